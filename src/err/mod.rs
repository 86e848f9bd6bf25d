use thiserror::Error;

/// An error originating from the storage-configuration store.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
	/// The configuration store has not been created or loaded yet,
	/// or it has already been closed
	#[error("The configuration store is not open")]
	NotOpen,

	/// A stored value could not be decoded
	#[error("Corrupt configuration value for key '{key}' at offset {offset}: {reason}")]
	CorruptValue {
		key: String,
		offset: usize,
		reason: String,
	},

	/// There was a problem with one of the underlying storage structures
	#[error("There was a problem with the underlying storage: {0}")]
	Storage(String),

	/// A supplied argument was not valid for the operation
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// The atomic operation was already committed or rolled back
	#[error("The atomic operation has already finished")]
	TxFinished,

	/// A second atomic operation was started before the first finished
	#[error("Nested atomic operations are not permitted")]
	NestedAtomicOperation,

	/// Represents an underlying IO error from a storage structure
	#[error("There was a filesystem error: {0}")]
	Io(#[from] std::io::Error),

	/// An internal invariant was broken, indicating a bug
	#[error("An unreachable condition was reached: {0}")]
	Unreachable(String),
}
