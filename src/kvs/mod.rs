//! The module defining the keyed persistent map under the configuration
//! store, and the contracts of the storage structures it composes.
//!
//! The store itself is a thin transactional map in `store.rs`. It is
//! layered on three collaborator seams owned by the surrounding storage
//! engine: an ordered key index, a paginated record cluster, and the
//! atomic-operation manager coordinating the two. The `mem` module
//! provides an in-memory implementation of all three for embedded use
//! and for the test suite.

#[cfg(feature = "kv-mem")]
pub mod mem;

mod store;

pub use self::store::*;

use crate::err::Error;

const TARGET: &str = "terndb::config::kvs";

/// The key type for the configuration index.
pub type Key = String;

/// The value type stored in the record cluster.
pub type Val = Vec<u8>;

/// A stable reference to one record in the record cluster.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RecordRef(pub i64);

/// The ordered key → record-reference index.
///
/// Keys are unique UTF-8 strings, totally ordered lexicographically.
pub trait KeyIndex: Send + Sync {
	/// Initialise the index structure on disk.
	fn create(&mut self) -> Result<(), Error>;
	/// Open an existing index structure.
	fn load(&mut self) -> Result<(), Error>;
	/// Close the index structure.
	fn close(&mut self) -> Result<(), Error>;
	/// Remove the index files.
	fn delete(&mut self) -> Result<(), Error>;
	/// Fetch the reference mapped to a key.
	fn get(&self, key: &str) -> Result<Option<RecordRef>, Error>;
	/// Insert or replace a mapping.
	fn put(&mut self, key: &str, pos: RecordRef) -> Result<(), Error>;
	/// Remove a mapping, returning the reference it held.
	fn remove(&mut self, key: &str) -> Result<Option<RecordRef>, Error>;
	/// Iterate entries in ascending key order, starting at `from`.
	///
	/// With `inclusive` false the entry equal to `from` is skipped.
	/// Descending iteration reverses the order from the same position.
	fn iterate_major(
		&self,
		from: &str,
		inclusive: bool,
		ascending: bool,
	) -> Result<Box<dyn Iterator<Item = (Key, RecordRef)> + '_>, Error>;
}

/// The paginated record cluster storing configuration payloads.
pub trait RecordCluster: Send + Sync {
	/// Initialise the cluster files on disk.
	fn create(&mut self) -> Result<(), Error>;
	/// Open existing cluster files.
	fn open(&mut self) -> Result<(), Error>;
	/// Close the cluster files.
	fn close(&mut self) -> Result<(), Error>;
	/// Remove the cluster files.
	fn delete(&mut self) -> Result<(), Error>;
	/// Append a new record, returning its position.
	fn create_record(
		&mut self,
		content: &[u8],
		kind: u8,
		flags: u8,
		hint: Option<RecordRef>,
	) -> Result<RecordRef, Error>;
	/// Overwrite the payload of an existing record. A version of `-1`
	/// bypasses the version check.
	fn update_record(
		&mut self,
		pos: RecordRef,
		content: &[u8],
		version: i32,
		flags: u8,
	) -> Result<(), Error>;
	/// Delete a record.
	fn delete_record(&mut self, pos: RecordRef) -> Result<(), Error>;
	/// Read the payload of a record.
	fn read_record(&self, pos: RecordRef, prefetch: bool) -> Result<Val, Error>;
}

/// The atomic-operation manager coordinating index and cluster.
///
/// Changes made to either structure between `start_atomic_operation`
/// and `end_atomic_operation` become durable together on commit, or
/// are undone together on rollback. Operations do not nest.
pub trait AtomicManager: Send + Sync {
	fn start_atomic_operation(&self, name: &str, track_non_tx: bool) -> Result<(), Error>;
	fn end_atomic_operation(&self, rollback: bool) -> Result<(), Error>;
}

/// A scoped atomic operation.
///
/// Dropping the scope without calling [`AtomicScope::commit`] ends the
/// operation with rollback, so early returns and error paths always
/// compute the correct rollback flag.
pub struct AtomicScope<'a> {
	manager: &'a dyn AtomicManager,
	done: bool,
}

impl<'a> AtomicScope<'a> {
	/// Start a new atomic operation.
	pub fn start(manager: &'a dyn AtomicManager, name: &str) -> Result<Self, Error> {
		manager.start_atomic_operation(name, true)?;
		Ok(Self {
			manager,
			done: false,
		})
	}

	/// End the operation, making its changes durable.
	pub fn commit(mut self) -> Result<(), Error> {
		self.done = true;
		self.manager.end_atomic_operation(false)
	}
}

impl Drop for AtomicScope<'_> {
	fn drop(&mut self) {
		if !self.done {
			trace!(target: TARGET, "rolling back an uncommitted atomic operation");
			if let Err(e) = self.manager.end_atomic_operation(true) {
				error!(target: TARGET, "failed to roll back an atomic operation: {e}");
			}
		}
	}
}
