use super::{AtomicManager, AtomicScope, Key, KeyIndex, RecordCluster, Val};
use crate::cnf::ATOMIC_OPERATION_NAME;
use crate::err::Error;
use std::sync::Arc;

const TARGET: &str = "terndb::config::kvs::store";

/// Record kind under which configuration payloads are stored.
const RECORD_KIND: u8 = b'b';

/// A hook invoked after every committed configuration write.
pub trait UpdateListener: Send + Sync {
	fn on_update(&self, key: &str);
}

/// The keyed persistent map backing the configuration store.
///
/// Entries pair a key in the ordered index with a payload record in the
/// cluster. Every mutation runs inside a single named atomic operation,
/// so a crash can never separate the two structures: either both carry
/// the change or neither does.
///
/// The store carries no lock of its own. Mutators take `&mut self` and
/// readers `&self`; the owning facade maps those borrows onto its
/// readers/writer lock.
pub struct CatalogStore {
	index: Box<dyn KeyIndex>,
	cluster: Box<dyn RecordCluster>,
	atomics: Arc<dyn AtomicManager>,
	listener: Option<Arc<dyn UpdateListener>>,
}

impl CatalogStore {
	/// Compose a store from its collaborators.
	pub fn new(
		index: Box<dyn KeyIndex>,
		cluster: Box<dyn RecordCluster>,
		atomics: Arc<dyn AtomicManager>,
	) -> Self {
		Self {
			index,
			cluster,
			atomics,
			listener: None,
		}
	}

	/// Install or clear the post-commit update listener.
	pub fn set_update_listener(&mut self, listener: Option<Arc<dyn UpdateListener>>) {
		self.listener = listener;
	}

	/// Initialise both structures for a new database.
	pub fn create(&mut self) -> Result<(), Error> {
		self.cluster.create()?;
		self.index.create()?;
		Ok(())
	}

	/// Open both structures of an existing database.
	pub fn open(&mut self) -> Result<(), Error> {
		self.cluster.open()?;
		self.index.load()?;
		Ok(())
	}

	/// Close both structures.
	pub fn close(&mut self) -> Result<(), Error> {
		self.index.close()?;
		self.cluster.close()?;
		Ok(())
	}

	/// Remove both structures from disk.
	pub fn delete(&mut self) -> Result<(), Error> {
		self.index.delete()?;
		self.cluster.delete()?;
		Ok(())
	}

	/// Fetch the payload stored under a key.
	pub fn get(&self, key: &str) -> Result<Option<Val>, Error> {
		match self.index.get(key)? {
			Some(pos) => Ok(Some(self.cluster.read_record(pos, false)?)),
			None => Ok(None),
		}
	}

	/// Whether a key is present.
	pub fn exists(&self, key: &str) -> Result<bool, Error> {
		Ok(self.index.get(key)?.is_some())
	}

	/// Insert or overwrite the payload stored under a key.
	pub fn put(&mut self, key: &str, val: &[u8]) -> Result<(), Error> {
		#[cfg(debug_assertions)]
		trace!(target: TARGET, "put {key}");
		// Apply the change within one atomic operation
		let scope = AtomicScope::start(&*self.atomics, ATOMIC_OPERATION_NAME)?;
		match self.index.get(key)? {
			// The key exists, so overwrite its record in place
			Some(pos) => self.cluster.update_record(pos, val, -1, 0)?,
			// Otherwise append a record and link the key to it
			None => {
				let pos = self.cluster.create_record(val, RECORD_KIND, 0, None)?;
				self.index.put(key, pos)?;
			}
		}
		scope.commit()?;
		// The write is durable, notify the listener outside the scope
		if let Some(listener) = &self.listener {
			listener.on_update(key);
		}
		Ok(())
	}

	/// Remove a key and its payload record.
	pub fn del(&mut self, key: &str) -> Result<(), Error> {
		#[cfg(debug_assertions)]
		trace!(target: TARGET, "del {key}");
		let scope = AtomicScope::start(&*self.atomics, ATOMIC_OPERATION_NAME)?;
		if let Some(pos) = self.index.remove(key)? {
			self.cluster.delete_record(pos)?;
		}
		scope.commit()
	}

	/// Fetch every entry whose key starts with `prefix`, in ascending
	/// key order.
	pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<(Key, Val)>, Error> {
		let mut entries = Vec::new();
		for (key, pos) in self.index.iterate_major(prefix, false, true)? {
			// The index is ordered, so the family ends at the first
			// key outside the prefix
			if !key.starts_with(prefix) {
				break;
			}
			let val = self.cluster.read_record(pos, false)?;
			entries.push((key, val));
		}
		Ok(entries)
	}

	/// Remove every entry whose key starts with `prefix`, within one
	/// atomic operation.
	pub fn clear_prefix(&mut self, prefix: &str) -> Result<(), Error> {
		#[cfg(debug_assertions)]
		trace!(target: TARGET, "clear {prefix}");
		let mut entries = Vec::new();
		for (key, pos) in self.index.iterate_major(prefix, false, true)? {
			if !key.starts_with(prefix) {
				break;
			}
			entries.push((key, pos));
		}
		let scope = AtomicScope::start(&*self.atomics, ATOMIC_OPERATION_NAME)?;
		for (key, pos) in entries {
			self.index.remove(&key)?;
			self.cluster.delete_record(pos)?;
		}
		scope.commit()
	}
}

#[cfg(all(test, feature = "kv-mem"))]
mod tests {
	use super::*;
	use crate::kvs::mem::Datastore;
	use parking_lot::Mutex;

	fn new_store(ds: &Datastore) -> CatalogStore {
		let mut store = CatalogStore::new(
			Box::new(ds.index()),
			Box::new(ds.cluster()),
			Arc::new(ds.atomics()),
		);
		store.create().unwrap();
		store
	}

	#[test]
	fn put_get_del() {
		let ds = Datastore::new();
		let mut store = new_store(&ds);
		assert_eq!(store.get("version").unwrap(), None);
		store.put("version", &[0, 0, 0, 23]).unwrap();
		assert_eq!(store.get("version").unwrap().as_deref(), Some(&[0, 0, 0, 23][..]));
		// Overwrite in place
		store.put("version", &[0, 0, 0, 24]).unwrap();
		assert_eq!(store.get("version").unwrap().as_deref(), Some(&[0, 0, 0, 24][..]));
		store.del("version").unwrap();
		assert_eq!(store.get("version").unwrap(), None);
		// Deleting an absent key is a no-op
		store.del("version").unwrap();
	}

	#[test]
	fn prefix_scan_is_confined() {
		let ds = Datastore::new();
		let mut store = new_store(&ds);
		store.put("cluster_1", b"one").unwrap();
		store.put("cluster_2", b"two").unwrap();
		store.put("clusterish", b"not in family").unwrap();
		store.put("engine_a", b"engine").unwrap();
		let entries = store.scan_prefix("cluster_").unwrap();
		let keys = entries.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>();
		assert_eq!(keys, vec!["cluster_1", "cluster_2"]);
		assert_eq!(entries[0].1, b"one");
	}

	#[test]
	fn clear_prefix_removes_family_only() {
		let ds = Datastore::new();
		let mut store = new_store(&ds);
		store.put("property_a", b"1").unwrap();
		store.put("property_b", b"2").unwrap();
		store.put("version", b"v").unwrap();
		store.clear_prefix("property_").unwrap();
		assert!(store.scan_prefix("property_").unwrap().is_empty());
		assert!(store.exists("version").unwrap());
	}

	#[test]
	fn listener_fires_after_commit() {
		let ds = Datastore::new();
		let mut store = new_store(&ds);
		#[derive(Default)]
		struct Recorder(Mutex<Vec<String>>);
		impl UpdateListener for Recorder {
			fn on_update(&self, key: &str) {
				self.0.lock().push(key.to_owned());
			}
		}
		let recorder = Arc::new(Recorder::default());
		store.set_update_listener(Some(recorder.clone()));
		store.put("charset", b"UTF-8").unwrap();
		store.put("version", b"23").unwrap();
		store.del("charset").unwrap();
		assert_eq!(*recorder.0.lock(), vec!["charset", "version"]);
	}
}
