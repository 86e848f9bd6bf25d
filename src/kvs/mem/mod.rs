#![cfg(feature = "kv-mem")]

//! An in-memory implementation of the storage collaborators.
//!
//! One [`Datastore`] owns the index and record state behind a shared
//! handle, and hands out [`KeyIndex`], [`RecordCluster`] and
//! [`AtomicManager`] views over it. Atomic operations snapshot the
//! whole state on start and restore it on rollback, which gives the
//! same both-before-or-both-after guarantee a write-ahead log provides
//! on disk. Intended for embedded use and for tests.

use super::{AtomicManager, Key, KeyIndex, RecordCluster, RecordRef, Val};
use crate::err::Error;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// A shared in-memory datastore.
#[derive(Clone, Default)]
pub struct Datastore {
	inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
	index: BTreeMap<Key, RecordRef>,
	records: BTreeMap<i64, Val>,
	next_pos: i64,
	snapshot: Option<Snapshot>,
	index_open: bool,
	cluster_open: bool,
}

struct Snapshot {
	index: BTreeMap<Key, RecordRef>,
	records: BTreeMap<i64, Val>,
	next_pos: i64,
}

impl Datastore {
	/// Create a new empty datastore.
	pub fn new() -> Self {
		Self::default()
	}

	/// A key-index view over this datastore.
	pub fn index(&self) -> MemIndex {
		MemIndex {
			inner: self.inner.clone(),
		}
	}

	/// A record-cluster view over this datastore.
	pub fn cluster(&self) -> MemCluster {
		MemCluster {
			inner: self.inner.clone(),
		}
	}

	/// The atomic-operation manager for this datastore.
	pub fn atomics(&self) -> MemAtomics {
		MemAtomics {
			inner: self.inner.clone(),
		}
	}
}

/// The in-memory key index.
pub struct MemIndex {
	inner: Arc<Mutex<Inner>>,
}

impl MemIndex {
	fn check_open(inner: &Inner) -> Result<(), Error> {
		match inner.index_open {
			true => Ok(()),
			false => Err(Error::Storage("the configuration index is not open".to_owned())),
		}
	}
}

impl KeyIndex for MemIndex {
	fn create(&mut self) -> Result<(), Error> {
		let mut inner = self.inner.lock();
		inner.index.clear();
		inner.index_open = true;
		Ok(())
	}

	fn load(&mut self) -> Result<(), Error> {
		self.inner.lock().index_open = true;
		Ok(())
	}

	fn close(&mut self) -> Result<(), Error> {
		self.inner.lock().index_open = false;
		Ok(())
	}

	fn delete(&mut self) -> Result<(), Error> {
		let mut inner = self.inner.lock();
		inner.index.clear();
		inner.index_open = false;
		Ok(())
	}

	fn get(&self, key: &str) -> Result<Option<RecordRef>, Error> {
		let inner = self.inner.lock();
		Self::check_open(&inner)?;
		Ok(inner.index.get(key).copied())
	}

	fn put(&mut self, key: &str, pos: RecordRef) -> Result<(), Error> {
		let mut inner = self.inner.lock();
		Self::check_open(&inner)?;
		inner.index.insert(key.to_owned(), pos);
		Ok(())
	}

	fn remove(&mut self, key: &str) -> Result<Option<RecordRef>, Error> {
		let mut inner = self.inner.lock();
		Self::check_open(&inner)?;
		Ok(inner.index.remove(key))
	}

	fn iterate_major(
		&self,
		from: &str,
		inclusive: bool,
		ascending: bool,
	) -> Result<Box<dyn Iterator<Item = (Key, RecordRef)> + '_>, Error> {
		let inner = self.inner.lock();
		Self::check_open(&inner)?;
		let start = match inclusive {
			true => Bound::Included(from.to_owned()),
			false => Bound::Excluded(from.to_owned()),
		};
		let mut entries = inner
			.index
			.range((start, Bound::Unbounded))
			.map(|(k, v)| (k.clone(), *v))
			.collect::<Vec<_>>();
		if !ascending {
			entries.reverse();
		}
		Ok(Box::new(entries.into_iter()))
	}
}

/// The in-memory record cluster.
pub struct MemCluster {
	inner: Arc<Mutex<Inner>>,
}

impl MemCluster {
	fn check_open(inner: &Inner) -> Result<(), Error> {
		match inner.cluster_open {
			true => Ok(()),
			false => Err(Error::Storage("the configuration cluster is not open".to_owned())),
		}
	}
}

impl RecordCluster for MemCluster {
	fn create(&mut self) -> Result<(), Error> {
		let mut inner = self.inner.lock();
		inner.records.clear();
		inner.next_pos = 0;
		inner.cluster_open = true;
		Ok(())
	}

	fn open(&mut self) -> Result<(), Error> {
		self.inner.lock().cluster_open = true;
		Ok(())
	}

	fn close(&mut self) -> Result<(), Error> {
		self.inner.lock().cluster_open = false;
		Ok(())
	}

	fn delete(&mut self) -> Result<(), Error> {
		let mut inner = self.inner.lock();
		inner.records.clear();
		inner.cluster_open = false;
		Ok(())
	}

	fn create_record(
		&mut self,
		content: &[u8],
		_kind: u8,
		_flags: u8,
		_hint: Option<RecordRef>,
	) -> Result<RecordRef, Error> {
		let mut inner = self.inner.lock();
		Self::check_open(&inner)?;
		let pos = inner.next_pos;
		inner.next_pos += 1;
		inner.records.insert(pos, content.to_vec());
		Ok(RecordRef(pos))
	}

	fn update_record(
		&mut self,
		pos: RecordRef,
		content: &[u8],
		_version: i32,
		_flags: u8,
	) -> Result<(), Error> {
		let mut inner = self.inner.lock();
		Self::check_open(&inner)?;
		if !inner.records.contains_key(&pos.0) {
			return Err(Error::Storage(format!("record {} does not exist", pos.0)));
		}
		inner.records.insert(pos.0, content.to_vec());
		Ok(())
	}

	fn delete_record(&mut self, pos: RecordRef) -> Result<(), Error> {
		let mut inner = self.inner.lock();
		Self::check_open(&inner)?;
		match inner.records.remove(&pos.0) {
			Some(_) => Ok(()),
			None => Err(Error::Storage(format!("record {} does not exist", pos.0))),
		}
	}

	fn read_record(&self, pos: RecordRef, _prefetch: bool) -> Result<Val, Error> {
		let inner = self.inner.lock();
		Self::check_open(&inner)?;
		match inner.records.get(&pos.0) {
			Some(content) => Ok(content.clone()),
			None => Err(Error::Storage(format!("record {} does not exist", pos.0))),
		}
	}
}

/// The in-memory atomic-operation manager.
#[derive(Clone)]
pub struct MemAtomics {
	inner: Arc<Mutex<Inner>>,
}

impl AtomicManager for MemAtomics {
	fn start_atomic_operation(&self, _name: &str, _track_non_tx: bool) -> Result<(), Error> {
		let mut inner = self.inner.lock();
		if inner.snapshot.is_some() {
			return Err(Error::NestedAtomicOperation);
		}
		inner.snapshot = Some(Snapshot {
			index: inner.index.clone(),
			records: inner.records.clone(),
			next_pos: inner.next_pos,
		});
		Ok(())
	}

	fn end_atomic_operation(&self, rollback: bool) -> Result<(), Error> {
		let mut inner = self.inner.lock();
		match inner.snapshot.take() {
			None => Err(Error::TxFinished),
			Some(snapshot) => {
				if rollback {
					inner.index = snapshot.index;
					inner.records = snapshot.records;
					inner.next_pos = snapshot.next_pos;
				}
				Ok(())
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rollback_restores_both_structures() {
		let ds = Datastore::new();
		let mut index = ds.index();
		let mut cluster = ds.cluster();
		let atomics = ds.atomics();
		index.create().unwrap();
		cluster.create().unwrap();
		// Commit one entry
		atomics.start_atomic_operation("test", true).unwrap();
		let pos = cluster.create_record(b"one", b'b', 0, None).unwrap();
		index.put("a", pos).unwrap();
		atomics.end_atomic_operation(false).unwrap();
		// Roll back a second entry
		atomics.start_atomic_operation("test", true).unwrap();
		let pos = cluster.create_record(b"two", b'b', 0, None).unwrap();
		index.put("b", pos).unwrap();
		atomics.end_atomic_operation(true).unwrap();
		// Only the committed entry survives
		assert!(index.get("a").unwrap().is_some());
		assert!(index.get("b").unwrap().is_none());
		let pos = index.get("a").unwrap().unwrap();
		assert_eq!(cluster.read_record(pos, false).unwrap(), b"one");
	}

	#[test]
	fn nested_operations_are_rejected() {
		let ds = Datastore::new();
		let atomics = ds.atomics();
		atomics.start_atomic_operation("test", true).unwrap();
		assert!(matches!(
			atomics.start_atomic_operation("test", true),
			Err(Error::NestedAtomicOperation)
		));
		atomics.end_atomic_operation(false).unwrap();
		assert!(matches!(
			atomics.end_atomic_operation(false),
			Err(Error::TxFinished)
		));
	}

	#[test]
	fn iteration_is_ordered_and_bounded() {
		let ds = Datastore::new();
		let mut index = ds.index();
		index.create().unwrap();
		for (i, key) in ["cluster_1", "cluster_2", "engine_a", "version"].iter().enumerate() {
			index.put(key, RecordRef(i as i64)).unwrap();
		}
		let keys = index
			.iterate_major("cluster_", false, true)
			.unwrap()
			.map(|(k, _)| k)
			.collect::<Vec<_>>();
		assert_eq!(keys, vec!["cluster_1", "cluster_2", "engine_a", "version"]);
	}

	#[test]
	fn closed_structures_refuse_access() {
		let ds = Datastore::new();
		let mut index = ds.index();
		index.create().unwrap();
		index.close().unwrap();
		assert!(matches!(index.get("a"), Err(Error::Storage(_))));
	}
}
