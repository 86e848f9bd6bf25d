//! The typed facade over the configuration catalog.
//!
//! [`ConfigStore`] exposes get/set operations for every catalog field,
//! derived views (locale, date formatters), the cluster / index-engine
//! / user-property families, and the store lifecycle. One readers/writer
//! lock guards every public entry point; the lock is not reentrant, so
//! nothing called under it (listeners included) may call back into the
//! facade.

mod stream;

use crate::cnf;
use crate::ctx::{self, ContextConfiguration, ContextValue, GlobalCatalog};
use crate::err::Error;
use crate::kvs::{AtomicManager, CatalogStore, KeyIndex, RecordCluster, UpdateListener};
use crate::tim::{DateFormatter, Locale, TimeZone};
use crate::val;
use crate::val::cluster::{ClusterConfig, ClusterStatus};
use crate::val::engine::IndexEngineConfig;
use parking_lot::RwLock;
use std::sync::Arc;

const TARGET: &str = "terndb::config::cfg";

// Catalog keys for single-valued fields
const VERSION: &str = "version";
const SCHEMA_RECORD_ID: &str = "schemaRecordId";
const INDEX_MANAGER_RECORD_ID: &str = "indexManagerRecordId";
const LOCALE_LANGUAGE: &str = "localeLanguage";
const LOCALE_COUNTRY: &str = "localeCountry";
const DATE_FORMAT: &str = "dateFormat";
const DATE_TIME_FORMAT: &str = "dateTimeFormat";
const TIME_ZONE: &str = "timeZone";
const CHARSET: &str = "charset";
const CONFLICT_STRATEGY: &str = "conflictStrategy";
const CLUSTER_SELECTION: &str = "clusterSelection";
const RECORD_SERIALIZER: &str = "recordSerializer";
const RECORD_SERIALIZER_VERSION: &str = "recordSerializerVersion";
const CREATE_AT_VERSION: &str = "createAtVersion";
const BINARY_FORMAT_VERSION: &str = "binaryFormatVersion";
const MINIMUM_CLUSTERS: &str = "minimumClusters";
const PAGE_SIZE: &str = "pageSize";
const FREE_LIST_BOUNDARY: &str = "freeListBoundary";
const MAX_KEY_SIZE: &str = "maxKeySize";
const CONFIGURATION: &str = "configuration";

// Key prefixes for the enumerable families
const CLUSTER_PREFIX: &str = "cluster_";
const ENGINE_PREFIX: &str = "engine_";
const PROPERTY_PREFIX: &str = "property_";

// The user property that mirrors the in-memory validation flag
const VALIDATION_PROPERTY: &str = "validation";

/// Lifecycle state of the store.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
	Uninitialized,
	Open,
	Closed,
	Deleted,
}

struct Inner {
	store: CatalogStore,
	catalog: Arc<dyn GlobalCatalog>,
	context: ContextConfiguration,
	state: State,
	validation: bool,
	locale: Option<Locale>,
}

/// The atomic, persistent storage-configuration store of one database.
pub struct ConfigStore {
	inner: RwLock<Inner>,
}

impl ConfigStore {
	/// Compose a store from its collaborators. The store starts
	/// uninitialized; call [`ConfigStore::create`] for a new database
	/// or [`ConfigStore::load`] for an existing one.
	pub fn new(
		index: Box<dyn KeyIndex>,
		cluster: Box<dyn RecordCluster>,
		atomics: Arc<dyn AtomicManager>,
		catalog: Arc<dyn GlobalCatalog>,
	) -> Self {
		Self {
			inner: RwLock::new(Inner {
				store: CatalogStore::new(index, cluster, atomics),
				catalog,
				context: ContextConfiguration::new(),
				state: State::Uninitialized,
				validation: true,
				locale: None,
			}),
		}
	}

	/// Compose a store over the in-memory datastore.
	#[cfg(feature = "kv-mem")]
	pub fn memory(ds: &crate::kvs::mem::Datastore, catalog: Arc<dyn GlobalCatalog>) -> Self {
		Self::new(
			Box::new(ds.index()),
			Box::new(ds.cluster()),
			Arc::new(ds.atomics()),
			catalog,
		)
	}

	// --------------------------------------------------
	// Lifecycle
	// --------------------------------------------------

	/// Initialise the storage structures of a new database and
	/// populate the catalog with defaults.
	pub fn create(&self, context: ContextConfiguration) -> Result<(), Error> {
		let mut inner = self.inner.write();
		if inner.state != State::Uninitialized {
			return Err(Error::InvalidArgument(
				"the configuration store has already been initialised".to_owned(),
			));
		}
		inner.context = context;
		inner.store.create()?;
		inner.init()?;
		inner.state = State::Open;
		Ok(())
	}

	/// Open the storage structures of an existing database and
	/// rehydrate the in-memory view.
	pub fn load(&self, context: ContextConfiguration) -> Result<(), Error> {
		let mut inner = self.inner.write();
		if !matches!(inner.state, State::Uninitialized | State::Closed) {
			return Err(Error::InvalidArgument(
				"the configuration store is already open".to_owned(),
			));
		}
		inner.context = context;
		inner.store.open()?;
		// Rehydrate the persisted context into the supplied one
		if let Some(bytes) = inner.store.get(CONFIGURATION)? {
			for (key, value) in val::context::decode_context(CONFIGURATION, &bytes)? {
				let Some(def) = inner.catalog.find_by_key(&key) else {
					warn!(target: TARGET, "Skipping unknown context key '{key}' found in the stored configuration");
					continue;
				};
				match value {
					None => inner.context.set(&key, ContextValue::Null),
					Some(text) => match def.kind.parse_text(&key, &text) {
						Ok(value) => inner.context.set(&key, value),
						Err(e) => {
							warn!(target: TARGET, "Skipping stored context key '{key}': {e}");
						}
					},
				}
			}
		}
		// Rehydrate the minimum cluster count
		if let Some(count) = inner.get_i32(MINIMUM_CLUSTERS)? {
			inner.context.set(ctx::MINIMUM_CLUSTERS, ContextValue::Int(count as i64));
		}
		// Rehydrate the validation flag
		inner.validation = match inner.get_string(&property_key(VALIDATION_PROPERTY))? {
			Some(text) => text.eq_ignore_ascii_case("true"),
			None => inner.context.get_bool(ctx::VALIDATION).unwrap_or(true),
		};
		inner.locale = None;
		inner.state = State::Open;
		Ok(())
	}

	/// Persist the computed values and close the storage structures.
	pub fn close(&self) -> Result<(), Error> {
		let mut inner = self.inner.write();
		inner.check_open()?;
		// Flush the context and the minimum cluster count
		let blob = val::context::encode_context(&inner.context, &*inner.catalog);
		inner.store.put(CONFIGURATION, &blob)?;
		if let Some(count) = inner.context.get_int(ctx::MINIMUM_CLUSTERS) {
			inner.put_i32(MINIMUM_CLUSTERS, count as i32)?;
		}
		inner.store.close()?;
		inner.state = State::Closed;
		Ok(())
	}

	/// Remove the storage structures from disk.
	pub fn delete(&self) -> Result<(), Error> {
		let mut inner = self.inner.write();
		if inner.state == State::Deleted {
			return Err(Error::NotOpen);
		}
		inner.store.delete()?;
		inner.state = State::Deleted;
		Ok(())
	}

	/// Install or clear the single post-commit update listener.
	pub fn set_update_listener(&self, listener: Option<Arc<dyn UpdateListener>>) {
		self.inner.write().store.set_update_listener(listener);
	}

	// --------------------------------------------------
	// Scalar fields
	// --------------------------------------------------

	/// The storage-configuration layout version.
	pub fn version(&self) -> Result<i32, Error> {
		let inner = self.read()?;
		inner.require_i32(VERSION)
	}

	pub fn schema_record_id(&self) -> Result<Option<String>, Error> {
		self.read()?.get_string(SCHEMA_RECORD_ID)
	}

	pub fn set_schema_record_id(&self, id: &str) -> Result<(), Error> {
		self.write()?.put_string(SCHEMA_RECORD_ID, Some(id))
	}

	pub fn index_manager_record_id(&self) -> Result<Option<String>, Error> {
		self.read()?.get_string(INDEX_MANAGER_RECORD_ID)
	}

	pub fn set_index_manager_record_id(&self, id: &str) -> Result<(), Error> {
		self.write()?.put_string(INDEX_MANAGER_RECORD_ID, Some(id))
	}

	pub fn locale_language(&self) -> Result<String, Error> {
		self.read()?.require_string(LOCALE_LANGUAGE)
	}

	pub fn set_locale_language(&self, language: &str) -> Result<(), Error> {
		let mut inner = self.write()?;
		inner.put_string(LOCALE_LANGUAGE, Some(language))?;
		inner.locale = None;
		Ok(())
	}

	pub fn locale_country(&self) -> Result<String, Error> {
		self.read()?.require_string(LOCALE_COUNTRY)
	}

	pub fn set_locale_country(&self, country: &str) -> Result<(), Error> {
		let mut inner = self.write()?;
		inner.put_string(LOCALE_COUNTRY, Some(country))?;
		inner.locale = None;
		Ok(())
	}

	/// The locale built from the stored language and country.
	///
	/// Falls back to the host locale when the stored components do not
	/// form a valid locale. The instance is cached until either
	/// component changes.
	pub fn locale_instance(&self) -> Result<Locale, Error> {
		let mut inner = self.write()?;
		if let Some(locale) = &inner.locale {
			return Ok(locale.clone());
		}
		let language = inner.require_string(LOCALE_LANGUAGE)?;
		let country = inner.require_string(LOCALE_COUNTRY)?;
		let locale = match Locale::new(&language, &country) {
			Ok(locale) => locale,
			Err(e) => {
				warn!(target: TARGET, "Stored locale '{language}_{country}' is not valid, falling back to the host locale: {e}");
				Locale::host_default()
			}
		};
		inner.locale = Some(locale.clone());
		Ok(locale)
	}

	pub fn date_format(&self) -> Result<String, Error> {
		self.read()?.require_string(DATE_FORMAT)
	}

	pub fn set_date_format(&self, format: &str) -> Result<(), Error> {
		self.write()?.put_string(DATE_FORMAT, Some(format))
	}

	pub fn date_time_format(&self) -> Result<String, Error> {
		self.read()?.require_string(DATE_TIME_FORMAT)
	}

	pub fn set_date_time_format(&self, format: &str) -> Result<(), Error> {
		self.write()?.put_string(DATE_TIME_FORMAT, Some(format))
	}

	/// A fresh strict formatter for the stored date format, bound to
	/// the stored time zone.
	pub fn date_format_instance(&self) -> Result<DateFormatter, Error> {
		let inner = self.read()?;
		DateFormatter::new(&inner.require_string(DATE_FORMAT)?, inner.time_zone())
	}

	/// A fresh strict formatter for the stored date-time format, bound
	/// to the stored time zone.
	pub fn date_time_format_instance(&self) -> Result<DateFormatter, Error> {
		let inner = self.read()?;
		DateFormatter::new(&inner.require_string(DATE_TIME_FORMAT)?, inner.time_zone())
	}

	/// The stored time zone.
	pub fn time_zone(&self) -> Result<TimeZone, Error> {
		Ok(self.read()?.time_zone())
	}

	pub fn set_time_zone(&self, tz: TimeZone) -> Result<(), Error> {
		self.write()?.put_string(TIME_ZONE, Some(tz.name()))
	}

	pub fn charset(&self) -> Result<String, Error> {
		self.read()?.require_string(CHARSET)
	}

	pub fn set_charset(&self, charset: &str) -> Result<(), Error> {
		self.write()?.put_string(CHARSET, Some(charset))
	}

	pub fn conflict_strategy(&self) -> Result<Option<String>, Error> {
		self.read()?.get_string(CONFLICT_STRATEGY)
	}

	pub fn set_conflict_strategy(&self, strategy: &str) -> Result<(), Error> {
		self.write()?.put_string(CONFLICT_STRATEGY, Some(strategy))
	}

	pub fn cluster_selection(&self) -> Result<Option<String>, Error> {
		self.read()?.get_string(CLUSTER_SELECTION)
	}

	pub fn set_cluster_selection(&self, selection: &str) -> Result<(), Error> {
		self.write()?.put_string(CLUSTER_SELECTION, Some(selection))
	}

	pub fn record_serializer(&self) -> Result<Option<String>, Error> {
		self.read()?.get_string(RECORD_SERIALIZER)
	}

	pub fn set_record_serializer(&self, serializer: &str) -> Result<(), Error> {
		self.write()?.put_string(RECORD_SERIALIZER, Some(serializer))
	}

	pub fn record_serializer_version(&self) -> Result<i32, Error> {
		self.read()?.require_i32(RECORD_SERIALIZER_VERSION)
	}

	pub fn set_record_serializer_version(&self, version: i32) -> Result<(), Error> {
		self.write()?.put_i32(RECORD_SERIALIZER_VERSION, version)
	}

	/// The engine version this database was created with.
	pub fn create_at_version(&self) -> Result<Option<String>, Error> {
		self.read()?.get_string(CREATE_AT_VERSION)
	}

	pub fn set_create_at_version(&self, version: &str) -> Result<(), Error> {
		self.write()?.put_string(CREATE_AT_VERSION, Some(version))
	}

	pub fn binary_format_version(&self) -> Result<i32, Error> {
		self.read()?.require_i32(BINARY_FORMAT_VERSION)
	}

	pub fn set_binary_format_version(&self, version: i32) -> Result<(), Error> {
		self.write()?.put_i32(BINARY_FORMAT_VERSION, version)
	}

	/// The page size of the underlying storage, `-1` when unset.
	pub fn page_size(&self) -> Result<i32, Error> {
		Ok(self.read()?.get_i32(PAGE_SIZE)?.unwrap_or(-1))
	}

	pub fn set_page_size(&self, size: i32) -> Result<(), Error> {
		self.write()?.put_i32(PAGE_SIZE, size)
	}

	/// The free-list boundary of the underlying storage, `-1` when unset.
	pub fn free_list_boundary(&self) -> Result<i32, Error> {
		Ok(self.read()?.get_i32(FREE_LIST_BOUNDARY)?.unwrap_or(-1))
	}

	pub fn set_free_list_boundary(&self, boundary: i32) -> Result<(), Error> {
		self.write()?.put_i32(FREE_LIST_BOUNDARY, boundary)
	}

	/// The maximum index key size, `-1` when unset.
	pub fn max_key_size(&self) -> Result<i32, Error> {
		Ok(self.read()?.get_i32(MAX_KEY_SIZE)?.unwrap_or(-1))
	}

	pub fn set_max_key_size(&self, size: i32) -> Result<(), Error> {
		self.write()?.put_i32(MAX_KEY_SIZE, size)
	}

	/// The minimum number of clusters allocated per class.
	pub fn minimum_clusters(&self) -> Result<i32, Error> {
		Ok(self.read()?.minimum_clusters())
	}

	/// Update the minimum cluster count in the context. A value of
	/// zero recomputes the count from the available processors.
	pub fn set_minimum_clusters(&self, count: i32) -> Result<(), Error> {
		let mut inner = self.write()?;
		if count < 0 {
			return Err(Error::InvalidArgument(format!(
				"the minimum cluster count cannot be negative, got {count}"
			)));
		}
		let count = match count {
			0 => auto_sized_clusters(),
			n => n,
		};
		inner.context.set(ctx::MINIMUM_CLUSTERS, ContextValue::Int(count as i64));
		Ok(())
	}

	/// Whether record validation is enabled for this database.
	pub fn validation_enabled(&self) -> Result<bool, Error> {
		Ok(self.read()?.validation)
	}

	/// A snapshot of the in-memory context.
	pub fn context(&self) -> Result<ContextConfiguration, Error> {
		Ok(self.read()?.context.clone())
	}

	/// Update a registered context key from its textual form.
	pub fn set_context_value(&self, key: &str, text: &str) -> Result<(), Error> {
		let mut inner = self.write()?;
		let Some(def) = inner.catalog.find_by_key(key) else {
			return Err(Error::InvalidArgument(format!(
				"context key '{key}' is not registered in the global catalog"
			)));
		};
		let value = def.kind.parse_text(key, text)?;
		inner.context.set(key, value);
		Ok(())
	}

	// --------------------------------------------------
	// Clusters
	// --------------------------------------------------

	/// Insert or replace the descriptor of a cluster.
	pub fn update_cluster(&self, config: ClusterConfig) -> Result<(), Error> {
		let mut inner = self.write()?;
		inner.store.put(&cluster_key(config.id()), &config.encode())
	}

	/// The descriptor of one cluster.
	pub fn cluster(&self, id: u32) -> Result<Option<ClusterConfig>, Error> {
		self.read()?.cluster(id)
	}

	/// All cluster descriptors as a sparse sequence indexed by cluster
	/// id; ids that were never assigned hold `None`.
	pub fn clusters(&self) -> Result<Vec<Option<ClusterConfig>>, Error> {
		self.read()?.clusters_sparse()
	}

	/// Change the status of a cluster, preserving every other field.
	pub fn set_cluster_status(&self, id: u32, status: &str) -> Result<(), Error> {
		let mut inner = self.write()?;
		let Some(status) = ClusterStatus::parse(status) else {
			return Err(Error::InvalidArgument(format!(
				"'{status}' is not a valid cluster status"
			)));
		};
		let Some(config) = inner.cluster(id)? else {
			return Err(Error::InvalidArgument(format!("cluster {id} does not exist")));
		};
		let ClusterConfig::Paginated(mut config) = config;
		config.status = status;
		inner.store.put(&cluster_key(id), &ClusterConfig::Paginated(config).encode())
	}

	/// Remove the descriptor of a cluster.
	pub fn drop_cluster(&self, id: u32) -> Result<(), Error> {
		self.write()?.store.del(&cluster_key(id))
	}

	// --------------------------------------------------
	// Index engines
	// --------------------------------------------------

	/// Register an index engine. Re-registering an existing name keeps
	/// the stored descriptor and logs a warning.
	pub fn add_index_engine(&self, name: &str, engine: IndexEngineConfig) -> Result<(), Error> {
		let mut inner = self.write()?;
		let key = engine_key(name);
		if inner.store.exists(&key)? {
			warn!(target: TARGET, "Index engine '{name}' is already registered, keeping the existing descriptor");
			return Ok(());
		}
		inner.store.put(&key, &engine.encode())
	}

	/// The descriptor of one index engine.
	pub fn index_engine(&self, name: &str) -> Result<Option<IndexEngineConfig>, Error> {
		let inner = self.read()?;
		let key = engine_key(name);
		match inner.store.get(&key)? {
			Some(bytes) => Ok(Some(IndexEngineConfig::decode(&key, &bytes)?)),
			None => Ok(None),
		}
	}

	/// The names of all registered index engines, in ascending order.
	pub fn index_engines(&self) -> Result<Vec<String>, Error> {
		let inner = self.read()?;
		Ok(inner
			.engines()?
			.into_iter()
			.map(|(name, _)| name)
			.collect())
	}

	/// Remove the descriptor of an index engine.
	pub fn delete_index_engine(&self, name: &str) -> Result<(), Error> {
		self.write()?.store.del(&engine_key(name))
	}

	// --------------------------------------------------
	// User properties
	// --------------------------------------------------

	/// Insert or replace a user property.
	pub fn set_property(&self, name: &str, value: &str) -> Result<(), Error> {
		let mut inner = self.write()?;
		inner.put_string(&property_key(name), Some(value))?;
		// The validation property mirrors an in-memory flag
		if name == VALIDATION_PROPERTY {
			inner.validation = value.eq_ignore_ascii_case("true");
		}
		Ok(())
	}

	/// Fetch a user property.
	pub fn property(&self, name: &str) -> Result<Option<String>, Error> {
		self.read()?.get_string(&property_key(name))
	}

	/// All user properties in ascending name order.
	pub fn properties(&self) -> Result<Vec<(String, String)>, Error> {
		self.read()?.properties()
	}

	/// Remove every user property within one atomic operation.
	pub fn clear_properties(&self) -> Result<(), Error> {
		self.write()?.store.clear_prefix(PROPERTY_PREFIX)
	}

	// --------------------------------------------------
	// Lock helpers
	// --------------------------------------------------

	fn read(&self) -> Result<parking_lot::RwLockReadGuard<'_, Inner>, Error> {
		let inner = self.inner.read();
		inner.check_open()?;
		Ok(inner)
	}

	fn write(&self) -> Result<parking_lot::RwLockWriteGuard<'_, Inner>, Error> {
		let inner = self.inner.write();
		inner.check_open()?;
		Ok(inner)
	}
}

impl Inner {
	fn check_open(&self) -> Result<(), Error> {
		match self.state {
			State::Open => Ok(()),
			_ => Err(Error::NotOpen),
		}
	}

	/// Populate a freshly created catalog with its defaults.
	fn init(&mut self) -> Result<(), Error> {
		self.put_i32(VERSION, cnf::CURRENT_VERSION)?;
		self.put_i32(BINARY_FORMAT_VERSION, cnf::CURRENT_BINARY_FORMAT_VERSION)?;
		self.put_string(CHARSET, Some(cnf::DEFAULT_CHARSET))?;
		self.put_string(DATE_FORMAT, Some(cnf::DEFAULT_DATE_FORMAT))?;
		self.put_string(DATE_TIME_FORMAT, Some(cnf::DEFAULT_DATETIME_FORMAT))?;
		let locale = Locale::host_default();
		self.put_string(LOCALE_LANGUAGE, Some(&locale.language))?;
		self.put_string(LOCALE_COUNTRY, Some(&locale.country))?;
		self.put_string(TIME_ZONE, Some(TimeZone::Local.name()))?;
		self.put_string(CREATE_AT_VERSION, Some(env!("CARGO_PKG_VERSION")))?;
		self.put_i32(RECORD_SERIALIZER_VERSION, 0)?;
		// Page tuning values start unset
		self.put_i32(PAGE_SIZE, -1)?;
		self.put_i32(FREE_LIST_BOUNDARY, -1)?;
		self.put_i32(MAX_KEY_SIZE, -1)?;
		// Size the minimum cluster count from the host
		if self.context.get_int(ctx::MINIMUM_CLUSTERS).is_none() {
			self.context
				.set(ctx::MINIMUM_CLUSTERS, ContextValue::Int(auto_sized_clusters() as i64));
		}
		self.validation = self.context.get_bool(ctx::VALIDATION).unwrap_or(true);
		Ok(())
	}

	fn get_string(&self, key: &str) -> Result<Option<String>, Error> {
		match self.store.get(key)? {
			Some(bytes) => val::decode_string(key, &bytes),
			None => Ok(None),
		}
	}

	fn require_string(&self, key: &str) -> Result<String, Error> {
		self.get_string(key)?.ok_or_else(|| {
			Error::Unreachable(format!("the '{key}' key is always written at creation"))
		})
	}

	fn get_i32(&self, key: &str) -> Result<Option<i32>, Error> {
		match self.store.get(key)? {
			Some(bytes) => Ok(Some(val::decode_i32(key, &bytes)?)),
			None => Ok(None),
		}
	}

	fn require_i32(&self, key: &str) -> Result<i32, Error> {
		self.get_i32(key)?.ok_or_else(|| {
			Error::Unreachable(format!("the '{key}' key is always written at creation"))
		})
	}

	fn put_string(&mut self, key: &str, value: Option<&str>) -> Result<(), Error> {
		self.store.put(key, &val::encode_string(value))
	}

	fn put_i32(&mut self, key: &str, value: i32) -> Result<(), Error> {
		self.store.put(key, &val::encode_i32(value))
	}

	/// The stored time zone, falling back to the host zone when the
	/// stored identifier is unknown.
	fn time_zone(&self) -> TimeZone {
		match self.get_string(TIME_ZONE) {
			Ok(Some(name)) => match TimeZone::parse(&name) {
				Some(tz) => tz,
				None => {
					warn!(target: TARGET, "Stored time zone '{name}' is unknown, falling back to the host zone");
					TimeZone::Local
				}
			},
			_ => TimeZone::Local,
		}
	}

	fn minimum_clusters(&self) -> i32 {
		self.context.get_int(ctx::MINIMUM_CLUSTERS).unwrap_or(1) as i32
	}

	fn cluster(&self, id: u32) -> Result<Option<ClusterConfig>, Error> {
		let key = cluster_key(id);
		match self.store.get(&key)? {
			Some(bytes) => Ok(Some(ClusterConfig::decode(&key, id, &bytes)?)),
			None => Ok(None),
		}
	}

	fn clusters_sparse(&self) -> Result<Vec<Option<ClusterConfig>>, Error> {
		let mut clusters: Vec<Option<ClusterConfig>> = Vec::new();
		for (key, bytes) in self.store.scan_prefix(CLUSTER_PREFIX)? {
			let Some(id) = key
				.strip_prefix(CLUSTER_PREFIX)
				.and_then(|s| s.parse::<u32>().ok())
			else {
				warn!(target: TARGET, "Skipping malformed cluster key '{key}'");
				continue;
			};
			let config = ClusterConfig::decode(&key, id, &bytes)?;
			// Ids are assigned sparsely, leave gaps as placeholders
			if clusters.len() <= id as usize {
				clusters.resize(id as usize + 1, None);
			}
			clusters[id as usize] = Some(config);
		}
		Ok(clusters)
	}

	fn engines(&self) -> Result<Vec<(String, IndexEngineConfig)>, Error> {
		let mut engines = Vec::new();
		for (key, bytes) in self.store.scan_prefix(ENGINE_PREFIX)? {
			let engine = IndexEngineConfig::decode(&key, &bytes)?;
			let name = key.strip_prefix(ENGINE_PREFIX).unwrap_or(&key).to_owned();
			engines.push((name, engine));
		}
		Ok(engines)
	}

	fn properties(&self) -> Result<Vec<(String, String)>, Error> {
		let mut properties = Vec::new();
		for (key, bytes) in self.store.scan_prefix(PROPERTY_PREFIX)? {
			let value = val::decode_string(&key, &bytes)?.unwrap_or_default();
			let name = key.strip_prefix(PROPERTY_PREFIX).unwrap_or(&key).to_owned();
			properties.push((name, value));
		}
		Ok(properties)
	}
}

/// Recompute the minimum cluster count from the available processors.
fn auto_sized_clusters() -> i32 {
	num_cpus::get().min(*cnf::MINIMUM_CLUSTERS_CAP).max(1) as i32
}

fn cluster_key(id: u32) -> String {
	format!("{CLUSTER_PREFIX}{id}")
}

fn engine_key(name: &str) -> String {
	format!("{ENGINE_PREFIX}{name}")
}

fn property_key(name: &str) -> String {
	format!("{PROPERTY_PREFIX}{name}")
}

#[cfg(all(test, feature = "kv-mem"))]
mod tests {
	use super::*;
	use crate::ctx::StaticCatalog;
	use crate::kvs::mem::Datastore;
	use crate::val::cluster::PaginatedClusterConfig;

	fn new_store() -> (Datastore, ConfigStore) {
		let ds = Datastore::new();
		let store = ConfigStore::memory(&ds, Arc::new(StaticCatalog::default()));
		store.create(ContextConfiguration::new()).unwrap();
		(ds, store)
	}

	#[test]
	fn create_populates_defaults() {
		let (_ds, store) = new_store();
		assert_eq!(store.version().unwrap(), cnf::CURRENT_VERSION);
		assert_eq!(store.binary_format_version().unwrap(), cnf::CURRENT_BINARY_FORMAT_VERSION);
		assert_eq!(store.charset().unwrap(), cnf::DEFAULT_CHARSET);
		assert_eq!(store.date_format().unwrap(), cnf::DEFAULT_DATE_FORMAT);
		assert_eq!(store.record_serializer_version().unwrap(), 0);
		assert_eq!(store.page_size().unwrap(), -1);
		assert_eq!(store.free_list_boundary().unwrap(), -1);
		assert_eq!(store.max_key_size().unwrap(), -1);
		assert_eq!(store.time_zone().unwrap(), TimeZone::Local);
		let min = store.minimum_clusters().unwrap();
		assert!(min >= 1 && min <= *cnf::MINIMUM_CLUSTERS_CAP as i32);
		assert!(store.schema_record_id().unwrap().is_none());
		assert!(store.validation_enabled().unwrap());
	}

	#[test]
	fn operations_require_an_open_store() {
		let ds = Datastore::new();
		let store = ConfigStore::memory(&ds, Arc::new(StaticCatalog::default()));
		assert!(matches!(store.version(), Err(Error::NotOpen)));
		store.create(ContextConfiguration::new()).unwrap();
		store.close().unwrap();
		assert!(matches!(store.charset(), Err(Error::NotOpen)));
		assert!(matches!(
			store.set_charset("UTF-8"),
			Err(Error::NotOpen)
		));
	}

	#[test]
	fn scalar_round_trips() {
		let (_ds, store) = new_store();
		store.set_schema_record_id("#0:1").unwrap();
		assert_eq!(store.schema_record_id().unwrap().as_deref(), Some("#0:1"));
		store.set_conflict_strategy("version").unwrap();
		assert_eq!(store.conflict_strategy().unwrap().as_deref(), Some("version"));
		store.set_cluster_selection("round-robin").unwrap();
		store.set_record_serializer("binary").unwrap();
		store.set_record_serializer_version(2).unwrap();
		assert_eq!(store.record_serializer_version().unwrap(), 2);
		store.set_page_size(4096).unwrap();
		assert_eq!(store.page_size().unwrap(), 4096);
	}

	#[test]
	fn minimum_clusters_auto_sizing() {
		let (_ds, store) = new_store();
		store.set_minimum_clusters(7).unwrap();
		assert_eq!(store.minimum_clusters().unwrap(), 7);
		store.set_minimum_clusters(0).unwrap();
		let min = store.minimum_clusters().unwrap();
		assert!(min >= 1 && min <= *cnf::MINIMUM_CLUSTERS_CAP as i32);
		assert!(store.set_minimum_clusters(-2).is_err());
	}

	#[test]
	fn cluster_status_change_preserves_fields() {
		let (_ds, store) = new_store();
		store
			.update_cluster(ClusterConfig::Paginated(PaginatedClusterConfig {
				id: 7,
				name: "users".to_owned(),
				use_wal: true,
				binary_version: 3,
				encryption: Some("aes".to_owned()),
				conflict_strategy: Some("overwrite".to_owned()),
				status: ClusterStatus::Online,
				compression: Some("none".to_owned()),
			}))
			.unwrap();
		store.set_cluster_status(7, "OFFLINE").unwrap();
		let ClusterConfig::Paginated(config) = store.cluster(7).unwrap().unwrap();
		assert_eq!(config.status, ClusterStatus::Offline);
		assert_eq!(config.name, "users");
		assert_eq!(config.encryption.as_deref(), Some("aes"));
		assert_eq!(config.binary_version, 3);
		// Unknown status names and absent clusters are rejected
		assert!(matches!(store.set_cluster_status(7, "SLEEPING"), Err(Error::InvalidArgument(_))));
		assert!(matches!(store.set_cluster_status(9, "ONLINE"), Err(Error::InvalidArgument(_))));
	}

	#[test]
	fn clusters_are_sparse() {
		let (_ds, store) = new_store();
		for id in [1u32, 4] {
			store
				.update_cluster(ClusterConfig::Paginated(PaginatedClusterConfig {
					id,
					name: format!("c{id}"),
					use_wal: false,
					binary_version: 1,
					encryption: None,
					conflict_strategy: None,
					status: ClusterStatus::Online,
					compression: None,
				}))
				.unwrap();
		}
		let clusters = store.clusters().unwrap();
		assert_eq!(clusters.len(), 5);
		assert!(clusters[0].is_none());
		assert_eq!(clusters[1].as_ref().unwrap().name(), "c1");
		assert!(clusters[2].is_none());
		assert!(clusters[3].is_none());
		assert_eq!(clusters[4].as_ref().unwrap().name(), "c4");
		store.drop_cluster(4).unwrap();
		assert!(store.cluster(4).unwrap().is_none());
	}

	#[test]
	fn duplicate_engines_are_skipped() {
		let (_ds, store) = new_store();
		let first = IndexEngineConfig {
			version: 1,
			algorithm: "CELL_BTREE".to_owned(),
			..Default::default()
		};
		let second = IndexEngineConfig {
			version: 9,
			algorithm: "HASH".to_owned(),
			..Default::default()
		};
		store.add_index_engine("idx1", first.clone()).unwrap();
		store.add_index_engine("idx1", second).unwrap();
		assert_eq!(store.index_engine("idx1").unwrap().unwrap(), first);
		store.add_index_engine("idx2", first).unwrap();
		assert_eq!(store.index_engines().unwrap(), vec!["idx1", "idx2"]);
		store.delete_index_engine("idx1").unwrap();
		assert_eq!(store.index_engines().unwrap(), vec!["idx2"]);
	}

	#[test]
	fn validation_property_updates_flag() {
		let (_ds, store) = new_store();
		assert!(store.validation_enabled().unwrap());
		store.set_property("validation", "false").unwrap();
		assert!(!store.validation_enabled().unwrap());
		store.set_property("validation", "TRUE").unwrap();
		assert!(store.validation_enabled().unwrap());
		store.set_property("custom", "value").unwrap();
		assert_eq!(
			store.properties().unwrap(),
			vec![
				("custom".to_owned(), "value".to_owned()),
				("validation".to_owned(), "TRUE".to_owned()),
			]
		);
		store.clear_properties().unwrap();
		assert!(store.properties().unwrap().is_empty());
	}

	#[test]
	fn close_and_load_round_trips_state() {
		let ds = Datastore::new();
		let store = ConfigStore::memory(&ds, Arc::new(StaticCatalog::default()));
		store.create(ContextConfiguration::new()).unwrap();
		store.set_date_format("%d/%m/%Y").unwrap();
		store.set_minimum_clusters(5).unwrap();
		store.close().unwrap();
		// Reopen over the same datastore, as a restart would
		let store = ConfigStore::memory(&ds, Arc::new(StaticCatalog::default()));
		store.load(ContextConfiguration::new()).unwrap();
		assert_eq!(store.date_format().unwrap(), "%d/%m/%Y");
		assert_eq!(store.minimum_clusters().unwrap(), 5);
		assert_eq!(store.version().unwrap(), cnf::CURRENT_VERSION);
	}

	#[test]
	fn locale_falls_back_to_host() {
		let (_ds, store) = new_store();
		store.set_locale_language("de").unwrap();
		store.set_locale_country("DE").unwrap();
		let locale = store.locale_instance().unwrap();
		assert_eq!(locale.language, "de");
		assert_eq!(locale.country, "DE");
		// An empty language cannot form a locale
		store.set_locale_language("").unwrap();
		let locale = store.locale_instance().unwrap();
		assert!(!locale.language.is_empty());
	}
}
