use once_cell::sync::Lazy;

/// Version of the storage-configuration layout written by this crate.
///
/// Persisted under the `version` key when a database is created, and
/// emitted as the first field of the text snapshot. Readers use it to
/// select the correct decoding path for older databases.
pub const CURRENT_VERSION: i32 = 23;

/// Version of the on-disk binary encoding used by newly created clusters.
pub const CURRENT_BINARY_FORMAT_VERSION: i32 = 13;

/// First network protocol version carrying conflict-strategy fields and
/// the record-serializer / context block in the text snapshot.
pub const PROTOCOL_CONFLICT_STRATEGY: i32 = 25;

/// First network protocol version carrying the per-cluster status name.
pub const PROTOCOL_CLUSTER_STATUS: i32 = 26;

/// First network protocol version carrying per-cluster encryption.
pub const PROTOCOL_CLUSTER_ENCRYPTION: i32 = 31;

/// Last network protocol version expecting the legacy data-segment block.
pub const PROTOCOL_LEGACY_SEGMENTS: i32 = 25;

/// The most recent network protocol version understood by this crate.
pub const LATEST_NETWORK_VERSION: i32 = 36;

/// Default character set for text values stored in the database.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Default date pattern, applied when a database is created.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Default date-time pattern, applied when a database is created.
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Name under which the configuration index and record cluster are
/// registered with the underlying storage.
pub const COMPONENT_NAME: &str = "config";

/// Name of the atomic operation wrapping every configuration mutation.
pub const ATOMIC_OPERATION_NAME: &str = "dbConfig";

/// Specifies the upper bound for automatic cluster sizing. When the
/// minimum cluster count is set to zero, it is recomputed as the number
/// of available processors capped by this value.
pub static MINIMUM_CLUSTERS_CAP: Lazy<usize> =
	lazy_env_parse!("TERNDB_MINIMUM_CLUSTERS_CAP", usize, 64);
