//! The persisted descriptor of one cluster (partition).

use super::{write_bool, write_i32, write_string, Reader};
use crate::err::Error;
use std::fmt;

/// Operational status of a cluster.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ClusterStatus {
	#[default]
	Online,
	Offline,
}

impl ClusterStatus {
	/// The persisted enum name.
	pub fn name(&self) -> &'static str {
		match self {
			Self::Online => "ONLINE",
			Self::Offline => "OFFLINE",
		}
	}

	/// Parse a persisted enum name.
	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"ONLINE" => Some(Self::Online),
			"OFFLINE" => Some(Self::Offline),
			_ => None,
		}
	}
}

impl fmt::Display for ClusterStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Configuration of a paginated cluster.
#[derive(Clone, Debug, PartialEq)]
pub struct PaginatedClusterConfig {
	/// Cluster id, carried by the `cluster_<id>` key rather than the
	/// encoded payload.
	pub id: u32,
	pub name: String,
	pub use_wal: bool,
	pub binary_version: i32,
	pub encryption: Option<String>,
	pub conflict_strategy: Option<String>,
	pub status: ClusterStatus,
	pub compression: Option<String>,
}

/// A cluster descriptor.
///
/// The on-disk format only ever encodes the paginated variant, but the
/// discriminator is kept explicit so that adding another variant cannot
/// silently change the wire format.
#[derive(Clone, Debug, PartialEq)]
pub enum ClusterConfig {
	Paginated(PaginatedClusterConfig),
}

impl ClusterConfig {
	/// The cluster id.
	pub fn id(&self) -> u32 {
		match self {
			Self::Paginated(c) => c.id,
		}
	}

	/// The cluster name.
	pub fn name(&self) -> &str {
		match self {
			Self::Paginated(c) => &c.name,
		}
	}

	/// Encode the descriptor payload. The id is not part of the
	/// payload; it lives in the key.
	pub fn encode(&self) -> Vec<u8> {
		match self {
			Self::Paginated(c) => {
				let mut buf = Vec::new();
				write_string(&mut buf, Some(&c.name));
				write_bool(&mut buf, c.use_wal);
				write_i32(&mut buf, c.binary_version);
				write_string(&mut buf, c.encryption.as_deref());
				write_string(&mut buf, c.conflict_strategy.as_deref());
				write_string(&mut buf, Some(c.status.name()));
				write_string(&mut buf, c.compression.as_deref());
				buf
			}
		}
	}

	/// Decode a descriptor payload stored under `key`, for the cluster
	/// id carried by that key.
	pub fn decode(key: &str, id: u32, bytes: &[u8]) -> Result<Self, Error> {
		let mut reader = Reader::new(key, bytes);
		let name = reader.required_string("name")?;
		let use_wal = reader.bool()?;
		let binary_version = reader.i32()?;
		let encryption = reader.string()?;
		let conflict_strategy = reader.string()?;
		let status = reader.required_string("status")?;
		let status = match ClusterStatus::parse(&status) {
			Some(s) => s,
			None => return Err(reader.corrupt(format!("unknown cluster status '{status}'"))),
		};
		let compression = reader.string()?;
		reader.expect_end()?;
		Ok(Self::Paginated(PaginatedClusterConfig {
			id,
			name,
			use_wal,
			binary_version,
			encryption,
			conflict_strategy,
			status,
			compression,
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> ClusterConfig {
		ClusterConfig::Paginated(PaginatedClusterConfig {
			id: 7,
			name: "users".to_owned(),
			use_wal: true,
			binary_version: 3,
			encryption: Some("aes".to_owned()),
			conflict_strategy: Some("overwrite".to_owned()),
			status: ClusterStatus::Online,
			compression: Some("none".to_owned()),
		})
	}

	#[test]
	fn round_trip() {
		let config = sample();
		let decoded = ClusterConfig::decode("cluster_7", 7, &config.encode()).unwrap();
		assert_eq!(decoded, config);
	}

	#[test]
	fn round_trip_with_nulls() {
		let config = ClusterConfig::Paginated(PaginatedClusterConfig {
			id: 0,
			name: "default".to_owned(),
			use_wal: false,
			binary_version: 1,
			encryption: None,
			conflict_strategy: None,
			status: ClusterStatus::Offline,
			compression: None,
		});
		let decoded = ClusterConfig::decode("cluster_0", 0, &config.encode()).unwrap();
		assert_eq!(decoded, config);
	}

	#[test]
	fn unknown_status_is_corrupt() {
		let mut bytes = Vec::new();
		write_string(&mut bytes, Some("users"));
		write_bool(&mut bytes, true);
		write_i32(&mut bytes, 3);
		write_string(&mut bytes, None);
		write_string(&mut bytes, None);
		write_string(&mut bytes, Some("BROKEN"));
		write_string(&mut bytes, None);
		let err = ClusterConfig::decode("cluster_7", 7, &bytes).unwrap_err();
		assert!(matches!(err, Error::CorruptValue { .. }));
	}
}
