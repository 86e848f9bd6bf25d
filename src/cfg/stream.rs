//! The legacy pipe-delimited text snapshot of the configuration.
//!
//! Produced for cluster and network exchange, parameterized by the
//! network protocol version of the peer. The layout and its filler
//! blocks are byte-compatible with readers going back to protocol 24,
//! so fields are only ever appended under a version check and the
//! retired physical-segment and data-segment blocks are emitted with
//! their historical defaults.

use super::ConfigStore;
use crate::cnf;
use crate::err::Error;
use crate::val::cluster::ClusterConfig;

/// Accumulates `|`-separated fields, rendering null as a single space.
struct StreamWriter {
	out: String,
	first: bool,
}

impl StreamWriter {
	fn new() -> Self {
		Self {
			out: String::new(),
			first: true,
		}
	}

	fn field(&mut self, value: Option<&str>) {
		if !self.first {
			self.out.push('|');
		}
		self.first = false;
		match value {
			Some(value) => self.out.push_str(value),
			None => self.out.push(' '),
		}
	}

	fn text(&mut self, value: &str) {
		self.field(Some(value));
	}

	fn int(&mut self, value: i64) {
		self.text(&value.to_string());
	}

	fn bool(&mut self, value: bool) {
		self.text(match value {
			true => "true",
			false => "false",
		});
	}

	fn finish(self) -> String {
		self.out
	}
}

impl ConfigStore {
	/// Render the configuration as the legacy delimited byte stream.
	///
	/// The whole snapshot is taken under one read-lock acquisition.
	/// `charset` names the encoding of the returned bytes; unknown
	/// labels are rejected.
	pub fn to_stream(&self, network_version: i32, charset: &str) -> Result<Vec<u8>, Error> {
		let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) else {
			return Err(Error::InvalidArgument(format!("'{charset}' is not a known charset")));
		};
		let inner = self.inner.read();
		inner.check_open()?;
		let mut w = StreamWriter::new();
		w.int(inner.require_i32(super::VERSION)? as i64);
		// The storage name slot is padding in this rendition
		w.text("");
		w.field(inner.get_string(super::SCHEMA_RECORD_ID)?.as_deref());
		// The dictionary record id slot was retired long ago
		w.text("");
		w.field(inner.get_string(super::INDEX_MANAGER_RECORD_ID)?.as_deref());
		w.field(inner.get_string(super::LOCALE_LANGUAGE)?.as_deref());
		w.field(inner.get_string(super::LOCALE_COUNTRY)?.as_deref());
		w.field(inner.get_string(super::DATE_FORMAT)?.as_deref());
		w.field(inner.get_string(super::DATE_TIME_FORMAT)?.as_deref());
		w.field(inner.get_string(super::TIME_ZONE)?.as_deref());
		w.field(inner.get_string(super::CHARSET)?.as_deref());
		if network_version >= cnf::PROTOCOL_CONFLICT_STRATEGY {
			w.field(inner.get_string(super::CONFLICT_STRATEGY)?.as_deref());
		}
		// Physical-segment block, fixed at its historical defaults
		w.field(None);
		w.text("0");
		w.text("mmap");
		w.text("500Kb");
		w.text("500Mb");
		w.text("50%");
		w.text("auto");
		w.int(0);
		// One slot per cluster id, gaps included
		let clusters = inner.clusters_sparse()?;
		w.int(clusters.len() as i64);
		for slot in &clusters {
			match slot {
				None => w.int(-1),
				Some(ClusterConfig::Paginated(c)) => {
					w.int(c.id as i64);
					w.text(&c.name);
					// Paginated clusters carry the "d" discriminator;
					// other variants emit their header bare
					w.text("d");
					w.bool(c.use_wal);
					w.field(c.compression.as_deref());
					if network_version >= cnf::PROTOCOL_CLUSTER_ENCRYPTION {
						w.field(c.encryption.as_deref());
					}
					if network_version >= cnf::PROTOCOL_CONFLICT_STRATEGY {
						w.field(c.conflict_strategy.as_deref());
					}
					if network_version >= cnf::PROTOCOL_CLUSTER_STATUS {
						w.text(c.status.name());
					}
					if network_version == cnf::LATEST_NETWORK_VERSION {
						w.int(c.binary_version as i64);
					}
				}
			}
		}
		// Pre-26 peers still expect the retired data-segment block
		if network_version <= cnf::PROTOCOL_LEGACY_SEGMENTS {
			w.int(0);
		}
		let properties = inner.properties()?;
		w.int(properties.len() as i64);
		for (name, value) in &properties {
			w.text(name);
			w.text(value);
		}
		w.int(inner.require_i32(super::BINARY_FORMAT_VERSION)? as i64);
		w.field(inner.get_string(super::CLUSTER_SELECTION)?.as_deref());
		w.int(inner.minimum_clusters() as i64);
		if network_version >= cnf::PROTOCOL_CONFLICT_STRATEGY {
			w.field(inner.get_string(super::RECORD_SERIALIZER)?.as_deref());
			w.int(inner.require_i32(super::RECORD_SERIALIZER_VERSION)? as i64);
			w.int(inner.context.len() as i64);
			for (key, value) in inner.context.iter() {
				w.text(key);
				let text = match inner.catalog.find_by_key(key) {
					Some(def) if def.hidden => None,
					_ => value.to_text(),
				};
				w.field(text.as_deref());
			}
		}
		let engines = inner.engines()?;
		w.int(engines.len() as i64);
		for (name, engine) in &engines {
			w.text(name);
			w.text(&engine.algorithm);
			w.text(&engine.index_type);
			w.int(engine.value_serializer_id as i64);
			w.int(engine.key_serializer_id as i64);
			w.bool(engine.automatic);
			w.bool(engine.null_values_supported);
			w.int(engine.key_size as i64);
			w.int(engine.key_types.len() as i64);
			for key_type in &engine.key_types {
				w.text(key_type);
			}
			w.int(engine.engine_properties.len() as i64);
			for (name, value) in &engine.engine_properties {
				w.text(name);
				w.text(value);
			}
		}
		w.field(inner.get_string(super::CREATE_AT_VERSION)?.as_deref());
		w.int(inner.get_i32(super::PAGE_SIZE)?.unwrap_or(-1) as i64);
		w.int(inner.get_i32(super::FREE_LIST_BOUNDARY)?.unwrap_or(-1) as i64);
		w.int(inner.get_i32(super::MAX_KEY_SIZE)?.unwrap_or(-1) as i64);
		w.text("");
		let out = w.finish();
		let (bytes, _, _) = encoding.encode(&out);
		Ok(bytes.into_owned())
	}
}
