//! The persisted descriptor of one secondary-index engine.

use super::{write_bool, write_i32, write_string, Reader};
use crate::err::Error;
use std::collections::BTreeMap;

/// Configuration of a secondary-index engine.
///
/// The engine name is carried by the `engine_<name>` key rather than
/// the encoded payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexEngineConfig {
	pub version: i32,
	pub value_serializer_id: u8,
	pub key_serializer_id: u8,
	pub automatic: bool,
	pub null_values_supported: bool,
	pub key_size: i32,
	pub algorithm: String,
	/// Empty when the engine has no declared index type.
	pub index_type: String,
	pub encryption: Option<String>,
	pub key_types: Vec<String>,
	pub engine_properties: BTreeMap<String, String>,
}

impl IndexEngineConfig {
	pub fn encode(&self) -> Vec<u8> {
		let mut buf = Vec::new();
		write_i32(&mut buf, self.version);
		buf.push(self.value_serializer_id);
		buf.push(self.key_serializer_id);
		write_bool(&mut buf, self.automatic);
		write_bool(&mut buf, self.null_values_supported);
		write_i32(&mut buf, self.key_size);
		write_string(&mut buf, Some(&self.algorithm));
		write_string(&mut buf, Some(&self.index_type));
		write_string(&mut buf, self.encryption.as_deref());
		write_i32(&mut buf, self.key_types.len() as i32);
		for key_type in &self.key_types {
			write_string(&mut buf, Some(key_type));
		}
		write_i32(&mut buf, self.engine_properties.len() as i32);
		for (name, value) in &self.engine_properties {
			write_string(&mut buf, Some(name));
			write_string(&mut buf, Some(value));
		}
		buf
	}

	pub fn decode(key: &str, bytes: &[u8]) -> Result<Self, Error> {
		let mut reader = Reader::new(key, bytes);
		let version = reader.i32()?;
		let value_serializer_id = reader.u8()?;
		let key_serializer_id = reader.u8()?;
		let automatic = reader.bool()?;
		let null_values_supported = reader.bool()?;
		let key_size = reader.i32()?;
		let algorithm = reader.required_string("algorithm")?;
		let index_type = reader.string()?.unwrap_or_default();
		let encryption = reader.string()?;
		let key_type_count = reader.count()?;
		let mut key_types = Vec::with_capacity(key_type_count);
		for _ in 0..key_type_count {
			key_types.push(reader.required_string("keyType")?);
		}
		let property_count = reader.count()?;
		let mut engine_properties = BTreeMap::new();
		for _ in 0..property_count {
			let name = reader.required_string("propertyName")?;
			let value = reader.required_string("propertyValue")?;
			engine_properties.insert(name, value);
		}
		reader.expect_end()?;
		Ok(Self {
			version,
			value_serializer_id,
			key_serializer_id,
			automatic,
			null_values_supported,
			key_size,
			algorithm,
			index_type,
			encryption,
			key_types,
			engine_properties,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> IndexEngineConfig {
		IndexEngineConfig {
			version: 2,
			value_serializer_id: 17,
			key_serializer_id: 10,
			automatic: true,
			null_values_supported: false,
			key_size: 1,
			algorithm: "CELL_BTREE".to_owned(),
			index_type: "UNIQUE".to_owned(),
			encryption: None,
			key_types: vec!["STRING".to_owned(), "LONG".to_owned()],
			engine_properties: [("caseSensitive".to_owned(), "true".to_owned())]
				.into_iter()
				.collect(),
		}
	}

	#[test]
	fn round_trip() {
		let engine = sample();
		let decoded = IndexEngineConfig::decode("engine_idx1", &engine.encode()).unwrap();
		assert_eq!(decoded, engine);
	}

	#[test]
	fn absent_index_type_decodes_empty() {
		let mut engine = sample();
		engine.index_type = String::new();
		engine.key_types.clear();
		engine.engine_properties.clear();
		let decoded = IndexEngineConfig::decode("engine_idx1", &engine.encode()).unwrap();
		assert_eq!(decoded.index_type, "");
		assert_eq!(decoded, engine);
	}

	#[test]
	fn truncated_payload_is_corrupt() {
		let mut bytes = sample().encode();
		bytes.truncate(bytes.len() / 2);
		assert!(IndexEngineConfig::decode("engine_idx1", &bytes).is_err());
	}
}
