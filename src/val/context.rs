//! Codec for the `configuration` blob, the serialized form of the
//! external key/value context.

use super::{write_i32, write_string, Reader};
use crate::ctx::{ContextConfiguration, GlobalCatalog};
use crate::err::Error;

const TARGET: &str = "terndb::config::val";

/// Encode the context as a counted list of key/value string pairs.
///
/// Keys registered as hidden in the global catalog are written with a
/// null value so that secrets never reach disk. Keys with no
/// registration at all are also written with a null value, with a
/// warning, so that a later load can still surface their presence.
pub fn encode_context(context: &ContextConfiguration, catalog: &dyn GlobalCatalog) -> Vec<u8> {
	let mut buf = Vec::new();
	write_i32(&mut buf, context.len() as i32);
	for (key, value) in context.iter() {
		write_string(&mut buf, Some(key));
		let text = match catalog.find_by_key(key) {
			Some(def) if def.hidden => None,
			Some(_) => value.to_text(),
			None => {
				warn!(target: TARGET, "Context key '{key}' is not registered in the global catalog, storing a null value");
				None
			}
		};
		write_string(&mut buf, text.as_deref());
	}
	buf
}

/// Decode the blob back into textual key/value pairs.
///
/// Conversion to typed values happens in the facade, where the global
/// catalog is consulted; null values survive as `None`.
pub fn decode_context(key: &str, bytes: &[u8]) -> Result<Vec<(String, Option<String>)>, Error> {
	let mut reader = Reader::new(key, bytes);
	let count = reader.count()?;
	let mut entries = Vec::with_capacity(count);
	for _ in 0..count {
		let name = reader.required_string("contextKey")?;
		let value = reader.string()?;
		entries.push((name, value));
	}
	reader.expect_end()?;
	Ok(entries)
}
