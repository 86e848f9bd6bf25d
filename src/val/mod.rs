//! Binary codecs for the configuration value families.
//!
//! Every value stored in the catalog is encoded with one of these
//! codecs, selected by the key name. Encodings are bit-stable: a value
//! written by any version of the crate decodes identically on every
//! other, and all integers are big-endian two's-complement.

use crate::err::Error;
use bytes::BufMut;

pub mod cluster;
pub mod context;
pub mod engine;

/// Append a nullable string value.
///
/// A null writes a single `0` byte. A present value writes a `1` byte,
/// the 4-byte byte-length of the UTF-16 content, then the content
/// itself in big-endian order without a BOM.
pub fn write_string(buf: &mut Vec<u8>, val: Option<&str>) {
	match val {
		None => buf.put_u8(0),
		Some(s) => {
			buf.put_u8(1);
			let units = s.encode_utf16().count();
			buf.put_i32((units * 2) as i32);
			for unit in s.encode_utf16() {
				buf.put_u16(unit);
			}
		}
	}
}

/// The encoded size of a nullable string value.
pub fn string_wire_size(val: Option<&str>) -> usize {
	match val {
		None => 1,
		Some(s) => s.encode_utf16().count() * 2 + 5,
	}
}

/// Append a 4-byte big-endian integer value.
pub fn write_i32(buf: &mut Vec<u8>, val: i32) {
	buf.put_i32(val);
}

/// Append a boolean as a single `0`/`1` byte.
pub fn write_bool(buf: &mut Vec<u8>, val: bool) {
	buf.put_u8(val as u8);
}

/// Encode a standalone integer value.
pub fn encode_i32(val: i32) -> Vec<u8> {
	let mut buf = Vec::with_capacity(4);
	write_i32(&mut buf, val);
	buf
}

/// Decode a standalone integer value.
pub fn decode_i32(key: &str, bytes: &[u8]) -> Result<i32, Error> {
	let mut reader = Reader::new(key, bytes);
	let val = reader.i32()?;
	reader.expect_end()?;
	Ok(val)
}

/// Encode a standalone nullable string value.
pub fn encode_string(val: Option<&str>) -> Vec<u8> {
	let mut buf = Vec::with_capacity(string_wire_size(val));
	write_string(&mut buf, val);
	buf
}

/// Decode a standalone nullable string value.
pub fn decode_string(key: &str, bytes: &[u8]) -> Result<Option<String>, Error> {
	let mut reader = Reader::new(key, bytes);
	let val = reader.string()?;
	reader.expect_end()?;
	Ok(val)
}

/// A bounds-checked cursor over an encoded value.
///
/// Every read is validated against the remaining input; a failed read
/// reports the key being decoded and the offset it failed at.
pub(crate) struct Reader<'a> {
	key: &'a str,
	buf: &'a [u8],
	pos: usize,
}

impl<'a> Reader<'a> {
	pub(crate) fn new(key: &'a str, buf: &'a [u8]) -> Self {
		Self {
			key,
			buf,
			pos: 0,
		}
	}

	pub(crate) fn corrupt(&self, reason: impl Into<String>) -> Error {
		Error::CorruptValue {
			key: self.key.to_owned(),
			offset: self.pos,
			reason: reason.into(),
		}
	}

	fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
		if self.buf.len() - self.pos < len {
			return Err(self.corrupt(format!(
				"expected {len} more bytes but only {} remain",
				self.buf.len() - self.pos
			)));
		}
		let bytes = &self.buf[self.pos..self.pos + len];
		self.pos += len;
		Ok(bytes)
	}

	pub(crate) fn u8(&mut self) -> Result<u8, Error> {
		Ok(self.take(1)?[0])
	}

	pub(crate) fn bool(&mut self) -> Result<bool, Error> {
		match self.take(1)?[0] {
			0 => Ok(false),
			1 => Ok(true),
			v => Err(self.corrupt(format!("invalid boolean byte {v}"))),
		}
	}

	pub(crate) fn i32(&mut self) -> Result<i32, Error> {
		let bytes = self.take(4)?;
		Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
	}

	/// A non-negative count field, safe to use as a length.
	pub(crate) fn count(&mut self) -> Result<usize, Error> {
		let val = self.i32()?;
		if val < 0 {
			return Err(self.corrupt(format!("negative count {val}")));
		}
		Ok(val as usize)
	}

	pub(crate) fn string(&mut self) -> Result<Option<String>, Error> {
		match self.u8()? {
			0 => Ok(None),
			1 => {
				let len = self.count()?;
				if len % 2 != 0 {
					return Err(self.corrupt(format!("odd UTF-16 byte length {len}")));
				}
				let bytes = self.take(len)?;
				let units = bytes
					.chunks_exact(2)
					.map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
					.collect::<Vec<u16>>();
				match String::from_utf16(&units) {
					Ok(s) => Ok(Some(s)),
					Err(_) => Err(self.corrupt("invalid UTF-16 content")),
				}
			}
			v => Err(self.corrupt(format!("invalid string prefix byte {v}"))),
		}
	}

	/// A string field that must be present.
	pub(crate) fn required_string(&mut self, field: &str) -> Result<String, Error> {
		match self.string()? {
			Some(s) => Ok(s),
			None => Err(self.corrupt(format!("field '{field}' must not be null"))),
		}
	}

	pub(crate) fn expect_end(&self) -> Result<(), Error> {
		if self.pos != self.buf.len() {
			return Err(self.corrupt(format!(
				"{} trailing bytes after value",
				self.buf.len() - self.pos
			)));
		}
		Ok(())
	}
}
