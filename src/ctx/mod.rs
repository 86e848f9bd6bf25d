//! The external key/value context attached to a database.
//!
//! The context carries engine-wide settings supplied by the embedding
//! application. It is held in memory while the store is open and is
//! persisted as the `configuration` blob when the store closes.

use crate::err::Error;
use std::collections::BTreeMap;
use std::fmt;

/// Context key controlling the minimum number of clusters per class.
pub const MINIMUM_CLUSTERS: &str = "db.minimumClusters";

/// Context key controlling record validation.
pub const VALIDATION: &str = "db.validation";

/// The type a registered context key converts to on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValueKind {
	Bool,
	Int,
	Float,
	Str,
}

impl ValueKind {
	/// Convert the textual form of a value into its typed form.
	pub fn parse_text(&self, key: &str, text: &str) -> Result<ContextValue, Error> {
		match self {
			ValueKind::Bool => match text {
				"true" => Ok(ContextValue::Bool(true)),
				"false" => Ok(ContextValue::Bool(false)),
				_ => Err(Error::InvalidArgument(format!(
					"'{text}' is not a valid boolean for context key '{key}'"
				))),
			},
			ValueKind::Int => text.parse::<i64>().map(ContextValue::Int).map_err(|_| {
				Error::InvalidArgument(format!(
					"'{text}' is not a valid integer for context key '{key}'"
				))
			}),
			ValueKind::Float => text.parse::<f64>().map(ContextValue::Float).map_err(|_| {
				Error::InvalidArgument(format!(
					"'{text}' is not a valid float for context key '{key}'"
				))
			}),
			ValueKind::Str => Ok(ContextValue::Str(text.to_owned())),
		}
	}
}

/// A single typed context value.
///
/// `Null` marks a key whose value was suppressed when the context was
/// last serialized, because the key is registered as hidden.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ContextValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(String),
}

impl ContextValue {
	/// The textual form written into the configuration blob and the
	/// text snapshot. `None` for null values.
	pub fn to_text(&self) -> Option<String> {
		match self {
			ContextValue::Null => None,
			ContextValue::Bool(v) => Some(v.to_string()),
			ContextValue::Int(v) => Some(v.to_string()),
			ContextValue::Float(v) => Some(v.to_string()),
			ContextValue::Str(v) => Some(v.clone()),
		}
	}
}

impl fmt::Display for ContextValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.to_text() {
			Some(v) => write!(f, "{v}"),
			None => write!(f, "null"),
		}
	}
}

/// Definition of a key registered in the global catalog.
#[derive(Debug, Clone, Copy)]
pub struct GlobalKeyDef {
	/// The type the textual value converts to on load.
	pub kind: ValueKind,
	/// Hidden keys are serialized with a null value.
	pub hidden: bool,
}

/// The registry of recognised context keys.
///
/// Injected at store construction so that embedders control which keys
/// are known, typed and hidden, and so that tests can stub it out.
pub trait GlobalCatalog: Send + Sync {
	/// Look up the definition for a context key, if registered.
	fn find_by_key(&self, key: &str) -> Option<GlobalKeyDef>;
}

/// A map-backed [`GlobalCatalog`].
///
/// Registers the two keys the store itself consumes. Embedders add
/// their own with [`StaticCatalog::with`].
#[derive(Debug, Clone)]
pub struct StaticCatalog {
	entries: BTreeMap<String, GlobalKeyDef>,
}

impl Default for StaticCatalog {
	fn default() -> Self {
		Self::new()
			.with(MINIMUM_CLUSTERS, ValueKind::Int, false)
			.with(VALIDATION, ValueKind::Bool, false)
	}
}

impl StaticCatalog {
	/// Create an empty catalog.
	pub fn new() -> Self {
		Self {
			entries: BTreeMap::new(),
		}
	}

	/// Register a key definition.
	pub fn with(mut self, key: &str, kind: ValueKind, hidden: bool) -> Self {
		self.entries.insert(
			key.to_owned(),
			GlobalKeyDef {
				kind,
				hidden,
			},
		);
		self
	}
}

impl GlobalCatalog for StaticCatalog {
	fn find_by_key(&self, key: &str) -> Option<GlobalKeyDef> {
		self.entries.get(key).copied()
	}
}

/// The in-memory key/value context of one database.
#[derive(Debug, Clone, Default)]
pub struct ContextConfiguration {
	values: BTreeMap<String, ContextValue>,
}

impl ContextConfiguration {
	/// Create an empty context.
	pub fn new() -> Self {
		Self::default()
	}

	/// Fetch a value.
	pub fn get(&self, key: &str) -> Option<&ContextValue> {
		self.values.get(key)
	}

	/// Fetch an integer value, if present and typed as such.
	pub fn get_int(&self, key: &str) -> Option<i64> {
		match self.values.get(key) {
			Some(ContextValue::Int(v)) => Some(*v),
			_ => None,
		}
	}

	/// Fetch a boolean value, if present and typed as such.
	pub fn get_bool(&self, key: &str) -> Option<bool> {
		match self.values.get(key) {
			Some(ContextValue::Bool(v)) => Some(*v),
			_ => None,
		}
	}

	/// Insert or replace a value.
	pub fn set(&mut self, key: &str, value: ContextValue) {
		self.values.insert(key.to_owned(), value);
	}

	/// Remove a value.
	pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
		self.values.remove(key)
	}

	/// Whether the context holds no values.
	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// The number of values in the context.
	pub fn len(&self) -> usize {
		self.values.len()
	}

	/// Iterate over the entries in ascending key order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextValue)> {
		self.values.iter().map(|(k, v)| (k.as_str(), v))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn typed_accessors() {
		let mut ctx = ContextConfiguration::new();
		ctx.set(MINIMUM_CLUSTERS, ContextValue::Int(4));
		ctx.set(VALIDATION, ContextValue::Bool(false));
		assert_eq!(ctx.get_int(MINIMUM_CLUSTERS), Some(4));
		assert_eq!(ctx.get_bool(VALIDATION), Some(false));
		assert_eq!(ctx.get_int(VALIDATION), None);
		assert_eq!(ctx.get("missing"), None);
	}

	#[test]
	fn text_conversion() {
		assert_eq!(
			ValueKind::Int.parse_text("k", "42").unwrap(),
			ContextValue::Int(42)
		);
		assert_eq!(
			ValueKind::Bool.parse_text("k", "true").unwrap(),
			ContextValue::Bool(true)
		);
		assert!(ValueKind::Int.parse_text("k", "x").is_err());
		assert_eq!(ContextValue::Null.to_text(), None);
		assert_eq!(ContextValue::Int(7).to_text().as_deref(), Some("7"));
	}
}
