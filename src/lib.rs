//! The atomic storage-configuration store for the TernDB document-graph
//! database.
//!
//! Every database keeps its catalog (schema record identifiers, locale
//! and date/time defaults, cluster descriptors, secondary-index engine
//! descriptors, user properties and tuning constants) in a keyed
//! persistent map whose values are binary blobs. The map is layered on
//! two lower-level storage structures (an ordered key index and a
//! paginated record cluster) and every mutation is wrapped in a single
//! atomic operation, so a restart always recovers a consistent view.

#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

pub mod cfg;
pub mod cnf;
pub mod ctx;
pub mod err;
pub mod kvs;
pub mod tim;
pub mod val;
