//! Adapters for external stores.
//!
//! The core never talks to a database. Each submodule converts records to
//! and from the shape one kind of store exchanges, and drives a handle trait
//! that the caller implements over its own connection:
//!
//! - [`relational`]: WKT geometry plus JSON property text per row
//! - [`document`]: flattened GeoJSON documents
//!
//! [`memory`] provides in-memory handles for both.

pub mod document;
pub mod memory;
pub mod relational;

pub use crate::item::ExternalId;
pub use document::DocumentHandle;
pub use memory::{MemoryCollection, MemoryTable};
pub use relational::{RelationalHandle, SqlParams, SqlRow};
