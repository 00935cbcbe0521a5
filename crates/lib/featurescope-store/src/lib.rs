//! Schema models and classification tables for featurescope.
//!
//! This crate defines the data model shared by the cache, the schema manager,
//! the collaborator clients and the MCP tools. It performs no I/O.

pub mod models;
pub mod schema;
pub mod warehouse;

pub use models::*;
pub use warehouse::*;
