//! Core services for featurescope.
//!
//! This crate owns the two-tier cache manager, the schema manager that
//! categorizes catalog attributes, the catalog/metadata/warehouse
//! collaborators (live and mock), and the control plane behind the MCP tools.

pub mod cache;
pub mod control;
pub mod error;
pub mod integrations;
pub mod retry;
pub mod schema;
pub mod services;

pub use error::{ServerError, ServerResult};
