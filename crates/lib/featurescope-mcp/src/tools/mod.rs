//! MCP tool modules.
//!
//! One module per control-plane tool, plus contextual help.

pub mod analysis;
pub mod compliance;
pub mod discovery;
pub mod query;
mod context;
