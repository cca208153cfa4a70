//! CLI command implementations.

pub mod interactive;
pub mod query;
pub mod stats;
