//! CLI command implementations.

pub mod conflicts;
pub mod list;
pub mod pending;
pub mod resolve;
pub mod status;
