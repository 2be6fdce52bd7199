//! Command implementations.

pub mod start;
pub mod version;
