//! Data models for the attendance backend.
//!
//! Field names serialize in camelCase to match the mobile client's interfaces.

mod attendance;
mod statistics;

pub use attendance::*;
pub use statistics::*;
