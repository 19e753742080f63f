//! Utility functions and helpers.

pub mod http;
#[cfg(feature = "cli")]
pub mod log;
