//! Watermark persistence.
//!
//! The watermark is the completion time of the last ingest cycle that
//! attempted every record it fetched. It is read once at the start of a
//! cycle and written once at the end.
//!
//! ## File Format
//!
//! ```text
//! 2026-10-19T14:05:00.123456789Z
//! ```
//!
//! One RFC 3339 UTC timestamp with nanosecond precision, so a value written
//! by one process loads back exactly in the next.

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

// Re-export for convenience
pub use local::FileWatermarkStore;

/// Trait for watermark storage backends.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Load the persisted watermark.
    ///
    /// Never fails: a missing or unreadable value yields the current time.
    async fn load(&self) -> DateTime<Utc>;

    /// Persist a watermark so that a later `load` returns exactly `ts`.
    async fn save(&self, ts: DateTime<Utc>) -> Result<()>;
}
