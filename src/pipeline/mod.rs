//! Ingest pipeline and the components it drives.
//!
//! - `filter`: inclusion/exclusion rules for candidate records
//! - `render`: announcement text for a record
//! - `publish`: spacing and fixed-delay retry around the post client
//! - `cycle`: one fetch → filter → render → publish → advance pass
//! - `scheduler`: runs cycles forever, isolating failures

pub mod cycle;
pub mod filter;
pub mod publish;
pub mod render;
pub mod scheduler;

pub use cycle::{CycleSummary, IngestPipeline, PublishOutcome};
pub use filter::{Rejection, check, passes};
pub use publish::{PublishError, PublishReceipt, RateLimitedPublisher};
pub use render::render;
pub use scheduler::{Cycle, Scheduler};
