//! Clients for the services the announcer talks to.
//!
//! - License discovery on the Chicago Data Portal (`ChicagoDataClient`)
//! - Posting to Bluesky (`BlueskyClient`)

mod bluesky;
mod socrata;

pub use bluesky::{BlueskyClient, PostClient, PostRef};
pub use socrata::{ChicagoDataClient, LicenseSource};
