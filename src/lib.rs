// src/lib.rs

//! Herald: announces newly licensed Chicago restaurants on Bluesky.

pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
