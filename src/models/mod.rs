// src/models/mod.rs

//! Domain models for the announcer.

mod config;
mod record;

// Re-export all public types
pub use config::{
    AnnouncementFeatures, BlueskyConfig, Config, FeatureConfig, FilterConfig, FormattingFeatures,
    HashtagConfig, MonitoringConfig, PostTemplate, RenderConfig, RetryConfig, ScheduleConfig,
    SourceConfig, StorageConfig, ThrottlingConfig,
};
pub use record::LicenseRecord;
