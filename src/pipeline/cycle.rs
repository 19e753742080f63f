//! One ingest cycle.
//!
//! ```text
//! START → FETCHED → (per record: FILTERED → RENDERED → PUBLISHED | SKIPPED | FAILED)
//!       → WATERMARK_ADVANCED → DONE
//! ```
//!
//! A failed fetch ends the cycle with an empty summary and leaves the
//! watermark untouched, so the next cycle queries the same window. Once
//! records are fetched, each is handled independently: a rejected or failed
//! record never stops the ones after it. The watermark then advances to the
//! cycle's completion time, not the newest record's timestamp, which
//! tolerates overlap on the next query instead of risking late arrivals.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::error::Result;
use crate::metrics::{
    CycleCompleted, CycleFailed, InternalEvent, PostFailed, PostSucceeded, RecordSkipped,
    RecordsFound,
};
use crate::models::{Config, FilterConfig, LicenseRecord, RenderConfig};
use crate::pipeline::filter;
use crate::pipeline::publish::RateLimitedPublisher;
use crate::pipeline::render::render;
use crate::pipeline::scheduler::Cycle;
use crate::services::{BlueskyClient, ChicagoDataClient, LicenseSource};
use crate::storage::{FileWatermarkStore, WatermarkStore};

/// What happened to a single fetched record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// Rejected by the filters; never attempted
    Skipped,
    /// Attempted and exhausted its retries
    Failed,
}

/// Per-cycle counters.
///
/// `fetched == attempted + skipped` and `attempted == published + failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub fetched: usize,
    pub attempted: usize,
    pub published: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl CycleSummary {
    fn record(&mut self, outcome: PublishOutcome) {
        match outcome {
            PublishOutcome::Published => {
                self.attempted += 1;
                self.published += 1;
            }
            PublishOutcome::Failed => {
                self.attempted += 1;
                self.failed += 1;
            }
            PublishOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Drives fetch → filter → render → publish → advance.
pub struct IngestPipeline {
    source: Box<dyn LicenseSource>,
    publisher: RateLimitedPublisher,
    store: Box<dyn WatermarkStore>,
    filters: FilterConfig,
    render: RenderConfig,
}

impl IngestPipeline {
    pub fn new(
        source: Box<dyn LicenseSource>,
        publisher: RateLimitedPublisher,
        store: Box<dyn WatermarkStore>,
        filters: FilterConfig,
        render: RenderConfig,
    ) -> Self {
        Self {
            source,
            publisher,
            store,
            filters,
            render,
        }
    }

    /// Build the production pipeline and log in to Bluesky.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let source = ChicagoDataClient::new(&config.source)?;

        let mut client = BlueskyClient::new(
            &config.bluesky,
            &config.source.user_agent,
            config.source.timeout_secs,
        )?;
        client.login().await?;

        let publisher = RateLimitedPublisher::new(
            Box::new(client),
            &config.features.throttling,
            config.features.error_handling.clone(),
        );
        let store = FileWatermarkStore::new(&config.storage.timestamp_file);

        Ok(Self::new(
            Box::new(source),
            publisher,
            Box::new(store),
            config.filters.clone(),
            config.render_config(),
        ))
    }

    /// Filter, render and publish one record.
    async fn process(&mut self, record: &LicenseRecord) -> PublishOutcome {
        if let Err(reason) = filter::check(record, &self.filters) {
            log::info!("Skipping {} - did not pass filters ({reason})", record.name);
            RecordSkipped.emit();
            return PublishOutcome::Skipped;
        }

        let text = render(record, &self.render);

        match self.publisher.publish(&text).await {
            Ok(receipt) => {
                log::info!(
                    "Successfully posted announcement for {} ({}, attempt {})",
                    record.name,
                    receipt.post.uri,
                    receipt.attempts
                );
                PostSucceeded {
                    attempts: receipt.attempts,
                }
                .emit();
                PublishOutcome::Published
            }
            Err(e) => {
                log::error!("Giving up on announcement for {}: {e}", record.name);
                PostFailed.emit();
                PublishOutcome::Failed
            }
        }
    }

    /// Run one complete cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleSummary> {
        let started = Instant::now();
        let watermark = self.store.load().await;
        log::info!("Checking for licenses issued since {watermark}");

        let records = match self.source.fetch_since(watermark).await {
            Ok(records) => records,
            Err(e) => {
                log::error!(
                    "Error fetching licenses from {}: {e}. Watermark stays at {watermark}",
                    self.source.name()
                );
                CycleFailed { stage: "fetch" }.emit();
                return Ok(CycleSummary::default());
            }
        };
        RecordsFound {
            count: records.len() as u64,
        }
        .emit();

        let mut summary = CycleSummary {
            fetched: records.len(),
            ..CycleSummary::default()
        };
        for record in &records {
            let outcome = self.process(record).await;
            summary.record(outcome);
        }

        let next = Utc::now().max(watermark);
        if let Err(e) = self.store.save(next).await {
            log::error!("Failed to save watermark {next}: {e}");
        }

        CycleCompleted {
            duration: started.elapsed(),
        }
        .emit();
        Ok(summary)
    }
}

#[async_trait]
impl Cycle for IngestPipeline {
    async fn run_cycle(&mut self) -> Result<CycleSummary> {
        IngestPipeline::run_cycle(self).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, NaiveDate, TimeZone};

    use super::*;
    use crate::error::AppError;
    use crate::models::{RetryConfig, ThrottlingConfig};
    use crate::services::{PostClient, PostRef};

    #[derive(Clone, Default)]
    struct MemoryStore {
        value: Arc<Mutex<Option<DateTime<Utc>>>>,
        fail_writes: bool,
    }

    impl MemoryStore {
        fn at(ts: DateTime<Utc>) -> Self {
            Self {
                value: Arc::new(Mutex::new(Some(ts))),
                fail_writes: false,
            }
        }

        fn get(&self) -> Option<DateTime<Utc>> {
            *self.value.lock().unwrap()
        }
    }

    #[async_trait]
    impl WatermarkStore for MemoryStore {
        async fn load(&self) -> DateTime<Utc> {
            self.get().unwrap_or_else(Utc::now)
        }

        async fn save(&self, ts: DateTime<Utc>) -> Result<()> {
            if self.fail_writes {
                return Err(AppError::config("read-only"));
            }
            *self.value.lock().unwrap() = Some(ts);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct FakeSource {
        records: Vec<LicenseRecord>,
        fail: bool,
        requested: Arc<Mutex<Vec<DateTime<Utc>>>>,
    }

    #[async_trait]
    impl LicenseSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<LicenseRecord>> {
            self.requested.lock().unwrap().push(since);
            if self.fail {
                Err(AppError::fetch("fake", "HTTP 503 Service Unavailable"))
            } else {
                Ok(self.records.clone())
            }
        }
    }

    /// Post client that fails every post whose text mentions a poisoned name.
    #[derive(Clone, Default)]
    struct FakePoster {
        poisoned: HashSet<String>,
        posts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl PostClient for FakePoster {
        async fn push(&mut self, text: &str) -> Result<PostRef> {
            self.posts.lock().unwrap().push(text.to_string());
            if self.poisoned.iter().any(|name| text.contains(name.as_str())) {
                return Err(AppError::publish("HTTP 400 Bad Request"));
            }
            Ok(PostRef {
                uri: "at://did:plc:test/app.bsky.feed.post/1".to_string(),
                cid: "cid".to_string(),
            })
        }
    }

    fn record(name: &str, ward: &str) -> LicenseRecord {
        LicenseRecord {
            name: name.to_string(),
            address: "123 W Madison St".to_string(),
            zip_code: "60601".to_string(),
            license_description: "RETAIL FOOD ESTABLISHMENT".to_string(),
            business_activity: None,
            square_footage: None,
            ward: Some(ward.to_string()),
            issued_at: NaiveDate::from_ymd_opt(2026, 10, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }

    fn pipeline(
        source: FakeSource,
        poster: FakePoster,
        store: MemoryStore,
        filters: FilterConfig,
        render: RenderConfig,
    ) -> IngestPipeline {
        let publisher = RateLimitedPublisher::new(
            Box::new(poster),
            &ThrottlingConfig {
                enabled: false,
                min_delay_between_posts: 0,
            },
            RetryConfig {
                auto_retry: true,
                retry_delay: 0,
                max_retries: 1,
            },
        );
        IngestPipeline::new(
            Box::new(source),
            publisher,
            Box::new(store),
            filters,
            render,
        )
    }

    #[tokio::test]
    async fn test_accepted_record_is_published() {
        let source = FakeSource {
            records: vec![record("Chicago Deep Dish Paradise", "42")],
            ..Default::default()
        };
        let poster = FakePoster::default();
        let store = MemoryStore::at(start());
        let filters = FilterConfig {
            included_wards: vec!["42".to_string()],
            ..Default::default()
        };
        let render = RenderConfig {
            hashtags: vec!["ChicagoEats".to_string()],
            ..RenderConfig::default()
        };
        let mut pipeline = pipeline(source, poster.clone(), store.clone(), filters, render);

        let summary = pipeline.run_cycle().await.unwrap();

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.published, 1);
        let posts = poster.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].contains("Chicago Deep Dish Paradise"));
        assert!(posts[0].ends_with("#ChicagoEats"));
        assert!(store.get().unwrap() > start());
    }

    #[tokio::test]
    async fn test_filtered_record_is_never_posted() {
        let source = FakeSource {
            records: vec![record("Chicago Deep Dish Paradise", "42")],
            ..Default::default()
        };
        let poster = FakePoster::default();
        let filters = FilterConfig {
            included_wards: vec!["1".to_string()],
            ..Default::default()
        };
        let mut pipeline = pipeline(
            source,
            poster.clone(),
            MemoryStore::at(start()),
            filters,
            RenderConfig::default(),
        );

        let summary = pipeline.run_cycle().await.unwrap();

        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.published, 0);
        assert_eq!(summary.skipped, 1);
        assert!(poster.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_failing_post_does_not_stop_the_rest() {
        let source = FakeSource {
            records: vec![
                record("First Bite", "42"),
                record("Poison Pizza", "42"),
                record("Filtered Fries", "7"),
                record("Last Call Tacos", "42"),
            ],
            ..Default::default()
        };
        let poster = FakePoster {
            poisoned: HashSet::from(["Poison Pizza".to_string()]),
            ..Default::default()
        };
        let filters = FilterConfig {
            included_wards: vec!["42".to_string()],
            ..Default::default()
        };
        let store = MemoryStore::at(start());
        let mut pipeline = pipeline(
            source,
            poster.clone(),
            store.clone(),
            filters,
            RenderConfig::default(),
        );

        let summary = pipeline.run_cycle().await.unwrap();

        assert_eq!(
            summary,
            CycleSummary {
                fetched: 4,
                attempted: 3,
                published: 2,
                failed: 1,
                skipped: 1,
            }
        );
        assert_eq!(summary.fetched, summary.attempted + summary.skipped);
        assert_eq!(summary.attempted, summary.published + summary.failed);

        let posts = poster.posts.lock().unwrap();
        // 1 + 2 attempts for the poisoned post + 1
        assert_eq!(posts.len(), 4);
        assert!(posts.last().unwrap().contains("Last Call Tacos"));
        assert!(store.get().unwrap() > start());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_watermark() {
        let source = FakeSource {
            fail: true,
            ..Default::default()
        };
        let requested = Arc::clone(&source.requested);
        let store = MemoryStore::at(start());
        let mut pipeline = pipeline(
            source,
            FakePoster::default(),
            store.clone(),
            FilterConfig::default(),
            RenderConfig::default(),
        );

        assert_eq!(pipeline.run_cycle().await.unwrap(), CycleSummary::default());
        assert_eq!(store.get(), Some(start()));

        pipeline.run_cycle().await.unwrap();
        assert_eq!(*requested.lock().unwrap(), vec![start(), start()]);
    }

    #[tokio::test]
    async fn test_empty_fetch_still_advances() {
        let store = MemoryStore::at(start());
        let mut pipeline = pipeline(
            FakeSource::default(),
            FakePoster::default(),
            store.clone(),
            FilterConfig::default(),
            RenderConfig::default(),
        );

        let summary = pipeline.run_cycle().await.unwrap();
        assert_eq!(summary, CycleSummary::default());
        assert!(store.get().unwrap() > start());
    }

    #[tokio::test]
    async fn test_watermark_never_moves_backwards() {
        let future = Utc::now() + chrono::Duration::days(1);
        let store = MemoryStore::at(future);
        let mut pipeline = pipeline(
            FakeSource::default(),
            FakePoster::default(),
            store.clone(),
            FilterConfig::default(),
            RenderConfig::default(),
        );

        pipeline.run_cycle().await.unwrap();
        assert_eq!(store.get(), Some(future));
    }

    #[tokio::test]
    async fn test_save_failure_does_not_fail_cycle() {
        let source = FakeSource {
            records: vec![record("First Bite", "42")],
            ..Default::default()
        };
        let store = MemoryStore {
            fail_writes: true,
            ..MemoryStore::at(start())
        };
        let mut pipeline = pipeline(
            source,
            FakePoster::default(),
            store.clone(),
            FilterConfig::default(),
            RenderConfig::default(),
        );

        let summary = pipeline.run_cycle().await.unwrap();
        assert_eq!(summary.published, 1);
        assert_eq!(store.get(), Some(start()));
    }
}
