//! Application configuration structures.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Open-data portal query settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Bluesky account and service endpoint
    #[serde(default)]
    pub bluesky: BlueskyConfig,

    /// Cycle timing
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Persisted state locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Feature toggles
    #[serde(default)]
    pub features: FeatureConfig,

    /// Inclusion/exclusion rules
    #[serde(default)]
    pub filters: FilterConfig,

    /// Per-section prefixes for announcements
    #[serde(default)]
    pub post_template: PostTemplate,

    /// Hashtags appended to announcements
    #[serde(default)]
    pub hashtags: HashtagConfig,

    /// Logging and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, falling back to defaults only when the file
    /// does not exist. Returns whether the file was found.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<(Self, bool)> {
        match fs::read_to_string(path.as_ref()) {
            Ok(content) => Ok((toml::from_str(&content)?, true)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok((Self::default(), false)),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Values found here take precedence over anything read from the file.
    /// Empty values are ignored, and numeric values that fail to parse keep
    /// the current setting.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(handle) = get("BLUESKY_HANDLE") {
            self.bluesky.handle = handle;
        }
        if let Some(password) = get("BLUESKY_PASSWORD") {
            self.bluesky.password = password;
        }
        if let Some(token) = get("CHICAGO_DATA_TOKEN") {
            self.source.app_token = Some(token);
        }
        if let Some(minutes) = get("CHECK_INTERVAL_MINUTES") {
            match minutes.trim().parse() {
                Ok(m) => self.schedule.check_interval_minutes = m,
                Err(e) => log::warn!("Ignoring CHECK_INTERVAL_MINUTES={minutes:?}: {e}"),
            }
        }
        if let Some(path) = get("TIMESTAMP_FILE") {
            self.storage.timestamp_file = PathBuf::from(path);
        }
        if let Some(path) = get("LOG_FILE") {
            self.monitoring.log_file = Some(PathBuf::from(path));
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.bluesky.handle.trim().is_empty() {
            return Err(AppError::validation(
                "bluesky.handle is empty (set BLUESKY_HANDLE)",
            ));
        }
        if self.bluesky.password.is_empty() {
            return Err(AppError::validation(
                "bluesky.password is empty (set BLUESKY_PASSWORD)",
            ));
        }
        self.validate_source()?;
        if self.schedule.check_interval_minutes == 0 {
            return Err(AppError::validation(
                "schedule.check_interval_minutes must be > 0",
            ));
        }
        if self.storage.timestamp_file.as_os_str().is_empty() {
            return Err(AppError::validation("storage.timestamp_file is empty"));
        }
        Ok(())
    }

    /// Validate only the settings needed to query the open-data portal.
    pub fn validate_source(&self) -> Result<()> {
        if self.source.base_url.trim().is_empty() {
            return Err(AppError::validation("source.base_url is empty"));
        }
        if self.source.dataset.trim().is_empty() {
            return Err(AppError::validation("source.dataset is empty"));
        }
        if self.source.page_limit == 0 {
            return Err(AppError::validation("source.page_limit must be > 0"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if !(-12..=14).contains(&self.source.utc_offset_hours) {
            return Err(AppError::validation(
                "source.utc_offset_hours must be between -12 and 14",
            ));
        }
        Ok(())
    }

    /// Render settings derived from features, template and hashtags.
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            include_ward: self.features.announcement.include_ward,
            include_square_footage: self.features.announcement.include_square_footage,
            include_business_activity: self.features.announcement.include_business_activity,
            use_emojis: self.features.formatting.use_emojis,
            add_hashtags: self.features.formatting.add_hashtags,
            template: self.post_template.clone(),
            hashtags: self.hashtags.all(),
        }
    }
}

/// Chicago Data Portal query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the SODA resource endpoint
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Business licenses dataset identifier
    #[serde(default = "defaults::dataset")]
    pub dataset: String,

    /// Optional Socrata application token
    #[serde(default)]
    pub app_token: Option<String>,

    /// Maximum rows returned per query
    #[serde(default = "defaults::page_limit")]
    pub page_limit: u32,

    /// Fixed UTC offset of the portal's floating timestamps
    #[serde(default = "defaults::utc_offset_hours")]
    pub utc_offset_hours: i32,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            dataset: defaults::dataset(),
            app_token: None,
            page_limit: defaults::page_limit(),
            utc_offset_hours: defaults::utc_offset_hours(),
            timeout_secs: defaults::timeout(),
            user_agent: defaults::user_agent(),
        }
    }
}

/// Bluesky account settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct BlueskyConfig {
    /// PDS service URL
    #[serde(default = "defaults::bluesky_service")]
    pub service: String,

    /// Account handle, e.g. `chicagoeats.bsky.social`
    #[serde(default)]
    pub handle: String,

    /// App password
    #[serde(default)]
    pub password: String,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service: defaults::bluesky_service(),
            handle: String::new(),
            password: String::new(),
        }
    }
}

impl fmt::Debug for BlueskyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlueskyConfig")
            .field("service", &self.service)
            .field("handle", &self.handle)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Cycle timing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minutes between successful cycles
    #[serde(default = "defaults::check_interval_minutes")]
    pub check_interval_minutes: u64,

    /// Seconds to wait after a cycle fails unexpectedly
    #[serde(default = "defaults::recovery_delay_secs")]
    pub recovery_delay_secs: u64,

    /// Days of history shown by `preview`
    #[serde(default = "defaults::lookback_days")]
    pub lookback_days: u32,
}

impl ScheduleConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_minutes.saturating_mul(60))
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_secs(self.recovery_delay_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            check_interval_minutes: defaults::check_interval_minutes(),
            recovery_delay_secs: defaults::recovery_delay_secs(),
            lookback_days: defaults::lookback_days(),
        }
    }
}

/// Persisted state locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// File holding the last completed cycle timestamp
    #[serde(default = "defaults::timestamp_file")]
    pub timestamp_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            timestamp_file: defaults::timestamp_file(),
        }
    }
}

/// Feature toggle block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub announcement: AnnouncementFeatures,

    #[serde(default)]
    pub formatting: FormattingFeatures,

    #[serde(default)]
    pub throttling: ThrottlingConfig,

    #[serde(default)]
    pub error_handling: RetryConfig,
}

/// Optional announcement sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementFeatures {
    #[serde(default = "defaults::enabled")]
    pub include_ward: bool,

    #[serde(default = "defaults::enabled")]
    pub include_square_footage: bool,

    #[serde(default = "defaults::enabled")]
    pub include_business_activity: bool,
}

impl Default for AnnouncementFeatures {
    fn default() -> Self {
        Self {
            include_ward: true,
            include_square_footage: true,
            include_business_activity: true,
        }
    }
}

/// Announcement decoration toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattingFeatures {
    #[serde(default = "defaults::enabled")]
    pub use_emojis: bool,

    #[serde(default = "defaults::enabled")]
    pub add_hashtags: bool,
}

impl Default for FormattingFeatures {
    fn default() -> Self {
        Self {
            use_emojis: true,
            add_hashtags: true,
        }
    }
}

/// Minimum spacing between outbound posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottlingConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Seconds between consecutive post attempts
    #[serde(default = "defaults::min_delay_between_posts")]
    pub min_delay_between_posts: u64,
}

impl ThrottlingConfig {
    /// Spacing to enforce, or `None` when throttling is off.
    pub fn min_interval(&self) -> Option<Duration> {
        self.enabled
            .then(|| Duration::from_secs(self.min_delay_between_posts))
    }
}

impl Default for ThrottlingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_delay_between_posts: defaults::min_delay_between_posts(),
        }
    }
}

/// Retry policy for failed posts. The delay is fixed, not exponential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "defaults::enabled")]
    pub auto_retry: bool,

    /// Seconds to wait between attempts
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay: u64,

    /// Additional attempts after the first one
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }

    /// Total number of attempts a single post may consume.
    pub fn max_attempts(&self) -> u32 {
        if self.auto_retry {
            self.max_retries.saturating_add(1)
        } else {
            1
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            auto_retry: true,
            retry_delay: defaults::retry_delay(),
            max_retries: defaults::max_retries(),
        }
    }
}

/// Inclusion and exclusion rules. An empty list means "no constraint".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub excluded_license_types: Vec<String>,

    #[serde(default)]
    pub included_wards: Vec<String>,

    #[serde(default)]
    pub included_zip_codes: Vec<String>,
}

/// Header and per-section prefixes used when emojis are enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostTemplate {
    #[serde(default = "defaults::header")]
    pub header: String,

    #[serde(default = "defaults::name_prefix")]
    pub name_prefix: String,

    #[serde(default = "defaults::address_prefix")]
    pub address_prefix: String,

    #[serde(default = "defaults::activity_prefix")]
    pub activity_prefix: String,

    #[serde(default = "defaults::square_footage_prefix")]
    pub square_footage_prefix: String,

    #[serde(default = "defaults::ward_prefix")]
    pub ward_prefix: String,
}

impl Default for PostTemplate {
    fn default() -> Self {
        Self {
            header: defaults::header(),
            name_prefix: defaults::name_prefix(),
            address_prefix: defaults::address_prefix(),
            activity_prefix: defaults::activity_prefix(),
            square_footage_prefix: defaults::square_footage_prefix(),
            ward_prefix: defaults::ward_prefix(),
        }
    }
}

/// Hashtag lists, concatenated in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HashtagConfig {
    #[serde(default)]
    pub default: Vec<String>,

    #[serde(default)]
    pub additional: Vec<String>,
}

impl HashtagConfig {
    pub fn all(&self) -> Vec<String> {
        self.default
            .iter()
            .chain(&self.additional)
            .cloned()
            .collect()
    }
}

/// Logging and metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "defaults::log_level")]
    pub log_level: String,

    /// Write logs here instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default = "defaults::metrics_port")]
    pub metrics_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level(),
            log_file: None,
            enable_metrics: false,
            metrics_port: defaults::metrics_port(),
        }
    }
}

/// Everything the renderer needs, fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub include_ward: bool,
    pub include_square_footage: bool,
    pub include_business_activity: bool,
    pub use_emojis: bool,
    pub add_hashtags: bool,
    pub template: PostTemplate,
    pub hashtags: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Config::default().render_config()
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn enabled() -> bool {
        true
    }

    // Source defaults
    pub fn base_url() -> String {
        "https://data.cityofchicago.org/resource/".into()
    }
    pub fn dataset() -> String {
        "xqx5-8hwx".into()
    }
    pub fn page_limit() -> u32 {
        50
    }
    pub fn utc_offset_hours() -> i32 {
        -6
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn user_agent() -> String {
        concat!("herald/", env!("CARGO_PKG_VERSION")).into()
    }

    // Bluesky defaults
    pub fn bluesky_service() -> String {
        "https://bsky.social".into()
    }

    // Schedule defaults
    pub fn check_interval_minutes() -> u64 {
        60
    }
    pub fn recovery_delay_secs() -> u64 {
        300
    }
    pub fn lookback_days() -> u32 {
        7
    }

    pub fn timestamp_file() -> PathBuf {
        PathBuf::from("last_check.txt")
    }

    // Publishing defaults
    pub fn min_delay_between_posts() -> u64 {
        2
    }
    pub fn retry_delay() -> u64 {
        300
    }
    pub fn max_retries() -> u32 {
        3
    }

    // Template defaults
    pub fn header() -> String {
        "🆕 New Restaurant Alert!\n".into()
    }
    pub fn name_prefix() -> String {
        "🍽️".into()
    }
    pub fn address_prefix() -> String {
        "📍".into()
    }
    pub fn activity_prefix() -> String {
        "🍳".into()
    }
    pub fn square_footage_prefix() -> String {
        "📐".into()
    }
    pub fn ward_prefix() -> String {
        "📍".into()
    }

    // Monitoring defaults
    pub fn log_level() -> String {
        "info".into()
    }
    pub fn metrics_port() -> u16 {
        9090
    }
}
