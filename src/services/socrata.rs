// src/services/socrata.rs

//! Chicago Data Portal (Socrata SODA) license source.
//!
//! Queries the business licenses dataset for newly issued retail-food
//! licenses. The portal stores floating local timestamps, so the watermark
//! is shifted by a fixed UTC offset before it is compared.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{LicenseRecord, SourceConfig};
use crate::utils::http::{create_async_client, excerpt};

const SOURCE_NAME: &str = "chicago-data-portal";

const SELECT_COLUMNS: &str = "legal_name,address,zip_code,license_description,business_activity,\
square_footage,application_type,application_created_date,ward";

/// Format of SoQL floating timestamp literals.
const SOQL_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// A pull-based source of candidate license records.
#[async_trait]
pub trait LicenseSource: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Fetch records issued strictly after `since`.
    ///
    /// Order is unspecified. A failed query is an error, never an empty list.
    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<LicenseRecord>>;
}

/// One row of the business licenses dataset as returned by SODA.
#[derive(Debug, Deserialize)]
struct LicenseRow {
    legal_name: Option<String>,
    address: Option<String>,
    zip_code: Option<String>,
    license_description: Option<String>,
    business_activity: Option<String>,
    square_footage: Option<String>,
    application_created_date: Option<String>,
    ward: Option<String>,
}

impl LicenseRow {
    fn into_record(self) -> Option<LicenseRecord> {
        let raw_date = self.application_created_date?;
        let issued_at = parse_floating_timestamp(&raw_date)?;

        Some(LicenseRecord {
            name: self.legal_name.unwrap_or_default(),
            address: self.address.unwrap_or_default(),
            zip_code: self.zip_code.unwrap_or_default(),
            license_description: self.license_description.unwrap_or_default(),
            business_activity: self.business_activity,
            square_footage: self.square_footage,
            ward: self.ward,
            issued_at,
        })
    }
}

/// Parse a SODA floating timestamp such as `2026-10-01T00:00:00.000`.
fn parse_floating_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Convert decoded rows into records, dropping rows without a usable date.
fn rows_to_records(rows: Vec<LicenseRow>) -> Vec<LicenseRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let name = row.legal_name.clone().unwrap_or_default();
            let raw_date = row.application_created_date.clone();
            let record = row.into_record();
            if record.is_none() {
                log::warn!(
                    "Dropping license row {name:?}: unusable application_created_date {raw_date:?}"
                );
            }
            record
        })
        .collect()
}

/// Client for the City of Chicago business licenses dataset.
pub struct ChicagoDataClient {
    client: Client,
    endpoint: Url,
    app_token: Option<String>,
    page_limit: u32,
    offset: FixedOffset,
}

impl ChicagoDataClient {
    /// Create a client from source settings.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        if config.page_limit == 0 {
            return Err(AppError::config("source.page_limit must be > 0"));
        }
        let client = create_async_client(&config.user_agent, config.timeout_secs)?;

        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let endpoint = Url::parse(&base)?.join(&format!("{}.json", config.dataset.trim()))?;

        let offset = FixedOffset::east_opt(config.utc_offset_hours * 3600).ok_or_else(|| {
            AppError::config(format!(
                "invalid source.utc_offset_hours: {}",
                config.utc_offset_hours
            ))
        })?;

        Ok(Self {
            client,
            endpoint,
            app_token: config.app_token.clone().filter(|t| !t.is_empty()),
            page_limit: config.page_limit,
            offset,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Watermark expressed in the portal's floating local time.
    fn portal_time(&self, since: DateTime<Utc>) -> NaiveDateTime {
        since.with_timezone(&self.offset).naive_local()
    }

    /// SODA query parameters for one page of records issued after `since`.
    ///
    /// Rows are ordered oldest first with the row id as tie-breaker, so
    /// consecutive offsets never skip or repeat a row.
    fn query_params(&self, since: DateTime<Utc>, offset: usize) -> Vec<(&'static str, String)> {
        let cutoff = self.portal_time(since).format(SOQL_TIMESTAMP);
        vec![
            ("$select", SELECT_COLUMNS.to_string()),
            (
                "$where",
                format!(
                    "license_description like '%RETAIL FOOD%' AND application_type='ISSUE' \
                     AND application_created_date > '{cutoff}'"
                ),
            ),
            ("$order", "application_created_date ASC, :id".to_string()),
            ("$limit", self.page_limit.to_string()),
            ("$offset", offset.to_string()),
        ]
    }

    async fn fetch_page(&self, since: DateTime<Utc>, offset: usize) -> Result<Vec<LicenseRow>> {
        let mut request = self
            .client
            .get(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .query(&self.query_params(since, offset));
        if let Some(token) = &self.app_token {
            request = request.header("X-App-Token", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::fetch(SOURCE_NAME, e))?;
        log::debug!("Requesting URL: {}", response.url());

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::fetch(
                SOURCE_NAME,
                format!("HTTP {status}: {}", excerpt(&body)),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::fetch(SOURCE_NAME, format!("invalid response body: {e}")))
    }
}

#[async_trait]
impl LicenseSource for ChicagoDataClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<LicenseRecord>> {
        let page_size = self.page_limit as usize;
        let mut rows = Vec::new();

        loop {
            let page = self.fetch_page(since, rows.len()).await?;
            let last = page.len() < page_size;
            rows.extend(page);
            if last {
                break;
            }
        }
        log::info!("Found {} results", rows.len());

        Ok(rows_to_records(rows))
    }
}
