//! [`JobStore`] over a PostgREST endpoint (Supabase `/rest/v1`).
//!
//! Claim is a filtered, ordered, `limit`ed `GET`; update is a `PATCH`
//! scoped with `id=eq.<id>`. Neither is atomic against other workers.

use std::time::Duration;

use async_trait::async_trait;
use autorun_core::job::{NormalizedRecord, RecordShape};
use autorun_core::normalize::normalize;
use autorun_core::status::CLAIMABLE_LABELS;
use autorun_core::types::Timestamp;
use autorun_core::update::JobUpdate;
use chrono::{SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::{JobStore, StoreError};

/// Default HTTP timeout for a single store request.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Rows fetched per claim when scheduling has to be checked client-side.
const CLIENT_SIDE_WINDOW: usize = 25;

/// Connection settings for a PostgREST job table.
#[derive(Debug, Clone)]
pub struct PostgrestConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    /// Service-role key, sent as both `apikey` and bearer token.
    pub service_key: String,
    pub table: String,
    /// Push the `scheduled_at` filter to the server. Disable for tables
    /// without that column.
    pub schedule_filter: bool,
    pub request_timeout: Duration,
}

impl PostgrestConfig {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            service_key: service_key.into(),
            table: "automation_jobs".into(),
            schedule_filter: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct PostgrestStore {
    client: reqwest::Client,
    config: PostgrestConfig,
}

impl PostgrestStore {
    /// Build the client without touching the network.
    pub fn new(config: PostgrestConfig) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.service_key)
            .map_err(|_| StoreError::Config("service key is not a valid header value".into()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.service_key))
            .map_err(|_| StoreError::Config("service key is not a valid header value".into()))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    /// Build the client and verify the table answers with these credentials.
    pub async fn connect(config: PostgrestConfig) -> Result<Self, StoreError> {
        let store = Self::new(config)?;
        store.probe().await?;
        Ok(store)
    }

    pub fn config(&self) -> &PostgrestConfig {
        &self.config
    }

    /// Read one id from the table. Succeeds once the endpoint is reachable
    /// and accepts the credentials.
    pub async fn probe(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(self.table_url())
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        check_status(response).await?;
        tracing::info!(table = %self.config.table, "Connected to job store");
        Ok(())
    }

    fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.table
        )
    }

    fn claim_query(&self, now: Timestamp) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("status", format!("in.({})", CLAIMABLE_LABELS.join(","))),
            ("id", "not.is.null".to_string()),
            ("order", "created_at.asc".to_string()),
        ];
        if self.config.schedule_filter {
            let now = now.to_rfc3339_opts(SecondsFormat::Millis, true);
            query.push((
                "or",
                format!("(scheduled_at.is.null,scheduled_at.lte.\"{now}\")"),
            ));
            query.push(("limit", "1".to_string()));
        } else {
            query.push(("limit", CLIENT_SIDE_WINDOW.to_string()));
        }
        query
    }
}

#[async_trait]
impl JobStore for PostgrestStore {
    async fn fetch_next_claimable(&self) -> Result<Option<NormalizedRecord>, StoreError> {
        let now = Utc::now();
        let response = self
            .client
            .get(self.table_url())
            .query(&self.claim_query(now))
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = check_status(response).await?.json().await?;

        for row in &rows {
            let record = match normalize(row) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unaddressable job record");
                    continue;
                }
            };
            // Only filtered server-side when `schedule_filter` is on.
            if record.is_due(now) {
                return Ok(Some(record));
            }
            tracing::debug!(job_id = %record.id(), "Skipping job scheduled in the future");
        }
        Ok(None)
    }

    async fn update_fields(
        &self,
        id: &str,
        shape: RecordShape,
        update: &JobUpdate,
    ) -> Result<(), StoreError> {
        let fields = update.to_fields(shape, Utc::now());
        let response = self
            .client
            .patch(self.table_url())
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(&fields)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}
