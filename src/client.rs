//! Authenticated dbt Cloud v2 API client.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

/// All requests share this timeout; a hung API is treated as a hard failure.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("run listing for job {job_id} returned HTTP {status}")]
    RunListing { job_id: String, status: u16 },
}

/// The latest execution record for a job, as returned by the runs endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: u64,
    pub status: Option<i64>,
    pub is_complete: Option<bool>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub job: Option<RunJob>,
}

/// Job metadata embedded in a run record.
#[derive(Debug, Clone, Deserialize)]
pub struct RunJob {
    pub name: Option<String>,
}

impl Run {
    /// A run is in progress only when the API explicitly says it is not
    /// complete; a missing flag counts as complete.
    pub fn in_progress(&self) -> bool {
        self.is_complete == Some(false)
    }
}

#[derive(Debug, Deserialize)]
struct RunList {
    #[serde(default)]
    data: Vec<Run>,
}

/// HTTP client carrying credentials and endpoint configuration as immutable
/// state. One value serves the whole pass.
pub struct ApiClient {
    http: reqwest::Client,
    api_base: String,
    account: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Token {}", config.token))
            .context("API token contains characters not valid in a header")?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            account: config.account.clone(),
        })
    }

    /// Fetch the most recently finished run for a job. `None` means the job
    /// has never run. Any non-success response is a hard error: an
    /// unreachable API aborts the whole pass rather than publishing a
    /// misleading snapshot.
    pub async fn latest_run(&self, job_id: &str) -> Result<Option<Run>> {
        let url = format!("{}/accounts/{}/runs/", self.api_base, self.account);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("job_definition_id", job_id),
                ("order_by", "-finished_at"),
                ("limit", "1"),
            ])
            .send()
            .await
            .with_context(|| format!("run listing request for job {job_id} failed"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::RunListing {
                job_id: job_id.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let list: RunList = response
            .json()
            .await
            .with_context(|| format!("run listing for job {job_id} returned invalid JSON"))?;
        Ok(list.data.into_iter().next())
    }

    /// Fetch a named artifact for a run. Any non-200 response means the
    /// artifact was not produced (a job with no tests or no freshness checks
    /// is normal) and yields `None`; only transport failures propagate.
    pub async fn artifact(&self, run_id: u64, name: &str) -> Result<Option<Value>> {
        let url = format!(
            "{}/accounts/{}/runs/{}/artifacts/{}",
            self.api_base, self.account, run_id, name
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("artifact request for run {run_id} ({name}) failed"))?;

        if response.status() != StatusCode::OK {
            debug!(run_id, artifact = name, status = %response.status(), "artifact absent");
            return Ok(None);
        }

        let body = response
            .json()
            .await
            .with_context(|| format!("artifact {name} for run {run_id} returned invalid JSON"))?;
        Ok(Some(body))
    }
}
