//! Configuration for a status page run.
//!
//! Everything is environment-sourced in the normal deployment (a CI job or
//! cron entry), with an optional TOML file for the account and job list.
//! Environment variables always win over file values; the API token is
//! env-only so it never lands on disk.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

pub const ENV_TOKEN: &str = "DBT_CLOUD_TOKEN";
pub const ENV_ACCOUNT: &str = "DBT_CLOUD_ACCOUNT_ID";
pub const ENV_JOB_MAP: &str = "DBT_JOB_MAP";
pub const ENV_JOB_IDS: &str = "DBT_CLOUD_JOB_IDS";
pub const ENV_API_BASE: &str = "DBT_CLOUD_API_BASE";
pub const ENV_DASHBOARD_BASE: &str = "DBT_CLOUD_DASHBOARD_BASE";

const DEFAULT_API_BASE: &str = "https://cloud.getdbt.com/api/v2";
const DEFAULT_DASHBOARD_BASE: &str = "https://cloud.getdbt.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),
    #[error("no jobs configured: set DBT_JOB_MAP, DBT_CLOUD_JOB_IDS, or [[jobs]] in the config file")]
    NoJobs,
}

/// One monitored job: its dbt Cloud job definition id plus an optional
/// display name override.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub id: String,
    pub name: Option<String>,
}

/// Resolved configuration, immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub account: String,
    pub api_base: String,
    pub dashboard_base: String,
    /// Jobs in configuration order; this order is the dashboard row order.
    pub jobs: Vec<JobConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    account: Option<String>,
    api_base: Option<String>,
    dashboard_base: Option<String>,
    #[serde(default)]
    jobs: Vec<FileJob>,
}

#[derive(Debug, Deserialize)]
struct FileJob {
    id: String,
    name: Option<String>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

impl Config {
    /// Resolve configuration from the environment, layered over an optional
    /// TOML file. Missing token, account, or job list is fatal.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => FileConfig::load(p)?,
            None => FileConfig::default(),
        };

        let token = env_nonempty(ENV_TOKEN).ok_or(ConfigError::MissingVar(ENV_TOKEN))?;
        let account = env_nonempty(ENV_ACCOUNT)
            .or(file.account)
            .ok_or(ConfigError::MissingVar(ENV_ACCOUNT))?;
        let api_base = env_nonempty(ENV_API_BASE)
            .or(file.api_base)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let dashboard_base = env_nonempty(ENV_DASHBOARD_BASE)
            .or(file.dashboard_base)
            .unwrap_or_else(|| DEFAULT_DASHBOARD_BASE.to_string());

        let mut jobs = env_nonempty(ENV_JOB_MAP)
            .map(|raw| parse_job_map(&raw))
            .unwrap_or_default();
        if jobs.is_empty() {
            jobs = file
                .jobs
                .into_iter()
                .map(|j| JobConfig {
                    id: j.id,
                    name: j.name.filter(|n| !n.is_empty()),
                })
                .collect();
        }
        if jobs.is_empty() {
            jobs = env_nonempty(ENV_JOB_IDS)
                .map(|raw| parse_job_ids(&raw))
                .unwrap_or_default();
        }
        if jobs.is_empty() {
            return Err(ConfigError::NoJobs.into());
        }

        Ok(Config {
            token,
            account,
            api_base: api_base.trim_end_matches('/').to_string(),
            dashboard_base: dashboard_base.trim_end_matches('/').to_string(),
            jobs,
        })
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse the `DBT_JOB_MAP` JSON object ({job_id: display_name}). Key order is
/// preserved. Malformed JSON is non-fatal and yields an empty list so the
/// caller can fall back to the plain id list.
fn parse_job_map(raw: &str) -> Vec<JobConfig> {
    match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw) {
        Ok(map) => map
            .into_iter()
            .map(|(id, name)| JobConfig {
                id,
                name: name
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string),
            })
            .collect(),
        Err(error) => {
            warn!(%error, "ignoring malformed DBT_JOB_MAP");
            Vec::new()
        }
    }
}

/// Parse the comma-separated `DBT_CLOUD_JOB_IDS` fallback list.
fn parse_job_ids(raw: &str) -> Vec<JobConfig> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|id| JobConfig {
            id: id.to_string(),
            name: None,
        })
        .collect()
}
