//! dbtstatus -- traffic-light status page generator for dbt Cloud jobs.
//!
//! One invocation polls the dbt Cloud v2 API for the latest run of each
//! configured job, derives a per-job health color from run outcome, failed
//! tests, and source freshness, and publishes the aggregate as a JSON
//! snapshot plus a static HTML dashboard.

pub mod client;
pub mod config;
pub mod freshness;
pub mod publish;
pub mod snapshot;
pub mod status;

use std::path::Path;

use anyhow::Result;

/// Poll every configured job once and return the aggregate. Writes nothing.
pub async fn poll(config: &config::Config) -> Result<snapshot::Snapshot> {
    let client = client::ApiClient::new(config)?;
    snapshot::collect(&client, config).await
}

/// One full pass: poll all jobs, then write `status.json` and `index.html`
/// into `out_dir`. No partial output is written when the poll fails.
pub async fn generate(config: &config::Config, out_dir: &Path) -> Result<snapshot::Snapshot> {
    let snap = poll(config).await?;
    publish::write(&snap, out_dir)?;
    Ok(snap)
}
