//! Snapshot publishing: JSON file plus static HTML dashboard.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use askama::Template;
use chrono::DateTime;
use tracing::info;

use crate::snapshot::{JobStatus, Snapshot};

#[derive(Template)]
#[template(path = "status.html")]
struct StatusPage {
    overall: String,
    overall_label: String,
    updated: String,
    summary: String,
    jobs: Vec<JobRow>,
}

/// Pre-rendered display strings for one table row; the template stays dumb.
struct JobRow {
    href: String,
    name: String,
    color: String,
    color_label: String,
    reason: String,
    tests: String,
    freshness: String,
    started: String,
    finished: String,
}

impl JobRow {
    fn from_status(job: &JobStatus) -> Self {
        Self {
            href: job.href.clone(),
            name: job.job_name.clone(),
            color: job.color.to_string(),
            color_label: job.color.label().to_string(),
            reason: job.reason.clone(),
            tests: job
                .failed_tests
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            freshness: job.freshness_display.clone(),
            started: job.started_at.clone().unwrap_or_else(|| "-".to_string()),
            finished: job.finished_at.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Render the snapshot as the static dashboard page.
pub fn render(snapshot: &Snapshot) -> Result<String> {
    let updated = DateTime::from_timestamp(snapshot.generated_at, 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    let page = StatusPage {
        overall: snapshot.overall.to_string(),
        overall_label: snapshot.overall.label().to_string(),
        updated,
        summary: snapshot.summary(),
        jobs: snapshot.jobs.iter().map(JobRow::from_status).collect(),
    };
    page.render().context("failed to render status page")
}

/// Write `status.json` and `index.html` into `out_dir`, creating it if
/// needed.
pub fn write(snapshot: &Snapshot, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output directory: {}", out_dir.display()))?;

    let json_path = out_dir.join("status.json");
    let json = serde_json::to_string_pretty(snapshot).context("failed to serialize snapshot")?;
    fs::write(&json_path, json)
        .with_context(|| format!("failed to write {}", json_path.display()))?;

    let html_path = out_dir.join("index.html");
    fs::write(&html_path, render(snapshot)?)
        .with_context(|| format!("failed to write {}", html_path.display()))?;

    info!(json = %json_path.display(), html = %html_path.display(), "wrote status artifacts");
    Ok(())
}
