//! Aggregation: one pass over the configured jobs into a snapshot.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::client::{ApiClient, Run};
use crate::config::{Config, JobConfig};
use crate::freshness::{self, Verdict};
use crate::status::{self, Color};

/// Fixed order for the summary string; colors with a zero count are omitted.
const SUMMARY_ORDER: [Color; 4] = [Color::Green, Color::Amber, Color::Red, Color::Grey];

/// Per-job record in the published snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub job_id: String,
    pub run_id: Option<u64>,
    pub job_name: String,
    pub color: Color,
    pub reason: String,
    /// Absent when the job has never run; tests are not evaluated then.
    pub failed_tests: Option<u64>,
    pub freshness: Verdict,
    pub freshness_detail: String,
    pub freshness_display: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub in_progress: bool,
    pub href: String,
}

/// The aggregate published as `status.json` and rendered to HTML.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub overall: Color,
    pub generated_at: i64,
    pub total_jobs: usize,
    pub counts: BTreeMap<Color, usize>,
    pub jobs: Vec<JobStatus>,
}

impl Snapshot {
    /// Human-readable one-liner, e.g. `"3 jobs · 1 amber · 1 red · 1 grey"`.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!(
            "{} job{}",
            self.total_jobs,
            if self.total_jobs == 1 { "" } else { "s" }
        )];
        for color in SUMMARY_ORDER {
            if let Some(&count) = self.counts.get(&color) {
                if count > 0 {
                    parts.push(format!("{count} {color}"));
                }
            }
        }
        parts.join(" · ")
    }
}

/// Poll every configured job in order and reduce the results to a snapshot.
/// Up to three sequential requests per job: run listing, test results,
/// freshness results.
pub async fn collect(client: &ApiClient, config: &Config) -> Result<Snapshot> {
    let mut rows = Vec::with_capacity(config.jobs.len());
    for job in &config.jobs {
        let row = match client.latest_run(&job.id).await? {
            Some(run) => evaluate_job(client, config, job, run).await?,
            None => no_runs_row(config, job),
        };
        info!(job_id = %row.job_id, color = %row.color, reason = %row.reason, "evaluated job");
        rows.push(row);
    }
    Ok(build(rows))
}

/// Reduce per-job rows to the aggregate. Overall color is the maximum
/// severity across rows, grey when there are none.
pub fn build(rows: Vec<JobStatus>) -> Snapshot {
    let overall = rows
        .iter()
        .map(|r| r.color)
        .max_by_key(|c| c.severity())
        .unwrap_or(Color::Grey);
    let mut counts = BTreeMap::new();
    for row in &rows {
        *counts.entry(row.color).or_insert(0) += 1;
    }
    Snapshot {
        overall,
        generated_at: chrono::Utc::now().timestamp(),
        total_jobs: rows.len(),
        counts,
        jobs: rows,
    }
}

async fn evaluate_job(
    client: &ApiClient,
    config: &Config,
    job: &JobConfig,
    run: Run,
) -> Result<JobStatus> {
    let run_results = client.artifact(run.id, "run_results.json").await?;
    let failed_tests = status::count_failed_tests(run_results.as_ref());

    let sources = client.artifact(run.id, "sources.json").await?;
    let (freshness, freshness_detail) = freshness::evaluate(sources.as_ref());

    let in_progress = run.in_progress();
    let (color, reason) = status::evaluate(run.status, in_progress, failed_tests, freshness);

    let embedded_name = run.job.as_ref().and_then(|j| j.name.as_deref());
    let job_name = resolve_job_name(job.name.as_deref(), embedded_name, &job.id);
    let freshness_display = freshness_display(freshness, &freshness_detail);

    Ok(JobStatus {
        job_id: job.id.clone(),
        run_id: Some(run.id),
        job_name,
        color,
        reason,
        failed_tests: Some(failed_tests),
        freshness,
        freshness_detail,
        freshness_display,
        started_at: run.started_at,
        finished_at: run.finished_at,
        in_progress,
        href: run_href(config, &job.id, run.id),
    })
}

/// Record for a job that has never run: grey, no test or freshness signals.
fn no_runs_row(config: &Config, job: &JobConfig) -> JobStatus {
    JobStatus {
        job_id: job.id.clone(),
        run_id: None,
        job_name: resolve_job_name(job.name.as_deref(), None, &job.id),
        color: Color::Grey,
        reason: "no runs".to_string(),
        failed_tests: None,
        freshness: Verdict::Unknown,
        freshness_detail: String::new(),
        freshness_display: Verdict::Unknown.to_string(),
        started_at: None,
        finished_at: None,
        in_progress: false,
        href: job_href(config, &job.id),
    }
}

/// Display name resolution: configured name, then the run's embedded job
/// name, then the raw id. Empty strings fall through.
fn resolve_job_name(configured: Option<&str>, embedded: Option<&str>, id: &str) -> String {
    configured
        .filter(|s| !s.is_empty())
        .or_else(|| embedded.filter(|s| !s.is_empty()))
        .unwrap_or(id)
        .to_string()
}

fn freshness_display(verdict: Verdict, detail: &str) -> String {
    if detail.is_empty() {
        verdict.to_string()
    } else {
        format!("{verdict}: {detail}")
    }
}

fn job_href(config: &Config, job_id: &str) -> String {
    format!(
        "{}/#/accounts/{}/jobs/{}",
        config.dashboard_base, config.account, job_id
    )
}

fn run_href(config: &Config, job_id: &str, run_id: u64) -> String {
    format!("{}/runs/{}", job_href(config, job_id), run_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, color: Color, reason: &str) -> JobStatus {
        JobStatus {
            job_id: id.to_string(),
            run_id: Some(1),
            job_name: id.to_string(),
            color,
            reason: reason.to_string(),
            failed_tests: Some(0),
            freshness: Verdict::Unknown,
            freshness_detail: String::new(),
            freshness_display: "unknown".to_string(),
            started_at: None,
            finished_at: None,
            in_progress: false,
            href: String::new(),
        }
    }

    fn test_config() -> Config {
        Config {
            token: "t".to_string(),
            account: "9000".to_string(),
            api_base: "https://cloud.getdbt.com/api/v2".to_string(),
            dashboard_base: "https://cloud.getdbt.com".to_string(),
            jobs: Vec::new(),
        }
    }

    #[test]
    fn test_overall_is_max_severity() {
        let snap = build(vec![
            row("a", Color::Green, "last run success"),
            row("b", Color::Amber, "run in progress"),
            row("c", Color::Grey, "no runs"),
        ]);
        assert_eq!(snap.overall, Color::Amber);

        let snap = build(vec![row("a", Color::Green, ""), row("b", Color::Red, "")]);
        assert_eq!(snap.overall, Color::Red);
    }

    #[test]
    fn test_empty_job_list_is_grey() {
        let snap = build(Vec::new());
        assert_eq!(snap.overall, Color::Grey);
        assert_eq!(snap.total_jobs, 0);
        assert!(snap.counts.is_empty());
        assert_eq!(snap.summary(), "0 jobs");
    }

    #[test]
    fn test_counts_and_summary_worked_example() {
        // Job A never ran, job B succeeded with issues, job C errored.
        let snap = build(vec![
            row("a", Color::Grey, "no runs"),
            row("b", Color::Amber, "success with issues: tests=2, freshness=ok"),
            row("c", Color::Red, "last run failed"),
        ]);
        assert_eq!(snap.overall, Color::Red);
        assert_eq!(snap.total_jobs, 3);
        assert_eq!(snap.counts.get(&Color::Grey), Some(&1));
        assert_eq!(snap.counts.get(&Color::Amber), Some(&1));
        assert_eq!(snap.counts.get(&Color::Red), Some(&1));
        assert_eq!(snap.counts.get(&Color::Green), None);
        assert_eq!(snap.summary(), "3 jobs · 1 amber · 1 red · 1 grey");
    }

    #[test]
    fn test_summary_singular_job() {
        let snap = build(vec![row("a", Color::Green, "last run success")]);
        assert_eq!(snap.summary(), "1 job · 1 green");
    }

    #[test]
    fn test_resolve_job_name_order() {
        assert_eq!(resolve_job_name(Some("Cfg"), Some("Api"), "17"), "Cfg");
        assert_eq!(resolve_job_name(None, Some("Api"), "17"), "Api");
        assert_eq!(resolve_job_name(Some(""), Some(""), "17"), "17");
        assert_eq!(resolve_job_name(None, None, "17"), "17");
    }

    #[test]
    fn test_hrefs_deep_link_to_dashboard() {
        let config = test_config();
        assert_eq!(
            job_href(&config, "301"),
            "https://cloud.getdbt.com/#/accounts/9000/jobs/301"
        );
        assert_eq!(
            run_href(&config, "301", 42),
            "https://cloud.getdbt.com/#/accounts/9000/jobs/301/runs/42"
        );
    }

    #[test]
    fn test_no_runs_row_shape() {
        let config = test_config();
        let job = JobConfig {
            id: "301".to_string(),
            name: Some("Nightly build".to_string()),
        };
        let row = no_runs_row(&config, &job);
        assert_eq!(row.color, Color::Grey);
        assert_eq!(row.reason, "no runs");
        assert_eq!(row.failed_tests, None);
        assert_eq!(row.freshness, Verdict::Unknown);
        assert_eq!(row.job_name, "Nightly build");
        assert!(row.href.ends_with("/jobs/301"));
    }

    #[test]
    fn test_freshness_display_joins_detail() {
        assert_eq!(freshness_display(Verdict::Ok, ""), "ok");
        assert_eq!(
            freshness_display(Verdict::Fail, "raw_orders error (2 days)"),
            "fail: raw_orders error (2 days)"
        );
    }

    #[test]
    fn test_snapshot_serializes_counts_by_color_name() {
        let snap = build(vec![row("a", Color::Red, "last run failed")]);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["overall"], "red");
        assert_eq!(json["counts"]["red"], 1);
        assert_eq!(json["total_jobs"], 1);
        assert!(json["jobs"].as_array().unwrap().len() == 1);
    }
}
