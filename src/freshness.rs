//! Source-freshness evaluation from a `sources.json` artifact.
//!
//! dbt has shipped two artifact shapes: a legacy one with a top-level
//! `sources` list (pass/fail per source) and the current one with a `results`
//! list carrying a severity status and timing fields. Both reduce to a single
//! verdict plus a short detail string for the dashboard.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Freshness health verdict for a job's sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Unknown,
    Ok,
    Amber,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Unknown => "unknown",
            Verdict::Ok => "ok",
            Verdict::Amber => "amber",
            Verdict::Fail => "fail",
        };
        f.pad(s)
    }
}

/// The two known artifact shapes. Legacy is tried first: an artifact carrying
/// both keys is treated as legacy.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Artifact {
    Legacy { sources: Vec<SourceEntry> },
    Current { results: Vec<ResultEntry> },
}

#[derive(Debug, Deserialize)]
struct SourceEntry {
    name: Option<String>,
    source_name: Option<String>,
    unique_id: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultEntry {
    source_name: Option<String>,
    name: Option<String>,
    unique_id: Option<String>,
    status: Option<String>,
    max_loaded_at_time_ago_in_words: Option<String>,
}

/// Reduce a freshness artifact to a verdict and detail string.
///
/// An absent artifact, or one matching neither known shape, yields
/// `(Unknown, "")`.
pub fn evaluate(artifact: Option<&Value>) -> (Verdict, String) {
    let Some(value) = artifact else {
        return (Verdict::Unknown, String::new());
    };
    let Ok(parsed) = Artifact::deserialize(value) else {
        return (Verdict::Unknown, String::new());
    };
    match parsed {
        Artifact::Legacy { sources } => evaluate_legacy(&sources),
        Artifact::Current { results } => evaluate_current(&results),
    }
}

/// Legacy shape: ok iff every source passed. The detail names the first
/// failing source.
fn evaluate_legacy(sources: &[SourceEntry]) -> (Verdict, String) {
    match sources.iter().find(|s| s.status.as_deref() != Some("pass")) {
        None => (Verdict::Ok, String::new()),
        Some(failing) => {
            let name = display_name(&[
                failing.name.as_deref(),
                failing.source_name.as_deref(),
                failing.unique_id.as_deref(),
            ]);
            let status = failing.status.as_deref().unwrap_or("unknown");
            (Verdict::Fail, format!("{name} {status}"))
        }
    }
}

/// Current shape: pick the single worst entry by severity (ties go to the
/// first occurrence) and map its status to a verdict.
fn evaluate_current(results: &[ResultEntry]) -> (Verdict, String) {
    let worst = results
        .iter()
        .filter(|r| r.status.as_deref().is_some_and(|s| !s.is_empty()))
        .reduce(|best, r| if rank(r) > rank(best) { r } else { best });
    let Some(worst) = worst else {
        return (Verdict::Unknown, String::new());
    };

    let status = worst.status.as_deref().unwrap_or("").to_lowercase();
    let verdict = match status.as_str() {
        "error" => Verdict::Fail,
        "warn" => Verdict::Amber,
        "pass" => Verdict::Ok,
        _ => Verdict::Unknown,
    };

    let name = display_name(&[
        worst.source_name.as_deref(),
        worst.name.as_deref(),
        worst.unique_id.as_deref(),
    ]);
    let label = if status == "pass" { "fresh" } else { status.as_str() };
    let mut detail = format!("{name} {label}");
    if let Some(ago) = worst
        .max_loaded_at_time_ago_in_words
        .as_deref()
        .filter(|s| !s.is_empty())
    {
        detail.push_str(&format!(" ({ago})"));
    }
    (verdict, detail)
}

fn rank(entry: &ResultEntry) -> u8 {
    match entry
        .status
        .as_deref()
        .unwrap_or("")
        .to_lowercase()
        .as_str()
    {
        "error" => 3,
        "warn" => 2,
        "pass" => 1,
        _ => 0,
    }
}

/// First non-empty candidate, else "source".
fn display_name<'a>(candidates: &[Option<&'a str>]) -> &'a str {
    candidates
        .iter()
        .flatten()
        .find(|s| !s.is_empty())
        .copied()
        .unwrap_or("source")
}
