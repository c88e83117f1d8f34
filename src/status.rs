//! Per-job status derivation: color decision table and failed-test counting.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::freshness::Verdict;

/// dbt Cloud run status code for a successful run.
pub const RUN_STATUS_SUCCESS: i64 = 10;
/// dbt Cloud run status code for an errored run.
pub const RUN_STATUS_ERROR: i64 = 20;

/// Traffic-light health color for a job, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Grey,
    Green,
    Amber,
    Red,
}

impl Color {
    /// Severity rank used to pick the overall color: red > amber > green > grey.
    pub fn severity(self) -> u8 {
        match self {
            Color::Red => 3,
            Color::Amber => 2,
            Color::Green => 1,
            Color::Grey => 0,
        }
    }

    /// Capitalized label for display ("Green", "Amber", ...).
    pub fn label(self) -> &'static str {
        match self {
            Color::Grey => "Grey",
            Color::Green => "Green",
            Color::Amber => "Amber",
            Color::Red => "Red",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Color::Grey => "grey",
            Color::Green => "green",
            Color::Amber => "amber",
            Color::Red => "red",
        };
        f.pad(s)
    }
}

/// Map a run's outcome to a color and human-readable reason.
///
/// Precedence: an in-progress run is always amber; a successful run (code 10)
/// is green unless tests failed or freshness is outright "fail", which
/// downgrades it to amber; an errored run (code 20) is red; anything else is
/// amber with the raw status code in the reason.
///
/// A freshness verdict of "amber" or "unknown" never changes the color on a
/// successful run; only "fail" does. The verdict is still reported alongside.
pub fn evaluate(
    status: Option<i64>,
    in_progress: bool,
    failed_tests: u64,
    freshness: Verdict,
) -> (Color, String) {
    if in_progress {
        return (Color::Amber, "run in progress".to_string());
    }
    match status {
        Some(RUN_STATUS_SUCCESS) => {
            if failed_tests > 0 || freshness == Verdict::Fail {
                (
                    Color::Amber,
                    format!("success with issues: tests={failed_tests}, freshness={freshness}"),
                )
            } else {
                (Color::Green, "last run success".to_string())
            }
        }
        Some(RUN_STATUS_ERROR) => (Color::Red, "last run failed".to_string()),
        Some(code) => (Color::Amber, format!("status {code}")),
        None => (Color::Amber, "status unknown".to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct RunResults {
    #[serde(default)]
    results: Vec<ResultEntry>,
}

#[derive(Debug, Deserialize)]
struct ResultEntry {
    resource_type: Option<String>,
    status: Option<String>,
}

/// Count failing test entries in a `run_results.json` artifact.
///
/// Only entries with resource type "test" and status "fail" count. An absent
/// or unparseable artifact counts as zero (a job with no tests is normal).
pub fn count_failed_tests(artifact: Option<&Value>) -> u64 {
    let Some(value) = artifact else {
        return 0;
    };
    let Ok(parsed) = RunResults::deserialize(value) else {
        return 0;
    };
    parsed
        .results
        .iter()
        .filter(|r| {
            r.resource_type.as_deref() == Some("test") && r.status.as_deref() == Some("fail")
        })
        .count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_in_progress_is_amber_regardless_of_signals() {
        let (color, reason) = evaluate(Some(RUN_STATUS_SUCCESS), true, 5, Verdict::Fail);
        assert_eq!(color, Color::Amber);
        assert_eq!(reason, "run in progress");
    }

    #[test]
    fn test_clean_success_is_green() {
        let (color, reason) = evaluate(Some(10), false, 0, Verdict::Ok);
        assert_eq!(color, Color::Green);
        assert_eq!(reason, "last run success");
    }

    #[test]
    fn test_success_with_failed_tests_downgrades_to_amber() {
        let (color, reason) = evaluate(Some(10), false, 2, Verdict::Ok);
        assert_eq!(color, Color::Amber);
        assert_eq!(reason, "success with issues: tests=2, freshness=ok");
    }

    #[test]
    fn test_success_with_failed_freshness_downgrades_to_amber() {
        let (color, reason) = evaluate(Some(10), false, 0, Verdict::Fail);
        assert_eq!(color, Color::Amber);
        assert_eq!(reason, "success with issues: tests=0, freshness=fail");
    }

    #[test]
    fn test_amber_freshness_does_not_downgrade_success() {
        // Only a "fail" verdict affects the color; warn-level staleness is
        // displayed but the job stays green.
        let (color, _) = evaluate(Some(10), false, 0, Verdict::Amber);
        assert_eq!(color, Color::Green);
        let (color, _) = evaluate(Some(10), false, 0, Verdict::Unknown);
        assert_eq!(color, Color::Green);
    }

    #[test]
    fn test_error_run_is_red_regardless_of_signals() {
        let (color, reason) = evaluate(Some(20), false, 0, Verdict::Ok);
        assert_eq!(color, Color::Red);
        assert_eq!(reason, "last run failed");
        let (color, _) = evaluate(Some(20), false, 3, Verdict::Fail);
        assert_eq!(color, Color::Red);
    }

    #[test]
    fn test_other_status_code_is_amber_with_code() {
        let (color, reason) = evaluate(Some(30), false, 0, Verdict::Unknown);
        assert_eq!(color, Color::Amber);
        assert_eq!(reason, "status 30");
    }

    #[test]
    fn test_missing_status_code_is_amber() {
        let (color, reason) = evaluate(None, false, 0, Verdict::Unknown);
        assert_eq!(color, Color::Amber);
        assert_eq!(reason, "status unknown");
    }

    #[test]
    fn test_count_failed_tests() {
        let artifact = json!({
            "results": [
                {"resource_type": "test", "status": "fail"},
                {"resource_type": "test", "status": "pass"},
                {"resource_type": "model", "status": "fail"},
                {"resource_type": "test", "status": "fail"},
                {"status": "fail"}
            ]
        });
        assert_eq!(count_failed_tests(Some(&artifact)), 2);
    }

    #[test]
    fn test_count_failed_tests_absent_artifact() {
        assert_eq!(count_failed_tests(None), 0);
        assert_eq!(count_failed_tests(Some(&json!({}))), 0);
        assert_eq!(count_failed_tests(Some(&json!([1, 2]))), 0);
    }

    #[test]
    fn test_color_severity_ordering() {
        assert!(Color::Red.severity() > Color::Amber.severity());
        assert!(Color::Amber.severity() > Color::Green.severity());
        assert!(Color::Green.severity() > Color::Grey.severity());
    }

    #[test]
    fn test_color_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Color::Amber).unwrap(), "\"amber\"");
    }
}
