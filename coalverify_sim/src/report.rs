//! JSON report of a CLI run, for CI parsing.

use crate::reducer::{Comparison, StatisticSummary};
use coalverify_core::{OutputMode, ScenarioDescriptor, VerifyError};
use serde::Serialize;
use uuid::Uuid;

/// Summary of one statistic in one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct StatisticEntry {
    pub statistic: String,
    #[serde(flatten)]
    pub summary: StatisticSummary,
}

/// Outcome of one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioEntry {
    /// Scenario name
    pub scenario: String,

    /// One-line parameter summary
    pub parameters: String,

    pub mode: OutputMode,

    pub replicates: usize,

    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_backend: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_backend: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub statistics: Vec<StatisticEntry>,

    /// Error chain if the scenario failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Captured stderr of the failing backend process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

/// All scenarios of one CLI invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub run_id: Uuid,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<ScenarioEntry>,
}

impl ComparisonReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            total: 0,
            passed: 0,
            failed: 0,
            results: Vec::new(),
        }
    }

    /// Records a completed comparison.
    pub fn add_comparison(
        &mut self,
        name: &str,
        scenario: &ScenarioDescriptor,
        replicates: usize,
        comparison: &Comparison,
    ) {
        let statistics = comparison
            .statistics
            .iter()
            .map(|s| StatisticEntry {
                statistic: s.statistic.clone(),
                summary: s.summary(),
            })
            .collect();
        self.push(ScenarioEntry {
            scenario: name.to_string(),
            parameters: scenario.to_string(),
            mode: comparison.mode,
            replicates,
            passed: true,
            left_backend: Some(comparison.left_backend.clone()),
            right_backend: Some(comparison.right_backend.clone()),
            statistics,
            failure_reason: None,
            stderr: None,
        });
    }

    /// Records a failed scenario.
    pub fn add_failure(
        &mut self,
        name: &str,
        scenario: &ScenarioDescriptor,
        mode: OutputMode,
        replicates: usize,
        error: &VerifyError,
    ) {
        self.push(ScenarioEntry {
            scenario: name.to_string(),
            parameters: scenario.to_string(),
            mode,
            replicates,
            passed: false,
            left_backend: None,
            right_backend: None,
            statistics: Vec::new(),
            failure_reason: Some(error.to_string()),
            stderr: error.stderr().map(str::to_string),
        });
    }

    fn push(&mut self, entry: ScenarioEntry) {
        self.total += 1;
        if entry.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(entry);
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for ComparisonReport {
    fn default() -> Self {
        Self::new()
    }
}
