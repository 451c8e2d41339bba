//! Comparison reducer - pairs the two backends' tables statistic by statistic.

use coalverify_core::{expected_statistics, OutputMode, ReplicateTable, Result, ScenarioDescriptor, VerifyError};
use serde::Serialize;

/// Both backends' samples of one statistic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairedStatistic {
    pub statistic: String,
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

/// Location and spread of both samples plus their largest quantile gap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatisticSummary {
    pub left_mean: f64,
    pub left_std: f64,
    pub right_mean: f64,
    pub right_std: f64,
    pub max_quantile_gap: f64,
}

impl PairedStatistic {
    /// Sorted samples aligned by quantile, for a Q-Q comparison.
    ///
    /// With unequal sample sizes the longer sample is linearly interpolated
    /// at the shorter sample's plotting positions `i / (k - 1)`.
    pub fn quantile_pairs(&self) -> Vec<(f64, f64)> {
        let left = sorted(&self.left);
        let right = sorted(&self.right);
        if left.is_empty() || right.is_empty() {
            return Vec::new();
        }
        if left.len() <= right.len() {
            let k = left.len();
            left.iter()
                .enumerate()
                .map(|(i, &l)| (l, interpolate(&right, position(i, k))))
                .collect()
        } else {
            let k = right.len();
            right
                .iter()
                .enumerate()
                .map(|(i, &r)| (interpolate(&left, position(i, k)), r))
                .collect()
        }
    }

    /// Per-side mean and sample standard deviation. Empty samples give NaN.
    pub fn summary(&self) -> StatisticSummary {
        let (left_mean, left_std) = mean_std(&self.left);
        let (right_mean, right_std) = mean_std(&self.right);
        let max_quantile_gap = self
            .quantile_pairs()
            .into_iter()
            .map(|(l, r)| (l - r).abs())
            .fold(0.0, f64::max);
        StatisticSummary {
            left_mean,
            left_std,
            right_mean,
            right_std,
            max_quantile_gap,
        }
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

fn position(i: usize, k: usize) -> f64 {
    if k < 2 {
        0.5
    } else {
        i as f64 / (k - 1) as f64
    }
}

/// Linear interpolation of a sorted sample at plotting position `p` in [0, 1].
fn interpolate(sorted: &[f64], p: f64) -> f64 {
    let x = p * (sorted.len() - 1) as f64;
    let lo = x.floor() as usize;
    let hi = x.ceil() as usize;
    let frac = x - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

/// Paired output of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub mode: OutputMode,
    pub left_backend: String,
    pub right_backend: String,
    pub statistics: Vec<PairedStatistic>,
}

impl Comparison {
    pub fn statistic(&self, name: &str) -> Option<&PairedStatistic> {
        self.statistics.iter().find(|s| s.statistic == name)
    }
}

/// Knows which keys to pair for a mode and subpopulation count.
#[derive(Debug, Clone)]
pub struct ComparisonReducer {
    mode: OutputMode,
    expected: Vec<String>,
}

impl ComparisonReducer {
    pub fn new(mode: OutputMode, scenario: &ScenarioDescriptor) -> Self {
        Self {
            mode,
            expected: expected_statistics(mode, scenario.num_populations()),
        }
    }

    pub fn expected(&self) -> &[String] {
        &self.expected
    }

    /// Pairs every expected key. Extra columns on either side are ignored.
    pub fn reduce(&self, left: &ReplicateTable, right: &ReplicateTable) -> Result<Comparison> {
        let statistics = self
            .expected
            .iter()
            .map(|key| {
                Ok(PairedStatistic {
                    statistic: key.clone(),
                    left: column(left, key, "left")?.to_vec(),
                    right: column(right, key, "right")?.to_vec(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Comparison {
            mode: self.mode,
            left_backend: left.backend().to_string(),
            right_backend: right.backend().to_string(),
            statistics,
        })
    }
}

fn column<'a>(table: &'a ReplicateTable, key: &str, side: &str) -> Result<&'a [f64]> {
    table.column(key).ok_or_else(|| VerifyError::SchemaMismatch {
        statistic: key.to_string(),
        side: format!("{} ({})", side, table.backend()),
    })
}
