//! One-call comparisons of two backends on one scenario.
//!
//! ```text
//! scenario ──► driver(left)  ──► table ─┐
//!          └─► driver(right) ──► table ─┴─► reducer ──► Comparison
//! ```

use crate::adapter::StatisticsAdapter;
use crate::driver::ReplicateDriver;
use crate::embedded::EmbeddedAdapter;
use crate::process::ProcessAdapter;
use crate::reducer::{Comparison, ComparisonReducer};
use coalverify_core::{OutputMode, Result, ScenarioDescriptor, VerifyError};
use coalverify_env::{CommandRunner, EngineFactory};
use tracing::info;

/// Runs both adapters for `replicates` and pairs their statistics.
///
/// The adapters must report the same mode. Any failure is wrapped in
/// `ScenarioFailed` carrying the scenario parameters.
pub fn compare<L, R>(
    scenario: &ScenarioDescriptor,
    replicates: usize,
    left: &L,
    right: &R,
) -> Result<Comparison>
where
    L: StatisticsAdapter,
    R: StatisticsAdapter,
{
    run_pair(scenario, replicates, left, right).map_err(|e| e.in_scenario(scenario))
}

fn run_pair<L, R>(scenario: &ScenarioDescriptor, replicates: usize, left: &L, right: &R) -> Result<Comparison>
where
    L: StatisticsAdapter,
    R: StatisticsAdapter,
{
    let mode = left.mode();
    if right.mode() != mode {
        return Err(VerifyError::invalid(format!(
            "{} reports {} statistics but {} reports {}",
            left.backend(),
            mode,
            right.backend(),
            right.mode()
        )));
    }

    info!("comparing {} against {} ({} mode)", left.backend(), right.backend(), mode);
    let driver = ReplicateDriver::new(replicates);
    let left_table = driver.run(left, scenario)?;
    let right_table = driver.run(right, scenario)?;
    ComparisonReducer::new(mode, scenario).reduce(&left_table, &right_table)
}

/// Topology statistics from a process backend against the embedded engine.
pub fn compare_coalescent<R, F>(
    scenario: &ScenarioDescriptor,
    replicates: usize,
    process: &ProcessAdapter<R>,
    embedded: &EmbeddedAdapter<F>,
) -> Result<Comparison>
where
    R: CommandRunner,
    F: EngineFactory,
{
    compare(scenario, replicates, process, embedded)
}

/// Mutation statistics from two process backends.
///
/// Both adapters must have a `MutationStatistics` filter and the scenario
/// must carry a mutation rate.
pub fn compare_mutations<L, R>(
    scenario: &ScenarioDescriptor,
    replicates: usize,
    left: &ProcessAdapter<L>,
    right: &ProcessAdapter<R>,
) -> Result<Comparison>
where
    L: CommandRunner,
    R: CommandRunner,
{
    if left.mode() != OutputMode::Mutation {
        let err = VerifyError::invalid(format!("{} is not in mutation mode", left.backend()));
        return Err(err.in_scenario(scenario));
    }
    compare(scenario, replicates, left, right)
}
