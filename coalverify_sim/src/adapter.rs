//! Backend adapter capability shared by process and embedded backends.

use coalverify_core::{OutputMode, ReplicateTable, Result, ScenarioDescriptor};
use coalverify_env::CommandLine;
use std::fmt::Debug;

/// How a backend produces N replicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicatePlan {
    /// One `collect` call yields all N rows (the replicate count is part of
    /// the invocation).
    Batched,

    /// Each `collect` call yields exactly one row from a fresh backend
    /// instance.
    Sequential,
}

/// A backend that can realise a scenario and report replicate statistics.
///
/// Implemented independently by each backend; the replicate driver only
/// sees this surface.
pub trait StatisticsAdapter {
    /// Backend-specific rendering of a scenario.
    type Invocation: Debug;

    /// Name used in logs, errors and reports.
    fn backend(&self) -> &str;

    /// Statistic family this adapter reports.
    fn mode(&self) -> OutputMode;

    fn plan(&self) -> ReplicatePlan;

    /// Translates the scenario into this backend's invocation surface.
    ///
    /// Pure: the same scenario always renders to the same invocation.
    fn render(&self, scenario: &ScenarioDescriptor, replicates: usize) -> Result<Self::Invocation>;

    /// Executes a rendered invocation and collects its statistics.
    fn collect(&self, invocation: &Self::Invocation) -> Result<ReplicateTable>;
}

/// Mutation-mode strategy: pipe raw haplotype output through a filter that
/// reduces it to diversity statistics.
///
/// Injected into whichever adapter should report mutation statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationStatistics {
    filter: CommandLine,
}

impl MutationStatistics {
    /// Uses `filter` (e.g. Hudson's `sample_stats`) as the reducing process.
    pub fn new(filter: CommandLine) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &CommandLine {
        &self.filter
    }
}
