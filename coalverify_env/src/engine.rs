//! Configuration and result surface of an in-process coalescent engine.

use crate::error::EnvError;
use crate::types::{Epoch, MemoryCeiling, MigrationMatrix};
use nalgebra::DMatrix;

/// Counters reported by the engine after one completed replicate.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutcome {
    num_breakpoints: u64,
    time: f64,
    common_ancestor_events: u64,
    recombination_events: u64,
    migration_events: DMatrix<u64>,
}

impl EngineOutcome {
    /// Creates an outcome from the engine's raw counters.
    ///
    /// `migration_events[(i, j)]` counts lineages that moved from `i` to `j`.
    pub fn new(
        num_breakpoints: u64,
        time: f64,
        common_ancestor_events: u64,
        recombination_events: u64,
        migration_events: DMatrix<u64>,
    ) -> Self {
        Self {
            num_breakpoints,
            time,
            common_ancestor_events,
            recombination_events,
            migration_events,
        }
    }

    /// Distinct breakpoints in the resulting tree sequence.
    pub fn num_breakpoints(&self) -> u64 {
        self.num_breakpoints
    }

    /// Simulated time at which the run finished (time to the MRCA).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Common-ancestor events.
    pub fn common_ancestor_events(&self) -> u64 {
        self.common_ancestor_events
    }

    /// Recombination events.
    pub fn recombination_events(&self) -> u64 {
        self.recombination_events
    }

    /// Migration event counts per ordered (source, destination) pair.
    pub fn migration_events(&self) -> &DMatrix<u64> {
        &self.migration_events
    }
}

/// Setter surface of the embedded engine.
///
/// Setters may be called in any order before `run`. The engine owns no state
/// shared with other instances; each replicate gets a fresh one from an
/// `EngineFactory`.
pub trait CoalescentEngine {
    /// Recombination rate between adjacent loci, scaled by 4Ne.
    fn set_scaled_recombination_rate(&mut self, rate: f64);

    /// Number of loci (1 means no recombination).
    fn set_num_loci(&mut self, num_loci: u32);

    /// Upper bound on the engine's working memory.
    fn set_max_memory(&mut self, ceiling: &MemoryCeiling);

    /// Registers the next demographic epoch; call in ascending start time.
    fn add_population_model(&mut self, epoch: Epoch);

    /// Per-subpopulation sample counts.
    fn set_sample_configuration(&mut self, configuration: &[u32]);

    /// Migration rates between subpopulations.
    fn set_migration_matrix(&mut self, matrix: &MigrationMatrix);

    /// Runs the replicate to completion.
    ///
    /// Blocks with no cancellation. Returns `EnvError::ResourceLimit` when
    /// the memory ceiling is breached.
    fn run(&mut self) -> Result<EngineOutcome, EnvError>;
}

/// Creates fresh engine instances, one per replicate.
pub trait EngineFactory {
    type Engine: CoalescentEngine;

    /// Constructs an engine for `sample_size` haploid lineages.
    fn create(&self, sample_size: u32) -> Self::Engine;
}
