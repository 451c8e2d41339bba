//! Replicate driver - obtains N replicates from one adapter.

use crate::adapter::{ReplicatePlan, StatisticsAdapter};
use coalverify_core::{ReplicateTable, Result, ScenarioDescriptor, VerifyError};
use tracing::{debug, info};

/// Runs a fixed number of replicates against any adapter.
///
/// Fail-fast: the first failing replicate aborts the run and no partial
/// table is returned. Batched failures carry no replicate index since the
/// whole batch is one invocation.
#[derive(Debug, Clone, Copy)]
pub struct ReplicateDriver {
    replicates: usize,
}

impl ReplicateDriver {
    pub fn new(replicates: usize) -> Self {
        Self { replicates }
    }

    pub fn replicates(&self) -> usize {
        self.replicates
    }

    /// Renders `scenario` once and collects N rows from `adapter`.
    pub fn run<A: StatisticsAdapter>(&self, adapter: &A, scenario: &ScenarioDescriptor) -> Result<ReplicateTable> {
        if self.replicates == 0 {
            return Err(VerifyError::invalid("replicate count must be positive"));
        }
        let backend = adapter.backend();
        let invocation = adapter.render(scenario, self.replicates)?;
        info!("{}: {} replicates of [{}]", backend, self.replicates, scenario);

        match adapter.plan() {
            ReplicatePlan::Batched => adapter
                .collect(&invocation)
                .and_then(|table| {
                    if table.len() == self.replicates {
                        Ok(table)
                    } else {
                        // Adapters normally check this themselves.
                        Err(VerifyError::malformed(
                            backend,
                            format!("{} rows, expected {}", table.len(), self.replicates),
                        ))
                    }
                })
                .map_err(|e| e.in_batch(backend, self.replicates)),
            ReplicatePlan::Sequential => {
                let step = (self.replicates / 10).max(1);
                let mut table = ReplicateTable::new(backend);
                for replicate in 0..self.replicates {
                    adapter
                        .collect(&invocation)
                        .and_then(|row| {
                            if row.len() == 1 {
                                Ok(row)
                            } else {
                                Err(VerifyError::malformed(
                                    backend,
                                    format!("{} rows from a single replicate", row.len()),
                                ))
                            }
                        })
                        .and_then(|row| table.extend(row))
                        .map_err(|e| e.in_replicate(backend, replicate))?;
                    if (replicate + 1) % step == 0 {
                        debug!("{}: {}/{} replicates", backend, replicate + 1, self.replicates);
                    }
                }
                Ok(table)
            }
        }
    }
}
