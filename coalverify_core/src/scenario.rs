//! Scenario Descriptor - the backend-independent description of one simulation.
//!
//! A descriptor is validated once by `ScenarioBuilder::build` and is
//! read-only afterwards; both backend adapters receive the same value.
//!
//! ```ignore
//! use coalverify_core::{Epoch, ScenarioDescriptor};
//!
//! let scenario = ScenarioDescriptor::builder(15)
//!     .with_sample_configuration(vec![10, 4, 1])
//!     .with_migration_rate(5.0)
//!     .build()?;
//! assert_eq!(scenario.num_populations(), 3);
//! ```

use crate::error::{Result, VerifyError};
use crate::schema::OutputMode;
use coalverify_env::{Epoch, MigrationMatrix};
use serde::Serialize;
use std::fmt;

/// Migration structure of a subdivided population.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Migration {
    /// Total rate, spread evenly over the other subpopulations.
    Symmetric(f64),

    /// Full asymmetric rate matrix.
    Matrix(MigrationMatrix),
}

/// Canonical parameter set shared by both backends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioDescriptor {
    sample_size: u32,
    num_loci: u32,
    effective_population_size: f64,
    recombination_rate: f64,
    mutation_rate: Option<f64>,
    epochs: Vec<Epoch>,
    sample_configuration: Option<Vec<u32>>,
    migration: Option<Migration>,
}

impl ScenarioDescriptor {
    /// Starts a builder for `sample_size` haploid lineages.
    pub fn builder(sample_size: u32) -> ScenarioBuilder {
        ScenarioBuilder::new(sample_size)
    }

    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    pub fn num_loci(&self) -> u32 {
        self.num_loci
    }

    pub fn effective_population_size(&self) -> f64 {
        self.effective_population_size
    }

    pub fn recombination_rate(&self) -> f64 {
        self.recombination_rate
    }

    /// Mutation rate; `None` means topology only.
    pub fn mutation_rate(&self) -> Option<f64> {
        self.mutation_rate
    }

    /// Demographic epochs in ascending start time.
    pub fn epochs(&self) -> &[Epoch] {
        &self.epochs
    }

    pub fn sample_configuration(&self) -> Option<&[u32]> {
        self.sample_configuration.as_deref()
    }

    pub fn migration(&self) -> Option<&Migration> {
        self.migration.as_ref()
    }

    /// Number of subpopulations; 1 when the population is not subdivided.
    pub fn num_populations(&self) -> usize {
        self.sample_configuration.as_ref().map_or(1, Vec::len)
    }

    /// Total scaled recombination rate `rho = 4 Ne (m - 1) r` across the
    /// sequence, as passed to `ms -r`.
    pub fn scaled_recombination_rate(&self) -> f64 {
        scaled_recombination_rate(
            self.effective_population_size,
            self.num_loci,
            self.recombination_rate,
        )
    }

    /// The variant a backend should run in `mode`.
    ///
    /// Topology runs never carry a mutation rate, so `-t` is never passed
    /// next to `-T`. Mutation runs keep the scenario unchanged.
    pub fn for_mode(&self, mode: OutputMode) -> Result<Self> {
        match mode {
            OutputMode::Topology if self.mutation_rate.is_some() => self.to_builder().without_mutations().build(),
            _ => Ok(self.clone()),
        }
    }

    /// Returns a builder pre-filled with this scenario's parameters, for
    /// deriving a variant (e.g. the same demography with mutations).
    pub fn to_builder(&self) -> ScenarioBuilder {
        let (migration_rate, migration_matrix) = match &self.migration {
            Some(Migration::Symmetric(rate)) => (Some(*rate), None),
            Some(Migration::Matrix(matrix)) => (None, Some(matrix.clone())),
            None => (None, None),
        };
        ScenarioBuilder {
            sample_size: self.sample_size,
            num_loci: self.num_loci,
            effective_population_size: self.effective_population_size,
            recombination_rate: self.recombination_rate,
            mutation_rate: self.mutation_rate,
            epochs: self.epochs.clone(),
            sample_configuration: self.sample_configuration.clone(),
            migration_rate,
            migration_matrix,
        }
    }

    /// Scaled rate `4 Ne r` between one pair of adjacent loci.
    ///
    /// Multiplied by the `m - 1` gaps this gives `scaled_recombination_rate`.
    pub fn per_locus_recombination_rate(&self) -> f64 {
        4.0 * self.effective_population_size * self.recombination_rate
    }

    /// Matrix derived from a scalar migration rate; `None` when the
    /// scenario has no scalar rate.
    pub fn symmetric_migration_matrix(&self) -> Option<MigrationMatrix> {
        match self.migration.as_ref()? {
            Migration::Symmetric(rate) => {
                Some(MigrationMatrix::symmetric(self.num_populations(), *rate))
            }
            Migration::Matrix(_) => None,
        }
    }

    /// Migration matrix both backends should realise.
    ///
    /// `None` without subdivision.
    pub fn effective_migration_matrix(&self) -> Option<MigrationMatrix> {
        match self.migration.as_ref()? {
            Migration::Symmetric(_) => self.symmetric_migration_matrix(),
            Migration::Matrix(matrix) => Some(matrix.clone()),
        }
    }
}

/// Returns rho = 4 * Ne * (m - 1) * r, the scaled recombination rate.
pub fn scaled_recombination_rate(ne: f64, num_loci: u32, r: f64) -> f64 {
    4.0 * ne * f64::from(num_loci.saturating_sub(1)) * r
}

impl fmt::Display for ScenarioDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} m={} Ne={} r={}",
            self.sample_size, self.num_loci, self.effective_population_size, self.recombination_rate
        )?;
        if let Some(mu) = self.mutation_rate {
            write!(f, " theta={mu}")?;
        }
        if !self.epochs.is_empty() {
            let epochs: Vec<String> = self.epochs.iter().map(Epoch::to_string).collect();
            write!(f, " epochs=[{}]", epochs.join(", "))?;
        }
        if let Some(config) = &self.sample_configuration {
            write!(f, " samples={config:?}")?;
        }
        match &self.migration {
            Some(Migration::Symmetric(rate)) => write!(f, " migration={rate}")?,
            Some(Migration::Matrix(matrix)) => write!(f, " migration_matrix={:?}", matrix.rows())?,
            None => {}
        }
        Ok(())
    }
}

/// Collects scenario parameters and validates them in `build`.
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    sample_size: u32,
    num_loci: u32,
    effective_population_size: f64,
    recombination_rate: f64,
    mutation_rate: Option<f64>,
    epochs: Vec<Epoch>,
    sample_configuration: Option<Vec<u32>>,
    migration_rate: Option<f64>,
    migration_matrix: Option<MigrationMatrix>,
}

impl ScenarioBuilder {
    /// Defaults: one locus, Ne = 1, no recombination, no mutations.
    pub fn new(sample_size: u32) -> Self {
        Self {
            sample_size,
            num_loci: 1,
            effective_population_size: 1.0,
            recombination_rate: 0.0,
            mutation_rate: None,
            epochs: Vec::new(),
            sample_configuration: None,
            migration_rate: None,
            migration_matrix: None,
        }
    }

    pub fn with_num_loci(mut self, num_loci: u32) -> Self {
        self.num_loci = num_loci;
        self
    }

    pub fn with_effective_population_size(mut self, ne: f64) -> Self {
        self.effective_population_size = ne;
        self
    }

    pub fn with_recombination_rate(mut self, r: f64) -> Self {
        self.recombination_rate = r;
        self
    }

    pub fn with_mutation_rate(mut self, mutation_rate: f64) -> Self {
        self.mutation_rate = Some(mutation_rate);
        self
    }

    /// Drops the mutation rate (topology only).
    pub fn without_mutations(mut self) -> Self {
        self.mutation_rate = None;
        self
    }

    /// Appends one epoch.
    pub fn with_epoch(mut self, epoch: Epoch) -> Self {
        self.epochs.push(epoch);
        self
    }

    /// Appends several epochs in order.
    pub fn with_epochs(mut self, epochs: impl IntoIterator<Item = Epoch>) -> Self {
        self.epochs.extend(epochs);
        self
    }

    pub fn with_sample_configuration(mut self, configuration: Vec<u32>) -> Self {
        self.sample_configuration = Some(configuration);
        self
    }

    pub fn with_migration_rate(mut self, rate: f64) -> Self {
        self.migration_rate = Some(rate);
        self
    }

    pub fn with_migration_matrix(mut self, matrix: MigrationMatrix) -> Self {
        self.migration_matrix = Some(matrix);
        self
    }

    /// Validates every invariant and freezes the descriptor.
    pub fn build(self) -> Result<ScenarioDescriptor> {
        if self.sample_size == 0 {
            return Err(VerifyError::invalid("sample size must be positive"));
        }
        if self.num_loci == 0 {
            return Err(VerifyError::invalid("number of loci must be positive"));
        }
        let ne = self.effective_population_size;
        if !(ne.is_finite() && ne > 0.0) {
            return Err(VerifyError::invalid(format!(
                "effective population size must be positive, got {ne}"
            )));
        }
        let r = self.recombination_rate;
        if !(r.is_finite() && r >= 0.0) {
            return Err(VerifyError::invalid(format!(
                "recombination rate must be non-negative, got {r}"
            )));
        }
        if let Some(mu) = self.mutation_rate {
            // Zero is spelled as "no mutation rate".
            if !(mu.is_finite() && mu > 0.0) {
                return Err(VerifyError::invalid(format!(
                    "mutation rate must be strictly positive when given, got {mu}"
                )));
            }
        }
        validate_epochs(&self.epochs)?;
        let migration = self.validate_subdivision()?;

        Ok(ScenarioDescriptor {
            sample_size: self.sample_size,
            num_loci: self.num_loci,
            effective_population_size: ne,
            recombination_rate: r,
            mutation_rate: self.mutation_rate,
            epochs: self.epochs,
            sample_configuration: self.sample_configuration,
            migration,
        })
    }

    fn validate_subdivision(&self) -> Result<Option<Migration>> {
        let Some(config) = &self.sample_configuration else {
            if self.migration_rate.is_some() || self.migration_matrix.is_some() {
                return Err(VerifyError::invalid(
                    "migration given without a sample configuration",
                ));
            }
            return Ok(None);
        };

        if config.is_empty() {
            return Err(VerifyError::invalid("sample configuration is empty"));
        }
        let total: u64 = config.iter().map(|&c| u64::from(c)).sum();
        if total != u64::from(self.sample_size) {
            return Err(VerifyError::invalid(format!(
                "sample configuration {:?} sums to {}, expected sample size {}",
                config, total, self.sample_size
            )));
        }

        match (self.migration_rate, &self.migration_matrix) {
            (Some(_), Some(_)) => Err(VerifyError::invalid(
                "migration rate and migration matrix are mutually exclusive",
            )),
            (None, None) => Err(VerifyError::invalid(
                "a sample configuration requires a migration rate or matrix",
            )),
            (Some(rate), None) => {
                if !(rate.is_finite() && rate >= 0.0) {
                    return Err(VerifyError::invalid(format!(
                        "migration rate must be non-negative, got {rate}"
                    )));
                }
                Ok(Some(Migration::Symmetric(rate)))
            }
            (None, Some(matrix)) => {
                if matrix.dimension() != config.len() {
                    return Err(VerifyError::invalid(format!(
                        "migration matrix is {0}x{0} but there are {1} subpopulations",
                        matrix.dimension(),
                        config.len()
                    )));
                }
                if let Some(bad) = matrix.row_major().into_iter().find(|v| !(v.is_finite() && *v >= 0.0)) {
                    return Err(VerifyError::invalid(format!(
                        "migration matrix entries must be non-negative, got {bad}"
                    )));
                }
                Ok(Some(Migration::Matrix(matrix.clone())))
            }
        }
    }
}

fn validate_epochs(epochs: &[Epoch]) -> Result<()> {
    for epoch in epochs {
        let t = epoch.start_time();
        if !(t.is_finite() && t >= 0.0) {
            return Err(VerifyError::invalid(format!(
                "epoch start time must be non-negative, got {epoch}"
            )));
        }
        match *epoch {
            Epoch::Constant { size, .. } if !(size.is_finite() && size > 0.0) => {
                return Err(VerifyError::invalid(format!(
                    "constant epoch size must be positive, got {epoch}"
                )));
            }
            Epoch::Exponential { growth_rate, .. } if !growth_rate.is_finite() => {
                return Err(VerifyError::invalid(format!(
                    "growth rate must be finite, got {epoch}"
                )));
            }
            _ => {}
        }
    }
    if let Some(pair) = epochs.windows(2).find(|w| w[1].start_time() < w[0].start_time()) {
        return Err(VerifyError::invalid(format!(
            "epochs out of order: {} before {}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}
