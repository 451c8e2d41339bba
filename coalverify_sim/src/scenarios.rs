//! Named verification scenarios and the seeded random scenario generator.

use coalverify_core::{Epoch, MigrationMatrix, OutputMode, Result, ScenarioDescriptor, VerifyError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Size change and growth at the same instant (`-eN 0.3 0.5 -eG 0.3 7.0`)
    Scrm,

    /// Growth switched off again after 0.2
    ZeroGrowth,

    /// Three islands, symmetric migration (`-I 3 10 4 1 5.0`)
    Migration,

    /// Three islands, asymmetric matrix
    MigrationMatrix,

    /// Strong one-way migration with an empty deme
    HighMigration,

    /// Three stacked exponential epochs over a recombining sequence
    ExponentialModels,

    /// Human-like recombination rate and population size
    Simple,

    /// Diversity statistics under recombination
    Mutations,

    /// Expansion, bottleneck and ancestral constant size
    HumanDemographics,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Scrm,
            ScenarioId::ZeroGrowth,
            ScenarioId::Migration,
            ScenarioId::MigrationMatrix,
            ScenarioId::HighMigration,
            ScenarioId::ExponentialModels,
            ScenarioId::Simple,
            ScenarioId::Mutations,
            ScenarioId::HumanDemographics,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Scrm => "scrm",
            ScenarioId::ZeroGrowth => "zero_growth",
            ScenarioId::Migration => "migration",
            ScenarioId::MigrationMatrix => "migration_matrix",
            ScenarioId::HighMigration => "high_migration",
            ScenarioId::ExponentialModels => "exponential_models",
            ScenarioId::Simple => "simple",
            ScenarioId::Mutations => "mutations",
            ScenarioId::HumanDemographics => "human_demographics",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Scrm => "n=5, size change to 0.5 and growth 7.0 at t=0.3",
            ScenarioId::ZeroGrowth => "n=5, growth 6.93 stopped at t=0.2, resized at t=0.3",
            ScenarioId::Migration => "n=15 over 3 islands [10,4,1], symmetric rate 5.0",
            ScenarioId::MigrationMatrix => "n=15 over 3 islands [10,4,1], asymmetric matrix",
            ScenarioId::HighMigration => "n=100 over [10,90,0], rates 100-200 in a cycle",
            ScenarioId::ExponentialModels => "n=15, m=4550, three growth epochs",
            ScenarioId::Simple => "n=400, m=1e5, Ne=1e4, r=1e-8, three epochs, theta=10",
            ScenarioId::Mutations => "n=9, m=7165, Ne=3717, theta=100",
            ScenarioId::HumanDemographics => "n=100, m=5e5, Ne=1e6, expansion after a bottleneck",
        }
    }

    /// Statistic family the scenario was designed to check.
    ///
    /// Scenarios with a mutation rate can be run in either mode.
    pub fn mode(&self) -> OutputMode {
        match self {
            ScenarioId::Mutations => OutputMode::Mutation,
            _ => OutputMode::Topology,
        }
    }

    /// Whether the scenario can be compared in `mode`; mutation statistics
    /// need a mutation rate.
    pub fn runs_in(&self, mode: OutputMode) -> bool {
        match mode {
            OutputMode::Topology => true,
            OutputMode::Mutation => matches!(self, ScenarioId::Simple | ScenarioId::Mutations),
        }
    }

    /// Replicates used when none are requested.
    pub fn default_replicates(&self) -> usize {
        match self {
            ScenarioId::HighMigration | ScenarioId::Simple | ScenarioId::Mutations => 1000,
            _ => 10_000,
        }
    }

    /// Builds the scenario descriptor.
    pub fn build(&self) -> Result<ScenarioDescriptor> {
        match self {
            ScenarioId::Scrm => ScenarioDescriptor::builder(5)
                .with_epochs([Epoch::constant(0.3, 0.5), Epoch::exponential(0.3, 7.0)])
                .build(),
            ScenarioId::ZeroGrowth => ScenarioDescriptor::builder(5)
                .with_epochs([
                    Epoch::exponential(0.0, 6.93),
                    Epoch::exponential(0.2, 0.0),
                    Epoch::constant(0.3, 0.5),
                ])
                .build(),
            ScenarioId::Migration => ScenarioDescriptor::builder(15)
                .with_sample_configuration(vec![10, 4, 1])
                .with_migration_rate(5.0)
                .build(),
            ScenarioId::MigrationMatrix => ScenarioDescriptor::builder(15)
                .with_sample_configuration(vec![10, 4, 1])
                .with_migration_matrix(matrix(&[
                    vec![0.0, 1.0, 2.0],
                    vec![2.0, 0.0, 4.0],
                    vec![5.0, 6.0, 0.0],
                ])?)
                .build(),
            ScenarioId::HighMigration => ScenarioDescriptor::builder(100)
                .with_sample_configuration(vec![10, 90, 0])
                .with_migration_matrix(matrix(&[
                    vec![0.0, 100.0, 0.0],
                    vec![0.0, 0.0, 150.0],
                    vec![200.0, 0.0, 0.0],
                ])?)
                .build(),
            ScenarioId::ExponentialModels => {
                let mut t = 0.0;
                let epochs = (0..3).map(|_| {
                    t += 0.1;
                    Epoch::exponential(t, 100.0 * t)
                });
                ScenarioDescriptor::builder(15)
                    .with_num_loci(4550)
                    .with_effective_population_size(7730.75967602)
                    .with_recombination_rate(7.05807713707e-07)
                    .with_epochs(epochs.collect::<Vec<_>>())
                    .build()
            }
            ScenarioId::Simple => ScenarioDescriptor::builder(400)
                .with_num_loci(100_000)
                .with_effective_population_size(1e4)
                .with_recombination_rate(1e-8)
                .with_mutation_rate(10.0)
                .with_epochs([
                    Epoch::constant(0.1, 2.0),
                    Epoch::constant(0.4, 0.5),
                    Epoch::exponential(0.5, 1.0),
                ])
                .build(),
            ScenarioId::Mutations => ScenarioDescriptor::builder(9)
                .with_num_loci(7165)
                .with_effective_population_size(3717.0)
                .with_recombination_rate(5.05e-07)
                .with_mutation_rate(100.0)
                .build(),
            ScenarioId::HumanDemographics => human_demographics(),
        }
    }
}

fn matrix(rows: &[Vec<f64>]) -> Result<MigrationMatrix> {
    MigrationMatrix::from_rows(rows).map_err(|e| VerifyError::invalid(e.to_string()))
}

/// 1e6 now, growing from 2e4 400 generations ago, from 2e3 at 2000
/// generations, and a constant 2e4 before that.
fn human_demographics() -> Result<ScenarioDescriptor> {
    let (n0, n1, n2, n3): (f64, f64, f64, f64) = (1e6, 2e4, 2e3, 2e4);
    let t1 = 400.0 / (4.0 * n0);
    let t2 = 2000.0 / (4.0 * n0);
    let alpha1 = -(n1 / n0).ln() / t1;
    let alpha2 = -(n2 / n1).ln() / (t2 - t1);
    ScenarioDescriptor::builder(100)
        .with_num_loci(500_000)
        .with_effective_population_size(n0)
        .with_recombination_rate(1e-8)
        .with_epochs([
            Epoch::exponential(0.0, alpha1),
            Epoch::exponential(t1, alpha2),
            Epoch::constant(t2, n3 / n0),
        ])
        .build()
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "scrm" => Ok(ScenarioId::Scrm),
            "zero_growth" | "zero" => Ok(ScenarioId::ZeroGrowth),
            "migration" => Ok(ScenarioId::Migration),
            "migration_matrix" => Ok(ScenarioId::MigrationMatrix),
            "high_migration" => Ok(ScenarioId::HighMigration),
            "exponential_models" | "expo_models" => Ok(ScenarioId::ExponentialModels),
            "simple" => Ok(ScenarioId::Simple),
            "mutations" => Ok(ScenarioId::Mutations),
            "human_demographics" | "human" => Ok(ScenarioId::HumanDemographics),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

/// Draws `count` random scenarios, reproducibly from `seed`.
///
/// n in [2, 100], m in [1, 10000], Ne in [100, 1e4], r in [1e-9, 1e-6],
/// theta in [1, 100] and up to 10 epochs whose start times accumulate
/// steps drawn from [0, 0.3].
pub fn random_scenarios(seed: u64, count: usize) -> Result<Vec<ScenarioDescriptor>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let ne = Uniform::new_inclusive(100.0, 1e4);
    let r = Uniform::new_inclusive(1e-9, 1e-6);
    let theta = Uniform::new_inclusive(1.0, 100.0);
    let step = Uniform::new_inclusive(0.0, 0.3);
    let param = Uniform::new_inclusive(0.1, 2.0);

    (0..count)
        .map(|_| {
            let n = rng.gen_range(2..=100);
            let m = rng.gen_range(1..=10_000);
            let mut builder = ScenarioDescriptor::builder(n)
                .with_num_loci(m)
                .with_effective_population_size(ne.sample(&mut rng))
                .with_recombination_rate(r.sample(&mut rng))
                .with_mutation_rate(theta.sample(&mut rng));
            let mut t = 0.0;
            for _ in 0..rng.gen_range(0..=10) {
                t += step.sample(&mut rng);
                let p = param.sample(&mut rng);
                let epoch = if rng.gen_bool(0.5) {
                    Epoch::constant(t, p)
                } else {
                    Epoch::exponential(t, p)
                };
                builder = builder.with_epoch(epoch);
            }
            builder.build()
        })
        .collect()
}
