//! Embedded backend - drives an in-process coalescent engine, one fresh
//! instance per replicate.

use crate::adapter::{ReplicatePlan, StatisticsAdapter};
use coalverify_core::schema::{migration_statistic, TOPOLOGY_STATISTICS};
use coalverify_core::{Epoch, OutputMode, ReplicateTable, Result, ScenarioDescriptor, VerifyError};
use coalverify_env::{CoalescentEngine, EngineFactory, EngineOutcome, MemoryCeiling, MigrationMatrix};
use tracing::debug;

/// Everything an engine needs before `run`, derived once per scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSetup {
    /// Sample size handed to the factory.
    pub sample_size: u32,

    /// Scaled rate between adjacent loci (`4 Ne r`).
    pub scaled_recombination_rate: f64,

    pub num_loci: u32,

    pub max_memory: MemoryCeiling,

    pub epochs: Vec<Epoch>,

    pub sample_configuration: Option<Vec<u32>>,

    /// Realised migration matrix; `None` without subdivision.
    pub migration_matrix: Option<MigrationMatrix>,

    /// Subpopulations the event-count matrix must cover.
    pub num_populations: usize,
}

impl EngineSetup {
    /// Derives the engine configuration for `scenario`.
    pub fn from_scenario(scenario: &ScenarioDescriptor, max_memory: MemoryCeiling) -> Self {
        Self {
            sample_size: scenario.sample_size(),
            scaled_recombination_rate: scenario.per_locus_recombination_rate(),
            num_loci: scenario.num_loci(),
            max_memory,
            epochs: scenario.epochs().to_vec(),
            sample_configuration: scenario.sample_configuration().map(<[u32]>::to_vec),
            migration_matrix: scenario.effective_migration_matrix(),
            num_populations: scenario.num_populations(),
        }
    }

    /// Pushes the configuration through the engine's setters.
    pub fn apply<E: CoalescentEngine + ?Sized>(&self, engine: &mut E) {
        engine.set_scaled_recombination_rate(self.scaled_recombination_rate);
        engine.set_num_loci(self.num_loci);
        engine.set_max_memory(&self.max_memory);
        for epoch in &self.epochs {
            engine.add_population_model(*epoch);
        }
        if let Some(config) = &self.sample_configuration {
            engine.set_sample_configuration(config);
        }
        if let Some(matrix) = &self.migration_matrix {
            engine.set_migration_matrix(matrix);
        }
    }
}

/// Adapter around an `EngineFactory`.
///
/// Always reports topology statistics.
pub struct EmbeddedAdapter<F> {
    name: String,
    factory: F,
    max_memory: MemoryCeiling,
}

impl<F: EngineFactory> EmbeddedAdapter<F> {
    /// Creates an adapter with the default `10G` memory ceiling.
    pub fn new(name: impl Into<String>, factory: F) -> Self {
        Self {
            name: name.into(),
            factory,
            max_memory: MemoryCeiling::default(),
        }
    }

    pub fn with_max_memory(mut self, ceiling: MemoryCeiling) -> Self {
        self.max_memory = ceiling;
        self
    }

    fn table_row(&self, setup: &EngineSetup, outcome: &EngineOutcome) -> Result<Vec<(String, f64)>> {
        let events = outcome.migration_events();
        let p = setup.num_populations;
        if events.nrows() != p || events.ncols() != p {
            return Err(VerifyError::malformed(
                &self.name,
                format!(
                    "migration event matrix is {}x{}, expected {}x{}",
                    events.nrows(),
                    events.ncols(),
                    p,
                    p
                ),
            ));
        }

        let [t, num_trees, re_events, ca_events] = TOPOLOGY_STATISTICS;
        let mut row = vec![
            (t.to_string(), outcome.time()),
            (num_trees.to_string(), (outcome.num_breakpoints() + 1) as f64),
            (re_events.to_string(), outcome.recombination_events() as f64),
            (ca_events.to_string(), outcome.common_ancestor_events() as f64),
        ];
        // Row-major, matching the flattening of `-ma`.
        let mut k = 0;
        for i in 0..p {
            for j in 0..p {
                row.push((migration_statistic(k), events[(i, j)] as f64));
                k += 1;
            }
        }
        Ok(row)
    }
}

impl<F: EngineFactory> StatisticsAdapter for EmbeddedAdapter<F> {
    type Invocation = EngineSetup;

    fn backend(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> OutputMode {
        OutputMode::Topology
    }

    fn plan(&self) -> ReplicatePlan {
        ReplicatePlan::Sequential
    }

    fn render(&self, scenario: &ScenarioDescriptor, _replicates: usize) -> Result<EngineSetup> {
        Ok(EngineSetup::from_scenario(scenario, self.max_memory.clone()))
    }

    fn collect(&self, setup: &EngineSetup) -> Result<ReplicateTable> {
        let mut engine = self.factory.create(setup.sample_size);
        setup.apply(&mut engine);
        let outcome = engine.run().map_err(|e| VerifyError::engine(&self.name, e))?;
        debug!(
            "{}: t={} breakpoints={} ca={} re={}",
            self.name,
            outcome.time(),
            outcome.num_breakpoints(),
            outcome.common_ancestor_events(),
            outcome.recombination_events()
        );

        let mut table = ReplicateTable::new(&self.name);
        table.push_row(self.table_row(setup, &outcome)?)?;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use coalverify_core::expected_statistics;
    use coalverify_env::EnvError;
    use nalgebra::DMatrix;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Setter calls observed by the fake engine.
    #[derive(Debug, Default, Clone)]
    struct Observed {
        sample_size: u32,
        recombination: Option<f64>,
        num_loci: Option<u32>,
        memory: Option<String>,
        epochs: Vec<Epoch>,
        configuration: Option<Vec<u32>>,
        matrix: Option<Vec<Vec<f64>>>,
    }

    struct FakeEngine {
        observed: Observed,
        sink: Rc<RefCell<Vec<Observed>>>,
        outcome: std::result::Result<EngineOutcome, String>,
    }

    impl CoalescentEngine for FakeEngine {
        fn set_scaled_recombination_rate(&mut self, rate: f64) {
            self.observed.recombination = Some(rate);
        }
        fn set_num_loci(&mut self, num_loci: u32) {
            self.observed.num_loci = Some(num_loci);
        }
        fn set_max_memory(&mut self, ceiling: &MemoryCeiling) {
            self.observed.memory = Some(ceiling.as_str().to_string());
        }
        fn add_population_model(&mut self, epoch: Epoch) {
            self.observed.epochs.push(epoch);
        }
        fn set_sample_configuration(&mut self, configuration: &[u32]) {
            self.observed.configuration = Some(configuration.to_vec());
        }
        fn set_migration_matrix(&mut self, matrix: &MigrationMatrix) {
            self.observed.matrix = Some(matrix.rows());
        }
        fn run(&mut self) -> std::result::Result<EngineOutcome, EnvError> {
            self.sink.borrow_mut().push(self.observed.clone());
            match &self.outcome {
                Ok(outcome) => Ok(outcome.clone()),
                Err(msg) if msg.starts_with("memory") => Err(EnvError::resource_limit(msg.clone())),
                Err(msg) => Err(EnvError::Engine(msg.clone())),
            }
        }
    }

    struct FakeFactory {
        outcome: std::result::Result<EngineOutcome, String>,
        sink: Rc<RefCell<Vec<Observed>>>,
    }

    impl FakeFactory {
        fn returning(outcome: EngineOutcome) -> Self {
            Self {
                outcome: Ok(outcome),
                sink: Rc::default(),
            }
        }

        fn failing(msg: &str) -> Self {
            Self {
                outcome: Err(msg.to_string()),
                sink: Rc::default(),
            }
        }
    }

    impl EngineFactory for FakeFactory {
        type Engine = FakeEngine;

        fn create(&self, sample_size: u32) -> FakeEngine {
            FakeEngine {
                observed: Observed {
                    sample_size,
                    ..Observed::default()
                },
                sink: Rc::clone(&self.sink),
                outcome: self.outcome.clone(),
            }
        }
    }

    fn three_islands() -> ScenarioDescriptor {
        ScenarioDescriptor::builder(15)
            .with_num_loci(11)
            .with_effective_population_size(100.0)
            .with_recombination_rate(1e-4)
            .with_epoch(Epoch::constant(0.1, 2.0))
            .with_sample_configuration(vec![10, 4, 1])
            .with_migration_rate(5.0)
            .build()
            .unwrap()
    }

    fn outcome(p: usize) -> EngineOutcome {
        let events = DMatrix::from_fn(p, p, |i, j| (i * p + j) as u64);
        EngineOutcome::new(3, 1.5, 14, 3, events)
    }

    #[test]
    fn test_setup_applies_every_parameter() {
        let factory = FakeFactory::returning(outcome(3));
        let sink = Rc::clone(&factory.sink);
        let adapter = EmbeddedAdapter::new("embedded", factory);
        let scenario = three_islands();

        let setup = adapter.render(&scenario, 1).unwrap();
        adapter.collect(&setup).unwrap();

        let observed = sink.borrow()[0].clone();
        assert_eq!(observed.sample_size, 15);
        assert_relative_eq!(observed.recombination.unwrap(), 4.0 * 100.0 * 1e-4);
        assert_eq!(observed.num_loci, Some(11));
        assert_eq!(observed.memory.as_deref(), Some("10G"));
        assert_eq!(observed.epochs, vec![Epoch::constant(0.1, 2.0)]);
        assert_eq!(observed.configuration, Some(vec![10, 4, 1]));
        assert_eq!(
            observed.matrix,
            Some(vec![
                vec![0.0, 2.5, 2.5],
                vec![2.5, 0.0, 2.5],
                vec![2.5, 2.5, 0.0]
            ])
        );
    }

    #[test]
    fn test_row_matches_topology_schema() {
        let adapter = EmbeddedAdapter::new("embedded", FakeFactory::returning(outcome(3)));
        let setup = adapter.render(&three_islands(), 1).unwrap();
        let table = adapter.collect(&setup).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.statistics(), expected_statistics(OutputMode::Topology, 3).as_slice());
        assert_eq!(table.column("num_trees").unwrap(), &[4.0]);
        assert_eq!(table.column("t").unwrap(), &[1.5]);
        assert_eq!(table.column("mig_events_1").unwrap(), &[1.0]);
        assert_eq!(table.column("mig_events_3").unwrap(), &[3.0]);
        assert_eq!(table.column("mig_events_8").unwrap(), &[8.0]);
    }

    #[test]
    fn test_single_population_reports_one_counter() {
        let adapter = EmbeddedAdapter::new("embedded", FakeFactory::returning(outcome(1)));
        let scenario = ScenarioDescriptor::builder(5).build().unwrap();
        let setup = adapter.render(&scenario, 1).unwrap();
        assert!(setup.migration_matrix.is_none());
        let table = adapter.collect(&setup).unwrap();
        assert_eq!(table.statistics(), expected_statistics(OutputMode::Topology, 1).as_slice());
    }

    #[test]
    fn test_wrong_event_matrix_shape() {
        let adapter = EmbeddedAdapter::new("embedded", FakeFactory::returning(outcome(2)));
        let setup = adapter.render(&three_islands(), 1).unwrap();
        assert!(matches!(
            adapter.collect(&setup),
            Err(VerifyError::MalformedBackendOutput { .. })
        ));
    }

    #[test]
    fn test_engine_failures_are_classified() {
        let adapter = EmbeddedAdapter::new("embedded", FakeFactory::failing("memory ceiling 10G exceeded"));
        let setup = adapter.render(&three_islands(), 1).unwrap();
        assert!(matches!(
            adapter.collect(&setup),
            Err(VerifyError::ResourceExhausted { .. })
        ));

        let adapter = EmbeddedAdapter::new("embedded", FakeFactory::failing("bad sample"));
        assert!(matches!(
            adapter.collect(&setup),
            Err(VerifyError::EngineFailed { .. })
        ));
    }

    #[test]
    fn test_custom_memory_ceiling() {
        let factory = FakeFactory::returning(outcome(1));
        let sink = Rc::clone(&factory.sink);
        let adapter = EmbeddedAdapter::new("embedded", factory)
            .with_max_memory("512M".parse().unwrap());
        let setup = adapter.render(&ScenarioDescriptor::builder(4).build().unwrap(), 1).unwrap();
        adapter.collect(&setup).unwrap();
        assert_eq!(sink.borrow()[0].memory.as_deref(), Some("512M"));
    }
}
