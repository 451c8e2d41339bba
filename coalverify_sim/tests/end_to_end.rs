//! End-to-end comparisons through the public API.

use coalverify_core::{expected_statistics, Epoch, OutputMode, ScenarioDescriptor, VerifyError};
use coalverify_env::{
    CoalescentEngine, CommandLine, CommandRunner, EngineFactory, EngineOutcome, EnvError, MemoryCeiling,
    MigrationMatrix, ProcessOutput,
};
use coalverify_sim::scenarios::ScenarioId;
use coalverify_sim::{
    compare_coalescent, EmbeddedAdapter, ProcessAdapter, ReplicateDriver, StatisticsAdapter,
};
use nalgebra::DMatrix;
use std::cell::{Cell, RefCell};

/// Answers every command with an `ms_summary_stats`-style table sized from
/// the replicate count in the argument vector.
#[derive(Default)]
struct RecordingRunner {
    commands: RefCell<Vec<Vec<String>>>,
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &CommandLine) -> Result<ProcessOutput, EnvError> {
        self.commands.borrow_mut().push(command.as_slice().to_vec());
        let args = command.arguments();
        let replicates: usize = args[1].parse().unwrap_or(0);
        let populations = args
            .iter()
            .position(|a| a == "-I")
            .and_then(|i| args[i + 1].parse::<usize>().ok())
            .unwrap_or(1);

        let keys = expected_statistics(OutputMode::Topology, populations);
        let mut out = keys.join("\t");
        out.push('\n');
        for r in 0..replicates {
            let row: Vec<String> = keys
                .iter()
                .enumerate()
                .map(|(i, _)| if i == 0 { format!("{}", 0.01 * (r + 1) as f64) } else { "1".into() })
                .collect();
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
        Ok(ProcessOutput {
            stdout: out.into_bytes(),
            stderr: String::new(),
        })
    }

    fn run_piped(&self, producer: &CommandLine, _filter: &CommandLine) -> Result<ProcessOutput, EnvError> {
        self.run(producer)
    }
}

struct StubEngine {
    populations: usize,
}

impl CoalescentEngine for StubEngine {
    fn set_scaled_recombination_rate(&mut self, _rate: f64) {}
    fn set_num_loci(&mut self, _num_loci: u32) {}
    fn set_max_memory(&mut self, _ceiling: &MemoryCeiling) {}
    fn add_population_model(&mut self, _epoch: Epoch) {}
    fn set_sample_configuration(&mut self, configuration: &[u32]) {
        self.populations = configuration.len();
    }
    fn set_migration_matrix(&mut self, matrix: &MigrationMatrix) {
        assert_eq!(matrix.dimension(), self.populations);
    }
    fn run(&mut self) -> Result<EngineOutcome, EnvError> {
        let run = RUNS.with(|c| {
            c.set(c.get() + 1);
            c.get()
        });
        if run == FAIL_AT.with(Cell::get) {
            return Err(EnvError::resource_limit("10G exceeded"));
        }
        let p = self.populations;
        Ok(EngineOutcome::new(0, 0.5, 14, 0, DMatrix::from_element(p, p, 2)))
    }
}

thread_local! {
    static RUNS: Cell<usize> = const { Cell::new(0) };
    static FAIL_AT: Cell<usize> = const { Cell::new(0) };
}

struct StubFactory;

impl EngineFactory for StubFactory {
    type Engine = StubEngine;

    fn create(&self, _sample_size: u32) -> StubEngine {
        StubEngine { populations: 1 }
    }
}

fn reset(fail_at: usize) {
    RUNS.with(|c| c.set(0));
    FAIL_AT.with(|c| c.set(fail_at));
}

fn three_islands() -> ScenarioDescriptor {
    ScenarioDescriptor::builder(15)
        .with_sample_configuration(vec![10, 4, 1])
        .with_migration_rate(5.0)
        .build()
        .unwrap()
}

#[test]
fn test_three_islands_both_backends() {
    reset(0);
    let runner = RecordingRunner::default();
    let ms = ProcessAdapter::with_runner("ms", CommandLine::new(["ms_summary_stats"]).unwrap(), &runner);
    let engine = EmbeddedAdapter::new("embedded", StubFactory);

    let comparison = compare_coalescent(&three_islands(), 100, &ms, &engine).unwrap();

    let keys: Vec<&str> = comparison.statistics.iter().map(|s| s.statistic.as_str()).collect();
    let mut expected = vec!["t", "num_trees", "re_events", "ca_events"];
    let migration: Vec<String> = (0..9).map(|k| format!("mig_events_{}", k)).collect();
    expected.extend(migration.iter().map(String::as_str));
    assert_eq!(keys, expected);

    for paired in &comparison.statistics {
        assert_eq!(paired.left.len(), 100, "{}", paired.statistic);
        assert_eq!(paired.right.len(), 100, "{}", paired.statistic);
    }
    assert_eq!(RUNS.with(Cell::get), 100);

    let commands = runner.commands.borrow();
    assert_eq!(commands.len(), 1);
    assert_eq!(
        commands[0],
        vec!["ms_summary_stats", "15", "100", "-T", "-I", "3", "10", "4", "1", "5.0"]
    );
}

#[test]
fn test_growth_after_size_change_renders_in_order() {
    let runner = RecordingRunner::default();
    let ms = ProcessAdapter::with_runner("ms", CommandLine::new(["ms"]).unwrap(), &runner);
    let scenario = ScenarioId::Scrm.build().unwrap();

    let table = ReplicateDriver::new(10).run(&ms, &scenario).unwrap();
    assert_eq!(table.len(), 10);

    let argv = runner.commands.borrow()[0].clone();
    let tail = &argv[argv.len() - 6..];
    assert_eq!(tail, ["-eN", "0.3", "0.5", "-eG", "0.3", "7.0"]);
}

#[test]
fn test_embedded_failure_aborts_without_table() {
    reset(42);
    let engine = EmbeddedAdapter::new("embedded", StubFactory);
    let err = ReplicateDriver::new(100).run(&engine, &three_islands()).unwrap_err();
    assert_eq!(RUNS.with(Cell::get), 42);
    match &err {
        VerifyError::ReplicateFailed { replicate, .. } => assert_eq!(*replicate, 41),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(err.innermost(), VerifyError::ResourceExhausted { .. }));
}

#[test]
fn test_rendering_is_pure() {
    let ms = ProcessAdapter::with_runner("ms", CommandLine::new(["ms"]).unwrap(), RecordingRunner::default());
    for id in ScenarioId::all() {
        let scenario = id.build().unwrap();
        assert_eq!(ms.render(&scenario, 7).unwrap(), ms.render(&scenario, 7).unwrap(), "{}", id);
    }
}

#[test]
fn test_topology_run_of_simple_omits_theta() {
    let runner = RecordingRunner::default();
    let ms = ProcessAdapter::with_runner("ms", CommandLine::new(["ms_summary_stats"]).unwrap(), &runner);
    let simple = ScenarioId::Simple.build().unwrap();
    assert_eq!(simple.mutation_rate(), Some(10.0));

    let topology = simple.for_mode(OutputMode::Topology).unwrap();
    let argv = ms.command_line(&topology, 1).unwrap();
    assert!(!argv.arguments().iter().any(|a| a == "-t"), "{}", argv);
    assert!(argv.arguments().iter().any(|a| a == "-T"));
    assert_eq!(topology.epochs(), simple.epochs());

    for scenario in coalverify_sim::scenarios::random_scenarios(7, 5).unwrap() {
        let argv = ms.command_line(&scenario.for_mode(OutputMode::Topology).unwrap(), 1).unwrap();
        assert!(!argv.arguments().iter().any(|a| a == "-t"), "{}", argv);
    }

    let table = ReplicateDriver::new(3).run(&ms, &topology).unwrap();
    assert_eq!(table.len(), 3);
    assert!(!runner.commands.borrow()[0].iter().any(|a| a == "-t"));
}

#[cfg(unix)]
mod subprocess {
    use super::*;
    use coalverify_sim::{compare_mutations, MutationStatistics};

    /// `sh -c <script> sh` followed by the rendered arguments: `$1` is the
    /// sample size and `$2` the replicate count.
    fn sh(script: &str) -> CommandLine {
        CommandLine::new(["sh", "-c", script, "sh"]).unwrap()
    }

    const FAKE_MS_SUMMARY: &str = r#"
        printf 't\tnum_trees\tre_events\tca_events'
        i=0; while [ $i -lt 9 ]; do printf '\tmig_events_%d' $i; i=$((i+1)); done
        printf '\n'
        r=0
        while [ $r -lt $2 ]; do
            printf '0.5\t1\t0\t14'
            i=0; while [ $i -lt 9 ]; do printf '\t2'; i=$((i+1)); done
            printf '\n'
            r=$((r+1))
        done
    "#;

    const FAKE_MS_HAPLOTYPES: &str = r#"
        echo "ms $*"
        r=0
        while [ $r -lt $2 ]; do echo "//"; echo "segsites: 2"; r=$((r+1)); done
    "#;

    fn fake_sample_stats() -> MutationStatistics {
        let program = r#"BEGIN { print "pi\tss\tD\tthetaH\tH" } /^\/\// { n++; print n "\t2\t0.1\t1.5\t-0.5" }"#;
        MutationStatistics::new(CommandLine::new(["awk", program]).unwrap())
    }

    #[test]
    fn test_real_process_against_engine() {
        reset(0);
        let ms = ProcessAdapter::new("sh-ms", sh(FAKE_MS_SUMMARY));
        let engine = EmbeddedAdapter::new("embedded", StubFactory);
        let comparison = compare_coalescent(&three_islands(), 25, &ms, &engine).unwrap();
        assert_eq!(comparison.statistics.len(), 13);
        let mig = comparison.statistics.iter().find(|s| s.statistic == "mig_events_4").unwrap();
        assert_eq!(mig.left, vec![2.0; 25]);
        assert_eq!(mig.right, vec![2.0; 25]);
    }

    #[test]
    fn test_piped_mutation_statistics() {
        let left = ProcessAdapter::new("ms", sh(FAKE_MS_HAPLOTYPES)).with_mutation_statistics(fake_sample_stats());
        let right = ProcessAdapter::new("alt", sh(FAKE_MS_HAPLOTYPES)).with_mutation_statistics(fake_sample_stats());
        let scenario = ScenarioId::Mutations.build().unwrap();

        let comparison = compare_mutations(&scenario, 12, &left, &right).unwrap();
        let pi = comparison.statistics.iter().find(|s| s.statistic == "pi").unwrap();
        assert_eq!(pi.left.len(), 12);
        assert_eq!(pi.left[11], 12.0);
        assert_eq!(comparison.statistics.len(), 5);
    }

    #[test]
    fn test_short_output_is_malformed() {
        let ms = ProcessAdapter::new("sh-ms", sh("printf 'pi\\tss\\n1\\t2\\n'"));
        let err = ReplicateDriver::new(3)
            .run(&ms, &ScenarioDescriptor::builder(4).build().unwrap())
            .unwrap_err();
        assert!(matches!(err.innermost(), VerifyError::MalformedBackendOutput { .. }));
    }

    #[test]
    fn test_failed_process_reports_command_and_stderr() {
        let ms = ProcessAdapter::new("sh-ms", sh("echo 'bad option' >&2; exit 1"));
        let err = ReplicateDriver::new(5)
            .run(&ms, &ScenarioDescriptor::builder(4).build().unwrap())
            .unwrap_err();
        assert!(err.stderr().unwrap().contains("bad option"));
        match err.innermost() {
            VerifyError::BackendProcessFailed { command, .. } => assert!(command.ends_with("sh 4 5 -T")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_filter_is_a_process_failure() {
        let ms = ProcessAdapter::new("ms", sh(FAKE_MS_HAPLOTYPES)).with_mutation_statistics(MutationStatistics::new(
            CommandLine::new(["/nonexistent/sample_stats"]).unwrap(),
        ));
        let scenario = ScenarioDescriptor::builder(4).with_mutation_rate(1.0).build().unwrap();
        let err = ReplicateDriver::new(2).run(&ms, &scenario).unwrap_err();
        assert!(matches!(err.innermost(), VerifyError::BackendProcessFailed { .. }));
    }
}
