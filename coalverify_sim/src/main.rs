//! coalverify CLI
//!
//! Runs named, file-defined or random scenarios through two `ms`-compatible
//! backends and summarises how their statistics line up.

use anyhow::Context;
use clap::{Parser, Subcommand};
use coalverify_core::{OutputMode, ScenarioDescriptor};
use coalverify_sim::scenarios::{random_scenarios, ScenarioId};
use coalverify_sim::{
    compare, compare_mutations, BackendConfig, Comparison, ComparisonReport, ScenarioFile, StatisticsAdapter,
};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Cross-validate coalescent simulators
#[derive(Parser, Debug)]
#[command(name = "coalverify")]
#[command(about = "Compare replicate statistics of two coalescent simulators", long_about = None)]
struct Args {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long, global = true)]
    json: bool,

    /// Backend configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the named scenarios
    List,

    /// Print the command line a scenario renders to
    Render {
        /// Scenario name
        #[arg(short = 'S', long)]
        scenario: String,

        /// Replicate count to render
        #[arg(short, long, default_value = "1")]
        replicates: usize,

        /// Output mode (topology, mutation)
        #[arg(short, long, default_value = "topology")]
        mode: OutputMode,
    },

    /// Compare topology statistics
    Topology(RunArgs),

    /// Compare mutation statistics through sample_stats
    Mutations(RunArgs),

    /// Compare both modes on random scenarios
    Random {
        /// Seed of the scenario generator
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Number of scenarios to draw
        #[arg(short = 'k', long, default_value = "10")]
        count: usize,

        /// Replicates per scenario and backend
        #[arg(short, long, default_value = "1000")]
        replicates: usize,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Scenario to run (see `list`, or all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Scenario file (JSON) used instead of the named scenarios
    #[arg(long)]
    scenario_file: Option<String>,

    /// Replicates per backend (defaults to the scenario's own count)
    #[arg(short, long)]
    replicates: Option<usize>,
}

/// A scenario ready to run.
struct Job {
    name: String,
    scenario: ScenarioDescriptor,
    replicates: usize,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether every scenario completed.
fn run(args: &Args) -> anyhow::Result<bool> {
    let config = match &args.config {
        Some(path) => BackendConfig::load(path)?,
        None => BackendConfig::default(),
    };

    match &args.command {
        Command::List => {
            for id in ScenarioId::all() {
                println!(
                    "{:<20} {:<9} {:>6}  {}",
                    id.name(),
                    id.mode().name(),
                    id.default_replicates(),
                    id.description()
                );
            }
            Ok(true)
        }
        Command::Render {
            scenario,
            replicates,
            mode,
        } => {
            let id: ScenarioId = scenario.parse().map_err(anyhow::Error::msg)?;
            let scenario = id.build()?.for_mode(*mode)?;
            let invocation = match mode {
                OutputMode::Topology => config.reference_topology.adapter().render(&scenario, *replicates)?,
                OutputMode::Mutation => config
                    .reference
                    .adapter()
                    .with_mutation_statistics(config.mutation_statistics())
                    .render(&scenario, *replicates)?,
            };
            println!("{}", invocation);
            Ok(true)
        }
        Command::Topology(run_args) => {
            let jobs = jobs(run_args, OutputMode::Topology)?;
            Ok(run_jobs(args, &config, &jobs, &[OutputMode::Topology]))
        }
        Command::Mutations(run_args) => {
            let jobs = jobs(run_args, OutputMode::Mutation)?;
            Ok(run_jobs(args, &config, &jobs, &[OutputMode::Mutation]))
        }
        Command::Random {
            seed,
            count,
            replicates,
        } => {
            let jobs: Vec<Job> = random_scenarios(*seed, *count)?
                .into_iter()
                .enumerate()
                .map(|(j, scenario)| Job {
                    name: format!("random_{}", j),
                    scenario,
                    replicates: *replicates,
                })
                .collect();
            Ok(run_jobs(args, &config, &jobs, &[OutputMode::Topology, OutputMode::Mutation]))
        }
    }
}

/// Scenarios to compare in `mode`. Without an explicit scenario name,
/// mutation runs skip scenarios that carry no mutation rate.
fn jobs(run_args: &RunArgs, mode: OutputMode) -> anyhow::Result<Vec<Job>> {
    if let Some(path) = &run_args.scenario_file {
        let file = ScenarioFile::load(path)?;
        let mut jobs = Vec::new();
        for (spec, scenario) in file.descriptors()? {
            if mode == OutputMode::Mutation && scenario.mutation_rate().is_none() {
                warn!("skipping {}: no mutation rate", spec.name);
                continue;
            }
            jobs.push(Job {
                name: spec.name.clone(),
                scenario,
                replicates: run_args.replicates.or(spec.replicates).unwrap_or(1000),
            });
        }
        return Ok(jobs);
    }

    let ids = if run_args.scenario == "all" {
        let (runnable, skipped): (Vec<_>, Vec<_>) =
            ScenarioId::all().into_iter().partition(|id| id.runs_in(mode));
        if !skipped.is_empty() {
            let names: Vec<&str> = skipped.iter().map(|id| id.name()).collect();
            info!("{} mode skips {} (no mutation rate)", mode, names.join(", "));
        }
        runnable
    } else {
        vec![run_args.scenario.parse().map_err(anyhow::Error::msg)?]
    };
    ids.into_iter()
        .map(|id| {
            let scenario = id.build().with_context(|| format!("building scenario {}", id))?;
            Ok(Job {
                name: id.name().to_string(),
                scenario,
                replicates: run_args.replicates.unwrap_or_else(|| id.default_replicates()),
            })
        })
        .collect()
}

fn run_jobs(args: &Args, config: &BackendConfig, jobs: &[Job], modes: &[OutputMode]) -> bool {
    let mut report = ComparisonReport::new();
    for job in jobs {
        for &mode in modes {
            match run_one(config, job, mode) {
                Ok(comparison) => {
                    if !args.json {
                        log_comparison(&job.name, &comparison);
                    }
                    report.add_comparison(&job.name, &job.scenario, job.replicates, &comparison);
                }
                Err(e) => {
                    if !args.json {
                        error!("✗ {} ({}) FAILED: {}", job.name, mode, e);
                        if let Some(stderr) = e.stderr() {
                            error!("  stderr: {}", stderr.trim());
                        }
                    }
                    report.add_failure(&job.name, &job.scenario, mode, job.replicates, &e);
                }
            }
        }
    }

    if args.json {
        match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return false;
            }
        }
    } else if report.failed == 0 {
        info!("✅ All {} comparisons completed", report.total);
    } else {
        error!("❌ {}/{} comparisons failed", report.failed, report.total);
    }
    report.failed == 0
}

fn run_one(config: &BackendConfig, job: &Job, mode: OutputMode) -> coalverify_core::Result<Comparison> {
    let scenario = job.scenario.for_mode(mode)?;
    match mode {
        OutputMode::Topology => {
            let (left, right) = config.topology_pair();
            if left == right {
                warn!("no alternative topology backend configured, comparing {} with itself", left.name);
            }
            compare(&scenario, job.replicates, &left.adapter(), &right.adapter())
        }
        OutputMode::Mutation => {
            let strategy = config.mutation_statistics();
            let left = config.reference.adapter().with_mutation_statistics(strategy.clone());
            let right = config.alternative.adapter().with_mutation_statistics(strategy);
            compare_mutations(&scenario, job.replicates, &left, &right)
        }
    }
}

fn log_comparison(name: &str, comparison: &Comparison) {
    info!(
        "✓ {} ({}): {} vs {}",
        name, comparison.mode, comparison.left_backend, comparison.right_backend
    );
    for paired in &comparison.statistics {
        let s = paired.summary();
        info!(
            "  {:<14} mean {:>12.4} / {:<12.4} std {:>10.4} / {:<10.4} max q-gap {:.4}",
            paired.statistic, s.left_mean, s.right_mean, s.left_std, s.right_std, s.max_quantile_gap
        );
    }
}

