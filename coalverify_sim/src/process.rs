//! Process backend - renders a scenario into an `ms` command line.
//!
//! The argument order is significant: `ms` reads its flags positionally.
//!
//! ```text
//! <exe> n reps [-T] [-r rho m] [-t theta] [-eN t x | -eG t a]* [-I P n1..nP [M] | -ma m11..mPP]
//! ```

use crate::adapter::{MutationStatistics, ReplicatePlan, StatisticsAdapter};
use coalverify_core::{Epoch, Migration, OutputMode, ReplicateTable, Result, ScenarioDescriptor, VerifyError};
use coalverify_env::{CommandLine, CommandRunner, SystemRunner};
use tracing::{info, warn};

/// Renders a real number the way `ms`-style tools are usually driven:
/// shortest round-trip form, always with a decimal point or exponent.
pub fn format_real(value: f64) -> String {
    format!("{:?}", value)
}

/// A fully rendered process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    simulator: CommandLine,
    filter: Option<CommandLine>,
    replicates: usize,
}

impl ProcessInvocation {
    /// The simulator command line.
    pub fn command_line(&self) -> &CommandLine {
        &self.simulator
    }

    /// The statistics filter the simulator is piped into, in mutation mode.
    pub fn filter(&self) -> Option<&CommandLine> {
        self.filter.as_ref()
    }

    pub fn replicates(&self) -> usize {
        self.replicates
    }
}

impl std::fmt::Display for ProcessInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.filter {
            Some(filter) => write!(f, "{} | {}", self.simulator, filter),
            None => write!(f, "{}", self.simulator),
        }
    }
}

/// Adapter for an external `ms`-compatible executable.
pub struct ProcessAdapter<R = SystemRunner> {
    name: String,
    executable: CommandLine,
    mutation: Option<MutationStatistics>,
    runner: R,
}

impl ProcessAdapter<SystemRunner> {
    /// Creates an adapter that spawns real processes.
    ///
    /// `executable` may carry leading arguments, e.g. `python mspms_dev.py`.
    pub fn new(name: impl Into<String>, executable: CommandLine) -> Self {
        Self::with_runner(name, executable, SystemRunner::new())
    }
}

impl<R: CommandRunner> ProcessAdapter<R> {
    /// Creates an adapter with an explicit command runner.
    pub fn with_runner(name: impl Into<String>, executable: CommandLine, runner: R) -> Self {
        Self {
            name: name.into(),
            executable,
            mutation: None,
            runner,
        }
    }

    /// Switches to mutation mode, piping output through the given filter.
    pub fn with_mutation_statistics(mut self, strategy: MutationStatistics) -> Self {
        self.mutation = Some(strategy);
        self
    }

    /// Builds the simulator's argument vector.
    pub fn command_line(&self, scenario: &ScenarioDescriptor, replicates: usize) -> Result<CommandLine> {
        let mut cmd = self.executable.clone();
        cmd.arg(scenario.sample_size().to_string())
            .arg(replicates.to_string());

        match self.mode() {
            OutputMode::Topology => {
                cmd.arg("-T");
            }
            OutputMode::Mutation => {
                if scenario.mutation_rate().is_none() {
                    return Err(VerifyError::invalid(format!(
                        "{}: mutation statistics need a mutation rate",
                        self.name
                    )));
                }
            }
        }

        if scenario.num_loci() > 1 {
            cmd.arg("-r")
                .arg(format_real(scenario.scaled_recombination_rate()))
                .arg(scenario.num_loci().to_string());
        }

        if let Some(theta) = scenario.mutation_rate() {
            cmd.arg("-t").arg(format_real(theta));
        }

        for epoch in scenario.epochs() {
            match *epoch {
                Epoch::Constant { start_time, size } => {
                    cmd.args(["-eN".to_string(), format_real(start_time), format_real(size)]);
                }
                Epoch::Exponential { start_time, growth_rate } => {
                    cmd.args(["-eG".to_string(), format_real(start_time), format_real(growth_rate)]);
                }
            }
        }

        if let Some(config) = scenario.sample_configuration() {
            cmd.arg("-I").arg(config.len().to_string());
            cmd.args(config.iter().map(|c| c.to_string()));
            match scenario.migration() {
                Some(Migration::Symmetric(rate)) => {
                    cmd.arg(format_real(*rate));
                }
                Some(Migration::Matrix(matrix)) => {
                    cmd.arg("-ma");
                    cmd.args(matrix.row_major().into_iter().map(format_real));
                }
                None => {
                    return Err(VerifyError::invalid("subdivided scenario without migration"));
                }
            }
        }

        Ok(cmd)
    }
}

impl<R: CommandRunner> StatisticsAdapter for ProcessAdapter<R> {
    type Invocation = ProcessInvocation;

    fn backend(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> OutputMode {
        if self.mutation.is_some() {
            OutputMode::Mutation
        } else {
            OutputMode::Topology
        }
    }

    fn plan(&self) -> ReplicatePlan {
        ReplicatePlan::Batched
    }

    fn render(&self, scenario: &ScenarioDescriptor, replicates: usize) -> Result<ProcessInvocation> {
        Ok(ProcessInvocation {
            simulator: self.command_line(scenario, replicates)?,
            filter: self.mutation.as_ref().map(|m| m.filter().clone()),
            replicates,
        })
    }

    fn collect(&self, invocation: &ProcessInvocation) -> Result<ReplicateTable> {
        info!("{}", invocation);
        let output = match &invocation.filter {
            Some(filter) => self.runner.run_piped(&invocation.simulator, filter),
            None => self.runner.run(&invocation.simulator),
        }
        .map_err(|e| VerifyError::process(&self.name, invocation, e))?;

        if !output.stderr.trim().is_empty() {
            warn!("{} wrote to stderr: {}", self.name, output.stderr.trim());
        }

        let text = output
            .stdout_text()
            .map_err(|e| VerifyError::malformed(&self.name, e.to_string()))?;
        ReplicateTable::parse_delimited(&self.name, text, invocation.replicates)
    }
}
