//! Subprocess abstraction for process-based simulator backends.

use crate::error::EnvError;
use crate::types::CommandLine;

/// Captured result of a successful child process (or pipeline).
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Standard output of the last process in the pipeline.
    pub stdout: Vec<u8>,

    /// Standard error collected from every process, lossily decoded.
    pub stderr: String,
}

impl ProcessOutput {
    /// Standard output decoded as UTF-8.
    pub fn stdout_text(&self) -> Result<&str, EnvError> {
        std::str::from_utf8(&self.stdout).map_err(|e| {
            EnvError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }
}

/// Runs external commands on behalf of a backend adapter.
///
/// # Implementations
///
/// - **Production**: `SystemRunner` - wraps `std::process::Command`
/// - **Tests**: recording fakes that return canned tables
///
/// # Resource Ownership
///
/// Every pipe and staging file belongs to a single call and is closed before
/// the call returns, whether it succeeds or fails.
///
/// # Pipeline
///
/// ```text
/// producer --stdout--> filter --stdout--> ProcessOutput
/// ```
pub trait CommandRunner {
    /// Runs one command to completion and captures its standard output.
    ///
    /// # Returns
    /// * `Ok(ProcessOutput)` - exit status 0
    /// * `Err(EnvError::Spawn)` - the program could not be started
    /// * `Err(EnvError::ExitStatus)` - non-zero exit, with captured stderr
    fn run(&self, command: &CommandLine) -> Result<ProcessOutput, EnvError>;

    /// Runs `producer` with its standard output connected directly to the
    /// standard input of `filter`, waits for both, and returns the filter's
    /// standard output.
    ///
    /// Both exit statuses are checked; the producer's is reported first.
    fn run_piped(
        &self,
        producer: &CommandLine,
        filter: &CommandLine,
    ) -> Result<ProcessOutput, EnvError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, command: &CommandLine) -> Result<ProcessOutput, EnvError> {
        (**self).run(command)
    }

    fn run_piped(
        &self,
        producer: &CommandLine,
        filter: &CommandLine,
    ) -> Result<ProcessOutput, EnvError> {
        (**self).run_piped(producer, filter)
    }
}
