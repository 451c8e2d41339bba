//! Production implementation of CommandRunner using `std::process`.

use crate::error::EnvError;
use crate::process::{CommandRunner, ProcessOutput};
use crate::types::CommandLine;
use std::io::{Read, Seek, SeekFrom};
use std::process::{Child, Command, Stdio};
use tracing::debug;

/// Runs commands as real child processes of the current process.
///
/// Standard input of the first process is closed. In a pipeline, the
/// producer's stderr is staged in an anonymous temporary file so that a
/// chatty producer can never block on a full stderr pipe while we wait on
/// the filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Creates a new SystemRunner.
    pub fn new() -> Self {
        Self
    }
}

fn spawn_error(command: &CommandLine) -> impl FnOnce(std::io::Error) -> EnvError + '_ {
    move |source| EnvError::Spawn {
        program: command.program().to_string(),
        source,
    }
}

/// Kills and reaps a child we no longer need.
fn reap(mut child: Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandLine) -> Result<ProcessOutput, EnvError> {
        debug!("spawning: {}", command);
        let output = Command::new(command.program())
            .args(command.arguments())
            .stdin(Stdio::null())
            .output()
            .map_err(spawn_error(command))?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(EnvError::exit_status(command.program(), output.status, stderr));
        }
        Ok(ProcessOutput {
            stdout: output.stdout,
            stderr,
        })
    }

    fn run_piped(
        &self,
        producer: &CommandLine,
        filter: &CommandLine,
    ) -> Result<ProcessOutput, EnvError> {
        debug!("spawning: {} | {}", producer, filter);
        let mut producer_stderr = tempfile::tempfile()?;

        let mut producer_child = Command::new(producer.program())
            .args(producer.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(producer_stderr.try_clone()?))
            .spawn()
            .map_err(spawn_error(producer))?;

        let Some(pipe) = producer_child.stdout.take() else {
            reap(producer_child);
            return Err(EnvError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "producer stdout was not captured",
            )));
        };

        // The Command (and with it our copy of the pipe) is dropped at the end
        // of this statement, so the filter sees EOF when the producer exits.
        let filter_child = Command::new(filter.program())
            .args(filter.arguments())
            .stdin(Stdio::from(pipe))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let filter_child = match filter_child {
            Ok(child) => child,
            Err(source) => {
                reap(producer_child);
                return Err(EnvError::Spawn {
                    program: filter.program().to_string(),
                    source,
                });
            }
        };

        let filter_result = filter_child.wait_with_output();
        let producer_status = producer_child.wait()?;
        let filter_output = filter_result?;

        let mut staged = Vec::new();
        producer_stderr.seek(SeekFrom::Start(0))?;
        producer_stderr.read_to_end(&mut staged)?;
        let producer_err = String::from_utf8_lossy(&staged).into_owned();
        let filter_err = String::from_utf8_lossy(&filter_output.stderr).into_owned();

        if !producer_status.success() {
            return Err(EnvError::exit_status(producer.program(), producer_status, producer_err));
        }
        if !filter_output.status.success() {
            return Err(EnvError::exit_status(filter.program(), filter_output.status, filter_err));
        }

        Ok(ProcessOutput {
            stdout: filter_output.stdout,
            stderr: producer_err + &filter_err,
        })
    }
}
