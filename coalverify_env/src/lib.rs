//! coalverify Backend Environment Layer
//!
//! This crate describes the two ways a coalescent simulator can be driven,
//! independently of any particular scenario:
//!
//! - **Process backends**: an external `ms`-compatible executable, optionally
//!   piped into a statistics filter (`CommandRunner`, `SystemRunner`)
//! - **Embedded backends**: an in-process engine configured through setters
//!   and run to completion (`CoalescentEngine`, `EngineFactory`)
//!
//! Shared value types (`Epoch`, `MigrationMatrix`) live here so that both
//! surfaces speak the same vocabulary.
//!
//! # Example
//!
//! ```ignore
//! use coalverify_env::{CommandLine, CommandRunner, SystemRunner};
//!
//! let producer = CommandLine::new(["./data/ms/ms", "5", "100", "-t", "2.0"])?;
//! let filter = CommandLine::new(["./data/ms/sample_stats"])?;
//! let output = SystemRunner::new().run_piped(&producer, &filter)?;
//! ```

mod engine;
mod error;
mod process;
mod system_impl;
mod types;

pub use engine::{CoalescentEngine, EngineFactory, EngineOutcome};
pub use error::EnvError;
pub use process::{CommandRunner, ProcessOutput};
pub use system_impl::SystemRunner;
pub use types::{CommandLine, Epoch, MemoryCeiling, MigrationMatrix};
