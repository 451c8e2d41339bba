//! coalverify harness - runs one scenario through two simulator backends
//!
//! Each backend gets the same validated `ScenarioDescriptor`, renders it into
//! its own invocation surface, and reports one row of statistics per
//! replicate. The two tables are then paired statistic by statistic.
//!
//! # Backends
//!
//! - **Process**: an `ms`-compatible executable, driven through its argument
//!   vector. Mutation statistics pipe its output through `sample_stats`.
//! - **Embedded**: an in-process engine behind `EngineFactory`, one fresh
//!   instance per replicate.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  ScenarioDescriptor                  │
//! └─────────┬──────────────────────────────┬─────────────┘
//!           │ render                       │ render
//!  ┌────────▼────────┐            ┌────────▼────────┐
//!  │ ProcessAdapter  │            │ EmbeddedAdapter │
//!  │  argv / pipe    │            │  setters + run  │
//!  └────────┬────────┘            └────────┬────────┘
//!           │   ReplicateDriver (N rows)   │
//!  ┌────────▼────────┐            ┌────────▼────────┐
//!  │ ReplicateTable  │            │ ReplicateTable  │
//!  └────────┬────────┘            └────────┬────────┘
//!           └─────────► Reducer ◄──────────┘
//!                          │
//!                     Comparison
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use coalverify_sim::{compare_coalescent, EmbeddedAdapter, ProcessAdapter};
//! use coalverify_sim::scenarios::ScenarioId;
//!
//! let scenario = ScenarioId::Migration.build()?;
//! let ms = ProcessAdapter::new("ms", CommandLine::new(["./data/ms/ms_summary_stats"])?);
//! let engine = EmbeddedAdapter::new("embedded", my_factory);
//! let comparison = compare_coalescent(&scenario, 100, &ms, &engine)?;
//! ```

mod adapter;
mod compare;
pub mod config;
mod driver;
mod embedded;
mod process;
mod reducer;
pub mod report;
pub mod scenarios;

pub use adapter::{MutationStatistics, ReplicatePlan, StatisticsAdapter};
pub use compare::{compare, compare_coalescent, compare_mutations};
pub use config::{BackendConfig, ConfigError, ProcessBackendConfig, ScenarioFile};
pub use driver::ReplicateDriver;
pub use embedded::{EmbeddedAdapter, EngineSetup};
pub use process::{format_real, ProcessAdapter, ProcessInvocation};
pub use reducer::{Comparison, ComparisonReducer, PairedStatistic, StatisticSummary};
pub use report::ComparisonReport;
