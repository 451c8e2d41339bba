//! coalverify Core - canonical scenarios and replicate statistics
//!
//! This library holds the backend-independent half of a simulator
//! cross-validation run:
//! 1. **Scenario Descriptor**: one validated parameter set rendered by every backend
//! 2. **Statistic schema**: the keys both backends must report for an output mode
//! 3. **Replicate Statistics Table**: per-replicate values, one row per run

pub mod error;
pub mod scenario;
pub mod schema;
pub mod table;

// Re-export key types for convenience
pub use coalverify_env::{Epoch, MigrationMatrix};
pub use error::{Result, VerifyError};
pub use scenario::{Migration, ScenarioBuilder, ScenarioDescriptor};
pub use schema::{expected_statistics, OutputMode};
pub use table::ReplicateTable;
