//! Backend configuration and scenario files.
//!
//! Both are JSON. Every field of `BackendConfig` has a default matching the
//! usual `./data/ms` layout, so an empty object `{}` is a valid config.

use crate::adapter::MutationStatistics;
use crate::embedded::EmbeddedAdapter;
use crate::process::ProcessAdapter;
use coalverify_core::{Epoch, MigrationMatrix, OutputMode, ScenarioDescriptor, VerifyError};
use coalverify_env::{CommandLine, CommandRunner, EngineFactory, MemoryCeiling, SystemRunner};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading a configuration or scenario file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("backend '{0}' has an empty command line")]
    EmptyCommand(String),

    #[error("scenario '{name}': {source}")]
    Scenario {
        name: String,
        #[source]
        source: VerifyError,
    },
}

/// One process backend: a display name and its command prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessBackendConfig {
    pub name: String,
    pub command: CommandLine,
}

impl ProcessBackendConfig {
    fn new<const N: usize>(name: &str, command: [&str; N]) -> Self {
        Self {
            name: name.to_string(),
            command: default_command(command),
        }
    }

    /// Topology-mode adapter over real processes.
    pub fn adapter(&self) -> ProcessAdapter<SystemRunner> {
        ProcessAdapter::new(&self.name, self.command.clone())
    }

    /// Adapter with an explicit runner.
    pub fn adapter_with_runner<R: CommandRunner>(&self, runner: R) -> ProcessAdapter<R> {
        ProcessAdapter::with_runner(&self.name, self.command.clone(), runner)
    }
}

/// Where the backends live and how the embedded engine is bounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Reference `ms` for mutation statistics.
    pub reference: ProcessBackendConfig,

    /// Reference `ms` build that prints topology statistics.
    pub reference_topology: ProcessBackendConfig,

    /// ms-compatible front-end of the engine under test.
    pub alternative: ProcessBackendConfig,

    /// Topology-printing counterpart of `alternative`. Without one the CLI
    /// compares the reference against itself.
    pub alternative_topology: Option<ProcessBackendConfig>,

    /// Haplotype filter for mutation statistics.
    pub sample_stats: CommandLine,

    /// Memory ceiling for the embedded engine.
    pub max_memory: MemoryCeiling,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            reference: ProcessBackendConfig::new("ms", ["./data/ms/ms"]),
            reference_topology: ProcessBackendConfig::new("ms", ["./data/ms/ms_summary_stats"]),
            alternative: ProcessBackendConfig::new("msp", ["python", "mspms_dev.py"]),
            alternative_topology: None,
            sample_stats: default_command(["./data/ms/sample_stats"]),
            max_memory: MemoryCeiling::default(),
        }
    }
}

impl BackendConfig {
    /// Loads a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut backends = vec![&self.reference, &self.reference_topology, &self.alternative];
        backends.extend(self.alternative_topology.as_ref());
        if let Some(empty) = backends.iter().find(|b| is_empty(&b.command)) {
            return Err(ConfigError::EmptyCommand(empty.name.clone()));
        }
        if is_empty(&self.sample_stats) {
            return Err(ConfigError::EmptyCommand("sample_stats".to_string()));
        }
        Ok(())
    }

    /// The mutation-mode filter strategy.
    pub fn mutation_statistics(&self) -> MutationStatistics {
        MutationStatistics::new(self.sample_stats.clone())
    }

    /// The topology-mode pair the CLI compares.
    pub fn topology_pair(&self) -> (&ProcessBackendConfig, &ProcessBackendConfig) {
        let right = self.alternative_topology.as_ref().unwrap_or(&self.reference_topology);
        (&self.reference_topology, right)
    }

    /// Wraps `factory` with this config's memory ceiling.
    pub fn embedded<F: EngineFactory>(&self, name: &str, factory: F) -> EmbeddedAdapter<F> {
        EmbeddedAdapter::new(name, factory).with_max_memory(self.max_memory.clone())
    }
}

fn default_command<const N: usize>(parts: [&str; N]) -> CommandLine {
    CommandLine::try_from(parts).expect("default command lines are non-empty literals")
}

fn is_empty(command: &CommandLine) -> bool {
    command.as_slice().first().map_or(true, String::is_empty)
}

/// Epoch as written in a scenario file.
///
/// `value` is the relative size for `constant` and the growth rate for
/// `exponential`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSpec {
    pub kind: String,
    pub start_time: f64,
    pub value: f64,
}

impl EpochSpec {
    pub fn to_epoch(&self) -> Result<Epoch, VerifyError> {
        match self.kind.as_str() {
            "constant" => Ok(Epoch::constant(self.start_time, self.value)),
            "exponential" => Ok(Epoch::exponential(self.start_time, self.value)),
            other => Err(VerifyError::UnsupportedEpochKind {
                backend: "scenario file".to_string(),
                kind: other.to_string(),
            }),
        }
    }
}

fn one() -> u32 {
    1
}

fn unit() -> f64 {
    1.0
}

/// A scenario as written in a scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    pub sample_size: u32,
    #[serde(default = "one")]
    pub num_loci: u32,
    #[serde(default = "unit")]
    pub effective_population_size: f64,
    #[serde(default)]
    pub recombination_rate: f64,
    #[serde(default)]
    pub mutation_rate: Option<f64>,
    #[serde(default)]
    pub epochs: Vec<EpochSpec>,
    #[serde(default)]
    pub sample_configuration: Option<Vec<u32>>,
    #[serde(default)]
    pub migration_rate: Option<f64>,
    #[serde(default)]
    pub migration_matrix: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub replicates: Option<usize>,
    #[serde(default)]
    pub mode: Option<OutputMode>,
}

impl ScenarioSpec {
    /// Validates the entry into a descriptor.
    pub fn to_descriptor(&self) -> Result<ScenarioDescriptor, VerifyError> {
        let epochs = self
            .epochs
            .iter()
            .map(EpochSpec::to_epoch)
            .collect::<Result<Vec<_>, _>>()?;
        let mut builder = ScenarioDescriptor::builder(self.sample_size)
            .with_num_loci(self.num_loci)
            .with_effective_population_size(self.effective_population_size)
            .with_recombination_rate(self.recombination_rate)
            .with_epochs(epochs);
        if let Some(mu) = self.mutation_rate {
            builder = builder.with_mutation_rate(mu);
        }
        if let Some(config) = &self.sample_configuration {
            builder = builder.with_sample_configuration(config.clone());
        }
        if let Some(rate) = self.migration_rate {
            builder = builder.with_migration_rate(rate);
        }
        if let Some(rows) = &self.migration_matrix {
            let matrix = MigrationMatrix::from_rows(rows).map_err(|e| VerifyError::invalid(e.to_string()))?;
            builder = builder.with_migration_matrix(matrix);
        }
        builder.build()
    }
}

/// A list of named scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFile {
    pub scenarios: Vec<ScenarioSpec>,
}

impl ScenarioFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Every scenario with its descriptor; the first invalid entry fails.
    pub fn descriptors(&self) -> Result<Vec<(&ScenarioSpec, ScenarioDescriptor)>, ConfigError> {
        self.scenarios
            .iter()
            .map(|spec| {
                spec.to_descriptor()
                    .map(|d| (spec, d))
                    .map_err(|source| ConfigError::Scenario {
                        name: spec.name.clone(),
                        source,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_data_layout() {
        let config = BackendConfig::from_json("{}").unwrap();
        assert_eq!(config, BackendConfig::default());
        assert_eq!(config.reference.command.program(), "./data/ms/ms");
        assert_eq!(config.alternative.command.to_string(), "python mspms_dev.py");
        assert_eq!(config.sample_stats.program(), "./data/ms/sample_stats");
        assert_eq!(config.max_memory.as_str(), "10G");
        let (left, right) = config.topology_pair();
        assert_eq!(left, right);
    }

    #[test]
    fn test_partial_override() {
        let config = BackendConfig::from_json(
            r#"{ "alternative": { "name": "scrm", "command": ["scrm"] }, "max_memory": "2G" }"#,
        )
        .unwrap();
        assert_eq!(config.alternative.name, "scrm");
        assert_eq!(config.max_memory.bytes(), 2u64 << 30);
        assert_eq!(config.reference, BackendConfig::default().reference);
    }

    #[test]
    fn test_load_rejects_empty_command() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "sample_stats": [] }}"#).unwrap();
        assert!(matches!(
            BackendConfig::load(file.path()),
            Err(ConfigError::EmptyCommand(_))
        ));
        assert!(matches!(
            BackendConfig::load("/nonexistent/coalverify.json"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_scenario_file() {
        let file: ScenarioFile = serde_json::from_str(
            r#"{ "scenarios": [
                { "name": "scrm", "sample_size": 5,
                  "epochs": [ { "kind": "constant", "start_time": 0.3, "value": 0.5 },
                              { "kind": "exponential", "start_time": 0.3, "value": 7.0 } ] },
                { "name": "islands", "sample_size": 15, "sample_configuration": [10, 4, 1],
                  "migration_matrix": [[0, 1, 2], [2, 0, 4], [5, 6, 0]], "replicates": 100 }
            ] }"#,
        )
        .unwrap();
        let descriptors = file.descriptors().unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].1.epochs()[1], Epoch::exponential(0.3, 7.0));
        assert_eq!(descriptors[1].1.num_populations(), 3);
        assert_eq!(descriptors[1].0.replicates, Some(100));
    }

    #[test]
    fn test_unknown_epoch_kind() {
        let spec = EpochSpec {
            kind: "logistic".to_string(),
            start_time: 0.1,
            value: 1.0,
        };
        match spec.to_epoch().unwrap_err() {
            VerifyError::UnsupportedEpochKind { kind, .. } => assert_eq!(kind, "logistic"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_scenario_named() {
        let file: ScenarioFile = serde_json::from_str(
            r#"{ "scenarios": [ { "name": "bad", "sample_size": 15, "sample_configuration": [10, 4] , "migration_rate": 1.0 } ] }"#,
        )
        .unwrap();
        match file.descriptors().unwrap_err() {
            ConfigError::Scenario { name, source } => {
                assert_eq!(name, "bad");
                assert!(matches!(source, VerifyError::InvalidScenario(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
