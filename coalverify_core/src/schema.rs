//! Statistic-name schema shared by both backends.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Statistics reported in topology mode, before the migration counters.
pub const TOPOLOGY_STATISTICS: [&str; 4] = ["t", "num_trees", "re_events", "ca_events"];

/// Statistics reported by the haplotype filter in mutation mode.
pub const MUTATION_STATISTICS: [&str; 5] = ["pi", "ss", "D", "thetaH", "H"];

/// Which family of statistics a run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Genealogy only: tree counts, event counters, time to MRCA.
    Topology,

    /// Mutations overlaid on the genealogy, reduced to diversity statistics.
    Mutation,
}

impl OutputMode {
    pub fn name(&self) -> &'static str {
        match self {
            OutputMode::Topology => "topology",
            OutputMode::Mutation => "mutation",
        }
    }

    /// Statistic keys for this mode with `num_populations` subpopulations.
    pub fn expected_statistics(&self, num_populations: usize) -> Vec<String> {
        expected_statistics(*self, num_populations)
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "topology" | "coalescent" | "trees" => Ok(OutputMode::Topology),
            "mutation" | "mutations" | "haplotype" => Ok(OutputMode::Mutation),
            _ => Err(format!("Unknown output mode: {}", s)),
        }
    }
}

/// Key of the migration counter for the ordered pair at row-major `index`.
pub fn migration_statistic(index: usize) -> String {
    format!("mig_events_{}", index)
}

/// Derives the statistic keys both backends must produce.
///
/// Topology mode carries one migration counter per ordered pair of
/// subpopulations (P² keys, so a single population still has one).
pub fn expected_statistics(mode: OutputMode, num_populations: usize) -> Vec<String> {
    match mode {
        OutputMode::Topology => {
            let pairs = num_populations.max(1).pow(2);
            TOPOLOGY_STATISTICS
                .iter()
                .map(|s| s.to_string())
                .chain((0..pairs).map(migration_statistic))
                .collect()
        }
        OutputMode::Mutation => MUTATION_STATISTICS.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_populations_have_nine_migration_keys() {
        let keys = expected_statistics(OutputMode::Topology, 3);
        let mig: Vec<_> = keys.iter().filter(|k| k.starts_with("mig_events_")).collect();
        assert_eq!(mig.len(), 9);
        assert_eq!(keys.len(), 13);
        assert_eq!(keys.last().unwrap(), "mig_events_8");
    }

    #[test]
    fn test_single_population_has_one_migration_key() {
        let keys = expected_statistics(OutputMode::Topology, 1);
        assert_eq!(keys, vec!["t", "num_trees", "re_events", "ca_events", "mig_events_0"]);
    }

    #[test]
    fn test_mutation_keys_ignore_populations() {
        assert_eq!(expected_statistics(OutputMode::Mutation, 4), vec!["pi", "ss", "D", "thetaH", "H"]);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("Topology".parse::<OutputMode>().unwrap(), OutputMode::Topology);
        assert_eq!("mutations".parse::<OutputMode>().unwrap(), OutputMode::Mutation);
        assert!("plots".parse::<OutputMode>().is_err());
    }
}
