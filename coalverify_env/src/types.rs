//! Common types shared by both simulator backends.

use crate::error::EnvError;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One segment of the population-size history, measured backwards from the
/// present (start time 0) in coalescent units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Epoch {
    /// Population size held at `size` (relative to Ne) from `start_time`.
    Constant { start_time: f64, size: f64 },

    /// Exponential growth at `growth_rate` from `start_time`.
    Exponential { start_time: f64, growth_rate: f64 },
}

impl Epoch {
    /// Creates a constant-size epoch.
    pub fn constant(start_time: f64, size: f64) -> Self {
        Epoch::Constant { start_time, size }
    }

    /// Creates an exponential-growth epoch.
    pub fn exponential(start_time: f64, growth_rate: f64) -> Self {
        Epoch::Exponential { start_time, growth_rate }
    }

    /// Returns the time at which this epoch takes effect.
    pub fn start_time(&self) -> f64 {
        match *self {
            Epoch::Constant { start_time, .. } | Epoch::Exponential { start_time, .. } => start_time,
        }
    }

    /// Returns the kind name used in scenario files and log output.
    pub fn kind(&self) -> &'static str {
        match self {
            Epoch::Constant { .. } => "constant",
            Epoch::Exponential { .. } => "exponential",
        }
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Epoch::Constant { start_time, size } => write!(f, "constant(t={start_time}, size={size})"),
            Epoch::Exponential { start_time, growth_rate } => {
                write!(f, "exponential(t={start_time}, alpha={growth_rate})")
            }
        }
    }
}

/// Square matrix of per-generation migration rates between subpopulations.
///
/// Entry `(i, j)` is the rate from subpopulation `i` to `j`. The diagonal is
/// carried through unchanged but has no meaning to either backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct MigrationMatrix(DMatrix<f64>);

impl MigrationMatrix {
    /// Builds a matrix from row vectors. Rows must form a square matrix.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, EnvError> {
        let dim = rows.len();
        if dim == 0 {
            return Err(EnvError::InvalidMatrix("matrix has no rows".to_string()));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != dim) {
            return Err(EnvError::InvalidMatrix(format!(
                "row {} has {} entries, expected {}",
                i,
                row.len(),
                dim
            )));
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        Ok(Self(DMatrix::from_row_slice(dim, dim, &flat)))
    }

    /// Symmetric island model: every off-diagonal entry is `rate / (P - 1)`.
    ///
    /// A single population has nowhere to migrate to and gets a 1x1 zero matrix.
    pub fn symmetric(num_populations: usize, rate: f64) -> Self {
        let p = num_populations.max(1);
        let off_diagonal = if p > 1 { rate / (p - 1) as f64 } else { 0.0 };
        Self(DMatrix::from_fn(p, p, |i, j| if i == j { 0.0 } else { off_diagonal }))
    }

    /// Number of subpopulations.
    pub fn dimension(&self) -> usize {
        self.0.nrows()
    }

    /// Rate from subpopulation `from` to `to`.
    pub fn rate(&self, from: usize, to: usize) -> f64 {
        self.0[(from, to)]
    }

    /// Entries flattened row by row.
    pub fn row_major(&self) -> Vec<f64> {
        let dim = self.dimension();
        (0..dim)
            .flat_map(|i| (0..dim).map(move |j| (i, j)))
            .map(|idx| self.0[idx])
            .collect()
    }

    /// Entries as row vectors.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.0.row_iter().map(|row| row.iter().copied().collect()).collect()
    }

    /// Borrows the underlying matrix.
    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.0
    }
}

impl TryFrom<Vec<Vec<f64>>> for MigrationMatrix {
    type Error = EnvError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Self::from_rows(&rows)
    }
}

impl From<MigrationMatrix> for Vec<Vec<f64>> {
    fn from(matrix: MigrationMatrix) -> Self {
        matrix.rows()
    }
}

/// A program followed by its arguments, ready to hand to a `CommandRunner`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandLine(Vec<String>);

impl CommandLine {
    /// Creates a command line from an argument vector whose first element is
    /// the program.
    pub fn new<I, S>(parts: I) -> Result<Self, EnvError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
        if parts.is_empty() || parts[0].is_empty() {
            return Err(EnvError::EmptyCommand);
        }
        Ok(Self(parts))
    }

    /// Appends one argument.
    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.0.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.extend(args.into_iter().map(Into::into));
        self
    }

    /// The program to execute.
    pub fn program(&self) -> &str {
        self.0.first().map_or("", String::as_str)
    }

    /// Arguments after the program.
    pub fn arguments(&self) -> &[String] {
        self.0.get(1..).unwrap_or_default()
    }

    /// The full argument vector, program first.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Literal command lines such as `["./data/ms/ms"]`, checked like
/// `CommandLine::new`.
impl<const N: usize> TryFrom<[&str; N]> for CommandLine {
    type Error = EnvError;

    fn try_from(parts: [&str; N]) -> Result<Self, EnvError> {
        Self::new(parts)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// Upper memory bound handed to the embedded engine, e.g. `"10G"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemoryCeiling {
    text: String,
    bytes: u64,
}

impl MemoryCeiling {
    /// Size in bytes.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// The size string as the engine expects it.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl Default for MemoryCeiling {
    fn default() -> Self {
        Self {
            text: "10G".to_string(),
            bytes: 10 << 30,
        }
    }
}

impl FromStr for MemoryCeiling {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (digits, shift) = match trimmed.chars().last() {
            Some('K') | Some('k') => (&trimmed[..trimmed.len() - 1], 10),
            Some('M') | Some('m') => (&trimmed[..trimmed.len() - 1], 20),
            Some('G') | Some('g') => (&trimmed[..trimmed.len() - 1], 30),
            Some('T') | Some('t') => (&trimmed[..trimmed.len() - 1], 40),
            _ => (trimmed, 0),
        };
        let value: u64 = digits
            .parse()
            .map_err(|_| EnvError::InvalidMemoryCeiling(s.to_string()))?;
        let bytes = value
            .checked_mul(1u64 << shift)
            .filter(|b| *b > 0)
            .ok_or_else(|| EnvError::InvalidMemoryCeiling(s.to_string()))?;
        Ok(Self {
            text: trimmed.to_string(),
            bytes,
        })
    }
}

impl TryFrom<String> for MemoryCeiling {
    type Error = EnvError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MemoryCeiling> for String {
    fn from(ceiling: MemoryCeiling) -> Self {
        ceiling.text
    }
}

impl fmt::Display for MemoryCeiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
