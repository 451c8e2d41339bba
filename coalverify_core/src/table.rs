//! Replicate Statistics Table - one column per statistic, one row per replicate.

use crate::error::{Result, VerifyError};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

/// Per-replicate statistic values from one backend.
///
/// Columns keep the order in which the backend first reported them and
/// always have the same length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicateTable {
    backend: String,
    statistics: Vec<String>,
    columns: Vec<Vec<f64>>,
    rows: usize,
}

impl ReplicateTable {
    /// Creates an empty table whose schema is fixed by the first row.
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            statistics: Vec::new(),
            columns: Vec::new(),
            rows: 0,
        }
    }

    /// Creates an empty table with a fixed schema.
    pub fn with_statistics(backend: impl Into<String>, statistics: Vec<String>) -> Result<Self> {
        let backend = backend.into();
        check_unique(&backend, &statistics)?;
        let columns = vec![Vec::new(); statistics.len()];
        Ok(Self {
            backend,
            statistics,
            columns,
            rows: 0,
        })
    }

    /// Parses whitespace/tab-delimited text: a header of statistic names,
    /// then one line per replicate. Blank lines are ignored.
    pub fn parse_delimited(backend: &str, text: &str, expected_rows: usize) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let header = lines
            .next()
            .ok_or_else(|| VerifyError::malformed(backend, "output is empty, expected a header row"))?;
        let statistics: Vec<String> = header.split_whitespace().map(str::to_string).collect();
        let mut table = Self::with_statistics(backend, statistics)?;

        for (row, line) in lines.enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != table.statistics.len() {
                return Err(VerifyError::malformed(
                    backend,
                    format!(
                        "row {} has {} fields, header has {}",
                        row,
                        fields.len(),
                        table.statistics.len()
                    ),
                ));
            }
            for (col, field) in fields.iter().enumerate() {
                let value: f64 = field.parse().map_err(|_| {
                    VerifyError::malformed(
                        backend,
                        format!(
                            "row {} column '{}' is not numeric: {:?}",
                            row, table.statistics[col], field
                        ),
                    )
                })?;
                table.columns[col].push(value);
            }
            table.rows += 1;
        }

        if table.rows != expected_rows {
            return Err(VerifyError::malformed(
                backend,
                format!("{} rows, expected {}", table.rows, expected_rows),
            ));
        }
        Ok(table)
    }

    /// Appends one replicate. The keys must match the table's schema exactly;
    /// the first row of a schema-less table establishes it.
    pub fn push_row<S: Into<String>>(&mut self, values: impl IntoIterator<Item = (S, f64)>) -> Result<()> {
        let values: Vec<(String, f64)> = values.into_iter().map(|(k, v)| (k.into(), v)).collect();

        if self.statistics.is_empty() && self.rows == 0 {
            let names: Vec<String> = values.iter().map(|(k, _)| k.clone()).collect();
            check_unique(&self.backend, &names)?;
            self.statistics = names;
            self.columns = vec![Vec::new(); self.statistics.len()];
        }

        let by_name: BTreeMap<&str, f64> = values.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        if by_name.len() != values.len() || by_name.len() != self.statistics.len() {
            return Err(self.schema_error(by_name.keys().copied()));
        }
        let mut ordered = Vec::with_capacity(self.statistics.len());
        for name in &self.statistics {
            match by_name.get(name.as_str()) {
                Some(v) => ordered.push(*v),
                None => return Err(self.schema_error(by_name.keys().copied())),
            }
        }
        for (column, value) in self.columns.iter_mut().zip(ordered) {
            column.push(value);
        }
        self.rows += 1;
        Ok(())
    }

    /// Appends all rows of `other`, matching columns by name.
    pub fn extend(&mut self, other: ReplicateTable) -> Result<()> {
        if other.rows == 0 {
            return Ok(());
        }
        for i in 0..other.rows {
            let row: Vec<(String, f64)> = other
                .statistics
                .iter()
                .zip(&other.columns)
                .map(|(name, column)| (name.clone(), column[i]))
                .collect();
            self.push_row(row)?;
        }
        Ok(())
    }

    /// Backend that produced the table.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Statistic names in column order.
    pub fn statistics(&self) -> &[String] {
        &self.statistics
    }

    /// Values of one statistic, one per replicate.
    pub fn column(&self, statistic: &str) -> Option<&[f64]> {
        self.statistics
            .iter()
            .position(|s| s == statistic)
            .map(|i| self.columns[i].as_slice())
    }

    /// Number of replicates.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Renders the table in the same tab-separated layout `parse_delimited` reads.
    pub fn to_delimited(&self) -> String {
        let mut out = self.statistics.join("\t");
        out.push('\n');
        for i in 0..self.rows {
            let fields: Vec<String> = self.columns.iter().map(|c| c[i].to_string()).collect();
            let _ = writeln!(out, "{}", fields.join("\t"));
        }
        out
    }

    fn schema_error<'a>(&self, got: impl Iterator<Item = &'a str>) -> VerifyError {
        let got: Vec<&str> = got.collect();
        VerifyError::malformed(
            &self.backend,
            format!(
                "replicate {} reports statistics {:?}, table expects {:?}",
                self.rows, got, self.statistics
            ),
        )
    }
}

fn check_unique(backend: &str, statistics: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    if let Some(dup) = statistics.iter().find(|s| !seen.insert(s.as_str())) {
        return Err(VerifyError::malformed(backend, format!("duplicate statistic '{}'", dup)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_OUTPUT: &str = "t\tnum_trees\tre_events\tca_events\tmig_events_0\n\
                             0.53\t1\t0\t4\t0\n\
                             1.20\t1\t0\t4\t0\n\
                             \n\
                             0.07\t1\t0\t4\t0\n";

    #[test]
    fn test_parse_tab_separated() {
        let table = ReplicateTable::parse_delimited("ms", MS_OUTPUT, 3).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.statistics()[0], "t");
        assert_eq!(table.column("t").unwrap(), &[0.53, 1.20, 0.07]);
        assert_eq!(table.column("ca_events").unwrap(), &[4.0, 4.0, 4.0]);
        assert!(table.column("pi").is_none());
    }

    #[test]
    fn test_parse_mixed_whitespace() {
        let text = "pi ss\tD\n1.5  3\t-0.2\n";
        let table = ReplicateTable::parse_delimited("sample_stats", text, 1).unwrap();
        assert_eq!(table.column("D").unwrap(), &[-0.2]);
    }

    #[test]
    fn test_parse_row_count_mismatch() {
        let err = ReplicateTable::parse_delimited("ms", MS_OUTPUT, 4).unwrap_err();
        assert!(matches!(err, VerifyError::MalformedBackendOutput { .. }));
    }

    #[test]
    fn test_parse_non_numeric_field() {
        let text = "pi\tss\n1.0\tabc\n";
        let err = ReplicateTable::parse_delimited("ms", text, 1).unwrap_err();
        assert!(err.to_string().contains("not numeric"));
    }

    #[test]
    fn test_parse_ragged_row_and_empty_output() {
        let err = ReplicateTable::parse_delimited("ms", "pi\tss\n1.0\n", 1).unwrap_err();
        assert!(matches!(err, VerifyError::MalformedBackendOutput { .. }));
        let err = ReplicateTable::parse_delimited("ms", "   \n", 0).unwrap_err();
        assert!(matches!(err, VerifyError::MalformedBackendOutput { .. }));
    }

    #[test]
    fn test_push_row_establishes_and_enforces_schema() {
        let mut table = ReplicateTable::new("embedded");
        table.push_row([("t", 1.0), ("num_trees", 1.0)]).unwrap();
        table.push_row([("num_trees", 2.0), ("t", 0.5)]).unwrap();
        assert_eq!(table.column("t").unwrap(), &[1.0, 0.5]);
        assert_eq!(table.column("num_trees").unwrap(), &[1.0, 2.0]);

        assert!(table.push_row([("t", 1.0)]).is_err());
        assert!(table.push_row([("t", 1.0), ("pi", 2.0)]).is_err());
        assert!(table.push_row([("t", 1.0), ("t", 2.0)]).is_err());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_extend_and_round_trip_layout() {
        let mut table = ReplicateTable::new("embedded");
        table.extend(ReplicateTable::parse_delimited("ms", MS_OUTPUT, 3).unwrap()).unwrap();
        table.extend(ReplicateTable::parse_delimited("ms", MS_OUTPUT, 3).unwrap()).unwrap();
        assert_eq!(table.len(), 6);
        let rendered = table.to_delimited();
        assert!(rendered.starts_with("t\tnum_trees\tre_events\tca_events\tmig_events_0\n"));
        assert_eq!(rendered.lines().count(), 7);
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let err = ReplicateTable::parse_delimited("ms", "pi\tpi\n1\t2\n", 1).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
