//! Prediction results

use super::value::Value;
use crate::error::{PredictError, PredictResult};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io;

/// Column carrying the empty-batch diagnostic
pub const ERROR_COLUMN: &str = "ERROR";
/// Message of the empty-batch diagnostic
pub const NO_VALID_RECORDS: &str = "No correct item to predict";
pub const REAL_COLUMN: &str = "Real";
pub const PREDICTED_COLUMN: &str = "Predicted";
pub const COLOR_ATOM_COLUMN: &str = "ColorAtom";

/// Line accounting of one SMILES batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Non-empty input lines
    pub lines: usize,
    /// Lines that became records
    pub resolved: usize,
    /// Lines rejected by the field resolver
    pub dropped: usize,
}

/// Ordered rows with a uniform set of named columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    stats: BatchStats,
}

impl ResultTable {
    /// Empty table with the given columns
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            stats: BatchStats::default(),
        }
    }

    /// Single-row diagnostic table
    pub fn error(message: &str) -> Self {
        Self {
            columns: vec![ERROR_COLUMN.to_string()],
            rows: vec![vec![Value::Text(message.to_string())]],
            stats: BatchStats::default(),
        }
    }

    pub fn with_stats(mut self, stats: BatchStats) -> Self {
        self.stats = stats;
        self
    }

    /// Whether this is the empty-batch diagnostic
    pub fn is_error(&self) -> bool {
        self.columns.len() == 1 && self.columns[0] == ERROR_COLUMN
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column in row order
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[index])
    }

    /// Append a row; missing trailing cells are filled with nulls
    pub fn push_row(&mut self, mut row: Vec<Value>) -> PredictResult<()> {
        if row.len() > self.columns.len() {
            return Err(PredictError::ColumnLength {
                column: format!("row {}", self.rows.len()),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
        Ok(())
    }

    /// Append a column holding one value per existing row
    pub fn push_column(&mut self, name: &str, values: Vec<Value>) -> PredictResult<()> {
        self.insert_column(self.columns.len(), name, values)
    }

    /// Insert a column at `position` holding one value per existing row
    pub fn insert_column(
        &mut self,
        position: usize,
        name: &str,
        values: Vec<Value>,
    ) -> PredictResult<()> {
        if values.len() != self.rows.len() {
            return Err(PredictError::ColumnLength {
                column: name.to_string(),
                expected: self.rows.len(),
                actual: values.len(),
            });
        }
        let position = position.min(self.columns.len());
        self.columns.insert(position, name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(position, value);
        }
        Ok(())
    }

    /// Apply `f` to every cell of a column
    pub fn map_column(&mut self, name: &str, f: impl Fn(Value) -> Value) {
        if let Some(index) = self.column_index(name) {
            for row in &mut self.rows {
                let value = std::mem::replace(&mut row[index], Value::Null);
                row[index] = f(value);
            }
        }
    }

    /// Write the table as CSV with a header row
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(&self.columns)
            .context("Failed to write CSV header")?;
        for row in &self.rows {
            csv.write_record(row.iter().map(|v| v.to_string()))
                .context("Failed to write CSV row")?;
        }
        csv.flush().context("Failed to flush CSV output")?;
        Ok(())
    }

    /// Read a CSV table with a header row. Cells are kept as text; empty
    /// cells become nulls.
    pub fn read_csv<R: io::Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let columns: Vec<String> = csv
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut table = Self::new(columns);
        for (line, record) in csv.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read CSV row {}", line + 1))?;
            let row = record
                .iter()
                .map(|cell| match cell {
                    "" => Value::Null,
                    text => Value::Text(text.to_string()),
                })
                .collect();
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// CSV rendering as a string
    pub fn to_csv_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer).context("CSV output is not UTF-8")
    }
}

/// Result of one prediction call
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutput {
    /// Descriptors path: the model's single output
    Scalar(f64),
    /// SMILES path: one row per accepted record
    Table(ResultTable),
}

impl PredictionOutput {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            PredictionOutput::Scalar(v) => Some(*v),
            PredictionOutput::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&ResultTable> {
        match self {
            PredictionOutput::Table(t) => Some(t),
            PredictionOutput::Scalar(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultTable {
        let mut table = ResultTable::new(vec!["SMILES".into(), "Solvent".into()]);
        table
            .push_row(vec![Value::Text("CCO".into()), Value::Category("water".into())])
            .unwrap();
        table
            .push_row(vec![Value::Text("CC".into()), Value::Category("DMSO".into())])
            .unwrap();
        table
    }

    #[test]
    fn test_error_table() {
        let table = ResultTable::error(NO_VALID_RECORDS);
        assert!(table.is_error());
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get(0, ERROR_COLUMN),
            Some(&Value::Text(NO_VALID_RECORDS.to_string()))
        );
    }

    #[test]
    fn test_insert_and_push_columns() {
        let mut table = sample();
        table
            .push_column(PREDICTED_COLUMN, vec![1.5.into(), 2.5.into()])
            .unwrap();
        table
            .insert_column(2, REAL_COLUMN, vec![Some(1.0).into(), Value::Null])
            .unwrap();
        assert_eq!(table.columns(), &["SMILES", "Solvent", "Real", "Predicted"]);
        assert_eq!(table.get(1, REAL_COLUMN), Some(&Value::Null));
        assert_eq!(table.get(0, PREDICTED_COLUMN), Some(&Value::Number(1.5)));
    }

    #[test]
    fn test_column_length_mismatch() {
        let mut table = sample();
        let err = table.push_column(PREDICTED_COLUMN, vec![1.0.into()]).unwrap_err();
        assert!(matches!(err, PredictError::ColumnLength { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let mut table = sample();
        table.push_row(vec![Value::Text("C".into())]).unwrap();
        assert_eq!(table.get(2, "Solvent"), Some(&Value::Null));
    }

    #[test]
    fn test_write_csv() {
        let mut table = sample();
        table
            .push_column(PREDICTED_COLUMN, vec![1.5.into(), 2.0.into()])
            .unwrap();
        let csv = table.to_csv_string().unwrap();
        assert_eq!(csv, "SMILES,Solvent,Predicted\nCCO,water,1.5\nCC,DMSO,2\n");
    }

    #[test]
    fn test_read_csv() {
        let table = ResultTable::read_csv("SMILES,Solvent\nCCO,water\nCC,\n".as_bytes()).unwrap();
        assert_eq!(table.columns(), &["SMILES", "Solvent"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "Solvent"), Some(&Value::Text("water".into())));
        assert_eq!(table.get(1, "Solvent"), Some(&Value::Null));

        assert!(ResultTable::read_csv("a,b\n1,2,3\n".as_bytes()).is_err());
    }
}
