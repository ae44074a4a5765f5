//! In-memory tabular data.

use crate::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single table value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Cell {
    /// Absent or null value.
    #[default]
    Missing,
    /// Any numeric value.
    Number(f64),
    /// Free text or a category label.
    Text(String),
}

impl Cell {
    /// Builds a text cell.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Returns the numeric value, if any.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text value, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Converts a JSON document value into a cell.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Missing,
            serde_json::Value::Bool(b) => Self::Number(if *b { 1.0 } else { 0.0 }),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Missing, Self::Number),
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    /// Converts the cell back into a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Missing => serde_json::Value::Null,
            Self::Number(n) => serde_json::json!(n),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => Ok(()),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A row-major table with named columns.
///
/// Every row has exactly one cell per column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Creates an empty table with the given header.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Creates a table, checking every row against the header width.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        let mut table = Self {
            columns,
            rows: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Builds a table from JSON objects.
    ///
    /// Columns are the union of keys in first-seen order; absent keys become
    /// missing cells.
    pub fn from_documents<'a>(
        documents: impl IntoIterator<Item = &'a serde_json::Map<String, serde_json::Value>>,
    ) -> Self {
        let documents: Vec<_> = documents.into_iter().collect();
        let mut columns: Vec<String> = Vec::new();
        for doc in &documents {
            for key in doc.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = documents
            .iter()
            .map(|doc| {
                columns
                    .iter()
                    .map(|col| doc.get(col).map_or(Cell::Missing, Cell::from_json))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    /// Appends a row.
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::data(format!(
                "row {} has {} cells, expected {}",
                self.rows.len(),
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Iterates over one column's cells.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Removes a column, returning its cells.
    pub fn take_column(&mut self, name: &str) -> Option<Vec<Cell>> {
        let idx = self.column_index(name)?;
        self.columns.remove(idx);
        Some(self.rows.iter_mut().map(|row| row.remove(idx)).collect())
    }

    /// Removes a column; returns whether it was present.
    pub fn drop_column(&mut self, name: &str) -> bool {
        self.take_column(name).is_some()
    }

    /// Appends a column.
    pub fn push_column(&mut self, name: impl Into<String>, cells: Vec<Cell>) -> Result<()> {
        let name = name.into();
        if cells.len() != self.rows.len() {
            return Err(PipelineError::data(format!(
                "column '{name}' has {} cells, table has {} rows",
                cells.len(),
                self.rows.len()
            )));
        }
        self.columns.push(name);
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.push(cell);
        }
        Ok(())
    }

    /// Replaces a column's cells in place.
    pub fn map_column(
        &mut self,
        name: &str,
        mut f: impl FnMut(&Cell) -> Result<Cell>,
    ) -> Result<bool> {
        let Some(idx) = self.column_index(name) else {
            return Ok(false);
        };
        for row in &mut self.rows {
            row[idx] = f(&row[idx])?;
        }
        Ok(true)
    }

    /// Renames a column; returns whether it was present.
    pub fn rename_column(&mut self, from: &str, to: impl Into<String>) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.columns[idx] = to.into();
                true
            }
            None => false,
        }
    }

    /// Turns every text cell equal to `sentinel` into [`Cell::Missing`].
    ///
    /// Returns the number of replaced cells.
    pub fn replace_sentinel(&mut self, sentinel: &str) -> usize {
        let mut replaced = 0;
        for cell in self.rows.iter_mut().flatten() {
            if cell.as_text() == Some(sentinel) {
                *cell = Cell::Missing;
                replaced += 1;
            }
        }
        replaced
    }

    /// Returns a new table holding the given rows, in the given order.
    #[must_use]
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> Table {
        Table::from_rows(
            vec!["id".into(), "Gender".into(), "Age".into()],
            vec![
                vec![Cell::Number(1.0), Cell::text("Male"), Cell::Number(44.0)],
                vec![Cell::Number(2.0), Cell::text("na"), Cell::Number(76.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut table = Table::new(["a", "b"]);
        let err = table.push_row(vec![Cell::Missing]).unwrap_err();
        assert!(matches!(err, PipelineError::Data(_)));
    }

    #[test]
    fn test_from_documents_unions_keys() {
        let a = json!({"Gender": "Male", "Age": 44});
        let b = json!({"Age": 30, "Vintage": 217});
        let docs = [a.as_object().unwrap(), b.as_object().unwrap()];

        let table = Table::from_documents(docs);
        assert_eq!(table.columns(), ["Gender", "Age", "Vintage"]);
        assert_eq!(table.rows()[0][2], Cell::Missing);
        assert_eq!(table.rows()[1][0], Cell::Missing);
        assert_eq!(table.rows()[1][2], Cell::Number(217.0));
    }

    #[test]
    fn test_take_and_rename_columns() {
        let mut table = sample();
        let ids = table.take_column("id").unwrap();
        assert_eq!(ids, vec![Cell::Number(1.0), Cell::Number(2.0)]);
        assert!(!table.drop_column("id"));

        assert!(table.rename_column("Age", "Years"));
        assert_eq!(table.columns(), ["Gender", "Years"]);
        assert_eq!(table.rows()[1], vec![Cell::text("na"), Cell::Number(76.0)]);
    }

    #[test]
    fn test_replace_sentinel() {
        let mut table = sample();
        assert_eq!(table.replace_sentinel("na"), 1);
        assert!(table.rows()[1][1].is_missing());
    }

    #[test]
    fn test_select_rows_keeps_header() {
        let table = sample().select_rows(&[1]);
        assert_eq!(table.n_rows(), 1);
        assert_eq!(table.n_cols(), 3);
        assert_eq!(table.rows()[0][0], Cell::Number(2.0));
    }

    #[test]
    fn test_cell_json_conversion() {
        assert_eq!(Cell::from_json(&json!(null)), Cell::Missing);
        assert_eq!(Cell::from_json(&json!(true)), Cell::Number(1.0));
        assert_eq!(Cell::from_json(&json!("x")).to_json(), json!("x"));
        assert_eq!(Cell::Number(2.5).to_string(), "2.5");
    }
}
