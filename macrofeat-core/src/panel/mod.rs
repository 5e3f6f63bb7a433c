//! Panel data model: a table of typed columns keyed by (entity, date).
//!
//! A panel holds regular columns plus an optional hierarchical row key
//! (`index`) made of named levels. Identifier fields may live in either place;
//! [`Panel::field`] looks in the columns first, then in the index levels.

pub mod column;
pub mod io;

pub use column::{Column, ColumnData, ColumnType};

use crate::error::{MacroError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Tabular time-series data keyed by (entity, date).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    index: Vec<Column>,
    columns: Vec<Column>,
}

impl Panel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a panel from regular columns.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let mut panel = Self::new();
        for column in columns {
            panel = panel.with_column(column)?;
        }
        Ok(panel)
    }

    /// Append a column. Fails on a duplicate name or a length mismatch.
    pub fn with_column(mut self, column: Column) -> Result<Self> {
        self.push_column(column)?;
        Ok(self)
    }

    /// In-place form of [`Panel::with_column`].
    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if self.field(&column.name).is_some() {
            return Err(MacroError::schema(format!(
                "duplicate column name '{}'",
                column.name
            )));
        }
        if self.width() > 0 && column.len() != self.row_count() {
            return Err(MacroError::schema(format!(
                "column '{}' has {} rows, panel has {}",
                column.name,
                column.len(),
                self.row_count()
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Replace the regular column named like `column`, or append it.
    /// A name held by an index level is a schema error.
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        let Some(pos) = self.columns.iter().position(|c| c.name == column.name) else {
            return self.push_column(column);
        };
        if column.len() != self.row_count() {
            return Err(MacroError::schema(format!(
                "column '{}' has {} rows, panel has {}",
                column.name,
                column.len(),
                self.row_count()
            )));
        }
        self.columns[pos] = column;
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.index
            .first()
            .or_else(|| self.columns.first())
            .map(Column::len)
            .unwrap_or(0)
    }

    /// Number of regular columns (index levels excluded).
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of columns plus index levels.
    pub fn width(&self) -> usize {
        self.index.len() + self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn index_levels(&self) -> &[Column] {
        &self.index
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn index_names(&self) -> Vec<&str> {
        self.index.iter().map(|c| c.name.as_str()).collect()
    }

    /// Names of the regular numeric columns, in panel order.
    pub fn numeric_column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.dtype() == ColumnType::Numeric)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index_level(&self, name: &str) -> Option<&Column> {
        self.index.iter().find(|c| c.name == name)
    }

    /// Look a field up as a column, then as an index level.
    pub fn field(&self, name: &str) -> Option<&Column> {
        self.column(name).or_else(|| self.index_level(name))
    }

    /// Like [`Panel::field`] but a missing field is a schema error.
    pub fn require_field(&self, name: &str) -> Result<&Column> {
        self.field(name).ok_or_else(|| {
            MacroError::schema(format!(
                "panel has no '{name}' column or index level"
            ))
        })
    }

    /// Rename a regular column or index level. Unknown names are a no-op.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        if self.field(to).is_some() {
            return Err(MacroError::schema(format!(
                "cannot rename '{from}' to existing field '{to}'"
            )));
        }
        if let Some(col) = self
            .columns
            .iter_mut()
            .chain(self.index.iter_mut())
            .find(|c| c.name == from)
        {
            col.name = to.to_string();
        }
        Ok(())
    }

    /// Move the named columns into the row key, appending them as index levels.
    pub fn set_index(mut self, levels: &[&str]) -> Result<Self> {
        for level in levels {
            let pos = self
                .columns
                .iter()
                .position(|c| c.name == *level)
                .ok_or_else(|| MacroError::schema(format!("no column '{level}' to index by")))?;
            let col = self.columns.remove(pos);
            self.index.push(col);
        }
        Ok(self)
    }

    /// Move every index level back in front of the regular columns.
    pub fn reset_index(mut self) -> Self {
        let mut columns = std::mem::take(&mut self.index);
        columns.append(&mut self.columns);
        self.columns = columns;
        self
    }

    /// Whether the combination of the given fields is unique across rows.
    /// Rows with a missing key cell are compared like any other value.
    pub fn has_unique_keys(&self, fields: &[&str]) -> Result<bool> {
        let cols = fields
            .iter()
            .map(|f| self.require_field(f))
            .collect::<Result<Vec<_>>>()?;
        let mut seen = HashSet::with_capacity(self.row_count());
        for row in 0..self.row_count() {
            let key: Vec<Option<String>> = cols.iter().map(|c| c.data.key(row)).collect();
            if !seen.insert(key) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Panel {
        Panel::from_columns(vec![
            Column::from_strs("country", ["A", "A", "B"]),
            Column::from_strs("date", ["2020", "2021", "2020"]),
            Column::from_f64("x", [1.0, 2.0, 3.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_with_column_rejects_length_mismatch() {
        let err = sample()
            .with_column(Column::from_f64("y", [1.0]))
            .unwrap_err();
        assert!(matches!(err, MacroError::Schema(_)));
    }

    #[test]
    fn test_with_column_rejects_duplicate() {
        let err = sample()
            .with_column(Column::from_f64("x", [1.0, 2.0, 3.0]))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_set_and_reset_index() {
        let indexed = sample().set_index(&["country", "date"]).unwrap();
        assert_eq!(indexed.index_names(), vec!["country", "date"]);
        assert_eq!(indexed.column_names(), vec!["x"]);
        assert!(indexed.column("country").is_none());
        assert!(indexed.field("country").is_some());
        assert_eq!(indexed.row_count(), 3);

        let flat = indexed.reset_index();
        assert_eq!(flat, sample());
    }

    #[test]
    fn test_numeric_column_names_skip_identifiers() {
        assert_eq!(sample().numeric_column_names(), vec!["x"]);
    }

    #[test]
    fn test_require_field_missing() {
        let err = sample().require_field("entity").unwrap_err();
        assert!(matches!(err, MacroError::Schema(_)));
    }

    #[test]
    fn test_has_unique_keys() {
        let panel = sample();
        assert!(panel.has_unique_keys(&["country", "date"]).unwrap());
        assert!(!panel.has_unique_keys(&["date"]).unwrap());
    }

    #[test]
    fn test_set_column_replaces_in_place() {
        let mut panel = sample();
        panel.set_column(Column::from_f64("x", [7.0, 8.0, 9.0])).unwrap();
        panel.set_column(Column::from_f64("y", [0.0, 0.0, 0.0])).unwrap();
        assert_eq!(panel.column_names(), vec!["country", "date", "x", "y"]);
        assert_eq!(
            panel.column("x").unwrap().as_numeric().unwrap(),
            &[Some(7.0), Some(8.0), Some(9.0)]
        );
        assert!(panel.set_column(Column::from_f64("x", [1.0])).is_err());

        let mut indexed = sample().set_index(&["country"]).unwrap();
        assert!(indexed.set_column(Column::from_strs("country", ["Z", "Z", "Z"])).is_err());
    }

    #[test]
    fn test_rename() {
        let mut panel = sample();
        panel.rename("country", "entity").unwrap();
        assert!(panel.column("entity").is_some());
        assert!(panel.rename("entity", "x").is_err());
    }
}
