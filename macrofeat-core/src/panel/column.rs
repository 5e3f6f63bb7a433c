//! Typed columns with explicit missing cells.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Date,
    Numeric,
}

/// Cell storage for a column. `None` is a missing cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Date(Vec<Option<NaiveDate>>),
    Numeric(Vec<Option<f64>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(v) => v.len(),
            ColumnData::Date(v) => v.len(),
            ColumnData::Numeric(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> ColumnType {
        match self {
            ColumnData::Text(_) => ColumnType::Text,
            ColumnData::Date(_) => ColumnType::Date,
            ColumnData::Numeric(_) => ColumnType::Numeric,
        }
    }

    /// Hashable rendering of a cell, used for grouping and join keys.
    pub fn key(&self, row: usize) -> Option<String> {
        match self {
            ColumnData::Text(v) => v.get(row)?.clone(),
            ColumnData::Date(v) => v.get(row)?.map(|d| d.format("%Y-%m-%d").to_string()),
            ColumnData::Numeric(v) => v.get(row)?.map(format_number),
        }
    }

    /// Compare two rows of the same column. Missing cells sort last.
    pub fn compare_rows(&self, a: usize, b: usize) -> Ordering {
        fn cmp_opt<T, F>(x: Option<&T>, y: Option<&T>, f: F) -> Ordering
        where
            F: Fn(&T, &T) -> Ordering,
        {
            match (x, y) {
                (Some(x), Some(y)) => f(x, y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }

        match self {
            ColumnData::Text(v) => cmp_opt(
                v.get(a).and_then(Option::as_ref),
                v.get(b).and_then(Option::as_ref),
                |x, y| x.cmp(y),
            ),
            ColumnData::Date(v) => cmp_opt(
                v.get(a).and_then(Option::as_ref),
                v.get(b).and_then(Option::as_ref),
                |x, y| x.cmp(y),
            ),
            ColumnData::Numeric(v) => cmp_opt(
                v.get(a).and_then(Option::as_ref),
                v.get(b).and_then(Option::as_ref),
                |x, y| x.total_cmp(y),
            ),
        }
    }

    /// Build a new column by picking rows; `None` positions become missing cells.
    pub fn gather(&self, rows: &[Option<usize>]) -> ColumnData {
        match self {
            ColumnData::Text(v) => ColumnData::Text(
                rows.iter()
                    .map(|r| r.and_then(|i| v.get(i).cloned().flatten()))
                    .collect(),
            ),
            ColumnData::Date(v) => ColumnData::Date(
                rows.iter()
                    .map(|r| r.and_then(|i| v.get(i).copied().flatten()))
                    .collect(),
            ),
            ColumnData::Numeric(v) => ColumnData::Numeric(
                rows.iter()
                    .map(|r| r.and_then(|i| v.get(i).copied().flatten()))
                    .collect(),
            ),
        }
    }

    /// Render a cell for delimited output. Missing cells render empty.
    pub fn render(&self, row: usize) -> String {
        match self {
            ColumnData::Numeric(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(format_number)
                .unwrap_or_default(),
            _ => self.key(row).unwrap_or_default(),
        }
    }
}

/// Format a float the way the CSV writer and join keys expect.
pub fn format_number(value: f64) -> String {
    if value.is_infinite() {
        if value > 0.0 { "inf".into() } else { "-inf".into() }
    } else {
        value.to_string()
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::new(name, ColumnData::Numeric(values))
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self::new(name, ColumnData::Text(values))
    }

    pub fn dates(name: impl Into<String>, values: Vec<Option<NaiveDate>>) -> Self {
        Self::new(name, ColumnData::Date(values))
    }

    /// Numeric column with no missing cells.
    pub fn from_f64(name: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        Self::numeric(name, values.into_iter().map(Some).collect())
    }

    /// Text column with no missing cells.
    pub fn from_strs<S: AsRef<str>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::text(
            name,
            values
                .into_iter()
                .map(|s| Some(s.as_ref().to_string()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dtype(&self) -> ColumnType {
        self.data.dtype()
    }

    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&[Option<String>]> {
        match &self.data {
            ColumnData::Text(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_renders_each_type() {
        let text = ColumnData::Text(vec![Some("USA".into()), None]);
        assert_eq!(text.key(0).as_deref(), Some("USA"));
        assert_eq!(text.key(1), None);

        let dates = ColumnData::Date(vec![NaiveDate::from_ymd_opt(2020, 1, 1)]);
        assert_eq!(dates.key(0).as_deref(), Some("2020-01-01"));

        let nums = ColumnData::Numeric(vec![Some(1.5), Some(f64::NEG_INFINITY)]);
        assert_eq!(nums.key(0).as_deref(), Some("1.5"));
        assert_eq!(nums.key(1).as_deref(), Some("-inf"));
    }

    #[test]
    fn test_compare_rows_missing_last() {
        let dates = ColumnData::Date(vec![
            None,
            NaiveDate::from_ymd_opt(2021, 1, 1),
            NaiveDate::from_ymd_opt(2020, 1, 1),
        ]);
        assert_eq!(dates.compare_rows(1, 2), Ordering::Greater);
        assert_eq!(dates.compare_rows(0, 2), Ordering::Greater);
        assert_eq!(dates.compare_rows(2, 0), Ordering::Less);
    }

    #[test]
    fn test_gather_fills_missing() {
        let col = ColumnData::Numeric(vec![Some(1.0), Some(2.0)]);
        let out = col.gather(&[Some(1), None, Some(0)]);
        assert_eq!(out, ColumnData::Numeric(vec![Some(2.0), None, Some(1.0)]));
    }

    #[test]
    fn test_column_accessors() {
        let col = Column::from_f64("x", [1.0, 2.0]);
        assert_eq!(col.dtype(), ColumnType::Numeric);
        assert_eq!(col.as_numeric(), Some(&[Some(1.0), Some(2.0)][..]));
        assert!(col.as_text().is_none());
        assert_eq!(col.len(), 2);
    }
}
