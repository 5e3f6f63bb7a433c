//! Delimited-text persistence for panels.

use super::{Column, ColumnData, Panel};
use crate::error::{MacroError, Result};
use chrono::NaiveDate;
use std::path::Path;

/// How to type the columns of a CSV file on read.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Columns kept as text.
    pub text_columns: Vec<String>,
    /// Columns parsed as dates (ISO dates or World Bank periods).
    pub date_columns: Vec<String>,
    /// Field delimiter.
    pub delimiter: u8,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            text_columns: vec!["country".into()],
            date_columns: vec!["date".into()],
            delimiter: b',',
        }
    }
}

/// Parse a date cell: `YYYY-MM-DD`, `YYYY`, `YYYYMmm` or `YYYYQn`.
/// Periods are normalised to their first day.
pub fn parse_period(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    // Timestamps such as "2020-01-01 00:00:00" keep their date part.
    if s.len() > 10 && s.is_char_boundary(10) {
        if let Ok(d) = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d") {
            return Some(d);
        }
    }
    if s.len() == 4 {
        let year: i32 = s.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }
    if s.len() >= 6 && s.is_char_boundary(4) && s.is_char_boundary(5) {
        let year: i32 = s[..4].parse().ok()?;
        let rest = &s[5..];
        return match &s[4..5] {
            "M" => NaiveDate::from_ymd_opt(year, rest.parse().ok()?, 1),
            "Q" => {
                let quarter: u32 = rest.parse().ok()?;
                if !(1..=4).contains(&quarter) {
                    return None;
                }
                NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1)
            }
            _ => None,
        };
    }
    None
}

fn parse_number(raw: &str) -> std::result::Result<Option<f64>, ()> {
    let s = raw.trim();
    match s {
        "" | "NA" | "NaN" | "nan" | "null" => Ok(None),
        "inf" | "Infinity" => Ok(Some(f64::INFINITY)),
        "-inf" | "-Infinity" => Ok(Some(f64::NEG_INFINITY)),
        _ => s.parse::<f64>().map(|v| if v.is_nan() { None } else { Some(v) }).map_err(|_| ()),
    }
}

/// Write a panel as CSV: index levels first, then columns. Missing cells are empty.
pub fn write_csv(panel: &Panel, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)?;
    let fields: Vec<&Column> = panel
        .index_levels()
        .iter()
        .chain(panel.columns().iter())
        .collect();

    writer.write_record(fields.iter().map(|c| c.name.as_str()))?;
    for row in 0..panel.row_count() {
        writer.write_record(fields.iter().map(|c| c.data.render(row)))?;
    }
    writer.flush()?;
    tracing::debug!(
        path = %path.display(),
        rows = panel.row_count(),
        columns = fields.len(),
        "Wrote panel CSV"
    );
    Ok(())
}

/// Read a CSV written by [`write_csv`] (or any header-first CSV) into a flat panel.
pub fn read_csv(path: &Path, options: &ReadOptions) -> Result<Panel> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() {
        return Err(MacroError::parse(format!(
            "{}: CSV has no header row",
            path.display()
        )));
    }

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (i, col) in cells.iter_mut().enumerate() {
            col.push(record.get(i).unwrap_or("").to_string());
        }
    }

    let mut panel = Panel::new();
    for (name, raw) in headers.into_iter().zip(cells) {
        let data = if options.text_columns.contains(&name) {
            ColumnData::Text(
                raw.into_iter()
                    .map(|s| if s.is_empty() { None } else { Some(s) })
                    .collect(),
            )
        } else if options.date_columns.contains(&name) {
            let mut dates = Vec::with_capacity(raw.len());
            for (row, s) in raw.iter().enumerate() {
                if s.trim().is_empty() {
                    dates.push(None);
                    continue;
                }
                let date = parse_period(s).ok_or_else(|| {
                    MacroError::parse(format!("row {row}: '{s}' in '{name}' is not a date"))
                })?;
                dates.push(Some(date));
            }
            ColumnData::Date(dates)
        } else {
            let mut values = Vec::with_capacity(raw.len());
            for (row, s) in raw.iter().enumerate() {
                let value = parse_number(s).map_err(|_| {
                    MacroError::parse(format!("row {row}: '{s}' in '{name}' is not numeric"))
                })?;
                values.push(value);
            }
            ColumnData::Numeric(values)
        };
        panel.push_column(Column::new(name, data))?;
    }
    Ok(panel)
}
