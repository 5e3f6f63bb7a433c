//! Long-to-wide reshaping and outer merging of indicator panels.

use super::LongTable;
use crate::error::{MacroError, Result};
use crate::features::{DATE_FIELD, ENTITY_FIELD};
use crate::panel::{Column, ColumnData, Panel};
use std::collections::HashMap;

/// Pivot one indicator into a wide panel: `country`, `date`, `{indicator}`.
///
/// Rows keep first-seen (entity, date) order. A repeated pair is a schema
/// error since the wide form would have to drop one of the values.
pub fn pivot(table: &LongTable) -> Result<Panel> {
    let mut seen: HashMap<(&str, chrono::NaiveDate), usize> = HashMap::new();
    let mut entities = Vec::with_capacity(table.len());
    let mut dates = Vec::with_capacity(table.len());
    let mut values = Vec::with_capacity(table.len());

    for obs in &table.observations {
        if seen.insert((obs.entity.as_str(), obs.date), values.len()).is_some() {
            return Err(MacroError::schema(format!(
                "{}: duplicate observation for ({}, {})",
                table.indicator, obs.entity, obs.date
            )));
        }
        entities.push(Some(obs.entity.clone()));
        dates.push(Some(obs.date));
        values.push(obs.value);
    }

    tracing::debug!(indicator = %table.indicator, rows = values.len(), "Pivoted indicator");

    Panel::from_columns(vec![
        Column::text(ENTITY_FIELD, entities),
        Column::dates(DATE_FIELD, dates),
        Column::numeric(table.indicator.clone(), values),
    ])
}

/// Full outer join of two panels on `keys`.
///
/// Output rows are the left rows in order, then right-only keys in their
/// first-seen order. Key fields may be columns or index levels; the result
/// carries them as leading columns. Any other column present on both sides
/// is a schema error.
pub fn outer_merge(left: &Panel, right: &Panel, keys: &[&str]) -> Result<Panel> {
    if keys.is_empty() {
        return Err(MacroError::invalid_input("outer merge needs at least one key"));
    }
    let left = left.clone().reset_index();
    let right = right.clone().reset_index();

    let left_keys = key_columns(&left, keys)?;
    let right_keys = key_columns(&right, keys)?;
    for (l, r) in left_keys.iter().zip(&right_keys) {
        if l.dtype() != r.dtype() {
            return Err(MacroError::schema(format!(
                "key '{}' has type {:?} on the left and {:?} on the right",
                l.name,
                l.dtype(),
                r.dtype()
            )));
        }
    }

    let left_values: Vec<&Column> = left.columns().iter().filter(|c| !keys.contains(&c.name.as_str())).collect();
    let right_values: Vec<&Column> = right.columns().iter().filter(|c| !keys.contains(&c.name.as_str())).collect();
    if let Some(clash) = right_values.iter().find(|r| left_values.iter().any(|l| l.name == r.name)) {
        return Err(MacroError::schema(format!(
            "column '{}' exists on both sides of the merge",
            clash.name
        )));
    }

    // Output row -> (left row, right row).
    let mut rows: Vec<(Option<usize>, Option<usize>)> = Vec::new();
    let mut positions: HashMap<Vec<Option<String>>, usize> = HashMap::new();

    for row in 0..left.row_count() {
        let key = row_key(&left_keys, row);
        positions.entry(key).or_insert(rows.len());
        rows.push((Some(row), None));
    }
    for row in 0..right.row_count() {
        let key = row_key(&right_keys, row);
        match positions.get(&key) {
            Some(&pos) if rows[pos].1.is_none() => rows[pos].1 = Some(row),
            Some(_) => {
                return Err(MacroError::schema(format!(
                    "merge key {key:?} is not unique on the right"
                )));
            }
            None => {
                positions.insert(key, rows.len());
                rows.push((None, Some(row)));
            }
        }
    }

    let left_rows: Vec<Option<usize>> = rows.iter().map(|(l, _)| *l).collect();
    let right_rows: Vec<Option<usize>> = rows.iter().map(|(_, r)| *r).collect();

    let mut merged = Panel::new();
    for (l, r) in left_keys.iter().zip(&right_keys) {
        let data = coalesce(&l.data.gather(&left_rows), &r.data.gather(&right_rows));
        merged.push_column(Column::new(l.name.clone(), data))?;
    }
    for col in left_values {
        merged.push_column(Column::new(col.name.clone(), col.data.gather(&left_rows)))?;
    }
    for col in right_values {
        merged.push_column(Column::new(col.name.clone(), col.data.gather(&right_rows)))?;
    }
    Ok(merged)
}

/// Fold [`outer_merge`] over panels keyed by (`country`, `date`).
pub fn merge_all(panels: Vec<Panel>) -> Result<Panel> {
    let mut iter = panels.into_iter();
    let Some(first) = iter.next() else {
        return Ok(Panel::new());
    };
    iter.try_fold(first, |acc, next| {
        outer_merge(&acc, &next, &[ENTITY_FIELD, DATE_FIELD])
    })
}

fn key_columns<'a>(panel: &'a Panel, keys: &[&str]) -> Result<Vec<&'a Column>> {
    keys.iter().map(|k| panel.require_field(k)).collect()
}

fn row_key(cols: &[&Column], row: usize) -> Vec<Option<String>> {
    cols.iter().map(|c| c.data.key(row)).collect()
}

/// Cell-wise `left.or(right)` for two columns of the same type.
fn coalesce(left: &ColumnData, right: &ColumnData) -> ColumnData {
    match (left, right) {
        (ColumnData::Text(l), ColumnData::Text(r)) => ColumnData::Text(
            l.iter().zip(r).map(|(a, b)| a.clone().or_else(|| b.clone())).collect(),
        ),
        (ColumnData::Date(l), ColumnData::Date(r)) => {
            ColumnData::Date(l.iter().zip(r).map(|(a, b)| a.or(*b)).collect())
        }
        (ColumnData::Numeric(l), ColumnData::Numeric(r)) => {
            ColumnData::Numeric(l.iter().zip(r).map(|(a, b)| a.or(*b)).collect())
        }
        _ => left.clone(),
    }
}
