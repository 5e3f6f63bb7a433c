//! Entity grouping for per-group time-series transforms.

use crate::panel::ColumnData;
use std::collections::HashMap;

/// Row positions of each entity group, each group in time order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowGroups {
    groups: Vec<Vec<usize>>,
    rows: usize,
    reordered: bool,
}

impl RowGroups {
    /// Group rows by the entity key. Groups appear in first-seen order; rows
    /// with a missing entity form one group of their own. When `order_by` is
    /// given, each group is stably sorted by it (missing values last).
    pub fn new(entity: &ColumnData, order_by: Option<&ColumnData>) -> Self {
        let rows = entity.len();
        let mut slots: HashMap<Option<String>, usize> = HashMap::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for row in 0..rows {
            let slot = *slots.entry(entity.key(row)).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(row);
        }

        let mut reordered = false;
        if let Some(order) = order_by {
            for group in &mut groups {
                let sorted = group
                    .windows(2)
                    .all(|w| order.compare_rows(w[0], w[1]).is_le());
                if !sorted {
                    group.sort_by(|&a, &b| order.compare_rows(a, b));
                    reordered = true;
                }
            }
        }

        Self {
            groups,
            rows,
            reordered,
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Whether any group had to be re-sorted by time.
    pub fn reordered(&self) -> bool {
        self.reordered
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.groups.iter().map(Vec::as_slice)
    }

    /// Apply `f` to each group's values (in time order) and write the results
    /// back to the original row positions.
    pub fn apply<F>(&self, values: &[Option<f64>], f: F) -> Vec<Option<f64>>
    where
        F: Fn(&[Option<f64>]) -> Vec<Option<f64>>,
    {
        let mut out = vec![None; self.rows];
        for group in &self.groups {
            let series: Vec<Option<f64>> = group.iter().map(|&r| values[r]).collect();
            for (&row, value) in group.iter().zip(f(&series)) {
                out[row] = value;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entities(keys: &[&str]) -> ColumnData {
        ColumnData::Text(keys.iter().map(|k| Some(k.to_string())).collect())
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let groups = RowGroups::new(&entities(&["B", "A", "B", "A"]), None);
        let collected: Vec<&[usize]> = groups.iter().collect();
        assert_eq!(collected, vec![&[0, 2][..], &[1, 3][..]]);
        assert!(!groups.reordered());
    }

    #[test]
    fn test_missing_entity_forms_own_group() {
        let col = ColumnData::Text(vec![Some("A".into()), None, None]);
        let groups = RowGroups::new(&col, None);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_groups_sorted_by_date() {
        let dates = ColumnData::Date(vec![
            NaiveDate::from_ymd_opt(2021, 1, 1),
            NaiveDate::from_ymd_opt(2020, 1, 1),
            NaiveDate::from_ymd_opt(2022, 1, 1),
        ]);
        let groups = RowGroups::new(&entities(&["A", "A", "A"]), Some(&dates));
        assert_eq!(groups.iter().next().unwrap(), &[1, 0, 2]);
        assert!(groups.reordered());
    }

    #[test]
    fn test_apply_scatters_back() {
        let groups = RowGroups::new(&entities(&["A", "B", "A", "B"]), None);
        let values = [Some(1.0), Some(10.0), Some(3.0), Some(30.0)];
        let out = groups.apply(&values, |s| crate::features::window::diff(s, 1));
        assert_eq!(out, vec![None, None, Some(2.0), Some(20.0)]);
    }
}
