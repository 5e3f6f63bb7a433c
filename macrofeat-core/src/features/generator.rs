//! Grouped time-series feature generation.

use super::grouping::RowGroups;
use super::spec::{FeatureKind, FeatureSpec, feature_column_name, rolling_mean_change_suffix};
use super::window::{self, RollingStat};
use crate::error::Result;
use crate::panel::{Column, Panel};

/// Default entity identifier field.
pub const ENTITY_FIELD: &str = "country";
/// Default date field used to order rows within an entity.
pub const DATE_FIELD: &str = "date";

/// Appends derived time-series columns to a panel, computed per entity.
///
/// Every numeric column is a target. Identifier and date fields are passed
/// through untouched. Rows of one entity never mix with another's.
#[derive(Debug, Clone)]
pub struct FeatureGenerator {
    spec: FeatureSpec,
    entity_field: String,
    date_field: String,
}

impl Default for FeatureGenerator {
    fn default() -> Self {
        Self::from_spec(FeatureSpec::default())
    }
}

impl FeatureGenerator {
    /// Build from a window, a tag list and a time-unit label.
    /// Unknown tags are skipped (see [`FeatureSpec::ignored`]).
    pub fn new<S: AsRef<str>>(
        window: usize,
        tags: impl IntoIterator<Item = S>,
        time_unit: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self::from_spec(FeatureSpec::new(window, tags, time_unit)?))
    }

    pub fn from_spec(spec: FeatureSpec) -> Self {
        Self {
            spec,
            entity_field: ENTITY_FIELD.to_string(),
            date_field: DATE_FIELD.to_string(),
        }
    }

    pub fn with_entity_field(mut self, field: impl Into<String>) -> Self {
        self.entity_field = field.into();
        self
    }

    pub fn with_date_field(mut self, field: impl Into<String>) -> Self {
        self.date_field = field.into();
        self
    }

    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    /// Names of the columns `transform` would append for the given targets,
    /// in emission order.
    pub fn output_columns(&self, targets: &[&str]) -> Vec<String> {
        let mut names = Vec::new();
        for &kind in self.spec.kinds() {
            let suffix = self.spec.suffix(kind);
            names.extend(targets.iter().map(|t| feature_column_name(t, &suffix)));
            if kind == FeatureKind::RollingMean {
                let chg = rolling_mean_change_suffix(self.spec.window(), self.spec.time_unit());
                names.extend(targets.iter().map(|t| feature_column_name(t, &chg)));
            }
        }
        names
    }

    /// Return a copy of `panel` with the requested feature columns appended.
    /// A feature column already present in `panel` is recomputed in place.
    ///
    /// Fails with a schema error when the entity field is neither a column nor
    /// an index level. Rows are processed in date order within each entity
    /// when the date field exists; the output keeps the input row order.
    pub fn transform(&self, panel: &Panel) -> Result<Panel> {
        let entity = panel.require_field(&self.entity_field)?;
        let order = panel.field(&self.date_field).map(|c| &c.data);
        let groups = RowGroups::new(&entity.data, order);
        if groups.reordered() {
            tracing::debug!(
                field = %self.date_field,
                "Input rows not in time order within entity; sorting groups"
            );
        }

        let targets: Vec<(&str, &[Option<f64>])> = panel
            .columns()
            .iter()
            .filter_map(|c| c.as_numeric().map(|v| (c.name.as_str(), v)))
            .collect();

        let span = self.spec.window();
        let unit = self.spec.time_unit();
        let mut out = panel.clone();

        for &kind in self.spec.kinds() {
            let suffix = self.spec.suffix(kind);
            let mut derived: Vec<Column> = Vec::with_capacity(targets.len());
            for &(name, values) in &targets {
                let computed = match kind {
                    FeatureKind::ChangeRaw => groups.apply(values, |s| window::diff(s, 1)),
                    FeatureKind::ChangePct => groups.apply(values, window::pct_change),
                    FeatureKind::RollingMean => {
                        groups.apply(values, |s| window::rolling(s, span, RollingStat::Mean))
                    }
                    FeatureKind::Lag1 => groups.apply(values, |s| window::shift(s, 1)),
                    FeatureKind::Lag2 => groups.apply(values, |s| window::shift(s, 2)),
                    FeatureKind::ZScore => groups.apply(values, window::zscore),
                    FeatureKind::RollingStd => {
                        groups.apply(values, |s| window::rolling(s, span, RollingStat::Std))
                    }
                    FeatureKind::RollingMin => {
                        groups.apply(values, |s| window::rolling(s, span, RollingStat::Min))
                    }
                    FeatureKind::RollingMax => {
                        groups.apply(values, |s| window::rolling(s, span, RollingStat::Max))
                    }
                };
                derived.push(Column::numeric(feature_column_name(name, &suffix), computed));
            }

            // The rolling-mean change columns follow the full block of means.
            let changes: Vec<Column> = if kind == FeatureKind::RollingMean {
                let chg = rolling_mean_change_suffix(span, unit);
                targets
                    .iter()
                    .zip(&derived)
                    .map(|(&(name, _), ma)| {
                        let values = ma.as_numeric().unwrap_or_default();
                        Column::numeric(
                            feature_column_name(name, &chg),
                            groups.apply(values, |s| window::diff(s, 1)),
                        )
                    })
                    .collect()
            } else {
                Vec::new()
            };

            tracing::debug!(
                feature = %kind,
                columns = derived.len() + changes.len(),
                "Computed feature columns"
            );
            for column in derived.into_iter().chain(changes) {
                if out.column(&column.name).is_some() {
                    tracing::debug!(column = %column.name, "Replacing existing feature column");
                }
                out.set_column(column)?;
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MacroError;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn year(y: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, 1, 1)
    }

    /// Entities A and B over four years; X = [10,20,30,40] for A and 5s for B.
    fn two_entity_panel() -> Panel {
        Panel::from_columns(vec![
            Column::from_strs("country", ["A", "A", "A", "A", "B", "B", "B", "B"]),
            Column::dates(
                "date",
                vec![
                    year(2020),
                    year(2021),
                    year(2022),
                    year(2023),
                    year(2020),
                    year(2021),
                    year(2022),
                    year(2023),
                ],
            ),
            Column::from_f64("X", [10.0, 20.0, 30.0, 40.0, 5.0, 5.0, 5.0, 5.0]),
        ])
        .unwrap()
    }

    fn values<'a>(panel: &'a Panel, name: &str) -> &'a [Option<f64>] {
        panel
            .column(name)
            .unwrap_or_else(|| panic!("missing column {name}"))
            .as_numeric()
            .unwrap()
    }

    #[test]
    fn test_two_entity_scenario() {
        let generator =
            FeatureGenerator::new(2, ["changeraw", "rollingmean", "zscore"], "D").unwrap();
        let out = generator.transform(&two_entity_panel()).unwrap();

        assert_eq!(
            out.column_names(),
            vec!["country", "date", "X", "X_chraw1D", "X_ma2D", "X_ma2D_chgD", "X_zscoreD"]
        );
        assert_eq!(
            &values(&out, "X_chraw1D")[..4],
            &[None, Some(10.0), Some(10.0), Some(10.0)]
        );
        assert_eq!(
            &values(&out, "X_ma2D")[..4],
            &[Some(10.0), Some(15.0), Some(25.0), Some(35.0)]
        );
        assert_eq!(
            &values(&out, "X_ma2D_chgD")[..4],
            &[None, Some(5.0), Some(10.0), Some(10.0)]
        );
        // Zero variance in B yields missing z-scores.
        assert_eq!(&values(&out, "X_zscoreD")[4..], &[None, None, None, None]);
        // B's first difference starts fresh.
        assert_eq!(
            &values(&out, "X_chraw1D")[4..],
            &[None, Some(0.0), Some(0.0), Some(0.0)]
        );
    }

    #[test]
    fn test_empty_feature_set_is_identity() {
        let panel = two_entity_panel();
        let generator = FeatureGenerator::new(3, Vec::<String>::new(), "D").unwrap();
        assert_eq!(generator.transform(&panel).unwrap(), panel);
    }

    #[test]
    fn test_missing_entity_is_schema_error() {
        let panel = Panel::from_columns(vec![Column::from_f64("X", [1.0, 2.0])]).unwrap();
        let err = FeatureGenerator::default().transform(&panel).unwrap_err();
        assert!(matches!(err, MacroError::Schema(_)));
    }

    #[test]
    fn test_entity_as_index_level() {
        let panel = two_entity_panel().set_index(&["country", "date"]).unwrap();
        let out = FeatureGenerator::new(3, ["lag1", "lag2"], "YE")
            .unwrap()
            .transform(&panel)
            .unwrap();
        assert_eq!(out.index_names(), vec!["country", "date"]);
        assert_eq!(out.column_names(), vec!["X", "X_lag1YE", "X_lag2YE"]);
        assert_eq!(
            values(&out, "X_lag2YE"),
            &[
                None,
                None,
                Some(10.0),
                Some(20.0),
                None,
                None,
                Some(5.0),
                Some(5.0)
            ]
        );
    }

    #[test]
    fn test_unsorted_rows_are_processed_in_date_order() {
        // A's rows arrive as 2021, 2020, 2022; output keeps that row order.
        let panel = Panel::from_columns(vec![
            Column::from_strs("country", ["A", "A", "A"]),
            Column::dates("date", vec![year(2021), year(2020), year(2022)]),
            Column::from_f64("X", [20.0, 10.0, 40.0]),
        ])
        .unwrap();
        let out = FeatureGenerator::new(3, ["changeraw", "changepct"], "D")
            .unwrap()
            .transform(&panel)
            .unwrap();
        assert_eq!(values(&out, "X"), &[Some(20.0), Some(10.0), Some(40.0)]);
        assert_eq!(values(&out, "X_chraw1D"), &[Some(10.0), None, Some(20.0)]);
        assert_eq!(values(&out, "X_chpct1D"), &[Some(1.0), None, Some(1.0)]);
    }

    #[test]
    fn test_rolling_stats_emission_order() {
        let panel = Panel::from_columns(vec![
            Column::from_strs("country", ["A", "A", "A"]),
            Column::from_f64("X", [3.0, 1.0, 2.0]),
            Column::from_f64("Y", [1.0, 1.0, 1.0]),
        ])
        .unwrap();
        let generator =
            FeatureGenerator::new(2, ["rollingmax", "rollingstd", "rollingmin"], "D").unwrap();
        let out = generator.transform(&panel).unwrap();
        assert_eq!(
            out.column_names(),
            vec!["country", "X", "Y", "X_std2D", "Y_std2D", "X_min2D", "Y_min2D", "X_max2D", "Y_max2D"]
        );
        assert_eq!(values(&out, "X_min2D"), &[Some(3.0), Some(1.0), Some(1.0)]);
        assert_eq!(values(&out, "X_max2D"), &[Some(3.0), Some(3.0), Some(2.0)]);
        assert_eq!(values(&out, "Y_std2D"), &[None, Some(0.0), Some(0.0)]);
        assert_eq!(
            generator.output_columns(&["X", "Y"]),
            out.column_names()[3..].to_vec()
        );
    }

    #[test]
    fn test_text_columns_are_not_targets() {
        let panel = Panel::from_columns(vec![
            Column::from_strs("country", ["A", "A"]),
            Column::from_strs("note", ["x", "y"]),
            Column::from_f64("v", [1.0, 2.0]),
        ])
        .unwrap();
        let out = FeatureGenerator::new(3, ["changeraw"], "D")
            .unwrap()
            .transform(&panel)
            .unwrap();
        assert_eq!(out.column_names(), vec!["country", "note", "v", "v_chraw1D"]);
    }

    #[test]
    fn test_transform_twice_recomputes_existing_columns() {
        let generator = FeatureGenerator::new(2, ["changeraw"], "D").unwrap();
        let once = generator.transform(&two_entity_panel()).unwrap();
        let twice = generator.transform(&once).unwrap();

        assert_eq!(
            twice.column_names(),
            vec!["country", "date", "X", "X_chraw1D", "X_chraw1D_chraw1D"]
        );
        assert_eq!(values(&twice, "X_chraw1D"), values(&once, "X_chraw1D"));
        assert_eq!(
            &values(&twice, "X_chraw1D_chraw1D")[..4],
            &[None, None, Some(0.0), Some(0.0)]
        );
    }

    #[test]
    fn test_nan_cell_only_affects_its_own_rows() {
        let panel = Panel::from_columns(vec![
            Column::from_strs("country", ["A", "A", "A", "A"]),
            Column::from_f64("X", [1.0, f64::NAN, 3.0, 5.0]),
        ])
        .unwrap();
        let out = FeatureGenerator::new(2, ["rollingmean", "zscore"], "D")
            .unwrap()
            .transform(&panel)
            .unwrap();
        assert_eq!(
            values(&out, "X_ma2D"),
            &[Some(1.0), Some(1.0), Some(3.0), Some(4.0)]
        );
        let z = values(&out, "X_zscoreD");
        assert_eq!(z[1], None);
        assert!([z[0], z[2], z[3]].iter().all(|v| v.is_some_and(f64::is_finite)));
    }

    #[test]
    fn test_custom_date_field() {
        let panel = Panel::from_columns(vec![
            Column::from_strs("country", ["A", "A", "A"]),
            Column::from_f64("year", [2022.0, 2020.0, 2021.0]),
            Column::from_f64("v", [9.0, 1.0, 4.0]),
        ])
        .unwrap();
        let out = FeatureGenerator::new(3, ["lag1"], "D")
            .unwrap()
            .with_date_field("year")
            .transform(&panel)
            .unwrap();
        assert_eq!(values(&out, "v_lag1D"), &[Some(4.0), None, Some(1.0)]);
    }

    #[test]
    fn test_pct_change_zero_base_is_missing() {
        let panel = Panel::from_columns(vec![
            Column::from_strs("country", ["A", "A", "A"]),
            Column::from_f64("v", [0.0, 2.0, 3.0]),
        ])
        .unwrap();
        let out = FeatureGenerator::new(3, ["changepct"], "D")
            .unwrap()
            .transform(&panel)
            .unwrap();
        assert_eq!(values(&out, "v_chpct1D"), &[None, None, Some(0.5)]);
    }

    #[test]
    fn test_custom_entity_field() {
        let panel = Panel::from_columns(vec![
            Column::from_strs("iso3", ["USA", "USA"]),
            Column::from_f64("v", [1.0, 4.0]),
        ])
        .unwrap();
        let out = FeatureGenerator::new(3, ["changeraw"], "D")
            .unwrap()
            .with_entity_field("iso3")
            .transform(&panel)
            .unwrap();
        assert_eq!(values(&out, "v_chraw1D"), &[None, Some(3.0)]);
    }
}
