//! Feature vocabulary and output column naming.

use crate::error::{MacroError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One transform from the closed feature vocabulary.
///
/// Variant order is the emission order used by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    ChangeRaw,
    ChangePct,
    RollingMean,
    Lag1,
    Lag2,
    ZScore,
    RollingStd,
    RollingMin,
    RollingMax,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 9] = [
        FeatureKind::ChangeRaw,
        FeatureKind::ChangePct,
        FeatureKind::RollingMean,
        FeatureKind::Lag1,
        FeatureKind::Lag2,
        FeatureKind::ZScore,
        FeatureKind::RollingStd,
        FeatureKind::RollingMin,
        FeatureKind::RollingMax,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            FeatureKind::ChangeRaw => "changeraw",
            FeatureKind::ChangePct => "changepct",
            FeatureKind::RollingMean => "rollingmean",
            FeatureKind::Lag1 => "lag1",
            FeatureKind::Lag2 => "lag2",
            FeatureKind::ZScore => "zscore",
            FeatureKind::RollingStd => "rollingstd",
            FeatureKind::RollingMin => "rollingmin",
            FeatureKind::RollingMax => "rollingmax",
        }
    }

    /// Column suffix (without the leading underscore) for this transform.
    pub fn suffix(&self, window: usize, unit: &str) -> String {
        match self {
            FeatureKind::ChangeRaw => format!("chraw1{unit}"),
            FeatureKind::ChangePct => format!("chpct1{unit}"),
            FeatureKind::RollingMean => format!("ma{window}{unit}"),
            FeatureKind::Lag1 => format!("lag1{unit}"),
            FeatureKind::Lag2 => format!("lag2{unit}"),
            FeatureKind::ZScore => format!("zscore{unit}"),
            FeatureKind::RollingStd => format!("std{window}{unit}"),
            FeatureKind::RollingMin => format!("min{window}{unit}"),
            FeatureKind::RollingMax => format!("max{window}{unit}"),
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for FeatureKind {
    type Err = MacroError;

    fn from_str(s: &str) -> Result<Self> {
        let tag = s.trim().to_lowercase();
        FeatureKind::ALL
            .into_iter()
            .find(|k| k.tag() == tag)
            .ok_or_else(|| MacroError::invalid_input(format!("unknown feature tag '{s}'")))
    }
}

/// `{base}_{suffix}`.
pub fn feature_column_name(base: &str, suffix: &str) -> String {
    format!("{base}_{suffix}")
}

/// Name of the first difference of the rolling-mean column.
pub fn rolling_mean_change_suffix(window: usize, unit: &str) -> String {
    format!("{}_chg{unit}", FeatureKind::RollingMean.suffix(window, unit))
}

/// Immutable feature request: which transforms, the rolling window, and the
/// time-unit label used in output column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    kinds: Vec<FeatureKind>,
    window: usize,
    time_unit: String,
    ignored: Vec<String>,
}

impl FeatureSpec {
    pub const DEFAULT_WINDOW: usize = 3;
    pub const DEFAULT_TIME_UNIT: &'static str = "D";

    /// Parse a tag list. Unrecognised tags are skipped and kept in
    /// [`FeatureSpec::ignored`]; duplicates collapse. A zero window is rejected.
    pub fn new<S: AsRef<str>>(
        window: usize,
        tags: impl IntoIterator<Item = S>,
        time_unit: impl Into<String>,
    ) -> Result<Self> {
        if window == 0 {
            return Err(MacroError::invalid_input(
                "rolling window must be a positive integer",
            ));
        }
        let mut kinds = Vec::new();
        let mut ignored = Vec::new();
        for tag in tags {
            let tag = tag.as_ref();
            match tag.parse::<FeatureKind>() {
                Ok(kind) => {
                    if !kinds.contains(&kind) {
                        kinds.push(kind);
                    }
                }
                Err(_) => {
                    tracing::warn!(tag, "Ignoring unknown feature tag");
                    ignored.push(tag.to_string());
                }
            }
        }
        kinds.sort();
        Ok(Self {
            kinds,
            window,
            time_unit: time_unit.into(),
            ignored,
        })
    }

    /// The transforms to run, in emission order.
    pub fn kinds(&self) -> &[FeatureKind] {
        &self.kinds
    }

    pub fn contains(&self, kind: FeatureKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn time_unit(&self) -> &str {
        &self.time_unit
    }

    /// Tags that were requested but are not part of the vocabulary.
    pub fn ignored(&self) -> &[String] {
        &self.ignored
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn suffix(&self, kind: FeatureKind) -> String {
        kind.suffix(self.window, &self.time_unit)
    }
}

impl Default for FeatureSpec {
    fn default() -> Self {
        Self {
            kinds: vec![
                FeatureKind::ChangeRaw,
                FeatureKind::ChangePct,
                FeatureKind::RollingMean,
                FeatureKind::Lag1,
                FeatureKind::Lag2,
                FeatureKind::ZScore,
            ],
            window: Self::DEFAULT_WINDOW,
            time_unit: Self::DEFAULT_TIME_UNIT.to_string(),
            ignored: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffixes() {
        assert_eq!(FeatureKind::ChangeRaw.suffix(3, "D"), "chraw1D");
        assert_eq!(FeatureKind::ChangePct.suffix(3, "YE"), "chpct1YE");
        assert_eq!(FeatureKind::RollingMean.suffix(3, "D"), "ma3D");
        assert_eq!(FeatureKind::RollingStd.suffix(5, "M"), "std5M");
        assert_eq!(FeatureKind::Lag2.suffix(5, "D"), "lag2D");
        assert_eq!(rolling_mean_change_suffix(2, "D"), "ma2D_chgD");
        assert_eq!(feature_column_name("X", "zscoreD"), "X_zscoreD");
    }

    #[test]
    fn test_unknown_tags_are_recorded() {
        let spec = FeatureSpec::new(3, ["changepct", "log", "ZScore", "bogus"], "YE").unwrap();
        assert_eq!(spec.kinds(), &[FeatureKind::ChangePct, FeatureKind::ZScore]);
        assert_eq!(spec.ignored(), &["log".to_string(), "bogus".to_string()]);
    }

    #[test]
    fn test_kinds_follow_emission_order() {
        let spec = FeatureSpec::new(2, ["rollingmax", "lag1", "changeraw", "lag1"], "D").unwrap();
        assert_eq!(
            spec.kinds(),
            &[FeatureKind::ChangeRaw, FeatureKind::Lag1, FeatureKind::RollingMax]
        );
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = FeatureSpec::new(0, ["changeraw"], "D").unwrap_err();
        assert!(matches!(err, MacroError::InvalidInput(_)));
    }

    #[test]
    fn test_default_matches_generator_defaults() {
        let spec = FeatureSpec::default();
        assert_eq!(spec.window(), 3);
        assert_eq!(spec.time_unit(), "D");
        assert!(!spec.contains(FeatureKind::RollingStd));
        assert!(spec.contains(FeatureKind::ZScore));
    }
}
