//! Indicator sources and the long-to-wide reshaping that turns their output
//! into a panel.

pub mod reshape;
pub mod worldbank;

pub use reshape::{merge_all, outer_merge, pivot};
pub use worldbank::WorldBankSource;

use crate::error::Result;
use crate::panel::{Column, Panel};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Field holding the entity code in long-form tables.
pub const SOURCE_ENTITY_FIELD: &str = "countryiso3code";

/// Inclusive period range. Both bounds must be set for the range to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl DateRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }

    /// `start:end` when both bounds are present.
    pub fn as_query(&self) -> Option<String> {
        match (&self.start, &self.end) {
            (Some(s), Some(e)) if !s.is_empty() && !e.is_empty() => Some(format!("{s}:{e}")),
            _ => None,
        }
    }
}

/// One observation of one indicator for one entity and period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Entity code (ISO3 for countries).
    pub entity: String,
    /// Human-readable entity name.
    pub entity_name: String,
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub indicator: String,
}

/// Long-form result for a single indicator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongTable {
    pub indicator: String,
    pub observations: Vec<Observation>,
}

impl LongTable {
    pub fn new(indicator: impl Into<String>) -> Self {
        Self {
            indicator: indicator.into(),
            observations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Raw long-form panel: entity code, entity name, date, value, series.
    pub fn to_panel(&self) -> Result<Panel> {
        let obs = &self.observations;
        Panel::from_columns(vec![
            Column::text(
                SOURCE_ENTITY_FIELD,
                obs.iter().map(|o| Some(o.entity.clone())).collect(),
            ),
            Column::text(
                "country_name",
                obs.iter().map(|o| Some(o.entity_name.clone())).collect(),
            ),
            Column::dates("date", obs.iter().map(|o| Some(o.date)).collect()),
            Column::numeric("value", obs.iter().map(|o| o.value).collect()),
            Column::text(
                "series",
                obs.iter().map(|o| Some(o.indicator.clone())).collect(),
            ),
        ])
    }
}

/// A remote (or local) provider of indicator observations.
#[async_trait]
pub trait IndicatorSource: Send + Sync {
    /// Fetch one indicator for the given entities and range.
    async fn fetch(
        &self,
        indicator: &str,
        entities: &[String],
        range: &DateRange,
    ) -> Result<LongTable>;

    /// Short description for logs.
    fn describe(&self) -> String;
}
