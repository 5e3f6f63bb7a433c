//! Time-series feature generation over entity-grouped panels.

pub mod generator;
pub mod grouping;
pub mod spec;
pub mod window;

pub use generator::{DATE_FIELD, ENTITY_FIELD, FeatureGenerator};
pub use grouping::RowGroups;
pub use spec::{FeatureKind, FeatureSpec, feature_column_name};
pub use window::RollingStat;
