//! Numerical collaborators of the pipeline.
//!
//! Each piece sits behind a narrow seam ([`Resampler`], [`Classifier`]) or is a
//! plain fitted value that serializes to JSON:
//! - [`FeatureEngineer`] and [`ColumnTransformer`], combined in [`Preprocessor`]
//! - [`SmoteEnn`] class rebalancing over a [`KdTree`]
//! - [`RandomForest`] of CART trees
//! - [`ModelBundle`], the deployable preprocessor + model pair

mod bundle;
mod engineer;
mod forest;
mod metrics;
mod neighbors;
mod resample;
mod scaler;

pub use bundle::{ModelBundle, Preprocessor};
pub use engineer::{EngineeredFeatures, FeatureEngineer, OneHotEncoding};
pub use forest::{Classifier, DecisionTree, ForestParams, RandomForest, SplitCriterion};
pub use metrics::{accuracy, classification_metrics, POSITIVE_LABEL};
pub use neighbors::{KdTree, Neighbor};
pub use resample::{class_counts, Resampler, SmoteEnn, SmoteEnnParams};
pub use scaler::{ColumnTransformer, MinMaxScaler, StandardScaler};
