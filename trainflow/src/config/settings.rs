//! Layered pipeline settings.
//!
//! Uses `figment`: built-in defaults, then an optional TOML file, then
//! `TRAINFLOW_`-prefixed environment variables (`__` separates nested keys,
//! e.g. `TRAINFLOW_TRAINER__EXPECTED_ACCURACY=0.7`).

use crate::errors::{PipelineError, Result};
use crate::ml::{ForestParams, SmoteEnnParams};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "TRAINFLOW_";

/// Top-level settings for one pipeline process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Optional pipeline name, recorded in events and the run summary.
    pub pipeline_name: String,
    /// Root directory under which timestamped run directories are created.
    pub artifact_root: PathBuf,
    /// Location of the schema declaration YAML.
    pub schema_path: PathBuf,
    /// Document store location (`TRAINFLOW_DATABASE_URL`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Ingestion stage settings.
    pub ingestion: IngestionSettings,
    /// Transformation stage settings.
    pub transformation: TransformationSettings,
    /// Training stage settings.
    pub trainer: TrainerSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            pipeline_name: String::new(),
            artifact_root: PathBuf::from("artifact"),
            schema_path: PathBuf::from("config").join("schema.yaml"),
            database_url: None,
            ingestion: IngestionSettings::default(),
            transformation: TransformationSettings::default(),
            trainer: TrainerSettings::default(),
        }
    }
}

impl PipelineSettings {
    /// Returns the database URL or a configuration error naming the variable.
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                PipelineError::Configuration(format!(
                    "{ENV_PREFIX}DATABASE_URL is not set as an environment variable"
                ))
            })
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let ratio = self.ingestion.test_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(PipelineError::Configuration(format!(
                "ingestion.test_ratio must be in (0, 1), got {ratio}"
            )));
        }
        if !(0.0..=1.0).contains(&self.trainer.expected_accuracy) {
            return Err(PipelineError::Configuration(format!(
                "trainer.expected_accuracy must be in [0, 1], got {}",
                self.trainer.expected_accuracy
            )));
        }
        if self.trainer.forest.n_estimators == 0 {
            return Err(PipelineError::Configuration(
                "trainer.forest.n_estimators must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Ingestion stage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    /// Collection exported from the document store.
    pub collection_name: String,
    /// Share of rows assigned to the test split.
    pub test_ratio: f64,
    /// Seed for the split; unseeded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_seed: Option<u64>,
    /// Identifier column dropped right after the export.
    pub id_column: String,
    /// Placeholder string normalized to a missing value.
    pub missing_sentinel: String,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            collection_name: "Project1_Data".to_string(),
            test_ratio: 0.25,
            split_seed: None,
            id_column: "id".to_string(),
            missing_sentinel: "na".to_string(),
        }
    }
}

/// Two-valued categorical column mapped onto `{0, 1}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryMapping {
    /// Column to map.
    pub column: String,
    /// Value mapped to 1.
    pub positive: String,
    /// Value mapped to 0.
    pub negative: String,
}

impl Default for BinaryMapping {
    fn default() -> Self {
        Self {
            column: "Gender".to_string(),
            positive: "Male".to_string(),
            negative: "Female".to_string(),
        }
    }
}

/// Transformation stage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformationSettings {
    /// Label column, split off before feature engineering.
    pub target_column: String,
    /// Binary categorical mapping applied first.
    pub binary_mapping: BinaryMapping,
    /// Renames applied to generated dummy columns.
    pub renames: BTreeMap<String, String>,
    /// Class rebalancing applied to both transformed splits.
    pub resampling: ResamplingSettings,
}

impl Default for TransformationSettings {
    fn default() -> Self {
        let renames = [
            ("Vehicle_Age_< 1 Year", "Vehicle_Age_lt_1_Year"),
            ("Vehicle_Age_> 2 Year", "Vehicle_Age_gt_2_Year"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        Self {
            target_column: "Response".to_string(),
            binary_mapping: BinaryMapping::default(),
            renames,
            resampling: ResamplingSettings::default(),
        }
    }
}

/// Class rebalancing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResamplingSettings {
    /// Disable to keep the transformed splits as they are.
    pub enabled: bool,
    /// SMOTE-ENN parameters.
    #[serde(flatten)]
    pub params: SmoteEnnParams,
}

impl Default for ResamplingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            params: SmoteEnnParams::default(),
        }
    }
}

/// Training stage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSettings {
    /// Minimum training-set accuracy for the model to be persisted.
    pub expected_accuracy: f64,
    /// Random forest hyperparameters.
    pub forest: ForestParams,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            expected_accuracy: 0.6,
            forest: ForestParams::default(),
        }
    }
}

/// Load settings from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `TRAINFLOW_`)
/// 2. The TOML file, when given
/// 3. Built-in defaults
pub fn load_settings(config_file: Option<&Path>) -> Result<PipelineSettings> {
    let mut figment = Figment::from(Serialized::defaults(PipelineSettings::default()));

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(PipelineError::Configuration(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let settings: PipelineSettings = figment.extract()?;
    settings.validate()?;
    Ok(settings)
}
