//! Error types for the trainflow pipeline.
//!
//! Every failure a stage can raise maps onto one variant of [`PipelineError`].
//! Schema mismatches are deliberately absent: the validation stage reports
//! them as data on its artifact instead of raising.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The record source could not be reached or is misconfigured.
    #[error("Record source unavailable: {0}")]
    SourceUnavailable(String),

    /// A filesystem read or write failed.
    #[error("IO failure on {path}: {source}")]
    Io {
        /// The path being read or written.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Transformation was invoked with a failed validation artifact.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// The trained model did not reach the configured accuracy floor.
    #[error("Model accuracy {accuracy:.4} is below the expected accuracy {expected:.4}")]
    AccuracyBelowThreshold {
        /// Measured resubstitution accuracy.
        accuracy: f64,
        /// Configured minimum.
        expected: f64,
    },

    /// A required configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Table or array contents could not be processed.
    #[error("Data error: {0}")]
    Data(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stage task stopped before producing a result.
    #[error("Stage task cancelled: {0}")]
    Cancelled(String),

    /// A stage-local error wrapped with its originating stage.
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        /// The stage that raised the error.
        stage: String,
        /// The underlying error.
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Creates an IO failure bound to a path.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Creates a data error.
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data(message.into())
    }

    /// Wraps this error with the name of the stage it came from.
    ///
    /// Already wrapped errors are returned unchanged so the innermost stage
    /// name wins.
    #[must_use]
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        match self {
            wrapped @ Self::Stage { .. } => wrapped,
            other => Self::Stage {
                stage: stage.into(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the originating stage, if the error has been wrapped.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Returns the innermost, unwrapped error.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns a stable error code for the root cause.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self.root() {
            Self::SourceUnavailable(_) => "PIPELINE-SOURCE-UNAVAILABLE",
            Self::Io { .. } => "PIPELINE-IO",
            Self::PreconditionFailed(_) => "PIPELINE-PRECONDITION",
            Self::AccuracyBelowThreshold { .. } => "PIPELINE-ACCURACY",
            Self::Configuration(_) => "PIPELINE-CONFIG",
            Self::Data(_) => "PIPELINE-DATA",
            Self::Serialization(_) => "PIPELINE-SERDE",
            Self::Cancelled(_) => "PIPELINE-CANCELLED",
            Self::Stage { .. } => "PIPELINE-STAGE",
        }
    }

    /// Builds the structured description used in run reports.
    #[must_use]
    pub fn info(&self) -> ErrorInfo {
        let mut info = ErrorInfo::new(self.code(), self.root().to_string());
        if let Some(stage) = self.stage() {
            info = info.with_context_entry("stage", stage);
        }
        if let Some(hint) = ErrorInfo::suggestion(self.code()) {
            info = info.with_fix_hint(hint);
        }
        info
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        Self::SourceUnavailable(err.to_string())
    }
}

impl From<figment::Error> for PipelineError {
    fn from(err: figment::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Structured error metadata for diagnostics and run reports.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ErrorInfo {
    /// Error code (e.g., "PIPELINE-ACCURACY").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn suggestion(code: &str) -> Option<&'static str> {
        match code {
            "PIPELINE-SOURCE-UNAVAILABLE" => Some(
                "Check that TRAINFLOW_DATABASE_URL points at a readable document store.",
            ),
            "PIPELINE-PRECONDITION" => Some(
                "Inspect data_validation/report.json; the ingested tables do not match the schema.",
            ),
            "PIPELINE-ACCURACY" => Some(
                "Lower trainer.expected_accuracy or revisit the forest hyperparameters.",
            ),
            "PIPELINE-CONFIG" => Some("Set the missing setting in the config file or environment."),
            _ => None,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("summary".to_string(), serde_json::json!(self.summary));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        if !self.context.is_empty() {
            map.insert("context".to_string(), serde_json::json!(self.context));
        }
        map
    }
}
