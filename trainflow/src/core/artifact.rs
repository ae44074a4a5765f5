//! Artifacts handed from one stage to the next.
//!
//! Each artifact is produced by exactly one stage and consumed by the next.
//! Fields are private and exposed through getters so an artifact cannot be
//! edited after the stage that built it returns.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output of the ingestion stage: where the train and test splits live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionArtifact {
    train_path: PathBuf,
    test_path: PathBuf,
}

impl IngestionArtifact {
    /// Creates a new ingestion artifact.
    #[must_use]
    pub fn new(train_path: impl Into<PathBuf>, test_path: impl Into<PathBuf>) -> Self {
        Self {
            train_path: train_path.into(),
            test_path: test_path.into(),
        }
    }

    /// Path of the persisted training table.
    #[must_use]
    pub fn train_path(&self) -> &Path {
        &self.train_path
    }

    /// Path of the persisted test table.
    #[must_use]
    pub fn test_path(&self) -> &Path {
        &self.test_path
    }
}

/// Output of the validation stage.
///
/// `passed` is derived from `message`: the artifact passes exactly when no
/// check appended a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationArtifact {
    passed: bool,
    message: String,
    report_path: PathBuf,
}

impl ValidationArtifact {
    /// Creates a validation artifact from the accumulated failure message.
    #[must_use]
    pub fn new(message: impl Into<String>, report_path: impl Into<PathBuf>) -> Self {
        let message = message.into();
        Self {
            passed: message.is_empty(),
            message,
            report_path: report_path.into(),
        }
    }

    /// Whether every schema check succeeded.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Accumulated failure lines; empty when the validation passed.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Path of the written validation report.
    #[must_use]
    pub fn report_path(&self) -> &Path {
        &self.report_path
    }
}

/// Output of the transformation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationArtifact {
    preprocessor_path: PathBuf,
    train_array_path: PathBuf,
    test_array_path: PathBuf,
}

impl TransformationArtifact {
    /// Creates a new transformation artifact.
    #[must_use]
    pub fn new(
        preprocessor_path: impl Into<PathBuf>,
        train_array_path: impl Into<PathBuf>,
        test_array_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            preprocessor_path: preprocessor_path.into(),
            train_array_path: train_array_path.into(),
            test_array_path: test_array_path.into(),
        }
    }

    /// Path of the fitted preprocessor.
    #[must_use]
    pub fn preprocessor_path(&self) -> &Path {
        &self.preprocessor_path
    }

    /// Path of the transformed training matrix (label in the last column).
    #[must_use]
    pub fn train_array_path(&self) -> &Path {
        &self.train_array_path
    }

    /// Path of the transformed test matrix (label in the last column).
    #[must_use]
    pub fn test_array_path(&self) -> &Path {
        &self.test_array_path
    }
}

/// Classification scores computed on the held-out test matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ClassificationMetrics {
    /// Fraction of correct predictions.
    pub accuracy: f64,
    /// Precision for the positive label.
    pub precision: f64,
    /// Recall for the positive label.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
}

/// Output of the training stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingArtifact {
    model_path: PathBuf,
    metrics: ClassificationMetrics,
}

impl TrainingArtifact {
    /// Creates a new training artifact.
    #[must_use]
    pub fn new(model_path: impl Into<PathBuf>, metrics: ClassificationMetrics) -> Self {
        Self {
            model_path: model_path.into(),
            metrics,
        }
    }

    /// Path of the persisted model bundle.
    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Test-set metrics of the trained model.
    #[must_use]
    pub fn metrics(&self) -> ClassificationMetrics {
        self.metrics
    }
}
