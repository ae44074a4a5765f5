//! Training: fit the forest, score it and persist the model bundle.

use super::{run_blocking, Stage};
use crate::config::ModelTrainerConfig;
use crate::context::{ExecutionContext, StageContext};
use crate::core::{StageKind, TrainingArtifact, TransformationArtifact};
use crate::data::{load_array, split_label_column};
use crate::errors::{PipelineError, Result};
use crate::ml::{accuracy, classification_metrics, Classifier, ModelBundle, Preprocessor, RandomForest};
use async_trait::async_trait;

/// Fits a [`RandomForest`] on the transformed training matrix and bundles it
/// with the fitted preprocessor.
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: ModelTrainerConfig,
}

impl ModelTrainer {
    #[must_use]
    pub fn new(config: ModelTrainerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ModelTrainerConfig {
        &self.config
    }

    /// Runs the stage.
    ///
    /// The accuracy gate uses resubstitution accuracy on the training matrix;
    /// the reported metrics come from the test matrix. No bundle is written
    /// when the gate fails.
    pub fn run(&self, transformation: &TransformationArtifact) -> Result<TrainingArtifact> {
        let train = load_array(transformation.train_array_path())?;
        let test = load_array(transformation.test_array_path())?;
        let (x_train, y_train) = split_label_column(&train)?;
        let (x_test, y_test) = split_label_column(&test)?;

        let model = RandomForest::fit(self.config.forest.clone(), x_train.view(), y_train.view())?;

        let y_pred = model.predict(x_test.view())?;
        let metrics = classification_metrics(y_test.view(), y_pred.view());
        tracing::info!(
            accuracy = metrics.accuracy,
            precision = metrics.precision,
            recall = metrics.recall,
            f1 = metrics.f1,
            "Scored model on test data"
        );

        let train_accuracy = accuracy(y_train.view(), model.predict(x_train.view())?.view());
        if train_accuracy < self.config.expected_accuracy {
            tracing::warn!(
                train_accuracy,
                expected = self.config.expected_accuracy,
                "Model is below the expected accuracy; not saving it"
            );
            return Err(PipelineError::AccuracyBelowThreshold {
                accuracy: train_accuracy,
                expected: self.config.expected_accuracy,
            });
        }

        let preprocessor = Preprocessor::load(transformation.preprocessor_path())?;
        let bundle = ModelBundle::new(preprocessor, model);
        bundle.save(&self.config.trained_model_file_path)?;
        tracing::info!(
            path = %self.config.trained_model_file_path.display(),
            train_accuracy,
            "Saved model bundle"
        );

        Ok(TrainingArtifact::new(
            self.config.trained_model_file_path.clone(),
            metrics,
        ))
    }
}

#[async_trait]
impl Stage for ModelTrainer {
    type Input = TransformationArtifact;
    type Output = TrainingArtifact;

    fn kind(&self) -> StageKind {
        StageKind::Training
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        input: TransformationArtifact,
    ) -> Result<TrainingArtifact> {
        let stage = self.clone();
        let artifact = run_blocking(move || stage.run(&input)).await?;
        ctx.try_emit_event(
            "training.model_saved",
            Some(serde_json::json!({
                "model_path": artifact.model_path().display().to_string(),
                "metrics": artifact.metrics(),
            })),
        );
        Ok(artifact)
    }
}
