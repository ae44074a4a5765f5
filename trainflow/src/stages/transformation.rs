//! Transformation: engineer, scale and rebalance the ingested tables.

use super::{run_blocking, Stage};
use crate::config::{DataTransformationConfig, SchemaDeclaration};
use crate::context::{ExecutionContext, StageContext};
use crate::core::{IngestionArtifact, StageKind, TransformationArtifact, ValidationArtifact};
use crate::data::{append_label_column, read_csv, save_array, Cell, Table};
use crate::errors::{PipelineError, Result};
use crate::ml::{class_counts, Preprocessor, Resampler, SmoteEnn};
use async_trait::async_trait;
use ndarray::{Array1, Array2};
use std::sync::Arc;

/// Artifacts consumed by [`DataTransformation`].
#[derive(Debug, Clone)]
pub struct TransformationInput {
    /// Where the raw splits live.
    pub ingestion: IngestionArtifact,
    /// Gate: the stage refuses to run unless this passed.
    pub validation: ValidationArtifact,
}

/// Fits the preprocessor on the training table, applies it to both tables,
/// rebalances each split and persists the matrices and the preprocessor.
#[derive(Clone)]
pub struct DataTransformation {
    config: DataTransformationConfig,
    schema: Arc<SchemaDeclaration>,
    resampler: Option<Arc<dyn Resampler>>,
}

impl DataTransformation {
    /// Creates the stage with the resampler described by the configuration.
    #[must_use]
    pub fn new(config: DataTransformationConfig, schema: Arc<SchemaDeclaration>) -> Self {
        let resampling = &config.options.resampling;
        let resampler: Option<Arc<dyn Resampler>> = resampling
            .enabled
            .then(|| Arc::new(SmoteEnn::new(resampling.params.clone())) as Arc<dyn Resampler>);
        Self {
            config,
            schema,
            resampler,
        }
    }

    /// Replaces the resampler; `None` keeps the transformed splits as they are.
    #[must_use]
    pub fn with_resampler(mut self, resampler: Option<Arc<dyn Resampler>>) -> Self {
        self.resampler = resampler;
        self
    }

    #[must_use]
    pub fn config(&self) -> &DataTransformationConfig {
        &self.config
    }

    /// Removes the target column and returns it as labels.
    fn take_labels(&self, table: &mut Table) -> Result<Array1<f64>> {
        let target = &self.config.options.target_column;
        let cells = table
            .take_column(target)
            .ok_or_else(|| PipelineError::data(format!("target column '{target}' is missing")))?;
        cells
            .iter()
            .enumerate()
            .map(|(row, cell)| match cell {
                Cell::Number(n) => Ok(*n),
                other => Err(PipelineError::data(format!(
                    "target column '{target}' holds {other:?} at row {row}"
                ))),
            })
            .collect()
    }

    fn rebalance(
        &self,
        split: &str,
        x: Array2<f64>,
        y: Array1<f64>,
    ) -> Result<(Array2<f64>, Array1<f64>)> {
        let Some(resampler) = &self.resampler else {
            return Ok((x, y));
        };
        let before = class_counts(y.view());
        let (x, y) = resampler.fit_resample(x.view(), y.view())?;
        tracing::info!(
            split,
            before = ?before,
            after = ?class_counts(y.view()),
            "Rebalanced classes"
        );
        Ok((x, y))
    }

    /// Runs the stage.
    ///
    /// Returns [`PipelineError::PreconditionFailed`] without touching the
    /// filesystem when validation did not pass.
    pub fn run(&self, input: &TransformationInput) -> Result<TransformationArtifact> {
        if !input.validation.passed() {
            return Err(PipelineError::PreconditionFailed(format!(
                "data validation did not pass: {}",
                input.validation.message().trim()
            )));
        }

        let mut train = read_csv(input.ingestion.train_path())?;
        let mut test = read_csv(input.ingestion.test_path())?;
        let y_train = self.take_labels(&mut train)?;
        let y_test = self.take_labels(&mut test)?;

        let (preprocessor, x_train) =
            Preprocessor::fit_transform(&train, &self.schema, &self.config.options)?;
        let x_test = preprocessor.transform(&test)?;
        tracing::info!(
            features = ?preprocessor.output_columns(),
            "Fitted preprocessor on training data"
        );

        // The test split is rebalanced on its own, with no train rows involved.
        let (x_train, y_train) = self.rebalance("train", x_train, y_train)?;
        let (x_test, y_test) = self.rebalance("test", x_test, y_test)?;

        let train_arr = append_label_column(x_train.view(), &y_train)?;
        let test_arr = append_label_column(x_test.view(), &y_test)?;

        let config = &self.config;
        preprocessor.save(&config.transformed_object_file_path)?;
        save_array(&config.transformed_train_file_path, &train_arr)?;
        save_array(&config.transformed_test_file_path, &test_arr)?;
        tracing::info!(
            train_shape = ?train_arr.shape(),
            test_shape = ?test_arr.shape(),
            "Saved transformed arrays"
        );

        Ok(TransformationArtifact::new(
            config.transformed_object_file_path.clone(),
            config.transformed_train_file_path.clone(),
            config.transformed_test_file_path.clone(),
        ))
    }
}

impl std::fmt::Debug for DataTransformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTransformation")
            .field("config", &self.config)
            .field("resampling", &self.resampler.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for DataTransformation {
    type Input = TransformationInput;
    type Output = TransformationArtifact;

    fn kind(&self) -> StageKind {
        StageKind::Transformation
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        input: TransformationInput,
    ) -> Result<TransformationArtifact> {
        let stage = self.clone();
        let artifact = run_blocking(move || stage.run(&input)).await?;
        ctx.try_emit_event(
            "transformation.arrays_written",
            Some(serde_json::json!({
                "train_array_path": artifact.train_array_path().display().to_string(),
                "test_array_path": artifact.test_array_path().display().to_string(),
            })),
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{schema, stage_ctx, vehicle_table};
    use super::*;
    use crate::config::{TransformationSettings, TrainingPipelineConfig, PipelineSettings};
    use crate::data::{load_array, split_label_column, write_csv};
    use crate::ml::SmoteEnnParams;
    use chrono::{Local, TimeZone};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn config(root: &Path, options: TransformationSettings) -> DataTransformationConfig {
        let settings = PipelineSettings {
            artifact_root: root.join("artifact"),
            transformation: options,
            ..PipelineSettings::default()
        };
        let started = Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        DataTransformationConfig::new(&TrainingPipelineConfig::new(&settings, &started), &settings)
    }

    fn seeded_options() -> TransformationSettings {
        let mut options = TransformationSettings::default();
        options.resampling.params = SmoteEnnParams {
            seed: Some(5),
            ..SmoteEnnParams::default()
        };
        options
    }

    fn input(root: &Path, passed: bool) -> TransformationInput {
        let train_path = root.join("ingested/train.csv");
        let test_path = root.join("ingested/test.csv");
        write_csv(&train_path, &vehicle_table(60)).unwrap();
        write_csv(&test_path, &vehicle_table(21)).unwrap();
        let message = if passed { "" } else { "Columns are not valid in train data, missing: Gender.\n" };
        TransformationInput {
            ingestion: IngestionArtifact::new(train_path, test_path),
            validation: ValidationArtifact::new(message, root.join("report.json")),
        }
    }

    fn files_under(dir: &Path) -> usize {
        if !dir.exists() {
            return 0;
        }
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    files_under(&path)
                } else {
                    1
                }
            })
            .sum()
    }

    #[tokio::test]
    async fn test_transformation_writes_arrays_and_preprocessor() {
        let dir = tempfile::tempdir().unwrap();
        let stage = DataTransformation::new(config(dir.path(), seeded_options()), schema());
        let (ctx, sink) = stage_ctx(StageKind::Transformation);

        let artifact = stage.execute(&ctx, input(dir.path(), true)).await.unwrap();

        let preprocessor = Preprocessor::load(artifact.preprocessor_path()).unwrap();
        let width = preprocessor.output_columns().len();
        assert_eq!(
            preprocessor.output_columns(),
            [
                "Age",
                "Annual_Premium",
                "Gender",
                "Vehicle_Age_lt_1_Year",
                "Vehicle_Age_gt_2_Year",
                "Vehicle_Damage_Yes"
            ]
        );

        let train = load_array(artifact.train_array_path()).unwrap();
        let test = load_array(artifact.test_array_path()).unwrap();
        assert_eq!(train.ncols(), width + 1);
        assert_eq!(test.ncols(), width + 1);

        let (_, y_train) = split_label_column(&train).unwrap();
        assert!(y_train.iter().all(|&y| y == 0.0 || y == 1.0));
        assert_eq!(sink.event_types(), vec!["transformation.arrays_written"]);
    }

    #[test]
    fn test_failed_validation_blocks_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let stage = DataTransformation::new(config(dir.path(), seeded_options()), schema());

        let err = stage.run(&input(dir.path(), false)).unwrap_err();

        assert!(matches!(err, PipelineError::PreconditionFailed(_)));
        assert!(err.to_string().contains("Gender"));
        assert_eq!(files_under(&stage.config().data_transformation_dir), 0);
        assert!(!dir.path().join("artifact").exists());
    }

    #[test]
    fn test_without_resampling_rows_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let stage = DataTransformation::new(config(dir.path(), seeded_options()), schema())
            .with_resampler(None);

        let artifact = stage.run(&input(dir.path(), true)).unwrap();

        let train = load_array(artifact.train_array_path()).unwrap();
        let test = load_array(artifact.test_array_path()).unwrap();
        assert_eq!(train.nrows(), 60);
        assert_eq!(test.nrows(), 21);
        // Standard-scaled Age has zero mean on the training split.
        assert!(train.column(0).mean().unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_seeded_transformation_is_deterministic() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let a = DataTransformation::new(config(first.path(), seeded_options()), schema())
            .run(&input(first.path(), true))
            .unwrap();
        let b = DataTransformation::new(config(second.path(), seeded_options()), schema())
            .run(&input(second.path(), true))
            .unwrap();

        assert_eq!(
            Preprocessor::load(a.preprocessor_path()).unwrap(),
            Preprocessor::load(b.preprocessor_path()).unwrap()
        );
        assert_eq!(
            load_array(a.train_array_path()).unwrap(),
            load_array(b.train_array_path()).unwrap()
        );
    }

    #[test]
    fn test_non_numeric_target_is_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let stage = DataTransformation::new(config(dir.path(), seeded_options()), schema());
        let input = input(dir.path(), true);
        let mut train = vehicle_table(10);
        train
            .map_column("Response", |_| Ok(Cell::text("yes")))
            .unwrap();
        write_csv(input.ingestion.train_path(), &train).unwrap();

        let err = stage.run(&input).unwrap_err();
        assert!(matches!(err, PipelineError::Data(_)));
    }
}
