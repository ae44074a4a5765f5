//! Ingestion: export the collection, snapshot it and split it.

use super::{run_blocking, Stage};
use crate::config::DataIngestionConfig;
use crate::context::{ExecutionContext, StageContext};
use crate::core::{IngestionArtifact, StageKind};
use crate::data::{train_test_split, write_csv, RecordSource};
use crate::errors::{PipelineError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Pulls one collection from a [`RecordSource`] and writes the feature-store
/// snapshot plus the train/test split.
#[derive(Clone)]
pub struct DataIngestion {
    config: DataIngestionConfig,
    source: Arc<dyn RecordSource>,
}

impl DataIngestion {
    #[must_use]
    pub fn new(config: DataIngestionConfig, source: Arc<dyn RecordSource>) -> Self {
        Self { config, source }
    }

    #[must_use]
    pub fn config(&self) -> &DataIngestionConfig {
        &self.config
    }

    /// Runs the stage. Single attempt; a source failure is not retried.
    pub fn run(&self) -> Result<IngestionArtifact> {
        let config = &self.config;
        let mut table = self.source.fetch(&config.collection_name)?;
        if table.is_empty() {
            return Err(PipelineError::data(format!(
                "collection '{}' has no records",
                config.collection_name
            )));
        }

        if table.drop_column(&config.id_column) {
            tracing::debug!(column = %config.id_column, "Dropped identifier column");
        }
        let normalized = table.replace_sentinel(&config.missing_sentinel);
        if normalized > 0 {
            tracing::debug!(
                cells = normalized,
                sentinel = %config.missing_sentinel,
                "Normalized sentinel values to missing"
            );
        }

        write_csv(&config.feature_store_file_path, &table)?;
        tracing::info!(
            path = %config.feature_store_file_path.display(),
            rows = table.n_rows(),
            "Wrote feature store snapshot"
        );

        let (train, test) = train_test_split(&table, config.train_test_split_ratio, config.split_seed);
        write_csv(&config.train_file_path, &train)?;
        write_csv(&config.test_file_path, &test)?;
        tracing::info!(
            train_rows = train.n_rows(),
            test_rows = test.n_rows(),
            "Wrote train/test split"
        );

        Ok(IngestionArtifact::new(
            config.train_file_path.clone(),
            config.test_file_path.clone(),
        ))
    }
}

impl std::fmt::Debug for DataIngestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataIngestion")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for DataIngestion {
    type Input = ();
    type Output = IngestionArtifact;

    fn kind(&self) -> StageKind {
        StageKind::Ingestion
    }

    async fn execute(&self, ctx: &StageContext, _input: ()) -> Result<IngestionArtifact> {
        let stage = self.clone();
        let artifact = run_blocking(move || stage.run()).await?;
        ctx.try_emit_event(
            "ingestion.split_written",
            Some(serde_json::json!({
                "train_path": artifact.train_path().display().to_string(),
                "test_path": artifact.test_path().display().to_string(),
            })),
        );
        Ok(artifact)
    }
}
