//! The fixed four-stage training pipeline.

use crate::config::{
    DataIngestionConfig, DataTransformationConfig, DataValidationConfig, ModelTrainerConfig,
    PipelineSettings, SchemaDeclaration, TrainingPipelineConfig,
};
use crate::context::{ExecutionContext, RunContext, RunIdentity};
use crate::core::{
    IngestionArtifact, PipelineState, StageEvent, StageKind, TrainingArtifact,
    TransformationArtifact, ValidationArtifact,
};
use crate::data::RecordSource;
use crate::errors::{ErrorInfo, PipelineError, Result};
use crate::events::{EventSink, NoOpEventSink};
use crate::stages::{
    DataIngestion, DataTransformation, DataValidation, ModelTrainer, Stage, StageRecord,
    TransformationInput,
};
use crate::utils::{file_sha256, write_json};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Artifacts produced so far by a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunArtifacts {
    /// Ingestion output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingestion: Option<IngestionArtifact>,
    /// Validation output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationArtifact>,
    /// Transformation output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformation: Option<TransformationArtifact>,
    /// Training output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training: Option<TrainingArtifact>,
}

/// Summary of one run, written to `run_summary.json` in the run directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRunReport {
    /// Run identity.
    pub run: RunIdentity,
    /// Run directory.
    pub artifact_dir: PathBuf,
    /// Final state: `done` or `failed`.
    pub state: PipelineState,
    /// One record per stage, in execution order.
    pub stages: Vec<StageRecord>,
    /// Artifacts of the stages that completed.
    pub artifacts: RunArtifacts,
    /// SHA-256 of every file the run wrote, keyed by path relative to the run
    /// directory.
    pub files: BTreeMap<String, String>,
    /// The error that ended the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    /// Wall-clock duration of the run.
    pub duration_ms: f64,
}

impl PipelineRunReport {
    /// Returns true if every stage completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == PipelineState::Done
    }

    /// The stage that failed, if any.
    #[must_use]
    pub fn failed_stage(&self) -> Option<StageKind> {
        self.stages.iter().find(|r| r.is_failure()).map(|r| r.stage)
    }
}

/// A finished run: its report and its outcome.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Report, also persisted as `run_summary.json`.
    pub report: PipelineRunReport,
    /// The training artifact, or the first stage error wrapped with its stage.
    pub result: Result<TrainingArtifact>,
}

/// State carried through one run.
struct Progress {
    state: PipelineState,
    stages: Vec<StageRecord>,
    artifacts: RunArtifacts,
}

/// Runs ingestion, validation, transformation and training in order.
///
/// Each stage's artifact is handed to the next; the first error moves the
/// run to [`PipelineState::Failed`] and the remaining stages are skipped.
/// There is no resume: every run starts over in a fresh timestamped
/// directory.
pub struct TrainingPipeline {
    settings: PipelineSettings,
    schema: Arc<SchemaDeclaration>,
    source: Arc<dyn RecordSource>,
    event_sink: Arc<dyn EventSink>,
}

impl TrainingPipeline {
    /// Creates a pipeline that discards events.
    #[must_use]
    pub fn new(
        settings: PipelineSettings,
        schema: SchemaDeclaration,
        source: Arc<dyn RecordSource>,
    ) -> Self {
        Self {
            settings,
            schema: Arc::new(schema),
            source,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs the pipeline and returns the training artifact.
    pub async fn run(&self) -> Result<TrainingArtifact> {
        self.run_with_report().await.result
    }

    /// Runs the pipeline in a directory named after the current local time.
    pub async fn run_with_report(&self) -> PipelineOutcome {
        self.run_at(Local::now()).await
    }

    /// Runs the pipeline in the directory for `started_at`.
    pub async fn run_at(&self, started_at: DateTime<Local>) -> PipelineOutcome {
        let timer = Instant::now();
        let run = TrainingPipelineConfig::new(&self.settings, &started_at);
        let identity = RunIdentity::new(run.pipeline_name.clone(), run.timestamp.clone());
        let ctx = Arc::new(RunContext::new(identity.clone()).with_event_sink(self.event_sink.clone()));

        tracing::info!(
            pipeline_run_id = %identity.pipeline_run_id,
            artifact_dir = %run.artifact_dir.display(),
            "Starting training pipeline"
        );
        ctx.emit(&StageEvent::pipeline_started(
            &run.pipeline_name,
            &run.artifact_dir.display().to_string(),
        ));

        let mut progress = Progress {
            state: PipelineState::default(),
            stages: Vec::with_capacity(StageKind::ALL.len()),
            artifacts: RunArtifacts::default(),
        };
        let result = self.run_stages(&run, &ctx, &mut progress).await;
        let duration_ms = timer.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(_) => {
                tracing::info!(duration_ms, "Training pipeline completed");
                ctx.emit(&StageEvent::pipeline_completed(duration_ms));
            }
            Err(err) => {
                for kind in StageKind::ALL {
                    if !progress.stages.iter().any(|r| r.stage == kind) {
                        progress.stages.push(StageRecord::skipped(kind));
                    }
                }
                let stage = err.stage().unwrap_or("pipeline");
                tracing::error!(stage, error = %err, "Training pipeline failed");
                ctx.emit(&StageEvent::pipeline_failed(stage, &err.root().to_string()));
            }
        }

        let report = PipelineRunReport {
            files: digest_files(&run, &self.settings),
            run: identity,
            artifact_dir: run.artifact_dir.clone(),
            state: progress.state,
            stages: progress.stages,
            artifacts: progress.artifacts,
            error: result.as_ref().err().map(PipelineError::info),
            duration_ms,
        };
        if let Err(err) = write_json(&run.summary_path(), &report) {
            tracing::warn!(error = %err, "Could not write run summary");
        }

        PipelineOutcome { report, result }
    }

    async fn run_stages(
        &self,
        run: &TrainingPipelineConfig,
        ctx: &Arc<RunContext>,
        progress: &mut Progress,
    ) -> Result<TrainingArtifact> {
        let ingestion = DataIngestion::new(
            DataIngestionConfig::new(run, &self.settings),
            self.source.clone(),
        );
        let ingested = run_stage(&ingestion, ctx, (), progress).await?;
        progress.artifacts.ingestion = Some(ingested.clone());

        let validation = DataValidation::new(DataValidationConfig::new(run), self.schema.clone());
        let validated = run_stage(&validation, ctx, ingested.clone(), progress).await?;
        progress.artifacts.validation = Some(validated.clone());

        let transformation = DataTransformation::new(
            DataTransformationConfig::new(run, &self.settings),
            self.schema.clone(),
        );
        let input = TransformationInput {
            ingestion: ingested,
            validation: validated,
        };
        let transformed = run_stage(&transformation, ctx, input, progress).await?;
        progress.artifacts.transformation = Some(transformed.clone());

        let trainer = ModelTrainer::new(ModelTrainerConfig::new(run, &self.settings));
        let trained = run_stage(&trainer, ctx, transformed, progress).await?;
        progress.artifacts.training = Some(trained.clone());

        Ok(trained)
    }
}

impl std::fmt::Debug for TrainingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingPipeline")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Executes one stage with lifecycle events, timing and error wrapping.
async fn run_stage<S: Stage>(
    stage: &S,
    run_ctx: &Arc<RunContext>,
    input: S::Input,
    progress: &mut Progress,
) -> Result<S::Output> {
    let kind = stage.kind();
    let ctx = run_ctx.for_stage(kind);
    progress.state = kind.running_state();

    let started_at = Utc::now();
    let timer = Instant::now();
    tracing::info!(stage = stage.name(), "Stage started");
    ctx.emit(&StageEvent::started(stage.name()));

    match stage.execute(&ctx, input).await {
        Ok(output) => {
            let duration_ms = timer.elapsed().as_secs_f64() * 1000.0;
            tracing::info!(stage = stage.name(), duration_ms, "Stage completed");
            ctx.emit(&StageEvent::completed(stage.name(), duration_ms));
            progress.stages.push(StageRecord::completed(kind, started_at));
            progress.state = progress.state.advance();
            Ok(output)
        }
        Err(err) => {
            let err = err.in_stage(stage.name());
            tracing::error!(stage = stage.name(), error = %err.root(), code = err.code(), "Stage failed");
            ctx.emit(&StageEvent::failed(stage.name(), &err.root().to_string()));
            progress.stages.push(StageRecord::failed(kind, started_at, &err));
            progress.state = progress.state.fail();
            Err(err)
        }
    }
}

/// Digests every known output file of the run that exists on disk.
fn digest_files(run: &TrainingPipelineConfig, settings: &PipelineSettings) -> BTreeMap<String, String> {
    let ingestion = DataIngestionConfig::new(run, settings);
    let validation = DataValidationConfig::new(run);
    let transformation = DataTransformationConfig::new(run, settings);
    let trainer = ModelTrainerConfig::new(run, settings);
    let paths = [
        ingestion.feature_store_file_path,
        ingestion.train_file_path,
        ingestion.test_file_path,
        validation.validation_report_file_path,
        transformation.transformed_object_file_path,
        transformation.transformed_train_file_path,
        transformation.transformed_test_file_path,
        trainer.trained_model_file_path,
    ];

    let mut files = BTreeMap::new();
    for path in paths.iter().filter(|p| p.is_file()) {
        match file_sha256(path) {
            Ok(digest) => {
                files.insert(relative_key(&run.artifact_dir, path), digest);
            }
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "Could not digest file"),
        }
    }
    files
}

fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
