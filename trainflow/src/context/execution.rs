//! Execution contexts for pipeline and stage execution.

use super::RunIdentity;
use crate::core::{StageEvent, StageKind};
use crate::events::{EventSink, NoOpEventSink};
use std::sync::Arc;
use uuid::Uuid;

/// Trait unifying pipeline and stage context behaviors.
pub trait ExecutionContext: Send + Sync {
    /// Returns the pipeline run ID.
    fn pipeline_run_id(&self) -> Uuid;

    /// Tries to emit an event.
    fn try_emit_event(&self, event_type: &str, data: Option<serde_json::Value>);

    /// Emits a prebuilt lifecycle event.
    fn emit(&self, event: &StageEvent) {
        self.try_emit_event(&event.event_type, Some(event.payload()));
    }
}

/// The context shared by every stage of one pipeline run.
pub struct RunContext {
    run_id: RunIdentity,
    event_sink: Arc<dyn EventSink>,
}

impl RunContext {
    /// Creates a new run context that discards events.
    #[must_use]
    pub fn new(run_id: RunIdentity) -> Self {
        Self {
            run_id,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the run identity.
    #[must_use]
    pub fn run_id(&self) -> &RunIdentity {
        &self.run_id
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }

    /// Creates the context for one stage of this run.
    #[must_use]
    pub fn for_stage(self: &Arc<Self>, kind: StageKind) -> StageContext {
        StageContext::new(self.clone(), kind)
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext for RunContext {
    fn pipeline_run_id(&self) -> Uuid {
        self.run_id.pipeline_run_id
    }

    fn try_emit_event(&self, event_type: &str, data: Option<serde_json::Value>) {
        let mut enriched = data.unwrap_or_else(|| serde_json::json!({}));

        if let serde_json::Value::Object(ref mut map) = enriched {
            map.insert(
                "pipeline_run_id".to_string(),
                serde_json::json!(self.run_id.pipeline_run_id.to_string()),
            );
            map.insert(
                "run_timestamp".to_string(),
                serde_json::json!(self.run_id.run_timestamp),
            );
        }

        self.event_sink.try_emit(event_type, Some(enriched));
    }
}

/// The context for a single stage execution.
#[derive(Debug, Clone)]
pub struct StageContext {
    run_ctx: Arc<RunContext>,
    kind: StageKind,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(run_ctx: Arc<RunContext>, kind: StageKind) -> Self {
        Self { run_ctx, kind }
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage_name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Returns the stage kind.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Returns the run context.
    #[must_use]
    pub fn run_ctx(&self) -> &Arc<RunContext> {
        &self.run_ctx
    }
}

impl ExecutionContext for StageContext {
    fn pipeline_run_id(&self) -> Uuid {
        self.run_ctx.pipeline_run_id()
    }

    fn try_emit_event(&self, event_type: &str, data: Option<serde_json::Value>) {
        let mut enriched = data.unwrap_or_else(|| serde_json::json!({}));
        if let serde_json::Value::Object(ref mut map) = enriched {
            map.entry("stage".to_string())
                .or_insert_with(|| serde_json::json!(self.stage_name()));
        }
        self.run_ctx.try_emit_event(event_type, Some(enriched));
    }
}
