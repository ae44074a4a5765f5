//! Run identity for tracking pipeline executions.

use crate::utils::generate_uuid;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Identifies one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique ID for this pipeline run.
    pub pipeline_run_id: Uuid,

    /// The configured pipeline name (may be empty).
    #[serde(default)]
    pub pipeline_name: String,

    /// Name of the timestamped artifact directory of this run.
    pub run_timestamp: String,
}

impl RunIdentity {
    /// Creates a new run identity with a generated pipeline run ID.
    #[must_use]
    pub fn new(pipeline_name: impl Into<String>, run_timestamp: impl Into<String>) -> Self {
        Self {
            pipeline_run_id: generate_uuid(),
            pipeline_name: pipeline_name.into(),
            run_timestamp: run_timestamp.into(),
        }
    }

    /// Replaces the generated run ID.
    #[must_use]
    pub fn with_pipeline_run_id(mut self, pipeline_run_id: Uuid) -> Self {
        self.pipeline_run_id = pipeline_run_id;
        self
    }

    /// Converts to a dictionary with string values.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert(
            "pipeline_run_id".to_string(),
            serde_json::json!(self.pipeline_run_id.to_string()),
        );
        map.insert("pipeline_name".to_string(), serde_json::json!(self.pipeline_name));
        map.insert("run_timestamp".to_string(), serde_json::json!(self.run_timestamp));
        map
    }
}
