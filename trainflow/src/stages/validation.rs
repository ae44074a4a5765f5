//! Validation: compare the ingested tables with the schema declaration.
//!
//! A schema mismatch is reported on the artifact and in the report file; it
//! is never returned as an error.

use super::{run_blocking, Stage};
use crate::config::{DataValidationConfig, SchemaDeclaration};
use crate::context::{ExecutionContext, StageContext};
use crate::core::{IngestionArtifact, StageKind, ValidationArtifact};
use crate::data::{read_csv, Table};
use crate::errors::Result;
use crate::utils::write_json;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

/// Contents of `report.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether every check succeeded.
    pub passed: bool,
    /// Failure lines, trimmed.
    pub message: String,
}

/// Checks the column count and the presence of every required column in the
/// train and test tables.
#[derive(Debug, Clone)]
pub struct DataValidation {
    config: DataValidationConfig,
    schema: Arc<SchemaDeclaration>,
}

impl DataValidation {
    #[must_use]
    pub fn new(config: DataValidationConfig, schema: Arc<SchemaDeclaration>) -> Self {
        Self { config, schema }
    }

    /// Whether the table has exactly the declared number of columns.
    #[must_use]
    pub fn validate_number_of_columns(&self, table: &Table) -> bool {
        let ok = table.n_cols() == self.schema.expected_column_count();
        tracing::debug!(
            actual = table.n_cols(),
            expected = self.schema.expected_column_count(),
            ok,
            "Checked column count"
        );
        ok
    }

    /// Required numeric and categorical columns absent from the table.
    #[must_use]
    pub fn missing_columns<'s>(&'s self, table: &Table) -> Vec<&'s str> {
        let missing = self.schema.missing_columns(table.columns());
        if !missing.is_empty() {
            tracing::info!(missing = ?missing, "Required columns are missing");
        }
        missing
    }

    fn check(&self, table: &Table, split: &str, message: &mut String) {
        if !self.validate_number_of_columns(table) {
            let _ = writeln!(
                message,
                "Number of columns in {split} data is invalid: expected {}, found {}.",
                self.schema.expected_column_count(),
                table.n_cols()
            );
        }
        let missing = self.missing_columns(table);
        if !missing.is_empty() {
            let _ = writeln!(
                message,
                "Columns are not valid in {split} data, missing: {}.",
                missing.join(", ")
            );
        }
    }

    /// Runs the stage. Only unreadable input or an unwritable report fail.
    pub fn run(&self, ingestion: &IngestionArtifact) -> Result<ValidationArtifact> {
        let train = read_csv(ingestion.train_path())?;
        let test = read_csv(ingestion.test_path())?;

        let mut message = String::new();
        self.check(&train, "train", &mut message);
        self.check(&test, "test", &mut message);

        let artifact = ValidationArtifact::new(
            message.clone(),
            self.config.validation_report_file_path.clone(),
        );
        let report = ValidationReport {
            passed: artifact.passed(),
            message: message.trim().to_string(),
        };
        write_json(&self.config.validation_report_file_path, &report)?;

        if artifact.passed() {
            tracing::info!("Ingested data matches the schema");
        } else {
            tracing::warn!(message = %report.message, "Ingested data does not match the schema");
        }
        Ok(artifact)
    }
}

#[async_trait]
impl Stage for DataValidation {
    type Input = IngestionArtifact;
    type Output = ValidationArtifact;

    fn kind(&self) -> StageKind {
        StageKind::Validation
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        input: IngestionArtifact,
    ) -> Result<ValidationArtifact> {
        let stage = self.clone();
        let artifact = run_blocking(move || stage.run(&input)).await?;
        ctx.try_emit_event(
            "validation.checked",
            Some(serde_json::json!({
                "passed": artifact.passed(),
                "report_path": artifact.report_path().display().to_string(),
            })),
        );
        Ok(artifact)
    }
}
