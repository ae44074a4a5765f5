//! Stage trait and the four pipeline stages.
//!
//! Each stage consumes the artifact of the stage before it and returns its
//! own. Stages hold their configuration and collaborators; the orchestrator
//! only threads artifacts through them.

mod ingestion;
mod result;
mod training;
mod transformation;
mod validation;

pub use ingestion::DataIngestion;
pub use result::StageRecord;
pub use training::ModelTrainer;
pub use transformation::{DataTransformation, TransformationInput};
pub use validation::DataValidation;

use crate::context::StageContext;
use crate::core::StageKind;
use crate::errors::{PipelineError, Result};
use async_trait::async_trait;
use std::fmt::Debug;

/// A typed pipeline stage.
///
/// Errors returned from [`Stage::execute`] are stage-local; the orchestrator
/// wraps them with [`Stage::kind`] before surfacing them.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Artifact(s) consumed by the stage.
    type Input: Send + 'static;
    /// Artifact produced by the stage.
    type Output: Send + 'static;

    /// Which of the four stages this is.
    fn kind(&self) -> StageKind;

    /// Returns the name of the stage.
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Executes the stage.
    async fn execute(&self, ctx: &StageContext, input: Self::Input) -> Result<Self::Output>;
}

/// Runs synchronous stage work on the blocking thread pool so fitting and
/// file IO never stall the runtime's worker threads.
///
/// A panic inside `work` is resumed on the caller.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => Err(PipelineError::Cancelled(err.to_string())),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Tables and schemas shared by the stage tests.

    use crate::config::SchemaDeclaration;
    use crate::context::{RunContext, RunIdentity, StageContext};
    use crate::core::StageKind;
    use crate::data::{Cell, Table};
    use crate::events::CollectingEventSink;
    use std::sync::Arc;

    pub const SCHEMA: &str = r"
columns:
  - _id: int
  - Gender: category
  - Age: int
  - Vehicle_Age: category
  - Vehicle_Damage: category
  - Annual_Premium: float
  - Response: int
numerical_columns: [_id, Age, Annual_Premium, Response]
categorical_columns: [Gender, Vehicle_Age, Vehicle_Damage]
drop_columns: _id
num_features: [Age]
mm_columns: [Annual_Premium]
";

    pub fn schema() -> Arc<SchemaDeclaration> {
        Arc::new(SchemaDeclaration::from_yaml_str(SCHEMA).unwrap())
    }

    /// A table in the shape exported by the document store.
    ///
    /// Damaged vehicles respond, everything else is noise, so a forest fits
    /// the training split well.
    pub fn vehicle_table(n: u32) -> Table {
        let mut table = Table::new([
            "Gender",
            "Age",
            "Vehicle_Age",
            "Vehicle_Damage",
            "Annual_Premium",
            "Response",
            "_id",
        ]);
        let vehicle_ages = ["< 1 Year", "1-2 Year", "> 2 Year"];
        for i in 0..n {
            let damaged = i % 3 != 0;
            table
                .push_row(vec![
                    Cell::text(if i % 2 == 0 { "Male" } else { "Female" }),
                    Cell::Number(f64::from(20 + (i * 7) % 50)),
                    Cell::text(vehicle_ages[(i % 3) as usize]),
                    Cell::text(if damaged { "Yes" } else { "No" }),
                    Cell::Number(f64::from(20_000 + (i * 137) % 9_000)),
                    Cell::Number(if damaged { 1.0 } else { 0.0 }),
                    Cell::Number(f64::from(i)),
                ])
                .unwrap();
        }
        table
    }

    pub fn stage_ctx(kind: StageKind) -> (StageContext, Arc<CollectingEventSink>) {
        let sink = Arc::new(CollectingEventSink::new());
        let run = Arc::new(
            RunContext::new(RunIdentity::new("test", "01_01_2025_00_00_00"))
                .with_event_sink(sink.clone()),
        );
        (run.for_stage(kind), sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_blocking_passes_results_through() {
        assert_eq!(run_blocking(|| Ok(7)).await.unwrap(), 7);

        let err = run_blocking::<(), _>(|| Err(PipelineError::data("bad cell")))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Data(_)));
    }

    #[tokio::test]
    #[should_panic(expected = "forest exploded")]
    async fn test_run_blocking_resumes_panics() {
        let _ = run_blocking::<(), _>(|| panic!("forest exploded")).await;
    }
}
