//! Run and stage contexts.
//!
//! - [`RunIdentity`] names one pipeline run
//! - [`RunContext`] carries the identity and event sink through a run
//! - [`StageContext`] scopes the run context to one stage

mod execution;
mod identity;

pub use execution::{ExecutionContext, RunContext, StageContext};
pub use identity::RunIdentity;
