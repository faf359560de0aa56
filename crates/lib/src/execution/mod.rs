//! Execution outcomes, results, and the contexts passed between steps.

pub mod context;
mod types;

pub use context::{
  BeforeExecutionContext, BeforeExecutionState, IncrementalChangesContext, PreviousExecutionContext, RequestContext,
};
pub use types::*;
