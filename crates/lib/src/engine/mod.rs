//! Execution engine facade.
//!
//! Assembles the step pipeline once and runs units of work through it,
//! either directly with [`ExecutionEngine::execute`] or through the builder
//! started by [`ExecutionEngine::prepare`].

mod config;

pub use config::EngineConfig;

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::cleanup::{Deleter, FsDeleter, NoopOutputChangeListener, OutputChangeListener, OutputOwnership};
use crate::execution::{CachingResult, ExecutionError, RequestContext};
use crate::steps::{
  CaptureStateBeforeExecutionStep, ExecuteStep, LoadPreviousExecutionStep, RemovePreviousOutputsStep,
  SkipEmptyWorkStep, SkipUpToDateStep, Step, StoreExecutionStateStep,
};
use crate::work::{ConfigurableUnitOfWork, UnitOfWork};
use crate::workspace::WorkspaceProvider;

/// Collaborators shared by every execution of one engine.
#[derive(Clone)]
pub struct EngineServices {
  pub ownership: Arc<OutputOwnership>,
  pub listener: Arc<dyn OutputChangeListener>,
  pub deleter: Arc<dyn Deleter>,
  /// Recorded as the origin of every execution state this engine stores.
  pub build_invocation_id: String,
}

impl Default for EngineServices {
  fn default() -> Self {
    Self {
      ownership: Arc::new(OutputOwnership::new()),
      listener: Arc::new(NoopOutputChangeListener),
      deleter: Arc::new(FsDeleter),
      build_invocation_id: new_build_invocation_id(),
    }
  }
}

/// Unique-enough id for one engine instance: start time plus process id.
pub fn new_build_invocation_id() -> String {
  let nanos = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_nanos();
  format!("{:x}-{}", nanos, std::process::id())
}

pub struct ExecutionEngine {
  services: EngineServices,
  pipeline: Box<dyn Step<RequestContext>>,
}

impl ExecutionEngine {
  pub fn new(services: EngineServices) -> Self {
    let pipeline = LoadPreviousExecutionStep::new(SkipEmptyWorkStep::new(
      services.ownership.clone(),
      services.deleter.clone(),
      services.listener.clone(),
      CaptureStateBeforeExecutionStep::new(SkipUpToDateStep::new(StoreExecutionStateStep::new(
        services.build_invocation_id.clone(),
        RemovePreviousOutputsStep::new(
          services.ownership.clone(),
          services.deleter.clone(),
          services.listener.clone(),
          ExecuteStep::new(),
        ),
      ))),
    ));

    debug!(build_invocation_id = %services.build_invocation_id, "assembled execution pipeline");
    Self {
      services,
      pipeline: Box::new(pipeline),
    }
  }

  pub fn services(&self) -> &EngineServices {
    &self.services
  }

  pub fn build_invocation_id(&self) -> &str {
    &self.services.build_invocation_id
  }

  pub fn execute(&self, work: &dyn UnitOfWork) -> Result<CachingResult, ExecutionError> {
    self.execute_with(work, RequestContext::default())
  }

  pub fn execute_with(&self, work: &dyn UnitOfWork, request: RequestContext) -> Result<CachingResult, ExecutionError> {
    let result = self.pipeline.execute(work, request)?;
    match result.outcome() {
      Some(outcome) => info!(identity = %work.identity(), outcome = %outcome, "finished {}", work.display_name()),
      None => info!(identity = %work.identity(), "{} failed", work.display_name()),
    }
    Ok(result)
  }

  /// Start building a command for a configurable unit of work.
  pub fn prepare(&self) -> CommandBuilder<'_> {
    CommandBuilder {
      engine: self,
      request: RequestContext::default(),
    }
  }
}

pub struct CommandBuilder<'e> {
  engine: &'e ExecutionEngine,
  request: RequestContext,
}

impl<'e> CommandBuilder<'e> {
  /// Execute even when up to date, reporting `reason` as the only reason.
  pub fn rebuild_because(mut self, reason: impl Into<String>) -> Self {
    self.request.rebuild_reason = Some(reason.into());
    self
  }

  pub fn workspace(self, workspace: Arc<dyn WorkspaceProvider>) -> CommandInWorkspace<'e> {
    CommandInWorkspace {
      engine: self.engine,
      request: self.request,
      workspace,
    }
  }
}

pub struct CommandInWorkspace<'e> {
  engine: &'e ExecutionEngine,
  request: RequestContext,
  workspace: Arc<dyn WorkspaceProvider>,
}

impl<'e> CommandInWorkspace<'e> {
  /// Pick the kind of work; `configure` fills in its default parameters.
  pub fn work_unit<W, F>(self, configure: F) -> CommandReadyToExecute<'e, W, F>
  where
    W: ConfigurableUnitOfWork,
    F: FnOnce(&mut W::Params),
  {
    CommandReadyToExecute {
      engine: self.engine,
      request: self.request,
      workspace: self.workspace,
      configure,
      work: PhantomData,
    }
  }
}

pub struct CommandReadyToExecute<'e, W, F> {
  engine: &'e ExecutionEngine,
  request: RequestContext,
  workspace: Arc<dyn WorkspaceProvider>,
  configure: F,
  work: PhantomData<fn() -> W>,
}

impl<W, F> CommandReadyToExecute<'_, W, F>
where
  W: ConfigurableUnitOfWork,
  F: FnOnce(&mut W::Params),
{
  /// Create the unit of work and run it.
  ///
  /// Invalid parameters fail with [`ExecutionError::Configuration`] before
  /// anything is fingerprinted.
  pub fn execute_now(self) -> Result<CachingResult, ExecutionError> {
    let mut params = W::Params::default();
    (self.configure)(&mut params);

    let work = W::create(params, self.workspace).map_err(|e| ExecutionError::Configuration {
      work: type_name::<W>().to_string(),
      message: e.message,
    })?;

    self.engine.execute_with(&work, self.request)
  }
}
