use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{BuildRequest, BuildResult, BuildRunner, ResolutionError, RunnerError, RunnerKind};
use crate::steps::ToolHost;
use crate::toolchain::Version;

/// Stands in for a backend that could not be resolved. The failure is only
/// raised once something actually needs the backend.
pub struct DeferredRunner {
  error: ResolutionError,
}

impl DeferredRunner {
  pub fn new(error: ResolutionError) -> Self {
    Self { error }
  }

  pub fn error(&self) -> &ResolutionError {
    &self.error
  }

  fn fail(&self) -> RunnerError {
    RunnerError::Resolution(self.error.clone())
  }
}

#[async_trait]
impl BuildRunner for DeferredRunner {
  fn kind(&self) -> RunnerKind {
    RunnerKind::Deferred
  }

  fn is_containerized(&self) -> bool {
    false
  }

  fn tool_host(&self) -> Option<ToolHost<'_>> {
    None
  }

  async fn setup(&self) -> Result<(), RunnerError> {
    Err(self.fail())
  }

  async fn query_version(&self) -> Result<Version, RunnerError> {
    Err(self.fail())
  }

  async fn pre_build(&self, _request: &BuildRequest<'_>) -> Result<(), RunnerError> {
    Err(self.fail())
  }

  async fn build(&self, _request: &BuildRequest<'_>) -> Result<BuildResult, RunnerError> {
    Err(self.fail())
  }

  async fn extract_debug_symbols(&self, _executable: &Path, _split: bool) -> Result<Option<PathBuf>, RunnerError> {
    Err(self.fail())
  }
}
