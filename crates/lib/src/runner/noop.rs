use async_trait::async_trait;

use super::{BuildRequest, BuildResult, BuildRunner, RunnerError, RunnerKind};
use crate::steps::ToolHost;
use crate::toolchain::Version;

/// Backend for sources-only builds. The orchestrator writes the argument file
/// itself; every build operation here is refused.
pub struct NoopRunner;

#[async_trait]
impl BuildRunner for NoopRunner {
  fn kind(&self) -> RunnerKind {
    RunnerKind::Noop
  }

  fn is_containerized(&self) -> bool {
    false
  }

  fn tool_host(&self) -> Option<ToolHost<'_>> {
    None
  }

  async fn setup(&self) -> Result<(), RunnerError> {
    Err(RunnerError::NotMeantToBuild)
  }

  async fn query_version(&self) -> Result<Version, RunnerError> {
    Err(RunnerError::NotMeantToBuild)
  }

  async fn pre_build(&self, _request: &BuildRequest<'_>) -> Result<(), RunnerError> {
    Err(RunnerError::NotMeantToBuild)
  }

  async fn build(&self, _request: &BuildRequest<'_>) -> Result<BuildResult, RunnerError> {
    Err(RunnerError::NotMeantToBuild)
  }
}
