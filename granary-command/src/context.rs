use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

/// Per-operation execution context handed to commands and listeners.
///
/// Carries the project root the command was initialized with and the
/// operation's cancellation token. Cancellation is cooperative: suspension
/// points call [`check_cancelled`](Self::check_cancelled) explicitly, it is
/// never preemptive.
#[derive(Clone)]
pub struct ExecutionContext {
    project_root: PathBuf,
    cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(project_root: PathBuf, cancel: CancellationToken) -> Self {
        Self {
            project_root,
            cancel,
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn check_cancelled(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}
