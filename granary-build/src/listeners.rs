use std::sync::Arc;

use async_trait::async_trait;

use granary_command::{CommandListener, ExecutionContext, ListenerError};

use crate::vcs::{Vcs, has_unpushed_changes};

/// Listener name, used by the orchestrator to map this gate's failure onto
/// the typed unpushed-changes error.
pub const UNPUSHED_LISTENER: &str = "verify-pushed-state";

/// Pre-execution gate: refuse to submit from a working tree whose branch
/// is ahead of (or diverged from) its remote tracking branch.
pub struct UnpushedChangesListener {
    vcs: Arc<dyn Vcs>,
    branch: String,
    remote: String,
}

impl UnpushedChangesListener {
    pub fn new(vcs: Arc<dyn Vcs>, branch: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            vcs,
            branch: branch.into(),
            remote: remote.into(),
        }
    }
}

#[async_trait]
impl CommandListener for UnpushedChangesListener {
    fn name(&self) -> &str {
        UNPUSHED_LISTENER
    }

    async fn pre_execution(&self, _ctx: &ExecutionContext) -> Result<(), ListenerError> {
        match has_unpushed_changes(self.vcs.as_ref(), &self.branch, &self.remote).await {
            Ok(false) => Ok(()),
            Ok(true) => Err(ListenerError::new(format!(
                "branch '{}' is not in sync with {}/{}",
                self.branch, self.remote, self.branch
            ))),
            Err(e) => Err(ListenerError::with_source(
                format!("could not verify pushed state of '{}'", self.branch),
                e,
            )),
        }
    }
}
