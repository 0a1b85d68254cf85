//! One-shot execution wrapper for orchestrated operations.
//!
//! Every higher-level operation (build submission, upload, source download)
//! runs through a [`Pipeline`] so validation, listener sequencing and
//! single-use enforcement are implemented once.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::context::ExecutionContext;
use crate::error::PipelineError;
use crate::listener::CommandListener;

/// Lifecycle of a command instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    /// Constructed, not yet bound to a project.
    Fresh,
    /// Bound to a project root; configuration setters are legal.
    Configured,
    /// Configuration validated; the body is about to run.
    Callable,
    /// The body ran. The command can never run again.
    Called,
}

/// A unit of work with validated configuration and typed failure.
///
/// The error type must absorb [`PipelineError`] so pipeline-level failures
/// (misconfiguration, re-execution, cancellation, listener faults) surface
/// through the same channel as the command's own.
#[async_trait]
pub trait Command: Send {
    type Output: Send;
    type Error: std::error::Error + From<PipelineError> + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    /// Verify every required field is set, reporting the first missing one
    /// in a fixed order so the error message is deterministic.
    fn check_configuration(&self) -> Result<(), PipelineError>;

    async fn execute(&mut self, ctx: &ExecutionContext) -> Result<Self::Output, Self::Error>;
}

pub struct Pipeline<C: Command> {
    command: C,
    listeners: Vec<Box<dyn CommandListener>>,
    state: CommandState,
    project_root: Option<PathBuf>,
}

impl<C: Command> Pipeline<C> {
    pub fn new(command: C) -> Self {
        Self {
            command,
            listeners: Vec::new(),
            state: CommandState::Fresh,
            project_root: None,
        }
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    /// Bind the command to a project root. Must happen exactly once, before
    /// any configuration.
    pub fn initialize(&mut self, project_root: PathBuf) -> Result<(), PipelineError> {
        match self.state {
            CommandState::Fresh => {
                self.project_root = Some(project_root);
                self.state = CommandState::Configured;
                Ok(())
            }
            CommandState::Called => Err(PipelineError::AlreadyCalled {
                command: self.command.name(),
            }),
            _ => Err(PipelineError::Misconfigured {
                command: self.command.name(),
                field: "project root (already initialized)",
            }),
        }
    }

    /// Apply configuration to the wrapped command.
    pub fn configure(&mut self, apply: impl FnOnce(&mut C)) -> Result<(), PipelineError> {
        match self.state {
            CommandState::Configured => {
                apply(&mut self.command);
                Ok(())
            }
            CommandState::Fresh => Err(PipelineError::NotInitialized {
                command: self.command.name(),
            }),
            _ => Err(PipelineError::AlreadyCalled {
                command: self.command.name(),
            }),
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn CommandListener>) {
        self.listeners.push(listener);
    }

    /// Take the wrapped command back, e.g. to release resources it owns
    /// after the pipeline has run.
    pub fn into_command(self) -> C {
        self.command
    }

    /// Run the command once.
    ///
    /// Sequence: pre-listeners in registration order (any failure
    /// short-circuits the body), cancellation check, body, post-listeners in
    /// registration order. Once the body has run the command is `Called`
    /// for good; post-listener failures are reported without rewinding the
    /// body's side effects.
    pub async fn call(&mut self, cancel: CancellationToken) -> Result<C::Output, C::Error> {
        match self.state {
            CommandState::Called => {
                return Err(PipelineError::AlreadyCalled {
                    command: self.command.name(),
                }
                .into());
            }
            CommandState::Fresh => {
                return Err(PipelineError::NotInitialized {
                    command: self.command.name(),
                }
                .into());
            }
            CommandState::Configured | CommandState::Callable => {}
        }

        self.command.check_configuration()?;
        self.state = CommandState::Callable;

        let ctx = ExecutionContext::new(
            self.project_root.clone().expect("initialized before call"),
            cancel,
        );

        for listener in &self.listeners {
            if let Err(source) = listener.pre_execution(&ctx).await {
                return Err(PipelineError::Listener {
                    listener: listener.name().to_owned(),
                    source,
                }
                .into());
            }
        }

        ctx.check_cancelled()?;

        let result = self.command.execute(&ctx).await;
        self.state = CommandState::Called;
        let output = result?;

        let mut post_failure = None;
        for listener in &self.listeners {
            if let Err(source) = listener.post_execution(&ctx).await {
                tracing::error!(
                    listener = listener.name(),
                    error = %source,
                    "post-execution listener failed; command side effects stand",
                );
                if post_failure.is_none() {
                    post_failure = Some(PipelineError::Listener {
                        listener: listener.name().to_owned(),
                        source,
                    });
                }
            }
        }
        if let Some(failure) = post_failure {
            return Err(failure.into());
        }

        Ok(output)
    }
}
