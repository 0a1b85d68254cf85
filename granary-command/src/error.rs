use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("command '{command}' is missing required configuration: {field}")]
    Misconfigured {
        command: &'static str,
        field: &'static str,
    },

    #[error("command '{command}' was not initialized with a project root")]
    NotInitialized { command: &'static str },

    #[error("command '{command}' was already called and cannot run again")]
    AlreadyCalled { command: &'static str },

    #[error("listener '{listener}' failed: {source}")]
    Listener {
        listener: String,
        #[source]
        source: ListenerError,
    },

    #[error("operation was cancelled")]
    Cancelled,
}

/// Failure raised by a pre- or post-execution listener.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ListenerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
