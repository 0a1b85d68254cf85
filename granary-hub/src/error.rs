use thiserror::Error;

use crate::types::TaskId;

/// Why authentication against the hub failed.
///
/// Each kind maps to distinct remediation, so the caller can tell the user
/// what to actually do instead of printing a generic login failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFaultKind {
    #[error("no client certificate found; obtain one before submitting builds")]
    MissingCredentials,

    #[error("client certificate has expired; renew it and retry")]
    ExpiredCredentials,

    #[error("client certificate has been revoked; request a replacement from the farm administrators")]
    RevokedCredentials,
}

#[derive(Error, Debug)]
pub enum HubError {
    /// Transport-level failure: network error, non-OK status, unreadable body.
    #[error("hub client fault: {context}")]
    Client {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Fault object returned by the hub itself.
    #[error("hub fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("hub login failed: {kind}")]
    Login { kind: LoginFaultKind },

    /// The remote spoke, but not the protocol we expect.
    #[error("hub protocol fault: {reason}")]
    Protocol { reason: String },

    #[error("build of {nvr} already exists on the farm{}", existing_task(.task_id))]
    BuildAlreadyExists {
        nvr: String,
        task_id: Option<TaskId>,
    },

    #[error("operation was cancelled")]
    Cancelled,
}

fn existing_task(task_id: &Option<TaskId>) -> String {
    match task_id {
        Some(task) => format!(" as task {task}"),
        None => String::new(),
    }
}

impl HubError {
    pub fn client(context: impl Into<String>) -> Self {
        Self::Client {
            context: context.into(),
            source: None,
        }
    }

    pub fn client_with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Client {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }
}
