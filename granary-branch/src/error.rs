use thiserror::Error;

#[derive(Error, Debug)]
pub enum BranchError {
    #[error("version control query failed: {message}")]
    Vcs { message: String },

    #[error("'{name}' is not a known release branch")]
    UnknownBranch { name: String },
}

impl BranchError {
    pub fn vcs(message: impl Into<String>) -> Self {
        Self::Vcs {
            message: message.into(),
        }
    }
}
