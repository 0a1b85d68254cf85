use thiserror::Error;

use granary_branch::BranchError;
use granary_command::PipelineError;
use granary_hub::HubError;
use granary_sources::SourcesError;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Branch(#[from] BranchError),

    #[error(transparent)]
    Sources(#[from] SourcesError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("local branch '{branch}' has unpushed changes; push them before submitting")]
    UnpushedChanges { branch: String },

    #[error("no build target chosen; submission abandoned")]
    TargetNotChosen,

    #[error("no release branch chosen; submission abandoned")]
    BranchNotChosen,

    #[error("download of '{filename}' failed: {reason}")]
    Download { filename: String, reason: String },

    #[error("downloaded '{filename}' does not match its manifest checksum")]
    ChecksumMismatch { filename: String },
}
