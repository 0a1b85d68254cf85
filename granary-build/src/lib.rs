mod commands;
mod error;
mod listeners;
mod lookaside;
mod orchestrator;
mod package;
mod vcs;

pub use commands::{DownloadSourcesCommand, SubmitBuildCommand, SubmitSources};
pub use error::BuildError;
pub use listeners::{UNPUSHED_LISTENER, UnpushedChangesListener};
pub use lookaside::LookasideCache;
pub use orchestrator::{BuildOptions, BuildOrchestrator, OrchestratorConfig};
pub use package::{Nvr, SourcePackage};
pub use vcs::{Vcs, has_unpushed_changes};
