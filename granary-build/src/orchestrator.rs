//! End-to-end sequencing for "submit this package to the build farm".

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use data_encoding::HEXLOWER;
use tokio_util::sync::CancellationToken;

use granary_branch::{BranchConfig, BranchResolver, map_branch_name};
use granary_command::{ChoicePrompter, Pipeline, PipelineError};
use granary_hub::{HubClient, RpcTransport, SourceLocations, TaskId};

use crate::commands::{SubmitBuildCommand, SubmitSources};
use crate::error::BuildError;
use crate::listeners::{UNPUSHED_LISTENER, UnpushedChangesListener};
use crate::package::{Nvr, SourcePackage};
use crate::vcs::Vcs;

/// Static configuration for one orchestrated operation.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Client certificate for `sslLogin`; plain `login` when absent.
    pub certificate: Option<PathBuf>,
    /// Remote the tracking branch lives on.
    pub tracking_remote: String,
    /// Ignore the branch's target and always ask.
    pub always_prompt_target: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            certificate: None,
            tracking_remote: "origin".to_owned(),
            always_prompt_target: false,
        }
    }
}

/// Caller's description of what to submit.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub scratch: bool,
    /// Pre-built SRPM to upload instead of referencing the SCM.
    pub srpm: Option<PathBuf>,
    /// Chain-build groups; mutually exclusive with `srpm`.
    pub chain: Option<Vec<Vec<String>>>,
    /// Explicit target, skipping resolution entirely.
    pub target: Option<String>,
}

/// One orchestrator instance performs one submission: it owns the hub
/// client (and therefore the session) for the operation's lifetime, and is
/// consumed by [`submit`](Self::submit). Independent operations construct
/// independent orchestrators.
pub struct BuildOrchestrator<T: RpcTransport> {
    config: OrchestratorConfig,
    client: HubClient<T>,
    vcs: Arc<dyn Vcs>,
    prompter: Arc<dyn ChoicePrompter>,
}

impl<T: RpcTransport + 'static> BuildOrchestrator<T> {
    pub fn new(
        config: OrchestratorConfig,
        client: HubClient<T>,
        vcs: Arc<dyn Vcs>,
        prompter: Arc<dyn ChoicePrompter>,
    ) -> Self {
        Self {
            config,
            client,
            vcs,
            prompter,
        }
    }

    /// Resolve branch, NVR and target, then run the upload-then-build
    /// sequence through the command pipeline. The hub session is logged
    /// out on every exit path that logged in.
    pub async fn submit(
        self,
        project_root: PathBuf,
        package: SourcePackage,
        options: BuildOptions,
        cancel: CancellationToken,
    ) -> Result<Vec<TaskId>, BuildError> {
        let branch_config = self.resolve_branch_config().await?;
        let nvr = Nvr::from_package(&package, &branch_config.dist);
        tracing::info!(%nvr, branch = %branch_config.equivalent_branch, "preparing submission");

        let target = match &options.target {
            Some(explicit) => explicit.clone(),
            None => self.resolve_target(&branch_config).await?,
        };

        // A chain build or plain SCM submission builds from the pushed
        // tree; only a pre-built SRPM bypasses the pushed-state gate.
        let (sources, from_working_tree) = match (&options.chain, &options.srpm) {
            (Some(groups), _) => (
                SubmitSources::Locations(SourceLocations::Chain(groups.clone())),
                true,
            ),
            (None, Some(srpm)) => (
                SubmitSources::Srpm {
                    local: srpm.clone(),
                    remote_path: unique_upload_path()?,
                },
                false,
            ),
            (None, None) => {
                let url = package.scm_url.clone().ok_or(PipelineError::Misconfigured {
                    command: "submit-build",
                    field: "source location",
                })?;
                (
                    SubmitSources::Locations(SourceLocations::Single(vec![url])),
                    true,
                )
            }
        };

        let current_branch = self.vcs.current_branch().await?;

        let mut pipeline = Pipeline::new(SubmitBuildCommand::new(self.config.certificate.clone()));
        pipeline.initialize(project_root)?;
        pipeline.configure(|command| {
            command.set_client(self.client);
            command.set_sources(sources);
            command.set_target(target);
            command.set_nvrs(vec![nvr.to_string()]);
            command.set_scratch(options.scratch);
        })?;
        if from_working_tree {
            pipeline.add_listener(Box::new(UnpushedChangesListener::new(
                self.vcs.clone(),
                current_branch.clone(),
                self.config.tracking_remote.clone(),
            )));
        }

        let result = pipeline.call(cancel).await;

        // Mandatory cleanup: whatever happened above, a session that got
        // opened is closed before the result propagates.
        let mut command = pipeline.into_command();
        if let Some(mut client) = command.take_client() {
            if client.session().is_logged_in() {
                if let Err(e) = client.logout().await {
                    tracing::warn!(error = %e, "hub logout failed");
                }
            }
        }

        match result {
            Err(BuildError::Pipeline(PipelineError::Listener { listener, .. }))
                if listener == UNPUSHED_LISTENER =>
            {
                Err(BuildError::UnpushedChanges {
                    branch: current_branch,
                })
            }
            other => other,
        }
    }

    /// Current branch's configuration, falling back to an interactive pick
    /// over the known release branches when the checkout is on a working
    /// branch.
    async fn resolve_branch_config(&self) -> Result<BranchConfig, BuildError> {
        let resolver = BranchResolver::new(self.vcs.clone());
        if let Some(config) = resolver.current_config().await? {
            return Ok(config);
        }

        let branches = resolver.branches().await?;
        let release_branches: Vec<String> = branches
            .keys()
            .filter(|name| map_branch_name(name).is_some())
            .cloned()
            .collect();
        let pick = self
            .prompter
            .choose(
                "The current branch does not map to a release; pick one to build for",
                &release_branches,
            )
            .await
            .ok_or(BuildError::BranchNotChosen)?;
        Ok(resolver.config_for(&pick).await?)
    }

    /// Use the branch's target when the farm knows it (and prompting is
    /// not forced); otherwise ask, failing the operation when the caller
    /// declines.
    async fn resolve_target(&self, branch_config: &BranchConfig) -> Result<String, BuildError> {
        let targets = self.client.list_build_targets().await?;
        let names: Vec<String> = targets.into_iter().map(|t| t.name).collect();

        if !self.config.always_prompt_target
            && names.iter().any(|name| *name == branch_config.build_target)
        {
            return Ok(branch_config.build_target.clone());
        }

        self.prompter
            .choose("Select a build target", &names)
            .await
            .ok_or(BuildError::TargetNotChosen)
    }
}

/// Unique remote path for a one-off SRPM deposit. Seconds-granularity
/// timestamp plus 32 random bits keeps the collision probability
/// negligible even across concurrent submitters.
fn unique_upload_path() -> Result<String, BuildError> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut random = [0u8; 4];
    getrandom::fill(&mut random).map_err(|e| BuildError::Io {
        context: "entropy source unavailable".to_owned(),
        source: std::io::Error::other(e),
    })?;
    Ok(format!("cli-build/{seconds}.{}", HEXLOWER.encode(&random)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_upload_paths_differ() {
        let a = unique_upload_path().unwrap();
        let b = unique_upload_path().unwrap();
        assert!(a.starts_with("cli-build/"));
        assert_ne!(a, b);
    }
}
