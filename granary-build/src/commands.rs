//! Pipeline commands for the orchestrated operations.

use std::path::PathBuf;

use async_trait::async_trait;

use granary_command::{Command, ExecutionContext, PipelineError};
use granary_hub::{BuildRequest, HubClient, RpcTransport, SourceLocations, TaskId};
use granary_sources::SourcesManifest;

use crate::error::BuildError;
use crate::lookaside::LookasideCache;

/// How the submission's sources reach the farm.
#[derive(Debug, Clone)]
pub enum SubmitSources {
    /// A pre-built SRPM, uploaded over the chunked protocol to a unique
    /// remote path before submission.
    Srpm {
        local: PathBuf,
        remote_path: String,
    },
    /// SCM URLs (or already-uploaded paths) the farm fetches on its own.
    Locations(SourceLocations),
}

/// Body of the submit operation: authenticate, deposit the SRPM if there
/// is one, submit, hand the task ids back.
///
/// Configuration is validated in a fixed order (hub client, source
/// location, build target, NVR) so a misconfiguration always names the
/// same missing field.
pub struct SubmitBuildCommand<T> {
    client: Option<HubClient<T>>,
    certificate: Option<PathBuf>,
    sources: Option<SubmitSources>,
    target: Option<String>,
    nvrs: Vec<String>,
    scratch: bool,
}

const SUBMIT_COMMAND: &str = "submit-build";

impl<T: RpcTransport> SubmitBuildCommand<T> {
    pub fn new(certificate: Option<PathBuf>) -> Self {
        Self {
            client: None,
            certificate,
            sources: None,
            target: None,
            nvrs: Vec::new(),
            scratch: false,
        }
    }

    pub fn set_client(&mut self, client: HubClient<T>) {
        self.client = Some(client);
    }

    pub fn set_sources(&mut self, sources: SubmitSources) {
        self.sources = Some(sources);
    }

    pub fn set_target(&mut self, target: String) {
        self.target = Some(target);
    }

    pub fn set_nvrs(&mut self, nvrs: Vec<String>) {
        self.nvrs = nvrs;
    }

    pub fn set_scratch(&mut self, scratch: bool) {
        self.scratch = scratch;
    }

    /// Reclaim the client, e.g. to log the session out after the pipeline
    /// has run.
    pub fn take_client(&mut self) -> Option<HubClient<T>> {
        self.client.take()
    }
}

#[async_trait]
impl<T: RpcTransport> Command for SubmitBuildCommand<T> {
    type Output = Vec<TaskId>;
    type Error = BuildError;

    fn name(&self) -> &'static str {
        SUBMIT_COMMAND
    }

    fn check_configuration(&self) -> Result<(), PipelineError> {
        if self.client.is_none() {
            return Err(PipelineError::Misconfigured {
                command: SUBMIT_COMMAND,
                field: "hub client",
            });
        }
        if self.sources.is_none() {
            return Err(PipelineError::Misconfigured {
                command: SUBMIT_COMMAND,
                field: "source location",
            });
        }
        if self.target.is_none() {
            return Err(PipelineError::Misconfigured {
                command: SUBMIT_COMMAND,
                field: "build target",
            });
        }
        if !self.scratch && self.nvrs.is_empty() {
            return Err(PipelineError::Misconfigured {
                command: SUBMIT_COMMAND,
                field: "nvr",
            });
        }
        Ok(())
    }

    async fn execute(&mut self, ctx: &ExecutionContext) -> Result<Vec<TaskId>, BuildError> {
        let missing = |field| PipelineError::Misconfigured {
            command: SUBMIT_COMMAND,
            field,
        };
        let client = self.client.as_mut().ok_or_else(|| missing("hub client"))?;

        match &self.certificate {
            Some(cert) => client.ssl_login(cert).await?,
            None => client.login().await?,
        }

        let sources = match self.sources.as_ref().ok_or_else(|| missing("source location"))? {
            SubmitSources::Srpm { local, remote_path } => {
                let filename = local
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| missing("source location"))?;
                client
                    .upload_file(local, remote_path, ctx.cancellation())
                    .await?;
                SourceLocations::Single(vec![format!("{remote_path}/{filename}")])
            }
            SubmitSources::Locations(locations) => locations.clone(),
        };

        let request = BuildRequest {
            target: self.target.clone().ok_or_else(|| missing("build target"))?,
            sources,
            nvrs: self.nvrs.clone(),
            scratch: self.scratch,
        };
        Ok(client.build(&request, ctx.cancellation()).await?)
    }
}

/// Body of the download operation: reconcile the manifest against the
/// working tree, fetch whatever is missing or stale from the upload cache.
pub struct DownloadSourcesCommand {
    cache: Option<LookasideCache>,
    package_name: Option<String>,
    manifest: Option<SourcesManifest>,
}

const DOWNLOAD_COMMAND: &str = "download-sources";

impl DownloadSourcesCommand {
    pub fn new() -> Self {
        Self {
            cache: None,
            package_name: None,
            manifest: None,
        }
    }

    pub fn set_cache(&mut self, cache: LookasideCache) {
        self.cache = Some(cache);
    }

    pub fn set_package_name(&mut self, name: String) {
        self.package_name = Some(name);
    }

    pub fn set_manifest(&mut self, manifest: SourcesManifest) {
        self.manifest = Some(manifest);
    }
}

impl Default for DownloadSourcesCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Command for DownloadSourcesCommand {
    type Output = Vec<String>;
    type Error = BuildError;

    fn name(&self) -> &'static str {
        DOWNLOAD_COMMAND
    }

    fn check_configuration(&self) -> Result<(), PipelineError> {
        if self.cache.is_none() {
            return Err(PipelineError::Misconfigured {
                command: DOWNLOAD_COMMAND,
                field: "lookaside cache",
            });
        }
        if self.package_name.is_none() {
            return Err(PipelineError::Misconfigured {
                command: DOWNLOAD_COMMAND,
                field: "package name",
            });
        }
        if self.manifest.is_none() {
            return Err(PipelineError::Misconfigured {
                command: DOWNLOAD_COMMAND,
                field: "sources manifest",
            });
        }
        Ok(())
    }

    async fn execute(&mut self, ctx: &ExecutionContext) -> Result<Vec<String>, BuildError> {
        let missing = |field| PipelineError::Misconfigured {
            command: DOWNLOAD_COMMAND,
            field,
        };
        let cache = self.cache.as_ref().ok_or_else(|| missing("lookaside cache"))?;
        let package = self
            .package_name
            .as_deref()
            .ok_or_else(|| missing("package name"))?;
        let manifest = self
            .manifest
            .as_ref()
            .ok_or_else(|| missing("sources manifest"))?;

        cache
            .download_missing(package, manifest, ctx.project_root(), ctx.cancellation())
            .await
    }
}
