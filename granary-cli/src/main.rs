mod config;
mod git;
mod prompt;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use granary_build::{
    BuildError, BuildOptions, BuildOrchestrator, DownloadSourcesCommand, LookasideCache,
    OrchestratorConfig, SourcePackage,
};
use granary_command::{Pipeline, PipelineError};
use granary_hub::{HubClient, HubError};
use granary_sources::{SourcesError, SourcesManifest};

use config::{Config, ConfigError};
use git::{VcsKind, vcs_for};
use prompt::ConsolePrompter;

const SOURCES_FILE: &str = "sources";

#[derive(Parser)]
#[command(name = "granary", version, about = "Source package build submission for the build farm")]
struct Cli {
    /// Project root; defaults to the current directory.
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Submit the package to the build farm.
    Build {
        /// Throwaway build; skips the duplicate-build check.
        #[arg(long)]
        scratch: bool,

        /// Upload this pre-built SRPM instead of referencing the SCM.
        #[arg(long)]
        srpm: Option<PathBuf>,

        /// Use this target instead of resolving one from the branch.
        #[arg(long)]
        target: Option<String>,

        /// Always ask for the target, even when the branch implies one.
        #[arg(long)]
        always_prompt: bool,
    },

    /// Submit a chain build: groups of SCM URLs separated by ':'.
    ChainBuild {
        #[arg(required = true)]
        locations: Vec<String>,
    },

    /// Fetch source archives the manifest lists but the tree lacks.
    DownloadSources,

    /// Track a source archive in the sources manifest.
    UploadSource {
        file: PathBuf,

        /// Replace the most recently tracked entry instead of appending.
        #[arg(long)]
        replace: bool,
    },

    /// List the build targets the farm knows.
    ListTargets,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Sources(#[from] SourcesError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling at the next safe point");
            signal_cancel.cancel();
        }
    });

    if let Err(e) = run(cli, cancel).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<(), CliError> {
    let project_root = match cli.project_root {
        Some(root) => root,
        None => std::env::current_dir().map_err(|e| CliError::Io {
            context: "cannot determine current directory".into(),
            source: e,
        })?,
    };
    let config = Config::locate(&project_root)?;

    match cli.command {
        CliCommand::Build {
            scratch,
            srpm,
            target,
            always_prompt,
        } => {
            let options = BuildOptions {
                scratch,
                srpm,
                target,
                chain: None,
            };
            submit(&config, project_root, options, always_prompt, cancel).await
        }

        CliCommand::ChainBuild { locations } => {
            let options = BuildOptions {
                chain: Some(parse_chain_groups(&locations)),
                ..Default::default()
            };
            submit(&config, project_root, options, false, cancel).await
        }

        CliCommand::DownloadSources => {
            let manifest = SourcesManifest::load(&project_root.join(SOURCES_FILE)).await?;
            let cache = LookasideCache::new(config.lookaside_url.clone())?;

            let mut pipeline = Pipeline::new(DownloadSourcesCommand::new());
            pipeline.initialize(project_root)?;
            pipeline.configure(|command| {
                command.set_cache(cache);
                command.set_package_name(config.package.name.clone());
                command.set_manifest(manifest);
            })?;

            let fetched = pipeline.call(cancel).await?;
            if fetched.is_empty() {
                println!("all sources are present and current");
            } else {
                for filename in fetched {
                    println!("downloaded {filename}");
                }
            }
            Ok(())
        }

        CliCommand::UploadSource { file, replace } => {
            let manifest_path = project_root.join(SOURCES_FILE);
            let mut manifest = SourcesManifest::load(&manifest_path).await?;
            let checksum = manifest.record_upload(&file, replace).await?;
            manifest.save(&manifest_path).await?;
            println!("tracked {} ({checksum})", file.display());
            Ok(())
        }

        CliCommand::ListTargets => {
            let client = HubClient::connect(config.server_url.clone())?;
            let mut targets = client.list_build_targets().await?;
            targets.sort_by(|a, b| a.name.cmp(&b.name));
            for target in targets {
                println!("{} (build tag {})", target.name, target.build_tag_name);
            }
            Ok(())
        }
    }
}

async fn submit(
    config: &Config,
    project_root: PathBuf,
    options: BuildOptions,
    always_prompt_target: bool,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let package = SourcePackage {
        name: config.package.name.clone(),
        version: config.package.version.clone(),
        release: config.package.release.clone(),
        scm_url: config.package.scm_url.clone(),
    };

    let vcs_kind: VcsKind = config.vcs.parse().map_err(BuildError::from)?;
    let orchestrator = BuildOrchestrator::new(
        OrchestratorConfig {
            certificate: config.certificate.clone(),
            tracking_remote: config.tracking_remote.clone(),
            always_prompt_target,
        },
        HubClient::connect(config.server_url.clone())?,
        vcs_for(vcs_kind, project_root.clone()),
        Arc::new(ConsolePrompter),
    );

    let tasks = orchestrator
        .submit(project_root, package, options, cancel)
        .await?;
    for task in tasks {
        println!("created task {task}");
    }
    Ok(())
}

/// `a : b c : d` becomes `[[a], [b, c], [d]]`.
fn parse_chain_groups(locations: &[String]) -> Vec<Vec<String>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    for location in locations {
        if location == ":" {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
        } else {
            current.push(location.clone());
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}
