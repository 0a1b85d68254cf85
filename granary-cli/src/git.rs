//! Thin `git` subprocess adapter behind the VCS traits, plus the registry
//! mapping a configured VCS kind to its implementation.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use granary_branch::{BranchError, BranchSource};
use granary_build::Vcs;

/// Version-control systems the tool can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VcsKind {
    #[default]
    Git,
}

impl FromStr for VcsKind {
    type Err = BranchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git" => Ok(VcsKind::Git),
            other => Err(BranchError::vcs(format!("unsupported VCS kind '{other}'"))),
        }
    }
}

/// Resolve a VCS kind to a concrete implementation rooted at `repo_root`.
pub fn vcs_for(kind: VcsKind, repo_root: PathBuf) -> Arc<dyn Vcs> {
    match kind {
        VcsKind::Git => Arc::new(GitCli::new(repo_root)),
    }
}

pub struct GitCli {
    repo_root: PathBuf,
}

impl GitCli {
    pub fn new(repo_root: PathBuf) -> Self {
        Self { repo_root }
    }

    async fn git(&self, args: &[&str]) -> Result<String, BranchError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_root)
            .args(args)
            .output()
            .await
            .map_err(|e| BranchError::vcs(format!("failed to run git {}: {e}", args.join(" "))))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BranchError::vcs(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

#[async_trait]
impl BranchSource for GitCli {
    async fn current_branch(&self) -> Result<String, BranchError> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    async fn remote_branches(&self) -> Result<Vec<String>, BranchError> {
        let output = self
            .git(&["for-each-ref", "--format=%(refname)", "refs/remotes/origin"])
            .await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.ends_with("/HEAD"))
            .map(|line| line.replace("refs/remotes/origin/", "refs/heads/"))
            .collect())
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn fetch(&self, remote: &str) -> Result<(), BranchError> {
        self.git(&["fetch", remote]).await.map(|_| ())
    }

    async fn commit_id(&self, refname: &str) -> Result<String, BranchError> {
        self.git(&["rev-parse", refname]).await
    }
}
