use async_trait::async_trait;

use granary_branch::{BranchError, BranchSource};

/// Version-control operations the orchestrator needs beyond branch
/// enumeration. Implemented over the real VCS by the binary; faked in
/// tests.
#[async_trait]
pub trait Vcs: BranchSource {
    /// Update the named remote's tracking refs.
    async fn fetch(&self, remote: &str) -> Result<(), BranchError>;

    /// Resolve a ref name to a commit object id.
    async fn commit_id(&self, refname: &str) -> Result<String, BranchError>;
}

/// Whether `branch` carries commits the tracking branch on `remote` does
/// not have.
///
/// The tracking ref is fetched first so the comparison is against current
/// remote state. A fetch failure is logged and conservatively reported as
/// "has changes": better to refuse a submission than to build stale code.
pub async fn has_unpushed_changes(
    vcs: &dyn Vcs,
    branch: &str,
    remote: &str,
) -> Result<bool, BranchError> {
    if let Err(e) = vcs.fetch(remote).await {
        tracing::warn!(error = %e, remote, "fetch failed; assuming unpushed changes");
        return Ok(true);
    }

    let local = vcs.commit_id(branch).await?;
    let tracking = vcs.commit_id(&format!("{remote}/{branch}")).await?;
    Ok(local != tracking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeVcs {
        fetch_fails: bool,
        commits: HashMap<&'static str, &'static str>,
    }

    #[async_trait]
    impl BranchSource for FakeVcs {
        async fn current_branch(&self) -> Result<String, BranchError> {
            Ok("f21".into())
        }

        async fn remote_branches(&self) -> Result<Vec<String>, BranchError> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl Vcs for FakeVcs {
        async fn fetch(&self, _remote: &str) -> Result<(), BranchError> {
            if self.fetch_fails {
                Err(BranchError::vcs("network unreachable"))
            } else {
                Ok(())
            }
        }

        async fn commit_id(&self, refname: &str) -> Result<String, BranchError> {
            self.commits
                .get(refname)
                .map(|c| (*c).to_owned())
                .ok_or_else(|| BranchError::vcs(format!("unknown ref {refname}")))
        }
    }

    #[tokio::test]
    async fn test_in_sync_branch_has_no_changes() {
        let vcs = FakeVcs {
            fetch_fails: false,
            commits: HashMap::from([("f21", "abc"), ("origin/f21", "abc")]),
        };
        assert!(!has_unpushed_changes(&vcs, "f21", "origin").await.unwrap());
    }

    #[tokio::test]
    async fn test_diverged_branch_has_changes() {
        let vcs = FakeVcs {
            fetch_fails: false,
            commits: HashMap::from([("f21", "abc"), ("origin/f21", "def")]),
        };
        assert!(has_unpushed_changes(&vcs, "f21", "origin").await.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_safe() {
        let vcs = FakeVcs {
            fetch_fails: true,
            commits: HashMap::from([("f21", "abc"), ("origin/f21", "abc")]),
        };
        assert!(has_unpushed_changes(&vcs, "f21", "origin").await.unwrap());
    }
}
