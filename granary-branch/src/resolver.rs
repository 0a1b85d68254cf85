//! Mapping from raw version-control branch names to distribution build
//! configurations.
//!
//! Release branches follow distro-family naming (`f21`, `fc9`, `el6`,
//! `rhel-7`, `olpc4`, `master`). Anything else is a working branch and maps
//! to nothing; callers treat that as non-fatal and fall back to an
//! interactive pick.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::config::BranchConfig;
use crate::error::BranchError;

/// Single alternation over every supported family. The capture groups are
/// walked pairwise (prefix, version) in declaration order.
static BRANCH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:f(\d+)|fc(\d+)|(master)|el(\d+)|rhel-(\d+)|olpc(\d+))$")
        .expect("branch pattern is valid")
});

/// Canonical prefix for each (family, capture index) pair, in the pattern's
/// declaration order. `rhel-N` normalises to `elN`.
const FAMILIES: [(&str, usize); 5] = [("f", 1), ("fc", 2), ("el", 4), ("el", 5), ("olpc", 6)];

const MASTER_GROUP: usize = 3;

/// Ref prefixes a VCS may report; stripped before mapping.
const REF_PREFIXES: [&str; 3] = ["refs/heads/", "refs/remotes/origin/", "origin/"];

fn strip_ref_prefix(raw: &str) -> &str {
    for prefix in REF_PREFIXES {
        if let Some(rest) = raw.strip_prefix(prefix) {
            return rest;
        }
    }
    raw
}

/// Map a raw branch name to its canonical release-branch form.
///
/// Returns `None` for anything that is not a release branch; the master
/// branch maps to the literal `"master"`.
pub fn map_branch_name(raw: &str) -> Option<String> {
    let name = strip_ref_prefix(raw);
    let caps = BRANCH_PATTERN.captures(name)?;
    if caps.get(MASTER_GROUP).is_some() {
        return Some("master".to_owned());
    }
    for (prefix, group) in FAMILIES {
        if let Some(version) = caps.get(group) {
            return Some(format!("{prefix}{}", version.as_str()));
        }
    }
    None
}

/// Split a canonical branch name into its family prefix and numeric part.
fn split_family(canonical: &str) -> Option<(&str, &str)> {
    let digits_at = canonical.find(|c: char| c.is_ascii_digit())?;
    let (family, version) = canonical.split_at(digits_at);
    version
        .chars()
        .all(|c| c.is_ascii_digit())
        .then_some((family, version))
}

/// Where branch names come from; implemented over the real VCS by callers.
#[async_trait]
pub trait BranchSource: Send + Sync {
    /// The currently checked-out branch, ref prefixes included or not.
    async fn current_branch(&self) -> Result<String, BranchError>;

    /// Every remote branch ref.
    async fn remote_branches(&self) -> Result<Vec<String>, BranchError>;
}

#[async_trait]
impl<S: BranchSource + ?Sized> BranchSource for std::sync::Arc<S> {
    async fn current_branch(&self) -> Result<String, BranchError> {
        (**self).current_branch().await
    }

    async fn remote_branches(&self) -> Result<Vec<String>, BranchError> {
        (**self).remote_branches().await
    }
}

pub struct BranchResolver<S> {
    source: S,
}

impl<S: BranchSource> BranchResolver<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Canonical membership map over the remote branches.
    ///
    /// Key and value are the same canonical name; refs that fail to map are
    /// kept under their raw name so they stay enumerable.
    pub async fn branches(&self) -> Result<BTreeMap<String, String>, BranchError> {
        let mut branches = BTreeMap::new();
        for raw in self.source.remote_branches().await? {
            match map_branch_name(&raw) {
                Some(canonical) => {
                    branches.insert(canonical.clone(), canonical);
                }
                None => {
                    let stripped = strip_ref_prefix(&raw).to_owned();
                    branches.insert(stripped.clone(), stripped);
                }
            }
        }
        Ok(branches)
    }

    /// The next unreleased distro version: max over every numbered release
    /// branch, plus one.
    pub async fn next_release_number(&self) -> Result<String, BranchError> {
        let branches = self.branches().await?;
        Ok(next_release_number(branches.keys().map(String::as_str)))
    }

    /// Resolve the current branch to a build configuration.
    ///
    /// `Ok(None)` means the checkout is on a working branch; the caller is
    /// expected to pick a release branch through other means.
    pub async fn current_config(&self) -> Result<Option<BranchConfig>, BranchError> {
        let raw = self.source.current_branch().await?;
        match map_branch_name(&raw) {
            Some(canonical) => self.config_for(&canonical).await.map(Some),
            None => {
                tracing::debug!(branch = %raw, "current branch is not a release branch");
                Ok(None)
            }
        }
    }

    /// Build configuration for a canonical branch name.
    pub async fn config_for(&self, canonical: &str) -> Result<BranchConfig, BranchError> {
        if canonical == "master" {
            let next = self.next_release_number().await?;
            return Ok(BranchConfig {
                dist: format!(".fc{next}"),
                dist_val: next,
                dist_variable: "fedora".to_owned(),
                build_target: "rawhide".to_owned(),
                equivalent_branch: "master".to_owned(),
            });
        }

        let (family, version) = split_family(canonical).ok_or_else(|| BranchError::UnknownBranch {
            name: canonical.to_owned(),
        })?;
        let config = match family {
            "f" | "fc" => BranchConfig {
                dist: format!(".fc{version}"),
                dist_val: version.to_owned(),
                dist_variable: "fedora".to_owned(),
                build_target: format!("f{version}-candidate"),
                equivalent_branch: canonical.to_owned(),
            },
            "el" => BranchConfig {
                dist: format!(".el{version}"),
                dist_val: version.to_owned(),
                dist_variable: "rhel".to_owned(),
                build_target: format!("dist-{version}E-epel-testing-candidate"),
                equivalent_branch: canonical.to_owned(),
            },
            "olpc" => BranchConfig {
                dist: format!(".olpc{version}"),
                dist_val: version.to_owned(),
                dist_variable: "olpc".to_owned(),
                build_target: format!("dist-olpc{version}"),
                equivalent_branch: canonical.to_owned(),
            },
            _ => {
                return Err(BranchError::UnknownBranch {
                    name: canonical.to_owned(),
                });
            }
        };
        Ok(config)
    }
}

/// Streaming max-reduce over numbered canonical branch names.
fn next_release_number<'a>(branches: impl Iterator<Item = &'a str>) -> String {
    let mut highest = 0u32;
    for branch in branches {
        if let Some((_, version)) = split_family(branch) {
            if let Ok(number) = version.parse::<u32>() {
                highest = highest.max(number);
            }
        }
    }
    (highest + 1).to_string()
}
