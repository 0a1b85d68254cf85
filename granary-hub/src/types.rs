use std::fmt;

use num_enum::TryFromPrimitive;
use serde::Deserialize;

/// Farm-side task identifier returned for each submitted build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Numeric build states the hub reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(i64)]
pub enum BuildState {
    Building = 0,
    Complete = 1,
    Deleted = 2,
    Failed = 3,
    Canceled = 4,
}

/// Build report returned by `getBuild`.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildInfo {
    pub state: i64,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    pub package_id: i64,
    pub package_name: String,
    #[serde(default)]
    pub epoch: Option<i64>,
    pub version: String,
    pub release: String,
    pub nvr: String,
}

impl BuildInfo {
    pub fn state(&self) -> Option<BuildState> {
        BuildState::try_from(self.state).ok()
    }

    /// Only a completed build blocks resubmission; failed or cancelled
    /// states may be rebuilt.
    pub fn is_complete(&self) -> bool {
        self.state == BuildState::Complete as i64
    }
}

/// Target descriptor from `getBuildTargets`.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildTarget {
    pub name: String,
    pub build_tag_name: String,
}

/// Repository descriptor from `getRepo`.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoInfo {
    pub id: i64,
    pub creation_time: String,
}

/// Where the sources for a build request come from.
///
/// A flat sequence submits one independent build per entry. A nested
/// sequence is a chain build: groups build in order, packages within a
/// group in parallel. The shape alone selects the RPC method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocations {
    Single(Vec<String>),
    Chain(Vec<Vec<String>>),
}

impl SourceLocations {
    pub fn is_empty(&self) -> bool {
        match self {
            SourceLocations::Single(urls) => urls.is_empty(),
            SourceLocations::Chain(groups) => groups.iter().all(|g| g.is_empty()),
        }
    }

    /// How many task ids a successful submission yields.
    pub fn task_count(&self) -> usize {
        match self {
            SourceLocations::Single(urls) => urls.len(),
            SourceLocations::Chain(_) => 1,
        }
    }
}

/// A fully-specified submission.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub target: String,
    pub sources: SourceLocations,
    pub nvrs: Vec<String>,
    pub scratch: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_state_roundtrip() {
        assert_eq!(BuildState::try_from(1).unwrap(), BuildState::Complete);
        assert!(BuildState::try_from(99).is_err());
    }

    #[test]
    fn test_is_complete_only_for_complete_state() {
        let mut info: BuildInfo = serde_json::from_value(serde_json::json!({
            "state": 1,
            "task_id": 42,
            "package_id": 7,
            "package_name": "pkg",
            "epoch": null,
            "version": "1.0",
            "release": "1.fc21",
            "nvr": "pkg-1.0-1.fc21",
        }))
        .unwrap();
        assert!(info.is_complete());
        assert_eq!(info.state(), Some(BuildState::Complete));

        info.state = BuildState::Failed as i64;
        assert!(!info.is_complete());
    }

    #[test]
    fn test_task_counts_by_shape() {
        let single = SourceLocations::Single(vec!["url1".into(), "url2".into()]);
        assert_eq!(single.task_count(), 2);

        let chain = SourceLocations::Chain(vec![vec!["url1".into()], vec!["url2".into()]]);
        assert_eq!(chain.task_count(), 1);
    }
}
