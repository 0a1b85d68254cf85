use std::fmt;

/// What the spec-file parser (an external collaborator) tells us about the
/// package in the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePackage {
    pub name: String,
    pub version: String,
    /// Raw release string, dist placeholder unresolved, e.g. `1%{?dist}`.
    pub release: String,
    /// SCM location to build from when no pre-built SRPM is supplied.
    pub scm_url: Option<String>,
}

/// A fully-resolved name-version-release identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nvr {
    pub name: String,
    pub version: String,
    pub release: String,
}

impl Nvr {
    /// Resolve the package's dist placeholder against the branch's dist tag.
    pub fn from_package(package: &SourcePackage, dist: &str) -> Self {
        Self {
            name: package.name.clone(),
            version: package.version.clone(),
            release: substitute_dist(&package.release, dist),
        }
    }
}

impl fmt::Display for Nvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.name, self.version, self.release)
    }
}

fn substitute_dist(release: &str, dist: &str) -> String {
    release
        .replace("%{?dist}", dist)
        .replace("%{dist}", dist)
}
