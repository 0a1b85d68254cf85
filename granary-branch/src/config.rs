/// Distribution build configuration derived from a release branch.
///
/// Built once per operation from the current branch and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchConfig {
    /// Dist tag appended to release strings, e.g. `.fc21`.
    pub dist: String,
    /// Ordinal release number, e.g. `"21"`.
    pub dist_val: String,
    /// Distro family: `fedora`, `rhel` or `olpc`.
    pub dist_variable: String,
    /// Farm-side build target identifier, e.g. `f21-candidate`.
    pub build_target: String,
    /// Canonical branch label, e.g. `f21` or `master`.
    pub equivalent_branch: String,
}
