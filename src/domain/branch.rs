use semver::Version;

/// Prefix of development branches, `dev/<semver>`
pub const DEV_PREFIX: &str = "dev";
/// Prefix of release tags, `release/<semver>`
pub const RELEASE_PREFIX: &str = "release";
/// Integration branch merged into every dev branch
pub const MASTER: &str = "master";

/// Name of the development branch for a version
pub fn dev_branch(version: &Version) -> String {
    format!("{}/{}", DEV_PREFIX, version)
}

/// Outcome of branch negotiation for one publish run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchDecision {
    pub branch: String,
    pub version: Version,
    pub version_changed: bool,
}

impl BranchDecision {
    /// Keep the declared version and work on its dev branch
    pub fn keep(version: Version) -> Self {
        BranchDecision {
            branch: dev_branch(&version),
            version,
            version_changed: false,
        }
    }

    /// Move to an incremented version and its dev branch
    pub fn bumped(version: Version) -> Self {
        BranchDecision {
            branch: dev_branch(&version),
            version,
            version_changed: true,
        }
    }
}
