use semver::Version;
use std::path::{Path, PathBuf};

use crate::domain::branch::BranchDecision;
use crate::platform::{OwnerKind, PlatformKind};

/// Identity and workflow state of the project being published.
///
/// Identity fields are fixed at construction. Workflow fields are filled in as
/// the run progresses and belong to that single run.
#[derive(Debug, Clone)]
pub struct RepositoryContext {
    name: String,
    normalized_name: String,
    declared_version: Version,
    dir: PathBuf,

    pub version: Version,
    pub branch: Option<String>,
    pub remote_url: Option<String>,
    pub platform: Option<PlatformKind>,
    pub owner: Option<OwnerKind>,
    pub login: Option<String>,
    pub build_cmd: Option<String>,
}

impl RepositoryContext {
    pub fn new(name: impl Into<String>, version: Version, dir: impl Into<PathBuf>) -> Self {
        let name = name.into();
        RepositoryContext {
            normalized_name: normalize_name(&name),
            name,
            version: version.clone(),
            declared_version: version,
            dir: dir.into(),
            branch: None,
            remote_url: None,
            platform: None,
            owner: None,
            login: None,
            build_cmd: None,
        }
    }

    /// Package name as declared in the manifest
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Repository-safe name (`@scope/pkg` becomes `scope_pkg`)
    pub fn normalized_name(&self) -> &str {
        &self.normalized_name
    }

    pub fn declared_version(&self) -> &Version {
        &self.declared_version
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record the negotiated branch and version
    pub fn apply(&mut self, decision: &BranchDecision) {
        self.branch = Some(decision.branch.clone());
        self.version = decision.version.clone();
    }
}

/// Turn a scoped npm name into a repository name
pub fn normalize_name(name: &str) -> String {
    if name.starts_with('@') && name.find('/').is_some_and(|idx| idx > 0) {
        name.split('/').collect::<Vec<_>>().join("_").replace('@', "")
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_scoped_name() {
        assert_eq!(
            normalize_name("@acme-cli/component-test"),
            "acme-cli_component-test"
        );
    }

    #[test]
    fn test_normalize_plain_name() {
        assert_eq!(normalize_name("temp-app"), "temp-app");
        assert_eq!(normalize_name("@noscope"), "@noscope");
    }

    #[test]
    fn test_apply_decision() {
        let mut ctx = RepositoryContext::new("demo", Version::new(1, 0, 0), "/tmp/demo");
        ctx.apply(&BranchDecision::bumped(Version::new(1, 1, 0)));
        assert_eq!(ctx.branch.as_deref(), Some("dev/1.1.0"));
        assert_eq!(ctx.version, Version::new(1, 1, 0));
        assert_eq!(ctx.declared_version(), &Version::new(1, 0, 0));
    }
}
