use crate::error::{PublishError, Result};
use semver::Version;
use std::fmt;
use std::str::FromStr;

/// Version increment class chosen when the local version is not ahead of the
/// latest release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementClass {
    Major,
    Minor,
    Patch,
}

impl IncrementClass {
    pub const ALL: [IncrementClass; 3] = [
        IncrementClass::Patch,
        IncrementClass::Minor,
        IncrementClass::Major,
    ];

    /// Increment `version`, dropping any pre-release and build metadata
    pub fn apply(&self, version: &Version) -> Version {
        match self {
            IncrementClass::Major => Version::new(version.major + 1, 0, 0),
            IncrementClass::Minor => Version::new(version.major, version.minor + 1, 0),
            IncrementClass::Patch => Version::new(version.major, version.minor, version.patch + 1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IncrementClass::Major => "major",
            IncrementClass::Minor => "minor",
            IncrementClass::Patch => "patch",
        }
    }
}

impl fmt::Display for IncrementClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncrementClass {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "major" => Ok(IncrementClass::Major),
            "minor" => Ok(IncrementClass::Minor),
            "patch" => Ok(IncrementClass::Patch),
            other => Err(PublishError::version_policy(format!(
                "unknown increment class '{}', expected patch, minor or major",
                other
            ))),
        }
    }
}

/// Parse a declared manifest version
pub fn parse_declared(version: &str) -> Result<Version> {
    Version::parse(version.trim()).map_err(|e| {
        PublishError::manifest(format!("version '{}' is not valid semver: {}", version, e))
    })
}
