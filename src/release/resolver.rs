//! Remote ref listings to sorted version sets.

use std::fmt;

use regex::Regex;
use semver::Version;

use crate::domain::branch::{DEV_PREFIX, RELEASE_PREFIX};
use crate::error::{PublishError, Result};

/// Which class of remote ref a version was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// `refs/tags/release/<semver>`
    ReleaseTag,
    /// `refs/heads/dev/<semver>`
    DevBranch,
}

impl RefKind {
    /// Ref prefix in front of the version
    pub fn prefix(&self) -> String {
        match self {
            RefKind::ReleaseTag => format!("refs/tags/{}/", RELEASE_PREFIX),
            RefKind::DevBranch => format!("refs/heads/{}/", DEV_PREFIX),
        }
    }

    fn pattern(&self) -> Result<Regex> {
        let pattern = format!(
            r"(?:^|\s){}(\d+\.\d+\.\d+)$",
            regex::escape(&self.prefix())
        );
        Regex::new(&pattern)
            .map_err(|e| PublishError::config(format!("invalid ref pattern: {}", e)))
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKind::ReleaseTag => f.write_str("release tag"),
            RefKind::DevBranch => f.write_str("dev branch"),
        }
    }
}

/// A version found on the remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub version: Version,
    pub kind: RefKind,
}

/// Versions of one ref kind, newest first, without duplicates.
///
/// Built from a fresh listing each time it is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSet {
    kind: RefKind,
    refs: Vec<RemoteRef>,
}

impl VersionSet {
    /// Parse a ref listing.
    ///
    /// Accepts `<oid>\t<refname>` lines or bare ref names. Lines that do not
    /// end in a `\d+.\d+.\d+` version under the kind's prefix are skipped, as
    /// are versions semver rejects (leading zeros).
    pub fn resolve(listing: &str, kind: RefKind) -> Result<Self> {
        let re = kind.pattern()?;

        let mut versions: Vec<Version> = listing
            .lines()
            .filter_map(|line| re.captures(line.trim()))
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| Version::parse(m.as_str()).ok())
            .collect();

        versions.sort_by(|a, b| b.cmp(a));
        versions.dedup();

        Ok(VersionSet {
            kind,
            refs: versions
                .into_iter()
                .map(|version| RemoteRef { version, kind })
                .collect(),
        })
    }

    pub fn kind(&self) -> RefKind {
        self.kind
    }

    /// Highest version, if any
    pub fn latest(&self) -> Option<&Version> {
        self.refs.first().map(|r| &r.version)
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.refs.iter().any(|r| &r.version == version)
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteRef> {
        self.refs.iter()
    }

    /// Versions as strings, newest first
    pub fn versions(&self) -> Vec<String> {
        self.refs.iter().map(|r| r.version.to_string()).collect()
    }
}
