//! Git operations abstraction layer
//!
//! The release workflow talks to version control only through the [Vcs]
//! trait. Implementations:
//!
//! - [repository::Git2Vcs]: a real implementation using the `git2` crate
//! - [mock::MockVcs]: a recording mock for testing workflow sequencing
//!
//! Every method is a blocking call. Nothing here retries.

pub mod mock;
pub mod repository;

pub use mock::MockVcs;
pub use repository::Git2Vcs;

use crate::error::Result;

/// Remote every workflow step talks to
pub const ORIGIN: &str = "origin";

/// Working tree state split into the categories the workflow acts on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingTreeStatus {
    /// Untracked paths
    pub not_added: Vec<String>,
    /// New paths already staged
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub modified: Vec<String>,
    pub renamed: Vec<String>,
    pub conflicted: Vec<String>,
}

impl WorkingTreeStatus {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicted.is_empty()
    }

    /// Whether anything needs to be staged and committed
    pub fn has_uncommitted(&self) -> bool {
        !(self.not_added.is_empty()
            && self.created.is_empty()
            && self.deleted.is_empty()
            && self.modified.is_empty()
            && self.renamed.is_empty())
    }

    /// All paths to stage, in category order, without duplicates
    pub fn paths_to_stage(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for path in self
            .not_added
            .iter()
            .chain(&self.created)
            .chain(&self.deleted)
            .chain(&self.modified)
            .chain(&self.renamed)
        {
            if !paths.contains(path) {
                paths.push(path.clone());
            }
        }
        paths
    }
}

/// Options for [Vcs::pull]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullOptions {
    /// Permit merging histories with no common ancestor
    pub allow_unrelated_histories: bool,
}

/// Common version control trait for the release workflow
///
/// ## Thread Safety
///
/// Implementors must be `Send`. `Sync` is not required (`git2::Repository`
/// is not `Sync`).
///
/// ## Error Handling
///
/// Underlying failures map to [crate::error::PublishError::Vcs] carrying the
/// VCS message.
pub trait Vcs: Send {
    /// Categorized working tree status
    fn status(&self) -> Result<WorkingTreeStatus>;

    /// Stage paths, including deletions
    fn add(&self, paths: &[String]) -> Result<()>;

    /// Commit the index on top of HEAD
    fn commit(&self, message: &str) -> Result<()>;

    /// Name of the checked-out branch, `None` when HEAD is detached
    fn current_branch(&self) -> Result<Option<String>>;

    fn local_branches(&self) -> Result<Vec<String>>;

    /// Switch to an existing local branch
    fn checkout(&self, branch: &str) -> Result<()>;

    /// Create a branch from HEAD and switch to it
    fn checkout_new_branch(&self, branch: &str) -> Result<()>;

    /// Raw ref listing of a remote, one `<oid>\t<refname>` per line.
    ///
    /// Peeled tag entries and symbolic `HEAD` are omitted.
    fn list_remote_refs(&self, remote: &str) -> Result<String>;

    fn remotes(&self) -> Result<Vec<String>>;

    fn add_remote(&self, name: &str, url: &str) -> Result<()>;

    /// Fetch `branch` from `remote` and merge it into the current branch.
    ///
    /// Conflicts do not fail the call; they are left in the working tree for
    /// [Vcs::status] to report.
    fn pull(&self, remote: &str, branch: &str, options: PullOptions) -> Result<()>;

    /// Push a local branch to the same name on `remote`
    fn push(&self, remote: &str, branch: &str) -> Result<()>;

    fn stash_count(&self) -> Result<usize>;

    /// Apply and drop the most recent stash entry
    fn stash_pop(&self) -> Result<()>;
}
