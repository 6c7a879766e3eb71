//! Brings the local working tree in line with a [BranchDecision].
//!
//! Every step is a blocking VCS call and steps run strictly in order. A
//! conflicted tree stops the sequence before any further mutation.

use tracing::{debug, info};

use crate::boundary::BoundaryWarning;
use crate::domain::branch::MASTER;
use crate::domain::BranchDecision;
use crate::error::{PublishError, Result};
use crate::git::{PullOptions, Vcs, ORIGIN};
use crate::release::resolver::{RefKind, VersionSet};
use crate::ui::Prompt;

pub struct Reconciler<'a> {
    vcs: &'a dyn Vcs,
    prompt: &'a mut dyn Prompt,
    remote: String,
    warnings: Vec<BoundaryWarning>,
}

impl<'a> Reconciler<'a> {
    pub fn new(vcs: &'a dyn Vcs, prompt: &'a mut dyn Prompt) -> Self {
        Reconciler {
            vcs,
            prompt,
            remote: ORIGIN.to_string(),
            warnings: Vec::new(),
        }
    }

    /// Warnings collected so far, draining them
    pub fn take_warnings(&mut self) -> Vec<BoundaryWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Pop the top stash entry if there is one
    pub fn restore_stash(&mut self) -> Result<bool> {
        let count = self.vcs.stash_count()?;
        if count == 0 {
            return Ok(false);
        }
        self.vcs.stash_pop()?;
        self.warnings.push(BoundaryWarning::StashRestored {
            remaining: count - 1,
        });
        Ok(true)
    }

    /// Fail with [PublishError::MergeConflict] if any path is conflicted
    pub fn check_conflict(&self) -> Result<()> {
        let status = self.vcs.status()?;
        if status.has_conflicts() {
            return Err(PublishError::MergeConflict {
                paths: status.conflicted,
            });
        }
        debug!("no conflicts in working tree");
        Ok(())
    }

    /// Stage and commit pending changes; returns whether a commit was made.
    ///
    /// The commit message is asked for until a non-empty one is given.
    pub fn check_uncommitted(&mut self) -> Result<bool> {
        let status = self.vcs.status()?;
        if !status.has_uncommitted() {
            debug!("working tree clean");
            return Ok(false);
        }

        let paths = status.paths_to_stage();
        self.vcs.add(&paths)?;

        let message = loop {
            let answer = self.prompt.input("Commit message:")?;
            let answer = answer.trim();
            if !answer.is_empty() {
                break answer.to_string();
            }
        };

        self.vcs.commit(&message)?;
        info!(files = paths.len(), "committed local changes");
        Ok(true)
    }

    /// Switch to `branch`, creating it from HEAD when it is not local
    pub fn checkout_target(&self, branch: &str) -> Result<()> {
        if self.vcs.current_branch()?.as_deref() == Some(branch) {
            return Ok(());
        }
        if self.vcs.local_branches()?.iter().any(|b| b == branch) {
            self.vcs.checkout(branch)
        } else {
            self.vcs.checkout_new_branch(branch)
        }
    }

    /// Whether the remote has a `master` branch
    pub fn remote_has_master(&self) -> Result<bool> {
        let target = format!("refs/heads/{}", MASTER);
        let listing = self.vcs.list_remote_refs(&self.remote)?;
        Ok(listing
            .lines()
            .filter_map(|line| line.split_whitespace().last())
            .any(|name| name == target))
    }

    /// Pull remote `master` into the current branch
    pub fn merge_master(&mut self) -> Result<()> {
        if !self.remote_has_master()? {
            self.warnings.push(BoundaryWarning::RemoteMasterMissing {
                remote: self.remote.clone(),
            });
            return Ok(());
        }
        self.vcs.pull(&self.remote, MASTER, PullOptions::default())?;
        self.check_conflict()
    }

    /// Pull the remote dev branch when one exists for the decided version.
    /// Returns whether a pull happened.
    pub fn merge_remote_branch(&self, decision: &BranchDecision) -> Result<bool> {
        let listing = self.vcs.list_remote_refs(&self.remote)?;
        let dev = VersionSet::resolve(&listing, RefKind::DevBranch)?;
        if !dev.contains(&decision.version) {
            debug!(branch = %decision.branch, "no remote dev branch to merge");
            return Ok(false);
        }
        self.vcs
            .pull(&self.remote, &decision.branch, PullOptions::default())?;
        self.check_conflict()?;
        Ok(true)
    }

    /// Push the current branch; local commits stay on failure
    pub fn push_branch(&self, fallback: &str) -> Result<()> {
        let branch = self
            .vcs
            .current_branch()?
            .unwrap_or_else(|| fallback.to_string());
        self.vcs.push(&self.remote, &branch)?;
        info!(branch = %branch, remote = %self.remote, "pushed branch");
        Ok(())
    }

    /// Full sequence for a negotiated branch
    pub fn reconcile(&mut self, decision: &BranchDecision) -> Result<()> {
        self.restore_stash()?;
        self.check_conflict()?;
        self.check_uncommitted()?;
        self.checkout_target(&decision.branch)?;
        self.merge_master()?;
        self.merge_remote_branch(decision)?;
        self.push_branch(&decision.branch)
    }

    /// First commit of a freshly initialised repository.
    ///
    /// Joins an existing remote `master` (unrelated histories allowed) or
    /// publishes the local one.
    pub fn initial_commit(&mut self) -> Result<()> {
        self.check_conflict()?;
        self.check_uncommitted()?;
        if self.remote_has_master()? {
            self.vcs.pull(
                &self.remote,
                MASTER,
                PullOptions {
                    allow_unrelated_histories: true,
                },
            )?;
            self.check_conflict()
        } else {
            self.vcs.push(&self.remote, MASTER)
        }
    }
}
