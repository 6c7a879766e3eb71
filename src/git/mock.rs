use crate::error::{PublishError, Result};
use crate::git::{PullOptions, Vcs, WorkingTreeStatus};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// A VCS call observed by [MockVcs]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    Status,
    Add(Vec<String>),
    Commit(String),
    Checkout(String),
    CheckoutNewBranch(String),
    ListRemoteRefs(String),
    AddRemote(String, String),
    Pull {
        remote: String,
        branch: String,
        options: PullOptions,
    },
    Push {
        remote: String,
        branch: String,
    },
    StashPop,
}

impl VcsCall {
    /// Whether the call changes the working tree, index, refs or remote
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            VcsCall::Add(_)
                | VcsCall::Commit(_)
                | VcsCall::Pull { .. }
                | VcsCall::Push { .. }
                | VcsCall::StashPop
        )
    }
}

#[derive(Default)]
struct MockState {
    status: WorkingTreeStatus,
    current: Option<String>,
    branches: Vec<String>,
    remote_refs: String,
    remotes: Vec<String>,
    stash: usize,
    pull_conflicts: HashMap<String, Vec<String>>,
    push_error: Option<String>,
    calls: Vec<VcsCall>,
}

/// Mock repository for testing without actual git operations.
///
/// Records every call and simulates just enough state for the release
/// workflow: commits clean the tree, pulls can inject conflicts.
#[derive(Default)]
pub struct MockVcs {
    state: Mutex<MockState>,
}

impl MockVcs {
    /// Create a clean repository on `master`
    pub fn new() -> Self {
        let mock = MockVcs::default();
        {
            let mut state = mock.lock();
            state.current = Some("master".to_string());
            state.branches = vec!["master".to_string()];
            state.remotes = vec!["origin".to_string()];
        }
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the working tree status
    pub fn set_status(&mut self, status: WorkingTreeStatus) {
        self.lock().status = status;
    }

    /// Set the raw remote ref listing
    pub fn set_remote_refs(&mut self, listing: impl Into<String>) {
        self.lock().remote_refs = listing.into();
    }

    pub fn add_local_branch(&mut self, branch: impl Into<String>) {
        self.lock().branches.push(branch.into());
    }

    pub fn set_stash_count(&mut self, count: usize) {
        self.lock().stash = count;
    }

    /// Pulling `branch` leaves `paths` conflicted
    pub fn conflict_on_pull(&mut self, branch: impl Into<String>, paths: Vec<String>) {
        self.lock().pull_conflicts.insert(branch.into(), paths);
    }

    /// Make every push fail with `message`
    pub fn fail_push(&mut self, message: impl Into<String>) {
        self.lock().push_error = Some(message.into());
    }

    /// All calls observed so far, in order
    pub fn calls(&self) -> Vec<VcsCall> {
        self.lock().calls.clone()
    }

    /// Observed calls that mutate state
    pub fn mutations(&self) -> Vec<VcsCall> {
        self.calls().into_iter().filter(VcsCall::is_mutation).collect()
    }

    fn record(&self, call: VcsCall) {
        self.lock().calls.push(call);
    }
}

impl Vcs for MockVcs {
    fn status(&self) -> Result<WorkingTreeStatus> {
        self.record(VcsCall::Status);
        Ok(self.lock().status.clone())
    }

    fn add(&self, paths: &[String]) -> Result<()> {
        self.record(VcsCall::Add(paths.to_vec()));
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.record(VcsCall::Commit(message.to_string()));
        let mut state = self.lock();
        let conflicted = std::mem::take(&mut state.status.conflicted);
        state.status = WorkingTreeStatus {
            conflicted,
            ..WorkingTreeStatus::default()
        };
        Ok(())
    }

    fn current_branch(&self) -> Result<Option<String>> {
        Ok(self.lock().current.clone())
    }

    fn local_branches(&self) -> Result<Vec<String>> {
        Ok(self.lock().branches.clone())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.record(VcsCall::Checkout(branch.to_string()));
        let mut state = self.lock();
        if !state.branches.iter().any(|b| b == branch) {
            return Err(PublishError::vcs(format!("cannot find branch '{}'", branch)));
        }
        state.current = Some(branch.to_string());
        Ok(())
    }

    fn checkout_new_branch(&self, branch: &str) -> Result<()> {
        self.record(VcsCall::CheckoutNewBranch(branch.to_string()));
        let mut state = self.lock();
        state.branches.push(branch.to_string());
        state.current = Some(branch.to_string());
        Ok(())
    }

    fn list_remote_refs(&self, remote: &str) -> Result<String> {
        self.record(VcsCall::ListRemoteRefs(remote.to_string()));
        Ok(self.lock().remote_refs.clone())
    }

    fn remotes(&self) -> Result<Vec<String>> {
        Ok(self.lock().remotes.clone())
    }

    fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        self.record(VcsCall::AddRemote(name.to_string(), url.to_string()));
        self.lock().remotes.push(name.to_string());
        Ok(())
    }

    fn pull(&self, remote: &str, branch: &str, options: PullOptions) -> Result<()> {
        self.record(VcsCall::Pull {
            remote: remote.to_string(),
            branch: branch.to_string(),
            options,
        });
        let mut state = self.lock();
        if let Some(paths) = state.pull_conflicts.get(branch).cloned() {
            state.status.conflicted = paths;
        }
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.record(VcsCall::Push {
            remote: remote.to_string(),
            branch: branch.to_string(),
        });
        match self.lock().push_error.clone() {
            Some(message) => Err(PublishError::vcs(message)),
            None => Ok(()),
        }
    }

    fn stash_count(&self) -> Result<usize> {
        Ok(self.lock().stash)
    }

    fn stash_pop(&self) -> Result<()> {
        self.record(VcsCall::StashPop);
        let mut state = self.lock();
        state.stash = state.stash.saturating_sub(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_commit_cleans_tree() {
        let mut vcs = MockVcs::new();
        vcs.set_status(WorkingTreeStatus {
            modified: vec!["a.js".to_string()],
            ..WorkingTreeStatus::default()
        });
        assert!(vcs.status().unwrap().has_uncommitted());
        vcs.commit("wip").unwrap();
        assert!(!vcs.status().unwrap().has_uncommitted());
    }

    #[test]
    fn test_mock_pull_injects_conflict() {
        let mut vcs = MockVcs::new();
        vcs.conflict_on_pull("master", vec!["index.js".to_string()]);
        vcs.pull("origin", "master", PullOptions::default()).unwrap();
        assert!(vcs.status().unwrap().has_conflicts());
    }

    #[test]
    fn test_mock_checkout_unknown_branch() {
        let vcs = MockVcs::new();
        assert!(vcs.checkout("dev/9.9.9").is_err());
        vcs.checkout_new_branch("dev/9.9.9").unwrap();
        assert_eq!(vcs.current_branch().unwrap().as_deref(), Some("dev/9.9.9"));
    }

    #[test]
    fn test_mock_records_mutations_only() {
        let vcs = MockVcs::new();
        vcs.status().unwrap();
        vcs.push("origin", "master").unwrap();
        assert_eq!(
            vcs.mutations(),
            vec![VcsCall::Push {
                remote: "origin".to_string(),
                branch: "master".to_string()
            }]
        );
    }
}
