use crate::error::{PublishError, Result};
use crate::git::{PullOptions, Vcs, WorkingTreeStatus};
use git2::build::CheckoutBuilder;
use git2::{
    AutotagOption, BranchType, Commit, Cred, CredentialType, ErrorCode, FetchOptions,
    IndexAddOption, Oid, PushOptions, RemoteCallbacks, Repository, RepositoryState, StatusOptions,
};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Scratch namespace receiving a remote's refs while they are listed
const LISTING_NS: &str = "refs/cloud-publish/listing/";

/// [Vcs] backed by a `git2` repository
pub struct Git2Vcs {
    repo: Repository,
}

impl Git2Vcs {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::discover(path)?;
        Ok(Git2Vcs { repo })
    }

    /// Create a new repository in `path`
    pub fn init<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::init(path)?;
        Ok(Git2Vcs { repo })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Repository) -> Self {
        Git2Vcs { repo }
    }

    fn head_commit(&self) -> Result<Option<Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Commits named by `.git/MERGE_HEAD` while a merge is in progress
    fn merge_heads(&self) -> Result<Vec<Commit<'_>>> {
        if self.repo.state() != RepositoryState::Merge {
            return Ok(Vec::new());
        }
        let path = self.repo.path().join("MERGE_HEAD");
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return Ok(Vec::new()),
        };
        let mut commits = Vec::new();
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let oid = Oid::from_str(line)?;
            commits.push(self.repo.find_commit(oid)?);
        }
        Ok(commits)
    }

    /// Symbolic target of HEAD, e.g. `refs/heads/master`
    fn head_target(&self) -> Result<String> {
        let head = self.repo.find_reference("HEAD")?;
        head.symbolic_target()
            .map(str::to_string)
            .ok_or_else(|| PublishError::vcs("HEAD is detached"))
    }

    fn stash_repo(&self) -> Result<Repository> {
        Ok(Repository::open(self.repo.path())?)
    }

    /// Refs under [LISTING_NS] with their targets
    fn listing_refs(&self) -> Result<Vec<(String, Oid)>> {
        let mut refs = Vec::new();
        for reference in self.repo.references()? {
            let reference = reference?;
            if let (Some(name), Some(oid)) = (reference.name(), reference.target()) {
                if name.starts_with(LISTING_NS) {
                    refs.push((name.to_string(), oid));
                }
            }
        }
        refs.sort();
        Ok(refs)
    }

    fn clear_listing_refs(&self) -> Result<()> {
        for (name, _) in self.listing_refs()? {
            self.repo.find_reference(&name)?.delete()?;
        }
        Ok(())
    }

    fn workdir(&self) -> PathBuf {
        self.repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.repo.path().to_path_buf())
    }
}

/// Credentials callback shared by fetch, ls-remote and push.
///
/// Tries SSH keys from `~/.ssh`, then the SSH agent, then default credentials.
fn remote_callbacks() -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(|_url, username_from_url, allowed_types| {
        let username = username_from_url.unwrap_or("git");
        if allowed_types.contains(CredentialType::SSH_KEY) {
            if let Some(home) = dirs::home_dir() {
                for key in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                    let path = home.join(".ssh").join(key);
                    if path.exists() {
                        if let Ok(cred) = Cred::ssh_key(username, None, &path, None) {
                            return Ok(cred);
                        }
                    }
                }
            }
            if let Ok(cred) = Cred::ssh_key_from_agent(username) {
                return Ok(cred);
            }
        }
        Cred::default()
    });
    callbacks
}

impl super::Vcs for Git2Vcs {
    fn status(&self) -> Result<WorkingTreeStatus> {
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .renames_head_to_index(true);

        let statuses = self.repo.statuses(Some(&mut options))?;
        let mut result = WorkingTreeStatus::default();

        for entry in statuses.iter() {
            let Some(path) = entry.path().map(str::to_string) else {
                continue;
            };
            let status = entry.status();

            if status.is_conflicted() {
                result.conflicted.push(path);
                continue;
            }
            if status.is_wt_new() {
                result.not_added.push(path.clone());
            }
            if status.is_index_new() {
                result.created.push(path.clone());
            }
            if status.is_index_deleted() || status.is_wt_deleted() {
                result.deleted.push(path.clone());
            }
            if status.is_index_modified()
                || status.is_wt_modified()
                || status.is_index_typechange()
                || status.is_wt_typechange()
            {
                result.modified.push(path.clone());
            }
            if status.is_index_renamed() || status.is_wt_renamed() {
                result.renamed.push(path);
            }
        }

        Ok(result)
    }

    fn add(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut index = self.repo.index()?;
        index.add_all(
            paths.iter().map(String::as_str),
            IndexAddOption::DEFAULT,
            None,
        )?;
        index.update_all(paths.iter().map(String::as_str), None)?;
        index.write()?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<()> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let signature = self.repo.signature()?;

        let mut parents: Vec<Commit<'_>> = self.head_commit()?.into_iter().collect();
        parents.extend(self.merge_heads()?);
        let parent_refs: Vec<&Commit<'_>> = parents.iter().collect();

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parent_refs,
        )?;
        self.repo.cleanup_state()?;
        debug!(commit = %oid, "created commit");
        Ok(())
    }

    fn current_branch(&self) -> Result<Option<String>> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().map(str::to_string)),
            Ok(_) => Ok(None),
            Err(e) if e.code() == ErrorCode::UnbornBranch => Ok(self
                .head_target()
                .ok()
                .and_then(|t| t.strip_prefix("refs/heads/").map(str::to_string))),
            Err(e) => Err(e.into()),
        }
    }

    fn local_branches(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for branch in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        let refname = format!("refs/heads/{}", branch);
        let target = self
            .repo
            .revparse_single(&refname)
            .map_err(|e| PublishError::vcs(format!("cannot find branch '{}': {}", branch, e)))?;
        self.repo
            .checkout_tree(&target, Some(CheckoutBuilder::new().safe()))?;
        self.repo.set_head(&refname)?;
        Ok(())
    }

    fn checkout_new_branch(&self, branch: &str) -> Result<()> {
        match self.head_commit()? {
            Some(commit) => {
                self.repo.branch(branch, &commit, false)?;
                self.checkout(branch)
            }
            None => {
                // Unborn HEAD: the branch comes into existence with the first commit.
                self.repo.set_head(&format!("refs/heads/{}", branch))?;
                Ok(())
            }
        }
    }

    fn list_remote_refs(&self, remote_name: &str) -> Result<String> {
        let mut remote = self.repo.find_remote(remote_name).map_err(|e| {
            PublishError::vcs(format!("cannot find remote '{}': {}", remote_name, e))
        })?;

        // Mirror the remote's heads and tags under a scratch namespace, read
        // them back, then drop the mirror. An empty remote mirrors nothing.
        self.clear_listing_refs()?;
        let heads = format!("+refs/heads/*:{}heads/*", LISTING_NS);
        let tags = format!("+refs/tags/*:{}tags/*", LISTING_NS);
        let mut fetch_options = FetchOptions::new();
        fetch_options
            .remote_callbacks(remote_callbacks())
            .download_tags(AutotagOption::None);
        remote
            .fetch(&[heads.as_str(), tags.as_str()], Some(&mut fetch_options), None)
            .map_err(|e| {
                PublishError::vcs(format!(
                    "failed to list refs of '{}': {}",
                    remote_name,
                    e.message()
                ))
            })?;

        let mut listing = String::new();
        for (name, oid) in self.listing_refs()? {
            let _ = writeln!(listing, "{}\trefs/{}", oid, &name[LISTING_NS.len()..]);
        }
        self.clear_listing_refs()?;
        Ok(listing)
    }

    fn remotes(&self) -> Result<Vec<String>> {
        let names = self.repo.remotes()?;
        Ok(names.iter().flatten().map(str::to_string).collect())
    }

    fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        self.repo.remote(name, url)?;
        Ok(())
    }

    fn pull(&self, remote_name: &str, branch: &str, options: PullOptions) -> Result<()> {
        let mut remote = self.repo.find_remote(remote_name).map_err(|e| {
            PublishError::vcs(format!("cannot find remote '{}': {}", remote_name, e))
        })?;

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks());
        let refspec = format!(
            "+refs/heads/{}:refs/remotes/{}/{}",
            branch, remote_name, branch
        );
        remote
            .fetch(&[refspec.as_str()], Some(&mut fetch_options), None)
            .map_err(|e| {
                PublishError::vcs(format!(
                    "failed to fetch {}/{}: {}",
                    remote_name,
                    branch,
                    e.message()
                ))
            })?;

        let tracking = self
            .repo
            .find_reference(&format!("refs/remotes/{}/{}", remote_name, branch))?;
        let fetched = self.repo.reference_to_annotated_commit(&tracking)?;
        let (analysis, _) = self.repo.merge_analysis(&[&fetched])?;

        if analysis.is_up_to_date() {
            debug!(remote = remote_name, branch, "already up to date");
            return Ok(());
        }

        if analysis.is_unborn() {
            let target = self.head_target()?;
            self.repo
                .reference(&target, fetched.id(), true, "pull: initial checkout")?;
            self.repo.set_head(&target)?;
            self.repo
                .checkout_head(Some(CheckoutBuilder::new().safe()))?;
            return Ok(());
        }

        if analysis.is_fast_forward() {
            let mut head = self.repo.head()?;
            head.set_target(fetched.id(), &format!("pull: fast-forward {}", branch))?;
            self.repo
                .checkout_head(Some(CheckoutBuilder::new().force()))?;
            return Ok(());
        }

        let ours = self
            .head_commit()?
            .ok_or_else(|| PublishError::vcs("HEAD has no commit to merge into"))?;
        let theirs = self.repo.find_commit(fetched.id())?;

        let related = self.repo.merge_base(ours.id(), theirs.id()).is_ok();
        if !related && !options.allow_unrelated_histories {
            return Err(PublishError::vcs(format!(
                "refusing to merge unrelated histories from {}/{}",
                remote_name, branch
            )));
        }

        self.repo.merge(&[&fetched], None, None)?;

        let mut index = self.repo.index()?;
        if index.has_conflicts() {
            debug!(remote = remote_name, branch, "merge stopped on conflicts");
            return Ok(());
        }

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let signature = self.repo.signature()?;
        let message = format!("Merge branch '{}' of {}", branch, remote_name);
        self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &message,
            &tree,
            &[&ours, &theirs],
        )?;
        self.repo.cleanup_state()?;
        Ok(())
    }

    fn push(&self, remote_name: &str, branch: &str) -> Result<()> {
        let mut remote = self.repo.find_remote(remote_name).map_err(|e| {
            PublishError::vcs(format!("cannot find remote '{}': {}", remote_name, e))
        })?;

        let mut callbacks = remote_callbacks();
        callbacks.push_update_reference(|refname, status| match status {
            Some(reason) => Err(git2::Error::from_str(&format!(
                "push rejected for {}: {}",
                refname, reason
            ))),
            None => Ok(()),
        });
        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);

        let refspec = format!("refs/heads/{}:refs/heads/{}", branch, branch);
        remote
            .push(&[refspec.as_str()], Some(&mut push_options))
            .map_err(|e| {
                if e.class() == git2::ErrorClass::Net {
                    PublishError::vcs(format!("network error during push: {}", e.message()))
                } else {
                    PublishError::vcs(format!(
                        "failed to push '{}' to '{}': {}",
                        branch,
                        remote_name,
                        e.message()
                    ))
                }
            })
    }

    fn stash_count(&self) -> Result<usize> {
        let mut repo = self.stash_repo()?;
        let mut count = 0;
        repo.stash_foreach(|_, _, _| {
            count += 1;
            true
        })?;
        Ok(count)
    }

    fn stash_pop(&self) -> Result<()> {
        let mut repo = self.stash_repo()?;
        repo.stash_pop(0, None)?;
        debug!(dir = %self.workdir().display(), "stash popped");
        Ok(())
    }
}
