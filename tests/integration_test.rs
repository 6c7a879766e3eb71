// tests/integration_test.rs
use std::fs;
use std::path::Path;
use std::process::Command;

use cloud_publish::domain::BranchDecision;
use cloud_publish::git::{Git2Vcs, PullOptions, Vcs, ORIGIN};
use cloud_publish::release::{Reconciler, RefKind, VersionSet};
use cloud_publish::ui::ScriptedPrompt;
use git2::{Repository, RepositoryInitOptions};
use semver::Version;
use tempfile::TempDir;

#[test]
fn test_cloud_publish_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_cloud-publish"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("cloud-publish"));
    assert!(stdout.contains("--increment"));
}

#[test]
fn test_unknown_increment_class_exits_with_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_cloud-publish"))
        .args(["--increment", "huge"])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("negotiation failed"));
    assert!(stderr.contains("huge"));
}

/// Working repository on `master` with a local identity
fn work_repo(dir: &Path) -> Git2Vcs {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("master");
    let repo = Repository::init_opts(dir, &opts).unwrap();
    {
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
    }
    Git2Vcs::from_git2(repo)
}

fn bare_remote(dir: &Path) -> String {
    Repository::init_bare(dir).unwrap();
    dir.to_str().unwrap().to_string()
}

#[test]
fn test_status_categories_and_commit() {
    let dir = TempDir::new().unwrap();
    let vcs = work_repo(dir.path());

    fs::write(dir.path().join("index.js"), "console.log(1)\n").unwrap();
    let status = vcs.status().unwrap();
    assert_eq!(status.not_added, vec!["index.js"]);
    assert!(status.has_uncommitted());

    vcs.add(&status.paths_to_stage()).unwrap();
    vcs.commit("first").unwrap();
    assert!(!vcs.status().unwrap().has_uncommitted());
    assert_eq!(vcs.current_branch().unwrap().as_deref(), Some("master"));

    fs::write(dir.path().join("index.js"), "console.log(2)\n").unwrap();
    assert_eq!(vcs.status().unwrap().modified, vec!["index.js"]);
    assert_eq!(vcs.stash_count().unwrap(), 0);
}

#[test]
fn test_checkout_new_branch_from_head() {
    let dir = TempDir::new().unwrap();
    let vcs = work_repo(dir.path());
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    vcs.add(&["a.txt".to_string()]).unwrap();
    vcs.commit("first").unwrap();

    vcs.checkout_new_branch("dev/1.0.0").unwrap();

    assert_eq!(vcs.current_branch().unwrap().as_deref(), Some("dev/1.0.0"));
    let mut branches = vcs.local_branches().unwrap();
    branches.sort();
    assert_eq!(branches, vec!["dev/1.0.0", "master"]);
}

#[test]
fn test_initial_commit_then_reconcile_against_bare_remote() {
    let remote_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    let remote = bare_remote(remote_dir.path());
    let vcs = work_repo(work_dir.path());
    vcs.add_remote(ORIGIN, &remote).unwrap();

    fs::write(work_dir.path().join("package.json"), "{}\n").unwrap();
    let mut prompt = ScriptedPrompt::new(["init", "feat: button"]);

    {
        let mut reconciler = Reconciler::new(&vcs, &mut prompt);
        reconciler.initial_commit().unwrap();
    }
    let listing = vcs.list_remote_refs(ORIGIN).unwrap();
    assert!(listing.contains("refs/heads/master"));

    fs::write(work_dir.path().join("button.js"), "export {}\n").unwrap();
    {
        let mut reconciler = Reconciler::new(&vcs, &mut prompt);
        reconciler
            .reconcile(&BranchDecision::keep(Version::new(1, 0, 0)))
            .unwrap();
        assert!(reconciler.take_warnings().is_empty());
    }

    assert_eq!(vcs.current_branch().unwrap().as_deref(), Some("dev/1.0.0"));
    let listing = vcs.list_remote_refs(ORIGIN).unwrap();
    let dev = VersionSet::resolve(&listing, RefKind::DevBranch).unwrap();
    assert!(dev.contains(&Version::new(1, 0, 0)));
    assert_eq!(prompt.asked().len(), 2);
}

#[test]
fn test_list_refs_of_empty_remote() {
    let remote_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    let remote = bare_remote(remote_dir.path());
    let vcs = work_repo(work_dir.path());
    vcs.add_remote(ORIGIN, &remote).unwrap();

    assert_eq!(vcs.list_remote_refs(ORIGIN).unwrap(), "");
    let dev = VersionSet::resolve("", RefKind::DevBranch).unwrap();
    assert!(dev.is_empty());

    let repo = Repository::open(work_dir.path()).unwrap();
    let leftovers = repo
        .references()
        .unwrap()
        .flatten()
        .filter(|r| r.name().map_or(false, |n| n.starts_with("refs/cloud-publish/")))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_pull_stops_on_conflicting_edit() {
    let remote_dir = TempDir::new().unwrap();
    let remote = bare_remote(remote_dir.path());

    let ours_dir = TempDir::new().unwrap();
    let ours = work_repo(ours_dir.path());
    ours.add_remote(ORIGIN, &remote).unwrap();
    fs::write(ours_dir.path().join("f.txt"), "base\n").unwrap();
    ours.add(&["f.txt".to_string()]).unwrap();
    ours.commit("base").unwrap();
    ours.push(ORIGIN, "master").unwrap();

    let theirs_dir = TempDir::new().unwrap();
    let theirs = work_repo(theirs_dir.path());
    theirs.add_remote(ORIGIN, &remote).unwrap();
    theirs.pull(ORIGIN, "master", PullOptions::default()).unwrap();
    fs::write(theirs_dir.path().join("f.txt"), "theirs\n").unwrap();
    theirs.add(&["f.txt".to_string()]).unwrap();
    theirs.commit("theirs").unwrap();
    theirs.push(ORIGIN, "master").unwrap();

    fs::write(ours_dir.path().join("f.txt"), "ours\n").unwrap();
    ours.add(&["f.txt".to_string()]).unwrap();
    ours.commit("ours").unwrap();

    ours.pull(ORIGIN, "master", PullOptions::default()).unwrap();

    let status = ours.status().unwrap();
    assert_eq!(status.conflicted, vec!["f.txt"]);
    assert!(status.has_conflicts());
}
