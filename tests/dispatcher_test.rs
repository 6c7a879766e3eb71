use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cloud_publish::cloudbuild::{ChannelEvent, MockChannel};
use cloud_publish::config::Config;
use cloud_publish::domain::{ComponentFile, Manifest, RepositoryContext};
use cloud_publish::error::{PublishError, Result, TimeoutPhase};
use cloud_publish::platform::{OwnerKind, PlatformKind};
use cloud_publish::publish::{Dispatcher, RecordingRunner};
use cloud_publish::registry::{ComponentDescriptor, ComponentRegistry};
use semver::Version;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::time::Instant;

/// Registry answering with a fixed verdict and keeping the uploads
struct StubRegistry {
    accept: bool,
    uploads: Mutex<Vec<ComponentDescriptor>>,
}

impl StubRegistry {
    fn new(accept: bool) -> Self {
        StubRegistry {
            accept,
            uploads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ComponentRegistry for StubRegistry {
    async fn create_component(&self, descriptor: &ComponentDescriptor) -> Result<Option<Value>> {
        self.uploads.lock().unwrap().push(descriptor.clone());
        Ok(self.accept.then(|| json!({"id": 7})))
    }
}

fn write_manifest(dir: &Path, json: &str) -> Manifest {
    fs::write(dir.join("package.json"), json).unwrap();
    Manifest::load(dir).unwrap()
}

fn context(dir: &Path) -> RepositoryContext {
    let mut ctx = RepositoryContext::new("@acme/button", Version::new(1, 1, 0), dir);
    ctx.branch = Some("dev/1.1.0".to_string());
    ctx.remote_url = Some("git@github.com:acme/acme_button.git".to_string());
    ctx.platform = Some(PlatformKind::Github);
    ctx.owner = Some(OwnerKind::Org);
    ctx.login = Some("acme".to_string());
    ctx
}

fn component_project(dir: &Path) -> (Manifest, ComponentFile) {
    fs::write(
        dir.join(".componentrc"),
        r#"{"buildPath": "lib", "examplePath": "examples"}"#,
    )
    .unwrap();
    fs::create_dir_all(dir.join("lib")).unwrap();
    fs::create_dir_all(dir.join("examples")).unwrap();
    fs::write(dir.join("examples/index.html"), "").unwrap();
    fs::write(dir.join("examples/index1.html"), "").unwrap();
    fs::write(dir.join("examples/notes.md"), "").unwrap();
    let manifest = write_manifest(
        dir,
        r#"{"name": "@acme/button", "version": "1.1.0", "files": ["lib"]}"#,
    );
    let component = ComponentFile::load(dir).unwrap().unwrap();
    (manifest, component)
}

#[test]
fn test_yarn_build_is_illegal() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(dir.path(), r#"{"scripts": {"build": "vite build"}}"#);
    let mut ctx = context(dir.path());
    ctx.build_cmd = Some("yarn build".to_string());

    let config = Config::default();
    let runner = RecordingRunner::new();
    let registry = StubRegistry::new(true);
    let dispatcher = Dispatcher::new(&config, &runner, &registry);

    let err = dispatcher.prepare_project(&ctx, &manifest).unwrap_err();
    assert!(matches!(err, PublishError::IllegalBuildCommand(_)));
}

#[test]
fn test_project_build_params() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(dir.path(), r#"{"scripts": {"build": "vite build"}}"#);
    let ctx = context(dir.path());

    let config = Config::default();
    let runner = RecordingRunner::new();
    let registry = StubRegistry::new(true);
    let dispatcher = Dispatcher::new(&config, &runner, &registry);

    let params = dispatcher.prepare_project(&ctx, &manifest).unwrap();
    assert_eq!(params.name, "acme_button");
    assert_eq!(params.branch, "dev/1.1.0");
    assert_eq!(params.version, "1.1.0");
    assert_eq!(params.build_cmd, "npm run build");
    assert_eq!(params.repo, "git@github.com:acme/acme_button.git");
}

#[tokio::test]
async fn test_component_path_uploads_then_publishes() {
    let dir = TempDir::new().unwrap();
    let (manifest, component) = component_project(dir.path());
    let ctx = context(dir.path());

    let config = Config::default();
    let runner = RecordingRunner::new();
    let registry = StubRegistry::new(true);
    let dispatcher = Dispatcher::new(&config, &runner, &registry);

    let data = dispatcher
        .publish_component(&ctx, &manifest, component)
        .await
        .unwrap();

    assert_eq!(data, json!({"id": 7}));
    assert_eq!(runner.commands(), vec!["npm run build", "npm publish"]);

    let uploads = registry.uploads.lock().unwrap();
    let upload = &uploads[0];
    assert_eq!(upload.component.example_list, vec!["index.html", "index1.html"]);
    assert_eq!(upload.git.platform, "github");
    assert_eq!(upload.git.owner, "org");

    let body = serde_json::to_value(upload).unwrap();
    assert_eq!(body["component"]["buildPath"], "lib");
    assert_eq!(body["git"]["type"], "github");
}

#[tokio::test]
async fn test_component_rejected_skips_npm_publish() {
    let dir = TempDir::new().unwrap();
    let (manifest, component) = component_project(dir.path());
    let ctx = context(dir.path());

    let config = Config::default();
    let runner = RecordingRunner::new();
    let registry = StubRegistry::new(false);
    let dispatcher = Dispatcher::new(&config, &runner, &registry);

    let err = dispatcher
        .publish_component(&ctx, &manifest, component)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::Registry(_)));
    assert_eq!(runner.commands(), vec!["npm run build"]);
}

#[tokio::test]
async fn test_component_build_output_missing() {
    let dir = TempDir::new().unwrap();
    let (manifest, component) = component_project(dir.path());
    fs::remove_dir_all(dir.path().join("lib")).unwrap();
    let ctx = context(dir.path());

    let config = Config::default();
    let runner = RecordingRunner::new();
    let registry = StubRegistry::new(true);
    let dispatcher = Dispatcher::new(&config, &runner, &registry);

    let err = dispatcher
        .publish_component(&ctx, &manifest, component)
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::BuildArtifactMissing(_)));
}

#[tokio::test]
async fn test_component_build_output_not_in_files() {
    let dir = TempDir::new().unwrap();
    let (_, component) = component_project(dir.path());
    let manifest = write_manifest(dir.path(), r#"{"name": "@acme/button", "files": ["dist"]}"#);
    let ctx = context(dir.path());

    let config = Config::default();
    let runner = RecordingRunner::new();
    let registry = StubRegistry::new(true);
    let dispatcher = Dispatcher::new(&config, &runner, &registry);

    let err = dispatcher
        .publish_component(&ctx, &manifest, component)
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::ManifestMisconfigured(_)));
    assert!(registry.uploads.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_terminal_action_strict_mode() {
    let mut config = Config::default();
    config.build.fail_on_terminal_action = true;
    let runner = RecordingRunner::new();
    let registry = StubRegistry::new(true);
    let dispatcher = Dispatcher::new(&config, &runner, &registry);

    let (channel, handle) = MockChannel::new();
    handle.push(ChannelEvent::Connect {
        id: "b1".to_string(),
    });
    handle.push_build("publish failed", "403 Forbidden");

    let err = dispatcher.run_build(channel).await.unwrap_err();
    assert!(matches!(
        err,
        PublishError::BuildTerminalFailure { ref action, .. } if action == "publish failed"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_terminal_action_reported_by_default() {
    let config = Config::default();
    let runner = RecordingRunner::new();
    let registry = StubRegistry::new(true);
    let dispatcher = Dispatcher::new(&config, &runner, &registry);

    let (channel, handle) = MockChannel::new();
    handle.push(ChannelEvent::Connect {
        id: "b1".to_string(),
    });
    handle.push_build("install failed", "ENOTFOUND");

    let outcome = dispatcher.run_build(channel).await.unwrap();
    assert_eq!(outcome.failure.unwrap().action, "install failed");
}

#[tokio::test(start_paused = true)]
async fn test_connect_deadline_shared_with_channel_open() {
    let mut config = Config::default();
    config.build.connect_timeout_secs = 5;
    let runner = RecordingRunner::new();
    let registry = StubRegistry::new(true);
    let dispatcher = Dispatcher::new(&config, &runner, &registry);

    let started = Instant::now();
    let deadline = started + Duration::from_secs(5);
    // opening the transport took most of the budget
    tokio::time::sleep(Duration::from_secs(4)).await;

    let (channel, handle) = MockChannel::new();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.push(ChannelEvent::Connect {
            id: "late".to_string(),
        });
    });

    let err = dispatcher.run_build_by(channel, deadline).await.unwrap_err();
    assert!(matches!(
        err,
        PublishError::BuildSessionTimeout(TimeoutPhase::Connect)
    ));
    assert!(started.elapsed() < Duration::from_secs(6));
}
