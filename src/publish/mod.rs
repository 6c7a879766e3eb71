//! Publish dispatcher.
//!
//! A source directory with `.componentrc` is a component: it is built
//! locally, registered with the component registry and published to npm.
//! Anything else is a project, built by the remote build service.

pub mod command;

pub use command::{CommandRunner, RecordingRunner, ShellRunner};

use std::fs;
use std::path::Path;

use regex::Regex;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cloudbuild::{BuildChannel, BuildParams, BuildSession, SessionOutcome, SocketIoChannel};
use crate::config::Config;
use crate::domain::{ComponentFile, Manifest, RepositoryContext};
use crate::error::{PublishError, Result, TimeoutPhase};
use crate::registry::{ComponentDescriptor, ComponentRegistry, ComponentUpload, GitDescriptor};

pub const DEFAULT_BUILD_CMD: &str = "npm run build";
pub const NPM_PUBLISH: &str = "npm publish";

const ALLOWED_BUILD_TOOLS: [&str; 2] = ["npm", "cnpm"];
const DIST_DIR: &str = "dist";

/// What a publish run produced
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// Registry response for the uploaded component
    Component(Value),
    Project(SessionOutcome),
}

/// Check a project build command and fill in the default.
///
/// The first token must be `npm` or `cnpm`; the last one must name a script
/// in the manifest.
pub fn validate_build_command(command: Option<&str>, manifest: &Manifest) -> Result<String> {
    let command = match command.map(str::trim) {
        Some(cmd) if !cmd.is_empty() => cmd.to_string(),
        _ => DEFAULT_BUILD_CMD.to_string(),
    };

    let tokens: Vec<&str> = command.split_whitespace().collect();
    let first = tokens.first().copied().unwrap_or_default();
    if !ALLOWED_BUILD_TOOLS.contains(&first) {
        return Err(PublishError::IllegalBuildCommand(command));
    }

    let script = tokens.last().copied().unwrap_or_default();
    if !manifest.has_script(script) {
        return Err(PublishError::UnknownBuildScript {
            script: script.to_string(),
            command,
        });
    }
    Ok(command)
}

/// Example pages of a component.
///
/// Returns the example path as declared (with `/dist` appended when the
/// pages live there), the resolved directory, and the sorted `index*.html`
/// file names.
pub fn collect_examples(dir: &Path, example_path: &str) -> Result<(String, String, Vec<String>)> {
    let mut declared = example_path.to_string();
    let mut real = dir.join(example_path);
    if !real.is_dir() {
        return Err(PublishError::BuildArtifactMissing(real.display().to_string()));
    }
    if real.join(DIST_DIR).is_dir() {
        real = real.join(DIST_DIR);
        declared = format!("{}/{}", declared.trim_end_matches('/'), DIST_DIR);
    }

    let pattern = Regex::new(r"^index\d*\.html$")
        .map_err(|e| PublishError::config(format!("invalid example pattern: {}", e)))?;
    let mut pages: Vec<String> = fs::read_dir(&real)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| pattern.is_match(name))
        .collect();
    pages.sort();

    Ok((declared, real.display().to_string(), pages))
}

/// Build parameters for a project context
pub fn build_params(ctx: &RepositoryContext, build_cmd: String) -> BuildParams {
    BuildParams {
        repo: ctx.remote_url.clone().unwrap_or_default(),
        name: ctx.normalized_name().to_string(),
        branch: ctx.branch.clone().unwrap_or_default(),
        version: ctx.version.to_string(),
        build_cmd,
    }
}

pub struct Dispatcher<'a> {
    config: &'a Config,
    runner: &'a dyn CommandRunner,
    registry: &'a dyn ComponentRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        config: &'a Config,
        runner: &'a dyn CommandRunner,
        registry: &'a dyn ComponentRegistry,
    ) -> Self {
        Dispatcher {
            config,
            runner,
            registry,
        }
    }

    /// Publish `ctx` along the component or project path
    pub async fn publish(&self, ctx: &RepositoryContext, manifest: &Manifest) -> Result<PublishOutcome> {
        match ComponentFile::load(ctx.dir())? {
            Some(component) => self
                .publish_component(ctx, manifest, component)
                .await
                .map(PublishOutcome::Component),
            None => {
                let params = self.prepare_project(ctx, manifest)?;
                let deadline = Instant::now() + self.config.build.connect_timeout();
                let channel = self.open_channel(&params, deadline).await?;
                self.run_build_by(channel, deadline)
                    .await
                    .map(PublishOutcome::Project)
            }
        }
    }

    /// Build locally, register the component, then `npm publish`
    pub async fn publish_component(
        &self,
        ctx: &RepositoryContext,
        manifest: &Manifest,
        mut component: ComponentFile,
    ) -> Result<Value> {
        let build_cmd = ctx.build_cmd.as_deref().unwrap_or(DEFAULT_BUILD_CMD);
        self.runner.run(build_cmd, ctx.dir())?;

        let build_path = ctx.dir().join(&component.build_path);
        if !build_path.exists() {
            return Err(PublishError::BuildArtifactMissing(
                build_path.display().to_string(),
            ));
        }
        if !manifest.includes_file(&component.build_path) {
            return Err(PublishError::manifest(format!(
                "'files' does not list the build output '{}'",
                component.build_path
            )));
        }
        info!(build_path = %component.build_path, "component build verified");

        let (example_list, example_real_path) = match component.example_path.clone() {
            Some(example_path) => {
                let (declared, real, pages) = collect_examples(ctx.dir(), &example_path)?;
                component.example_path = Some(declared);
                (pages, real)
            }
            None => (Vec::new(), String::new()),
        };
        debug!(pages = example_list.len(), "collected example pages");

        let descriptor = ComponentDescriptor {
            component: ComponentUpload {
                file: component,
                example_list,
                example_real_path,
            },
            git: GitDescriptor {
                platform: ctx.platform.map(|p| p.to_string()).unwrap_or_default(),
                remote: ctx.remote_url.clone().unwrap_or_default(),
                version: ctx.version.to_string(),
                branch: ctx.branch.clone().unwrap_or_default(),
                login: ctx.login.clone().unwrap_or_default(),
                owner: ctx.owner.map(|o| o.to_string()).unwrap_or_default(),
            },
        };

        let data = self
            .registry
            .create_component(&descriptor)
            .await?
            .ok_or_else(|| PublishError::registry("component upload was rejected"))?;

        self.runner.run(NPM_PUBLISH, ctx.dir())?;
        Ok(data)
    }

    /// Pre-checks of the project path
    pub fn prepare_project(&self, ctx: &RepositoryContext, manifest: &Manifest) -> Result<BuildParams> {
        let build_cmd = validate_build_command(ctx.build_cmd.as_deref(), manifest)?;
        Ok(build_params(ctx, build_cmd))
    }

    async fn open_channel(&self, params: &BuildParams, deadline: Instant) -> Result<SocketIoChannel> {
        let server = &self.config.build.server_url;
        tokio::time::timeout_at(deadline, SocketIoChannel::open(server, params))
            .await
            .map_err(|_| PublishError::BuildSessionTimeout(TimeoutPhase::Connect))?
    }

    /// Drive a build session over an open channel
    pub async fn run_build<C: BuildChannel>(&self, channel: C) -> Result<SessionOutcome> {
        let deadline = Instant::now() + self.config.build.connect_timeout();
        self.run_build_by(channel, deadline).await
    }

    /// Drive a build session whose `connect` must arrive by `deadline`.
    ///
    /// The deadline is shared with opening the transport, so the connect
    /// timeout covers both.
    pub async fn run_build_by<C: BuildChannel>(
        &self,
        channel: C,
        deadline: Instant,
    ) -> Result<SessionOutcome> {
        let mut session = BuildSession::new(
            channel,
            self.config.build.connect_timeout(),
            self.config.build.task_timeout(),
        )
        .connect_by(deadline);
        let outcome = session.run().await?;
        if self.config.build.fail_on_terminal_action {
            outcome.into_result()
        } else {
            Ok(outcome)
        }
    }
}
