//! Main workflow orchestration logic
//!
//! Runs the three phases of a publish in order: `prepare` (platform, token,
//! owner, remote repository, local repository), `commit` (branch
//! negotiation and reconciliation) and `publish`. Every error leaving a
//! phase is tagged with that phase.

use std::fs;
use std::path::{Path, PathBuf};

use semver::Version;
use tracing::{debug, info};

use crate::boundary::BoundaryWarning;
use crate::cache::{CacheEntry, UserCache};
use crate::config::Config;
use crate::domain::version::parse_declared;
use crate::domain::{BranchDecision, IncrementClass, Manifest, RepositoryContext};
use crate::error::{Phase, PhaseExt, PublishError, Result};
use crate::git::{Git2Vcs, Vcs, ORIGIN};
use crate::platform::{GitPlatform, OrgInfo, OwnerKind, PlatformKind, RepoInfo};
use crate::publish::{CommandRunner, Dispatcher, PublishOutcome};
use crate::registry::{ComponentRegistry, NpmRegistry};
use crate::release::{negotiate_branch, Reconciler};
use crate::ui::{self, Choice, Prompt};

pub const GITIGNORE_FILE: &str = ".gitignore";

const GITIGNORE_TEMPLATE: &str = ".DS_Store
node_modules
/dist

# local env files
.env.local
.env.*.local

# Log files
npm-debug.log*
yarn-debug.log*
yarn-error.log*
pnpm-debug.log*

# Editor directories and files
.idea
.vscode
*.suo
*.ntvs*
*.njsproj
*.sln
*.sw?
";

/// Arguments for the publish workflow
///
/// Mirrors the CLI Args but in a format suitable for orchestration logic.
/// This decoupling allows the workflow to be called programmatically
/// without depending on clap.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PublishWorkflowArgs {
    /// Source directory of the project
    pub dir: PathBuf,

    /// Ask for the platform again
    pub refresh_server: bool,

    /// Ask for the token again
    pub refresh_token: bool,

    /// Ask for owner and login again
    pub refresh_owner: bool,

    pub build_cmd: Option<String>,

    /// Increment class used when the version is not ahead of the latest release
    pub increment: Option<IncrementClass>,
}

/// Result of a successful publish workflow
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowResult {
    pub decision: BranchDecision,
    pub outcome: PublishOutcome,
}

/// Read the manifest and build the run's context
pub fn load_context(args: &PublishWorkflowArgs) -> Result<(RepositoryContext, Manifest)> {
    let manifest = Manifest::load(&args.dir)?;
    let name = manifest.name()?.to_string();
    let version = parse_declared(manifest.version()?)?;
    let mut ctx = RepositoryContext::new(name, version, &args.dir);
    ctx.build_cmd = args.build_cmd.clone();
    Ok((ctx, manifest))
}

/// Cached platform, or ask for it
pub fn resolve_platform(
    cache: &UserCache,
    prompt: &mut dyn Prompt,
    refresh: bool,
) -> Result<PlatformKind> {
    if !refresh {
        if let Some(cached) = cache.read(CacheEntry::Server)? {
            let kind = cached.parse()?;
            ui::display_success(&format!("Using git platform {}", kind));
            return Ok(kind);
        }
    }

    let choices: Vec<Choice> = PlatformKind::ALL
        .iter()
        .map(|kind| Choice::new(capitalize(kind.as_str()), kind.as_str()))
        .collect();
    let kind: PlatformKind = prompt
        .select("Select the git platform to host the repository", &choices, 0)?
        .parse()?;
    cache.write(CacheEntry::Server, kind.as_str())?;
    ui::display_success(&format!(
        "Saved git platform {} to {}",
        kind,
        cache.path(CacheEntry::Server).display()
    ));
    Ok(kind)
}

/// Cached token, or ask for it
pub fn resolve_token(
    cache: &UserCache,
    prompt: &mut dyn Prompt,
    kind: PlatformKind,
    token_url: &str,
    refresh: bool,
) -> Result<String> {
    if !refresh {
        if let Some(token) = cache.read(CacheEntry::Token)? {
            debug!(path = %cache.path(CacheEntry::Token).display(), "using cached token");
            return Ok(token);
        }
    }

    ui::display_status(&format!(
        "A {} token is required, create one at {}",
        kind, token_url
    ));
    let token = prompt.password("Paste the token here:")?;
    if token.is_empty() {
        return Err(PublishError::config(format!("no {} token given", kind)));
    }
    cache.write(CacheEntry::Token, &token)?;
    ui::display_success("Token saved");
    Ok(token)
}

/// Owner kind and login the repository lives under.
///
/// Cached answers are reused unless `refresh` is set; the organisation
/// choice is only offered when `orgs` is not empty.
pub fn resolve_owner(
    cache: &UserCache,
    prompt: &mut dyn Prompt,
    user_login: &str,
    orgs: &[OrgInfo],
    refresh: bool,
) -> Result<(OwnerKind, String)> {
    if !refresh {
        if let (Some(owner), Some(login)) = (
            cache.read(CacheEntry::Owner)?,
            cache.read(CacheEntry::Login)?,
        ) {
            return Ok((owner.parse()?, login));
        }
    }

    let mut choices = vec![Choice::new("Personal", OwnerKind::User.as_str())];
    if !orgs.is_empty() {
        choices.push(Choice::new("Organization", OwnerKind::Org.as_str()));
    }
    let owner: OwnerKind = prompt
        .select("Select the repository owner", &choices, 0)?
        .parse()?;

    let login = match owner {
        OwnerKind::User => user_login.to_string(),
        OwnerKind::Org => {
            let choices: Vec<Choice> = orgs
                .iter()
                .map(|org| Choice::new(org.login.as_str(), org.login.as_str()))
                .collect();
            prompt.select("Select the organization", &choices, 0)?
        }
    };

    cache.write(CacheEntry::Owner, owner.as_str())?;
    cache.write(CacheEntry::Login, &login)?;
    Ok((owner, login))
}

/// Find the remote repository, creating it when missing
pub async fn ensure_remote_repo(
    platform: &dyn GitPlatform,
    owner: OwnerKind,
    login: &str,
    orgs: &[OrgInfo],
    name: &str,
) -> Result<RepoInfo> {
    if let Some(repo) = platform.repo(login, name).await? {
        ui::display_success(&format!("Found remote repository {}/{}", login, name));
        return Ok(repo);
    }

    ui::display_status(&format!("Creating remote repository {}/{}", login, name));
    let repo = match owner {
        OwnerKind::User => platform.create_repo(name).await?,
        OwnerKind::Org => {
            let org = orgs.iter().find(|o| o.login == login).ok_or_else(|| {
                PublishError::platform(format!("not a member of organization '{}'", login))
            })?;
            platform.create_org_repo(name, org).await?
        }
    };
    ui::display_success("Remote repository created");
    Ok(repo)
}

/// Write the default `.gitignore` if there is none; returns whether it was written
pub fn ensure_gitignore(dir: &Path) -> Result<bool> {
    let path = dir.join(GITIGNORE_FILE);
    if path.exists() {
        return Ok(false);
    }
    fs::write(&path, GITIGNORE_TEMPLATE)?;
    ui::display_success(&format!("Wrote {}", GITIGNORE_FILE));
    Ok(true)
}

/// Open the local repository, initialising it on first use.
///
/// A fresh repository gets the `origin` remote and its first commit.
pub fn init_repository(dir: &Path, remote_url: &str, prompt: &mut dyn Prompt) -> Result<Git2Vcs> {
    if dir.join(".git").exists() {
        debug!(dir = %dir.display(), "repository already initialised");
        return Git2Vcs::open(dir);
    }

    ui::display_status("Initialising git repository");
    let vcs = Git2Vcs::init(dir)?;
    if !vcs.remotes()?.iter().any(|r| r == ORIGIN) {
        vcs.add_remote(ORIGIN, remote_url)?;
    }

    let mut reconciler = Reconciler::new(&vcs, prompt);
    reconciler.initial_commit()?;
    show_warnings(reconciler.take_warnings());
    ui::display_success("Initial commit done");
    Ok(vcs)
}

/// Prepare phase: platform, credentials, remote and local repository
pub async fn prepare(
    args: &PublishWorkflowArgs,
    config: &Config,
    ctx: &mut RepositoryContext,
    prompt: &mut dyn Prompt,
) -> Result<Git2Vcs> {
    let cache = UserCache::open(&config.cli_home()?)?;

    let kind = resolve_platform(&cache, prompt, args.refresh_server)?;
    // token_url does not depend on the token
    let token_url = kind.client("", config)?.token_url();
    let token = resolve_token(&cache, prompt, kind, &token_url, args.refresh_token)?;
    let platform = kind.client(&token, config)?;

    let user = platform.user().await?;
    let orgs = platform.orgs().await?;
    info!(login = %user.login, orgs = orgs.len(), "fetched user and organizations");

    let (owner, login) = resolve_owner(&cache, prompt, &user.login, &orgs, args.refresh_owner)?;
    let name = ctx.normalized_name().to_string();
    ensure_remote_repo(platform.as_ref(), owner, &login, &orgs, &name).await?;

    let remote_url = platform.remote_url(&login, &name);
    ctx.platform = Some(kind);
    ctx.owner = Some(owner);
    ctx.login = Some(login);
    ctx.remote_url = Some(remote_url.clone());

    ensure_gitignore(ctx.dir())?;
    init_repository(ctx.dir(), &remote_url, prompt)
}

/// Commit phase: negotiate the branch, then reconcile the working tree
pub fn commit(
    vcs: &dyn Vcs,
    prompt: &mut dyn Prompt,
    ctx: &mut RepositoryContext,
    manifest: &mut Manifest,
    increment: Option<IncrementClass>,
) -> Result<BranchDecision> {
    let (decision, warning) =
        negotiate_branch(vcs, prompt, ctx, manifest, increment).phase(Phase::Negotiation)?;
    show_warnings(warning);
    ui::display_success(&format!(
        "Working on {} (version {})",
        decision.branch, decision.version
    ));

    let mut reconciler = Reconciler::new(vcs, prompt);
    let result = reconciler.reconcile(&decision);
    show_warnings(reconciler.take_warnings());
    result.phase(Phase::Reconciliation)?;
    ui::display_success(&format!("Pushed {}", decision.branch));
    Ok(decision)
}

/// Publish phase
pub async fn publish(
    config: &Config,
    ctx: &RepositoryContext,
    manifest: &Manifest,
    runner: &dyn CommandRunner,
    registry: &dyn ComponentRegistry,
) -> Result<PublishOutcome> {
    let dispatcher = Dispatcher::new(config, runner, registry);
    let outcome = dispatcher.publish(ctx, manifest).await.phase(Phase::Build)?;

    match &outcome {
        PublishOutcome::Component(_) => ui::display_success("Component published"),
        PublishOutcome::Project(session) => match &session.failure {
            Some(failure) => show_warnings(Some(BoundaryWarning::BuildFailureObserved {
                action: failure.action.clone(),
                message: failure.message.clone(),
            })),
            None => ui::display_success("Cloud build finished"),
        },
    }
    Ok(outcome)
}

/// Main publish workflow
///
/// Orchestrates the entire release:
/// 1. Read the manifest into a [RepositoryContext]
/// 2. Prepare platform, credentials and repositories
/// 3. Negotiate the branch and reconcile the working tree
/// 4. Publish the component or run the cloud build
pub async fn run_publish_workflow(
    args: PublishWorkflowArgs,
    config: &Config,
    prompt: &mut dyn Prompt,
    runner: &dyn CommandRunner,
    registry: &dyn ComponentRegistry,
) -> Result<WorkflowResult> {
    let (mut ctx, mut manifest) = load_context(&args).phase(Phase::Prepare)?;

    let vcs = prepare(&args, config, &mut ctx, prompt)
        .await
        .phase(Phase::Prepare)?;

    let decision = commit(&vcs, prompt, &mut ctx, &mut manifest, args.increment)?;

    let outcome = publish(config, &ctx, &manifest, runner, registry).await?;
    Ok(WorkflowResult { decision, outcome })
}

/// Warn when a newer compatible release of this CLI is published
pub async fn check_cli_update(config: &Config, package: &str, current: &Version) -> Option<BoundaryWarning> {
    let registry = match NpmRegistry::new(&config.registry.npm_registry) {
        Ok(registry) => registry,
        Err(e) => {
            return Some(BoundaryWarning::RegistryUnreachable {
                reason: e.to_string(),
            })
        }
    };
    match registry.latest_compatible(package, current).await {
        Ok(Some(latest)) if &latest > current => Some(BoundaryWarning::UpdateAvailable {
            current: current.to_string(),
            latest: latest.to_string(),
        }),
        Ok(_) => None,
        Err(e) => Some(BoundaryWarning::RegistryUnreachable {
            reason: e.to_string(),
        }),
    }
}

fn show_warnings(warnings: impl IntoIterator<Item = BoundaryWarning>) {
    for warning in warnings {
        ui::display_boundary_warning(&warning);
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
