use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use semver::Version;
use tracing_subscriber::EnvFilter;

use cloud_publish::boundary::BoundaryWarning;
use cloud_publish::cli::orchestration::check_cli_update;
use cloud_publish::cli::{run_publish_workflow, PublishWorkflowArgs};
use cloud_publish::config;
use cloud_publish::domain::IncrementClass;
use cloud_publish::error::Phase;
use cloud_publish::publish::{PublishOutcome, ShellRunner};
use cloud_publish::registry::HttpComponentRegistry;
use cloud_publish::ui::{self, TerminalPrompt};

/// Overrides the CLI home when `--home` is not given
const CLI_HOME_ENV: &str = "CLI_HOME_PATH";

#[derive(clap::Parser)]
#[command(
    name = "cloud-publish",
    version,
    about = "Negotiate a release branch, sync it with the remote and publish through the cloud build"
)]
struct Args {
    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Enable debug logging")]
    debug: bool,

    #[arg(long, help = "Project source directory (defaults to the current directory)")]
    dir: Option<PathBuf>,

    #[arg(long, help = "CLI home directory holding cached answers")]
    home: Option<PathBuf>,

    #[arg(long, help = "Choose the git platform again")]
    refresh_server: bool,

    #[arg(long, help = "Enter the platform token again")]
    refresh_token: bool,

    #[arg(long, help = "Choose the repository owner again")]
    refresh_owner: bool,

    #[arg(long, help = "Build command, npm or cnpm only (default: npm run build)")]
    build_cmd: Option<String>,

    #[arg(
        long,
        help = "Increment class when the version is not ahead of the latest release: patch, minor or major"
    )]
    increment: Option<String>,
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    // Load configuration
    let mut config = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            ui::display_error(&format!("Error loading config: {}", e));
            std::process::exit(1);
        }
    };
    if let Some(home) = args.home {
        config.home = Some(home);
    } else if let Ok(home) = std::env::var(CLI_HOME_ENV) {
        config.home = Some(PathBuf::from(home));
    }

    let increment = match args.increment.as_deref().map(str::parse::<IncrementClass>) {
        Some(Ok(class)) => Some(class),
        Some(Err(e)) => {
            ui::display_error(&e.in_phase(Phase::Negotiation).to_string());
            std::process::exit(1);
        }
        None => None,
    };

    let current = Version::parse(env!("CARGO_PKG_VERSION")).context("invalid package version")?;
    match check_cli_update(&config, env!("CARGO_PKG_NAME"), &current).await {
        Some(BoundaryWarning::RegistryUnreachable { reason }) => {
            tracing::debug!(%reason, "update check skipped");
        }
        Some(warning) => ui::display_boundary_warning(&warning),
        None => {}
    }

    let dir = match args.dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot read current directory")?,
    };

    let workflow_args = PublishWorkflowArgs {
        dir,
        refresh_server: args.refresh_server,
        refresh_token: args.refresh_token,
        refresh_owner: args.refresh_owner,
        build_cmd: args.build_cmd,
        increment,
    };

    let registry = HttpComponentRegistry::new(&config.registry.component_api)?;
    let mut prompt = TerminalPrompt::new();

    match run_publish_workflow(workflow_args, &config, &mut prompt, &ShellRunner, &registry).await {
        Ok(result) => {
            let what = match result.outcome {
                PublishOutcome::Component(_) => "component",
                PublishOutcome::Project(_) => "project",
            };
            println!(
                "\n{} Published {} {} from {}\n",
                console::style("✓").green(),
                what,
                result.decision.version,
                result.decision.branch
            );
            Ok(())
        }
        Err(e) => {
            ui::display_error(&e.to_string());
            std::process::exit(1);
        }
    }
}
