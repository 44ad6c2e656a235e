mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    artifact::ArtifactSubcommand, audit::AuditSubcommand, checkpoint::CheckpointSubcommand,
    config::ConfigSubcommand, git::GitSubcommand, validate::ValidateSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "autodev",
    about = "Checkpoints, artifacts and consent-gated git automation for the autonomous-dev pipeline",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .claude/ or .git/)
    #[arg(long, global = true, env = "AUTODEV_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the .claude/ tree and a default config
    Init,

    /// Resumable workflows and their progress
    Status,

    /// Record and inspect pipeline progress
    Checkpoint {
        #[command(subcommand)]
        subcommand: CheckpointSubcommand,
    },

    /// Read and write per-stage artifacts
    Artifact {
        #[command(subcommand)]
        subcommand: ArtifactSubcommand,
    },

    /// Consent-gated commit and push
    Git {
        #[command(subcommand)]
        subcommand: GitSubcommand,
    },

    /// Validate paths, names, issue numbers and free text
    Validate {
        #[command(subcommand)]
        subcommand: ValidateSubcommand,
    },

    /// Inspect the security audit log
    Audit {
        #[command(subcommand)]
        subcommand: AuditSubcommand,
    },

    /// Show or validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Checkpoint { subcommand } => cmd::checkpoint::run(&root, subcommand, cli.json),
        Commands::Artifact { subcommand } => cmd::artifact::run(&root, subcommand, cli.json),
        Commands::Git { subcommand } => cmd::git::run(&root, subcommand, cli.json),
        Commands::Validate { subcommand } => cmd::validate::run(&root, subcommand, cli.json),
        Commands::Audit { subcommand } => cmd::audit::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
