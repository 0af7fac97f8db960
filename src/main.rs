//! DeepRelease CLI
//!
//! Generates Markdown release notes for a GitHub repository from the pull
//! requests merged since its last release.

mod cli;

use clap::{Parser, Subcommand};
use cli::helpers::OutputOverrides;
use deeprelease_core::Result;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deeprelease")]
#[command(about = "Release notes from merged pull requests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Config file (defaults to ./deeprelease.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate release notes for the pull requests merged since the last release
    Run {
        /// Repository as owner/name
        #[arg(short, long)]
        repo: String,

        /// GitHub access token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Only collect pull requests merged before this date (YYYYMMDDHHMM)
        #[arg(long)]
        until: Option<String>,

        /// Directory the Markdown file is written to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Markdown file name without extension
        #[arg(short, long)]
        name: Option<String>,

        /// Category order as code letters, e.g. FBDN
        #[arg(long)]
        order: Option<String>,
    },

    /// Summarize one change into a release note entry
    Summarize {
        /// Pull request title
        #[arg(short, long)]
        title: String,

        /// Pull request description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Commit message (repeatable)
        #[arg(long = "commit")]
        commits: Vec<String>,
    },

    /// Predict the release note category of a pull request title
    Classify {
        /// Pull request title
        #[arg(short, long)]
        title: String,
    },

    /// Validate configuration and check that model artifacts exist
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Library logs live under the deeprelease_core target
    let level = level.as_str().to_lowercase();
    let filter = EnvFilter::new(format!(
        "deeprelease={level},deeprelease_core={level},reqwest=warn,hyper=warn"
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("DeepRelease v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run {
            repo,
            token,
            until,
            output_dir,
            name,
            order,
        } => {
            let overrides = OutputOverrides {
                token,
                output_dir,
                name,
                order,
            };
            cli::run::handle(config_path, &repo, until.as_deref(), overrides).await
        }
        Commands::Summarize {
            title,
            description,
            commits,
        } => cli::summarize::handle(config_path, title, description, commits).await,
        Commands::Classify { title } => cli::classify::handle(config_path, &title).await,
        Commands::CheckConfig => cli::check_config::handle(config_path).await,
    }
}
