//! Dirprov - Directory User Provisioning
//!
//! Creates directory user entries under organizational-unit paths, sets
//! their initial credential, applies attribute groups and assigns group
//! memberships.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use commands::CommandContext;
use dirprov_core::config::{LoggingConfig, ProvisioningConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "dirprov")]
#[command(author = "Dirprov Team")]
#[command(version = dirprov_core::VERSION)]
#[command(about = "Directory user provisioning", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DIRPROV_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "DIRPROV_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Run against an in-memory directory instead of the configured server
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision one user from a JSON request file ("-" reads stdin)
    Provision {
        /// Request file
        request: String,
    },

    /// Create any missing organizational units along a path
    BuildOu {
        /// Path segments, outermost first (e.g. "Region/Dept/Sales/Users")
        path: String,
    },

    /// Resolve an organizational-unit path without creating anything
    Resolve {
        /// Path segments, outermost first
        path: String,
    },

    /// Generate a password under the configured policy
    Password {
        /// Number of random bytes to draw
        #[arg(long)]
        bytes: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = ProvisioningConfig::from_file(path)?;
            config.apply_env();
            config
        }
        None => ProvisioningConfig::from_env(),
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    init_logging(&config.logging);

    let ctx = CommandContext {
        config,
        output_format: cli.output,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Provision { request } => commands::provision::execute(&ctx, &request).await,
        Commands::BuildOu { path } => commands::ou::build(&ctx, &path).await,
        Commands::Resolve { path } => commands::ou::resolve(&ctx, &path).await,
        Commands::Password { bytes } => commands::password::execute(&ctx, bytes),
    }
}

/// Logs go to stderr so stdout carries only command output
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
