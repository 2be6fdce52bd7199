//! streamgate CLI.
//!
//! Streams a media source through a ledger-anchored relay session:
//! - `start`: reserve and create the session, then relay until stopped
//! - `version`: build and version
//! - `config show`: effective configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

use config::Config;
use output::OutputFormatter;

#[derive(Parser)]
#[command(name = "streamgate")]
#[command(author, version, about = "Ledger-anchored media streaming client", long_about = None)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Print machine-readable JSON where supported
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start streaming a source through a new session
    Start {
        /// Source address: tcp://host:port[/key], file://path or a path
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Account keystore file
        #[arg(short, long, value_name = "PATH")]
        account: PathBuf,

        /// Keystore password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Show build and version
    Version,

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let colored = !cli.no_color;
    let json = cli.json;

    if let Err(e) = run(cli).await {
        OutputFormatter::new(colored, json).error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if cli.no_color {
        config.colored = false;
    }

    init_tracing(&config.log_level, &config.log_format);
    let formatter = OutputFormatter::new(config.colored, cli.json);

    match cli.command {
        Commands::Start {
            source,
            account,
            password,
        } => commands::start::start(&config, &formatter, source, account, password).await,
        Commands::Version => commands::version::show(&formatter),
        Commands::Config(ConfigCommands::Show) => show_config(&config, &formatter),
    }
}

fn show_config(config: &Config, formatter: &OutputFormatter) -> Result<()> {
    if formatter.json_mode {
        return formatter.json(config);
    }

    let or_unset = |value: &str| {
        if value.is_empty() {
            "Not set".to_string()
        } else {
            value.to_string()
        }
    };

    formatter.header("Current Configuration");
    formatter.kv("Manager Address", &or_unset(&config.manager_addr));
    formatter.kv("Node RPC Address", &or_unset(&config.node_rpc_addr));
    formatter.kv("Contract Address", &or_unset(&config.contract_address));
    formatter.kv("Minimum Balance", &config.min_balance.to_string());
    formatter.kv("Log Level", &config.log_level);
    formatter.kv("Log Format", &config.log_format);
    formatter.kv("Profile ID", &config.profile_id.to_string());
    formatter.kv(
        "Job Statuses",
        &format!("{} / {}", config.approved_status, config.ready_status),
    );
    formatter.kv("Cancel Job On Stop", &config.cancel_job_on_stop.to_string());

    println!();
    let config_path = Config::config_path()?;
    formatter.info(&format!("Config file: {}", config_path.display()));
    if let Err(e) = config.validate() {
        formatter.warning(&e.to_string());
    }
    Ok(())
}

/// Logs go to stderr; stdout carries command output.
fn init_tracing(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
