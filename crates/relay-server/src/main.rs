use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use streamgate_relay::{RelayServer, RelayServerConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_LISTEN_ADDR};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "streamgate-relay")]
#[command(about = "FLV relay server for publish/play stream keys", long_about = None)]
#[command(version)]
struct Args {
    /// Address to accept publishers and players on
    #[arg(short, long, default_value = DEFAULT_LISTEN_ADDR)]
    listen: SocketAddr,

    /// Packets buffered per channel before slow players skip ahead
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    channel_capacity: usize,

    /// Seconds a client has to send its request line
    #[arg(long, default_value_t = 10)]
    handshake_timeout: u64,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format: "json" or "text"
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Application error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, &args.log_format);

    let config = RelayServerConfig {
        listen_addr: args.listen,
        channel_capacity: args.channel_capacity,
        handshake_timeout: Duration::from_secs(args.handshake_timeout),
    };

    info!("Relay server configuration:");
    info!("  Listen Address: {}", config.listen_addr);
    info!("  Channel Capacity: {}", config.channel_capacity);

    RelayServer::new(config).run(shutdown_signal()).await?;

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn init_tracing(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
