//! `start`: run one streaming session until the source ends or the user stops it.

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::Arc;
use streamgate_ledger::KeystoreConnector;
use streamgate_media::SchemeConnector;
use streamgate_orchestrator::{
    JobCoordinator, SessionError, SessionOrchestrator, SessionOutcome, SessionProgress,
};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{config::Config, output::OutputFormatter};

pub async fn start(
    config: &Config,
    formatter: &OutputFormatter,
    source: String,
    account: PathBuf,
    password: Option<String>,
) -> Result<()> {
    config.validate()?;

    if !account.is_file() {
        anyhow::bail!("Account file {} does not exist", account.display());
    }
    let password = match password.filter(|p| !p.is_empty()) {
        Some(password) => password,
        None => prompt_password()?,
    };

    let ledger = Arc::new(KeystoreConnector::new(config.ledger_config()?, account, password));
    let media = Arc::new(media_connector(config));
    let jobs = JobCoordinator::new(config.jobs_config()).context("Failed to create job client")?;

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let orchestrator = SessionOrchestrator::new(config.orchestrator_config(), ledger, media, jobs)
        .with_progress(progress_tx);

    let started_at = Utc::now();
    let spinner = formatter.spinner("Probing source...");
    let run = orchestrator.run(&source, shutdown_signal());
    tokio::pin!(run);

    let result = loop {
        tokio::select! {
            result = &mut run => break result,
            Some(event) = progress_rx.recv() => show_progress(formatter, &spinner, event),
        }
    };
    spinner.finish_and_clear();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(SessionError::Interrupted) => {
            formatter.warning("Stopped before streaming started");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    print_summary(formatter, &outcome, Utc::now() - started_at);
    Ok(())
}

/// RTMP sources and ingest URLs go through FFmpeg; FLV over TCP and files stay native.
fn media_connector(config: &Config) -> SchemeConnector {
    SchemeConnector::new(config.connect_timeout())
}

fn show_progress(formatter: &OutputFormatter, spinner: &ProgressBar, event: SessionProgress) {
    info!(%event, "Session progress");
    match event {
        SessionProgress::Ready { output_url } => {
            spinner.finish_and_clear();
            println!(
                "Your stream is going to be available shortly. Use next URL to access it: {}",
                output_url
            );
            println!("Stop streaming with Ctrl+C.");
        }
        SessionProgress::Stopping => {
            println!();
            formatter.info("Stopping stream...");
        }
        // Once ready the spinner is gone; later relay updates stay in the log.
        other if !spinner.is_finished() => spinner.set_message(capitalize(&other.to_string())),
        _ => {}
    }
}

fn print_summary(formatter: &OutputFormatter, outcome: &SessionOutcome, elapsed: TimeDelta) {
    if formatter.json_mode {
        let summary = serde_json::json!({
            "stream_id": outcome.session_id.to_string(),
            "stream_address": outcome.contract.to_string(),
            "destination": outcome.destination,
            "packets": outcome.packets,
            "end": format!("{:?}", outcome.end),
            "duration_secs": elapsed.num_seconds(),
        });
        if let Err(e) = formatter.json(&summary) {
            warn!("Failed to print summary: {}", e);
        }
        return;
    }

    formatter.header("Stream Summary");
    formatter.kv("Stream ID", &outcome.session_id.to_string());
    formatter.kv("Stream Address", &outcome.contract.to_string());
    formatter.kv("Destination", &formatter.format_url(&outcome.destination));
    formatter.kv("Packets Relayed", &outcome.packets.to_string());
    formatter.kv("Duration", &formatter.format_duration(elapsed));
    formatter.kv("Ended", &formatter.format_end(&outcome.end));
    println!();
    formatter.success("Streaming finished");
}

fn prompt_password() -> Result<String> {
    let password = dialoguer::Password::new()
        .with_prompt("Enter account password")
        .interact()
        .context("Failed to read account password")?;

    if password.is_empty() {
        anyhow::bail!("Account password is missing");
    }
    Ok(password)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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

#[cfg(test)]
mod tests {
    use super::*;
    use streamgate_media::{MediaConnector, MediaError};

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("acquired stream id 7"), "Acquired stream id 7");
        assert_eq!(capitalize(""), "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_connector_dials_rtmp_ingest_urls() {
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = Config {
            connect_timeout_secs: 5,
            ..Default::default()
        };

        let err = media_connector(&config)
            .dial_sink(&format!("rtmp://127.0.0.1:{}/live/abc", port))
            .await
            .err()
            .unwrap();
        assert!(
            matches!(err, MediaError::ConnectFailed { .. } | MediaError::ConnectTimeout { .. }),
            "{}",
            err
        );
    }

    #[tokio::test]
    async fn test_start_rejects_incomplete_config() {
        let formatter = OutputFormatter::new(false, false);
        let err = start(
            &Config::default(),
            &formatter,
            "tcp://camera:1936/live".to_string(),
            PathBuf::from("/nonexistent/key.json"),
            Some("secret".to_string()),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("manager_addr"));
    }

    #[tokio::test]
    async fn test_start_rejects_missing_account_file() {
        let config = Config {
            manager_addr: "http://manager:8080".to_string(),
            node_rpc_addr: "http://node:8545".to_string(),
            contract_address: format!("0x{}", "11".repeat(20)),
            ..Default::default()
        };
        let formatter = OutputFormatter::new(false, false);
        let err = start(
            &config,
            &formatter,
            "tcp://camera:1936/live".to_string(),
            PathBuf::from("/nonexistent/key.json"),
            Some("secret".to_string()),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
