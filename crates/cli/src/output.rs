//! Output formatting utilities for CLI.

use anyhow::Result;
use chrono::TimeDelta;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;
use streamgate_orchestrator::SessionEnd;

/// Output formatter
pub struct OutputFormatter {
    colored: bool,
    pub json_mode: bool,
}

impl OutputFormatter {
    pub fn new(colored: bool, json_mode: bool) -> Self {
        Self { colored, json_mode }
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("{} {}", "✓".green().bold(), message.green());
        } else {
            println!("✓ {}", message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("{} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("✗ {}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("{} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("⚠ {}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if self.colored {
            println!("{} {}", "ℹ".blue().bold(), message);
        } else {
            println!("ℹ {}", message);
        }
    }

    /// Print a header
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n{}", title.bold().underline());
        } else {
            println!("\n{}", title);
        }
    }

    /// Print key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("  {}: {}", key.bold(), value);
        } else {
            println!("  {}: {}", key, value);
        }
    }

    pub fn json<T: Serialize>(&self, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        println!("{}", json);
        Ok(())
    }

    /// Spinner ticking on its own until finished or cleared.
    pub fn spinner(&self, message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }

    pub fn format_end(&self, end: &SessionEnd) -> String {
        let text = match end {
            SessionEnd::SourceExhausted => "source ended",
            SessionEnd::Cancelled => "stopped",
        };
        if !self.colored {
            return text.to_string();
        }

        match end {
            SessionEnd::SourceExhausted => text.yellow().to_string(),
            SessionEnd::Cancelled => text.green().to_string(),
        }
    }

    pub fn format_duration(&self, elapsed: TimeDelta) -> String {
        let secs = elapsed.num_seconds().max(0);
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }

    /// Mask everything but the scheme and host of a URL.
    pub fn format_url(&self, url: &str) -> String {
        match url.split_once("://") {
            Some((scheme, rest)) => {
                let host = rest.split(['/', '?']).next().unwrap_or(rest);
                if host.len() == rest.len() {
                    url.to_string()
                } else {
                    format!("{}://{}/…", scheme, host)
                }
            }
            None => url.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_end() {
        let formatter = OutputFormatter::new(false, false);
        assert_eq!(formatter.format_end(&SessionEnd::Cancelled), "stopped");
        assert_eq!(formatter.format_end(&SessionEnd::SourceExhausted), "source ended");
    }

    #[test]
    fn test_format_duration() {
        let formatter = OutputFormatter::new(false, false);
        assert_eq!(formatter.format_duration(TimeDelta::seconds(3725)), "01:02:05");
        assert_eq!(formatter.format_duration(TimeDelta::seconds(-4)), "00:00:00");
    }

    #[test]
    fn test_format_url() {
        let formatter = OutputFormatter::new(false, false);
        assert_eq!(
            formatter.format_url("tcp://ingest:1936/secret-key"),
            "tcp://ingest:1936/…"
        );
        assert_eq!(formatter.format_url("http://manager:8080"), "http://manager:8080");
        assert_eq!(formatter.format_url("in.flv"), "in.flv");
    }
}
