//! `version`: build and version information.

use crate::output::OutputFormatter;
use anyhow::Result;
use serde::Serialize;

/// Build identifier injected at compile time, e.g. a git commit.
pub const BUILD: &str = match option_env!("STREAMGATE_BUILD") {
    Some(build) => build,
    None => "dev",
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
struct VersionInfo {
    build: &'static str,
    version: &'static str,
}

pub fn show(formatter: &OutputFormatter) -> Result<()> {
    if formatter.json_mode {
        return formatter.json(&VersionInfo {
            build: BUILD,
            version: VERSION,
        });
    }

    println!("Build: {}", BUILD);
    println!("Version: {}", VERSION);
    Ok(())
}
