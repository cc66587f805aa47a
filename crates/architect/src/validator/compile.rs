//! Type check of the crate with a staged artifact in place.
//!
//! The syntax-tree stages cannot see type errors, unresolved names or a
//! handler whose body does not match its signature. This stage runs the
//! compiler front end over the whole crate, so an artifact that would break
//! the next rebuild is caught while it can still be rolled back.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::SupervisorConfig;

/// Compiler diagnostics kept in a rejection reason.
const MAX_DIAGNOSTICS: usize = 5;

#[async_trait]
pub trait BuildCheck: Send + Sync {
    /// `Err` carries the diagnostics to show the requester.
    async fn check(&self) -> Result<(), String>;
}

/// Runs a check command (by default `cargo check`) in a fixed directory.
#[derive(Debug, Clone)]
pub struct CargoCheck {
    command: Vec<String>,
    dir: PathBuf,
}

impl CargoCheck {
    pub fn new(command: Vec<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            dir: dir.into(),
        }
    }

    pub fn from_config(config: &SupervisorConfig, dir: impl Into<PathBuf>) -> Self {
        Self::new(resolve_check(config), dir)
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }
}

#[async_trait]
impl BuildCheck for CargoCheck {
    async fn check(&self) -> Result<(), String> {
        let Some((program, args)) = self.command.split_first() else {
            return Ok(());
        };
        tracing::info!("checking build: {}", self.command.join(" "));
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.dir)
            .output()
            .await
            .map_err(|error| format!("could not run {program}: {error}"))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let summary = summarize_diagnostics(&stderr);
        if summary.is_empty() {
            return Err(format!("{program} exited with {}", output.status));
        }
        Err(summary)
    }
}

/// Configured check command, or a `cargo check` of every target of this
/// package with one-line diagnostics.
pub fn resolve_check(config: &SupervisorConfig) -> Vec<String> {
    if let Some(command) = &config.check_command {
        return command.clone();
    }
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
    vec![
        "cargo".to_string(),
        "check".to_string(),
        "--manifest-path".to_string(),
        manifest.display().to_string(),
        "--all-targets".to_string(),
        "--message-format".to_string(),
        "short".to_string(),
    ]
}

/// The first error lines of compiler output, without cargo's summaries.
pub fn summarize_diagnostics(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .filter(|line| line.contains("error"))
        .filter(|line| {
            !line.starts_with("error: could not compile")
                && !line.starts_with("error: aborting")
                && !line.starts_with("warning")
        })
        .take(MAX_DIAGNOSTICS)
        .collect::<Vec<_>>()
        .join("\n")
}
