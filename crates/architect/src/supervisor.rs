//! Restart-to-activate: rebuild, then replace the process image in place.

use std::ffi::OsString;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::SupervisorConfig;

/// The bot cannot restart. Fatal by contract.
#[derive(Debug, Error)]
pub enum RestartError {
    #[error("failed to determine the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("rebuild command {program} could not be started: {source}")]
    RebuildSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("rebuild command {program} failed with {status}")]
    RebuildFailed { program: String, status: String },
    #[error("failed to re-execute {program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait Restarter: Send + Sync {
    /// Replace the running process. Returns only on failure.
    fn restart(&self) -> Result<(), RestartError>;
}

#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    program: PathBuf,
    args: Vec<OsString>,
    rebuild: Vec<String>,
}

impl ProcessSupervisor {
    /// Capture the running executable and its arguments. Call at startup,
    /// before a rebuild can replace the binary on disk.
    pub fn capture(config: &SupervisorConfig) -> Result<Self, RestartError> {
        let program = std::env::current_exe().map_err(RestartError::CurrentExe)?;
        let args = std::env::args_os().skip(1).collect();
        Ok(Self::new(program, args, resolve_rebuild(config)))
    }

    pub fn new(program: PathBuf, args: Vec<OsString>, rebuild: Vec<String>) -> Self {
        Self {
            program,
            args,
            rebuild,
        }
    }

    pub fn rebuild_command(&self) -> &[String] {
        &self.rebuild
    }

    fn rebuild(&self) -> Result<(), RestartError> {
        let Some((program, args)) = self.rebuild.split_first() else {
            return Ok(());
        };
        tracing::info!("rebuilding before restart: {}", self.rebuild.join(" "));
        let status = std::process::Command::new(program)
            .args(args)
            .status()
            .map_err(|source| RestartError::RebuildSpawn {
                program: program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(RestartError::RebuildFailed {
                program: program.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }

    #[cfg(unix)]
    fn exec(&self) -> Result<(), RestartError> {
        use std::os::unix::process::CommandExt;

        let source = std::process::Command::new(&self.program)
            .args(&self.args)
            .exec();
        Err(RestartError::Exec {
            program: self.program.display().to_string(),
            source,
        })
    }

    #[cfg(not(unix))]
    fn exec(&self) -> Result<(), RestartError> {
        std::process::Command::new(&self.program)
            .args(&self.args)
            .spawn()
            .map_err(|source| RestartError::Exec {
                program: self.program.display().to_string(),
                source,
            })?;
        std::process::exit(0);
    }
}

impl Restarter for ProcessSupervisor {
    fn restart(&self) -> Result<(), RestartError> {
        self.rebuild()?;
        tracing::info!("restarting {}", self.program.display());
        self.exec()
    }
}

/// Configured rebuild command, or a `cargo build` of this package in the
/// profile the running binary was built with.
pub fn resolve_rebuild(config: &SupervisorConfig) -> Vec<String> {
    if let Some(command) = &config.rebuild_command {
        return command.clone();
    }
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
    let mut command = vec![
        "cargo".to_string(),
        "build".to_string(),
        "--manifest-path".to_string(),
        manifest.display().to_string(),
    ];
    if !cfg!(debug_assertions) {
        command.push("--release".to_string());
    }
    command
}
