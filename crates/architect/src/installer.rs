//! Durable installation of validated command artifacts.
//!
//! Every file is written to a temporary file in its destination directory and
//! then renamed into place without clobbering, so a reader never observes a
//! partially written artifact and an existing one is never replaced.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

/// Index file of the test-storage area. Pulls the generated test manifest
/// into the `generated_commands` integration test target.
pub const TEST_MARKER_FILE: &str = "mod.rs";

const TEST_MARKER_SOURCE: &str = "// Test artifacts for installed commands; the module list is generated by build.rs.\ninclude!(concat!(env!(\"OUT_DIR\"), \"/command_tests.rs\"));\n";

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("command '{0}' already exists")]
    AlreadyExists(String),
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Files written by one install attempt, in write order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallRecord {
    pub written: Vec<PathBuf>,
    pub command_path: PathBuf,
    pub test_path: Option<PathBuf>,
    pub marker_created: bool,
    /// Set when the test artifact could not be written; the command is still installed.
    pub test_warning: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Installer {
    commands_dir: PathBuf,
    tests_dir: PathBuf,
}

impl Installer {
    pub fn new(commands_dir: impl Into<PathBuf>, tests_dir: impl Into<PathBuf>) -> Self {
        Self {
            commands_dir: commands_dir.into(),
            tests_dir: tests_dir.into(),
        }
    }

    pub fn commands_dir(&self) -> &Path {
        &self.commands_dir
    }

    pub fn tests_dir(&self) -> &Path {
        &self.tests_dir
    }

    pub fn command_path(&self, name: &str) -> PathBuf {
        self.commands_dir.join(format!("{name}.rs"))
    }

    pub fn test_path(&self, name: &str) -> PathBuf {
        self.tests_dir.join(format!("{name}.rs"))
    }

    /// Whether a command artifact is already stored for `name`.
    pub fn exists(&self, name: &str) -> bool {
        self.command_path(name).exists()
    }

    /// Install a command artifact and, when given, its already validated test
    /// artifact. On a fatal failure every file written by this call is removed.
    pub fn install(
        &self,
        name: &str,
        command_source: &str,
        test_source: Option<&str>,
    ) -> Result<InstallRecord, InstallError> {
        let command_path = self.command_path(name);
        if command_path.exists() {
            return Err(InstallError::AlreadyExists(name.to_string()));
        }

        std::fs::create_dir_all(&self.tests_dir).map_err(|source| InstallError::CreateDir {
            path: self.tests_dir.clone(),
            source,
        })?;

        write_new(&command_path, command_source)?;
        let mut record = InstallRecord {
            written: vec![command_path.clone()],
            command_path,
            ..InstallRecord::default()
        };

        if let Some(test_source) = test_source {
            let test_path = self.test_path(name);
            match write_new(&test_path, test_source) {
                Ok(()) => {
                    record.written.push(test_path.clone());
                    record.test_path = Some(test_path);
                }
                Err(error) => {
                    tracing::warn!("skipping test artifact for {name}: {error}");
                    record.test_warning = Some(error.to_string());
                }
            }
        }

        let marker_path = self.tests_dir.join(TEST_MARKER_FILE);
        if !marker_path.is_file() {
            if let Err(error) = write_new(&marker_path, TEST_MARKER_SOURCE) {
                rollback(&record.written);
                return Err(error);
            }
            record.written.push(marker_path);
            record.marker_created = true;
        }

        tracing::info!("installed command {name} ({} files)", record.written.len());
        Ok(record)
    }

    /// Remove every file an install wrote, marker included when it was
    /// created by that install.
    pub fn uninstall(&self, record: &InstallRecord) {
        tracing::info!("removing {} installed files", record.written.len());
        rollback(&record.written);
    }

    /// Remove only the test artifact of an install, keeping the command.
    /// Returns whether there was one.
    pub fn discard_test(&self, record: &mut InstallRecord) -> bool {
        let Some(test_path) = record.test_path.take() else {
            return false;
        };
        rollback(std::slice::from_ref(&test_path));
        record.written.retain(|path| *path != test_path);
        true
    }
}

fn write_new(path: &Path, contents: &str) -> Result<(), InstallError> {
    let write_error = |source: std::io::Error| InstallError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir).map_err(write_error)?;
    file.write_all(contents.as_bytes()).map_err(write_error)?;
    file.as_file().sync_all().map_err(write_error)?;
    file.persist_noclobber(path)
        .map_err(|error| write_error(error.error))?;
    Ok(())
}

fn rollback(written: &[PathBuf]) {
    for path in written.iter().rev() {
        if let Err(error) = std::fs::remove_file(path) {
            tracing::warn!("rollback failed to remove {}: {error}", path.display());
        }
    }
}
