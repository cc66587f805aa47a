//! Self-extension pipeline: parse, generate, validate, install, commit,
//! schedule a restart.
//!
//! A request that passes the name check is serialized per name and then runs
//! in its own task: once generation starts the pipeline always reaches a
//! terminal stage, even if the caller stops waiting. A scheduled restart waits
//! for every running pipeline and turns new ones away until it happens.

pub mod locks;
pub mod request;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, RwLock};

use crate::builtins::CORE_COMMANDS;
use crate::generation::{CodeGenerator, GenerationError, GenerationRequest};
use crate::installer::{InstallError, InstallRecord, Installer};
use crate::supervisor::{RestartError, Restarter};
use crate::validator::{self, BuildCheck, ValidationError};
use crate::vcs::{commit_message, CommitWarning, VersionControl};

pub use locks::NameLocks;
pub use request::{parse_add, ADD_PATTERN, USAGE};

pub const RESTART_PENDING: &str =
    "The bot is restarting to load new commands. Please try again in a moment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionStage {
    Idle,
    NameValidated,
    Generated,
    Validated,
    Installed,
    Committed,
    RestartScheduled,
    Failed,
}

/// Every variant renders as the single message shown to the requester.
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Failed to generate command: {0}")]
    Generation(#[from] GenerationError),
    #[error("Generated code validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Error creating command: {0}")]
    Install(#[from] InstallError),
    #[error("Error creating command: {0}")]
    Aborted(String),
}

/// A failed request together with the stages it passed before failing.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ExtensionFailure {
    pub stages: Vec<ExtensionStage>,
    #[source]
    pub error: ExtensionError,
}

impl ExtensionFailure {
    fn new(stages: &[ExtensionStage], error: impl Into<ExtensionError>) -> Self {
        Self {
            stages: stages.to_vec(),
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtensionReport {
    pub name: String,
    /// Stages passed through, in order. The last one is terminal.
    pub stages: Vec<ExtensionStage>,
    pub record: Option<InstallRecord>,
    pub test_warning: Option<String>,
    pub commit_warning: Option<CommitWarning>,
    pub message: String,
}

impl ExtensionReport {
    pub fn stage(&self) -> ExtensionStage {
        self.stages.last().copied().unwrap_or(ExtensionStage::Idle)
    }

    fn failed(name: String, failure: ExtensionFailure) -> Self {
        let mut stages = failure.stages;
        stages.push(ExtensionStage::Failed);
        Self {
            name,
            stages,
            record: None,
            test_warning: None,
            commit_warning: None,
            message: failure.error.to_string(),
        }
    }
}

/// Collaborators of the pipeline.
pub struct ExtensionDeps {
    pub generator: Arc<dyn CodeGenerator>,
    pub installer: Installer,
    /// Type-checks the crate with a freshly installed artifact in place.
    pub checker: Arc<dyn BuildCheck>,
    /// `None` disables the commit step.
    pub vcs: Option<Arc<dyn VersionControl>>,
    pub restarter: Arc<dyn Restarter>,
    pub restart_delay: Duration,
    /// Receives restart failures; the bot loop treats them as fatal.
    pub fatal: mpsc::UnboundedSender<RestartError>,
}

#[derive(Clone)]
pub struct ExtensionController {
    inner: Arc<Inner>,
}

struct Inner {
    deps: ExtensionDeps,
    locks: NameLocks,
    /// Held from install through the build check; the check sees one staged
    /// artifact at a time.
    build: Mutex<()>,
    /// Read by every running pipeline, written by a restart about to happen.
    in_flight: Arc<RwLock<()>>,
}

impl ExtensionController {
    pub fn new(deps: ExtensionDeps) -> Self {
        Self {
            inner: Arc::new(Inner {
                deps,
                locks: NameLocks::new(),
                build: Mutex::new(()),
                in_flight: Arc::new(RwLock::new(())),
            }),
        }
    }

    /// Handle the text of an add request. Always yields a report whose
    /// message is ready to send back.
    pub async fn handle_request(&self, body: &str) -> ExtensionReport {
        let Some(request) = parse_add(body) else {
            let failure = ExtensionFailure::new(
                &[ExtensionStage::Idle],
                ExtensionError::BadRequest(USAGE.to_string()),
            );
            return ExtensionReport::failed(String::new(), failure);
        };
        let name = request.name.clone();
        match self.extend(request).await {
            Ok(report) => report,
            Err(failure) => {
                tracing::warn!("extension request for {name} failed: {failure}");
                ExtensionReport::failed(name, failure)
            }
        }
    }

    /// Run the pipeline for an already parsed request.
    pub async fn extend(
        &self,
        request: GenerationRequest,
    ) -> Result<ExtensionReport, ExtensionFailure> {
        let mut stages = vec![ExtensionStage::Idle];
        if !request::is_valid_name(&request.name) {
            return Err(ExtensionFailure::new(
                &stages,
                ExtensionError::BadRequest(USAGE.to_string()),
            ));
        }
        if let Some(error) = self.already_exists(&request.name) {
            return Err(ExtensionFailure::new(&stages, error));
        }

        let guard = self.inner.locks.acquire(&request.name).await;
        // A concurrent request for the same name may have installed it meanwhile.
        if let Some(error) = self.already_exists(&request.name) {
            return Err(ExtensionFailure::new(&stages, error));
        }
        let Ok(in_flight) = Arc::clone(&self.inner.in_flight).try_read_owned() else {
            return Err(ExtensionFailure::new(
                &stages,
                ExtensionError::BadRequest(RESTART_PENDING.to_string()),
            ));
        };
        stages.push(ExtensionStage::NameValidated);

        let controller = self.clone();
        let pipeline = tokio::spawn(async move {
            controller
                .run_pipeline(request, stages, guard, in_flight)
                .await
        });
        match pipeline.await {
            Ok(result) => result,
            Err(error) => Err(ExtensionFailure::new(
                &[ExtensionStage::NameValidated],
                ExtensionError::Aborted(error.to_string()),
            )),
        }
    }

    fn already_exists(&self, name: &str) -> Option<ExtensionError> {
        let exists = CORE_COMMANDS.contains(&name) || self.inner.deps.installer.exists(name);
        exists.then(|| ExtensionError::BadRequest(format!("Command '{name}' already exists.")))
    }

    async fn run_pipeline(
        self,
        request: GenerationRequest,
        mut stages: Vec<ExtensionStage>,
        _name: OwnedMutexGuard<()>,
        _in_flight: OwnedRwLockReadGuard<()>,
    ) -> Result<ExtensionReport, ExtensionFailure> {
        let deps = &self.inner.deps;
        let name = request.name.clone();

        let artifact = match deps.generator.generate(&request).await {
            Ok(artifact) if !artifact.source.trim().is_empty() => artifact,
            Ok(_) => return Err(ExtensionFailure::new(&stages, GenerationError::Empty)),
            Err(error) => return Err(ExtensionFailure::new(&stages, error)),
        };
        stages.push(ExtensionStage::Generated);

        if let Err(error) = validator::validate_command(&artifact.source, &name) {
            return Err(ExtensionFailure::new(&stages, error));
        }
        let mut test_warning = None;
        let test_source = artifact.test_source.filter(|test_source| {
            match validator::validate_test(test_source) {
                Ok(()) => true,
                Err(error) => {
                    tracing::warn!("dropping generated tests for {name}: {error}");
                    test_warning = Some(format!("generated tests rejected: {error}"));
                    false
                }
            }
        });
        stages.push(ExtensionStage::Validated);

        let build = self.inner.build.lock().await;
        let mut record = match deps
            .installer
            .install(&name, &artifact.source, test_source.as_deref())
        {
            Ok(record) => record,
            Err(error) => return Err(ExtensionFailure::new(&stages, error)),
        };
        if let Err(error) = self.check_build(&name, &mut record, &mut test_warning).await {
            deps.installer.uninstall(&record);
            return Err(ExtensionFailure::new(&stages, error));
        }
        drop(build);
        stages.push(ExtensionStage::Installed);

        let commit_warning = match &deps.vcs {
            Some(vcs) => vcs
                .commit(&record.written, &commit_message(&name, &request.description))
                .await
                .err(),
            None => None,
        };
        if let Some(warning) = &commit_warning {
            tracing::warn!("commit of command {name} failed: {warning}");
        }
        stages.push(ExtensionStage::Committed);

        self.schedule_restart();
        stages.push(ExtensionStage::RestartScheduled);

        let test_warning = test_warning.or_else(|| record.test_warning.clone());
        let mut message = match &commit_warning {
            None => format!(
                "Command '{name}' created successfully!\nDescription: {}\nBot will restart in {} to load the new command.",
                request.description,
                describe_delay(deps.restart_delay)
            ),
            Some(warning) => format!(
                "Command '{name}' created successfully but git commit failed: {warning}\nBot will restart shortly to apply changes."
            ),
        };
        if let Some(warning) = &test_warning {
            message.push_str(&format!("\nTests were not installed: {warning}"));
        }
        Ok(ExtensionReport {
            name,
            stages,
            test_warning,
            record: Some(record),
            commit_warning,
            message,
        })
    }

    /// Type-check the crate with the install in place. Tests that do not
    /// compile are dropped and the check repeated without them.
    async fn check_build(
        &self,
        name: &str,
        record: &mut InstallRecord,
        test_warning: &mut Option<String>,
    ) -> Result<(), ValidationError> {
        let deps = &self.inner.deps;
        let Err(diagnostics) = deps.checker.check().await else {
            return Ok(());
        };
        if !deps.installer.discard_test(record) {
            return Err(ValidationError::Compile(diagnostics));
        }
        tracing::warn!("build check failed for {name}; retrying without its tests");
        deps.checker.check().await.map_err(ValidationError::Compile)?;
        *test_warning = Some(format!("generated tests failed to compile: {diagnostics}"));
        Ok(())
    }

    /// Fire-and-forget restart after the configured delay, once no pipeline
    /// is running.
    fn schedule_restart(&self) {
        let restarter = Arc::clone(&self.inner.deps.restarter);
        let fatal = self.inner.deps.fatal.clone();
        let delay = self.inner.deps.restart_delay;
        let in_flight = Arc::clone(&self.inner.in_flight);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _quiesced = in_flight.write_owned().await;
            let outcome = tokio::task::spawn_blocking(move || restarter.restart()).await;
            let error = match outcome {
                Ok(Ok(())) => return,
                Ok(Err(error)) => error,
                Err(error) => RestartError::Exec {
                    program: "restart task".to_string(),
                    source: std::io::Error::other(error.to_string()),
                },
            };
            tracing::error!("restart failed: {error}");
            if fatal.send(error).is_err() {
                tracing::error!("no receiver for restart failure");
            }
        });
    }
}

fn describe_delay(delay: Duration) -> String {
    if delay.subsec_millis() == 0 {
        let secs = delay.as_secs();
        if secs == 1 {
            "1 second".to_string()
        } else {
            format!("{secs} seconds")
        }
    } else {
        format!("{} milliseconds", delay.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_wording() {
        assert_eq!(describe_delay(Duration::from_secs(2)), "2 seconds");
        assert_eq!(describe_delay(Duration::from_secs(1)), "1 second");
        assert_eq!(describe_delay(Duration::from_millis(250)), "250 milliseconds");
    }

    #[test]
    fn error_messages_carry_their_prefix() {
        let error = ExtensionError::from(ValidationError::DangerousImport("std::process".to_string()));
        assert_eq!(
            error.to_string(),
            "Generated code validation failed: dangerous import detected: std::process"
        );
        let error = ExtensionError::from(GenerationError::Empty);
        assert_eq!(
            error.to_string(),
            "Failed to generate command: generation service returned no code"
        );
    }
}
