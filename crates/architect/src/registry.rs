//! Command registry: ordered name -> command mapping with first-match dispatch.
//!
//! The registry is assembled once through [`RegistryBuilder`] and frozen by
//! [`RegistryBuilder::build`]. A built [`Registry`] has no mutation API; new
//! commands only appear after a restart rebuilds it from command storage.

pub mod loader;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use regex::Regex;
use thiserror::Error;

use crate::error::{CoreError, CoreResult};

pub use loader::load_artifacts;

/// Future returned by a compiled command handler.
pub type HandlerFuture<'a> = BoxFuture<'a, CoreResult<Option<String>>>;

/// Signature every compiled command artifact exposes through `command!`.
pub type HandlerFn = for<'a> fn(&'a str) -> HandlerFuture<'a>;

/// Statically bound handler of one command artifact.
#[derive(Clone, Copy)]
pub struct EntryPoint {
    pub name: &'static str,
    pub handler: HandlerFn,
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoint").field("name", &self.name).finish()
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, body: &str, registry: &Registry) -> CoreResult<Option<String>>;
}

#[async_trait]
impl CommandHandler for EntryPoint {
    async fn handle(&self, body: &str, _registry: &Registry) -> CoreResult<Option<String>> {
        (self.handler)(body).await
    }
}

/// A named, pattern-matched handler.
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub description: String,
    pub pattern: Regex,
    pub handler: Arc<dyn CommandHandler>,
}

impl Command {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        pattern: &str,
        handler: Arc<dyn CommandHandler>,
    ) -> CoreResult<Self> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|error| {
            CoreError::InvalidInput(format!("invalid pattern for command {name}: {error}"))
        })?;
        Ok(Self {
            name,
            description: description.into(),
            pattern,
            handler,
        })
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("command '{0}' is already registered")]
pub struct DuplicateNameError(pub String);

/// Mutable registration phase. Insertion order is dispatch order.
#[derive(Default)]
pub struct RegistryBuilder {
    commands: IndexMap<String, Command>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: Command) -> Result<(), DuplicateNameError> {
        if self.commands.contains_key(&command.name) {
            return Err(DuplicateNameError(command.name));
        }
        self.commands.insert(command.name.clone(), command);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn build(self) -> Registry {
        Registry {
            commands: self.commands,
        }
    }
}

/// Frozen command table.
pub struct Registry {
    commands: IndexMap<String, Command>,
}

impl Registry {
    /// Dispatch inbound text to the first command whose pattern matches.
    ///
    /// Returns `Ok(None)` when nothing matches. Handler errors are returned
    /// unchanged; the delivery layer decides how to report them.
    pub async fn dispatch(&self, text: &str) -> CoreResult<Option<String>> {
        let body = text.trim();
        match self.matching(body) {
            Some(command) => {
                tracing::debug!("dispatching to command {}", command.name);
                command.handler.handle(body, self).await
            }
            None => Ok(None),
        }
    }

    /// First registered command whose pattern matches `text`.
    pub fn matching(&self, text: &str) -> Option<&Command> {
        self.commands
            .values()
            .find(|command| command.pattern.is_match(text))
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    /// `(name, description)` pairs in registration order.
    pub fn list(&self) -> Vec<(&str, &str)> {
        self.commands
            .values()
            .map(|command| (command.name.as_str(), command.description.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
