//! Core commands compiled into the bot: `add` and `list`.
//!
//! Core commands are registered ahead of every installed artifact, so they
//! win dispatch ties and their names can never be taken by a generated
//! command. [`build_registry`] is the single point where a process assembles
//! its registry.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{CoreError, CoreResult};
use crate::extension::{ExtensionController, ADD_PATTERN};
use crate::registry::{self, Command, CommandHandler, EntryPoint, Registry, RegistryBuilder};

/// Names owned by core commands.
pub const CORE_COMMANDS: &[&str] = &["add", "list"];

pub const LIST_PATTERN: &str = r"^!list$";

pub struct AddCommand {
    controller: ExtensionController,
}

impl AddCommand {
    pub fn new(controller: ExtensionController) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl CommandHandler for AddCommand {
    async fn handle(&self, body: &str, _registry: &Registry) -> CoreResult<Option<String>> {
        let report = self.controller.handle_request(body).await;
        Ok(Some(report.message))
    }
}

pub struct ListCommand;

#[async_trait]
impl CommandHandler for ListCommand {
    async fn handle(&self, _body: &str, registry: &Registry) -> CoreResult<Option<String>> {
        let mut reply = String::from("Available commands:");
        for (name, description) in registry.list() {
            reply.push_str(&format!("\n- {name}: {description}"));
        }
        Ok(Some(reply))
    }
}

/// Register the core commands.
pub fn register_builtins(
    builder: &mut RegistryBuilder,
    controller: ExtensionController,
) -> CoreResult<()> {
    let commands = [
        Command::new(
            "add",
            "Add a new command using AI (usage: /add -n <name> -d \"<description>\")",
            ADD_PATTERN,
            Arc::new(AddCommand::new(controller)),
        )?,
        Command::new(
            "list",
            "List available commands",
            LIST_PATTERN,
            Arc::new(ListCommand),
        )?,
    ];
    for command in commands {
        builder
            .register(command)
            .map_err(|error| CoreError::Internal(error.to_string()))?;
    }
    Ok(())
}

/// Core commands first, then every installed artifact in file-name order.
pub fn build_registry(
    controller: ExtensionController,
    commands_dir: &Path,
    entry_points: &[EntryPoint],
) -> CoreResult<Registry> {
    let mut builder = RegistryBuilder::new();
    register_builtins(&mut builder, controller)?;
    let loaded = registry::load_artifacts(&mut builder, commands_dir, entry_points)?;
    tracing::info!("loaded {loaded} installed commands from {}", commands_dir.display());
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_reports_every_command_in_order() {
        let mut builder = RegistryBuilder::new();
        let list = Command::new(
            "list",
            "List available commands",
            LIST_PATTERN,
            Arc::new(ListCommand),
        )
        .expect("list");
        builder.register(list).expect("register");
        for entry in crate::commands::entry_points() {
            let command =
                Command::new(entry.name, "shipped", "^$never", Arc::new(*entry)).expect("entry");
            builder.register(command).expect("register");
        }
        let registry = builder.build();

        let reply = registry.dispatch("!list").await.expect("dispatch").expect("reply");
        let lines: Vec<&str> = reply.lines().collect();
        assert_eq!(lines[0], "Available commands:");
        assert_eq!(lines[1], "- list: List available commands");
        assert_eq!(lines.len(), registry.len() + 1);
    }
}
