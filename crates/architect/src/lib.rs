pub mod error;
pub mod config;

pub mod registry;
pub mod validator;
pub mod installer;
pub mod generation;
pub mod vcs;
pub mod supervisor;
pub mod extension;

pub mod builtins;
pub mod commands;

pub mod transport;
pub mod bot;

pub use crate::config::BotConfig;
pub use crate::error::{CoreError, CoreResult};
pub use crate::registry::{Registry, RegistryBuilder};
