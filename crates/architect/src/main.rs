use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;

use architect::bot::{Bot, EventFilter};
use architect::builtins;
use architect::commands;
use architect::config::{BotConfig, DEFAULT_CONFIG_FILENAME};
use architect::extension::{ExtensionController, ExtensionDeps};
use architect::generation::AnthropicGenerator;
use architect::installer::Installer;
use architect::supervisor::ProcessSupervisor;
use architect::transport::ConsoleTransport;
use architect::validator::CargoCheck;
use architect::vcs::{GitCli, VersionControl};

#[derive(Debug, Parser)]
#[command(name = "architect", version, about = "A chat bot that writes its own commands")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, env = "ARCHITECT_CONFIG", default_value = DEFAULT_CONFIG_FILENAME)]
    config: PathBuf,
    /// Overrides the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = BotConfig::load(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    // Captured before anything can rebuild the binary under us.
    let supervisor = ProcessSupervisor::capture(&config.supervisor)
        .context("failed to capture startup arguments")?;
    let started_at_ms = chrono::Utc::now().timestamp_millis();

    let generator = AnthropicGenerator::new(config.generation.clone())?;
    if config.generation.api_key.is_none() {
        tracing::warn!("no API key configured; /add requests will fail");
    }
    let vcs = config
        .enable_auto_commit
        .then(|| Arc::new(GitCli::new(&config.repo_dir)) as Arc<dyn VersionControl>);

    let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
    let controller = ExtensionController::new(ExtensionDeps {
        generator: Arc::new(generator),
        installer: Installer::new(&config.commands_dir, &config.tests_dir),
        checker: Arc::new(CargoCheck::from_config(&config.supervisor, &config.repo_dir)),
        vcs,
        restarter: Arc::new(supervisor),
        restart_delay: config.restart_delay(),
        fatal: fatal_tx,
    });

    let registry =
        builtins::build_registry(controller, &config.commands_dir, commands::entry_points())
            .context("failed to build command registry")?;
    tracing::info!(
        "{} ready with {} commands",
        config.display_name,
        registry.len()
    );

    let transport = Arc::new(ConsoleTransport::new("@console:localhost"));
    let bot = Bot::new(
        Arc::new(registry),
        transport,
        EventFilter::new(&config, started_at_ms),
    );
    bot.run(fatal_rx).await?;
    Ok(())
}
