use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use driftwood_scripting_host::ScriptManager;
use serenity::prelude::GatewayIntents;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

mod config;
mod handler;
mod logging;

use config::DriftwoodConfig;
use handler::Handler;

#[derive(Parser)]
#[command(version = env!("VERSION_STRING"), about, long_about = None)]
pub struct Cli {
    /// Enables debug mode
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    /// Path to config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory to load Lua scripts from
    #[arg(long)]
    scripts: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .or_else(DriftwoodConfig::default_path)
        .context("Failed to determine config directory")?;
    let mut config = DriftwoodConfig::load(&config_path)?;
    config.apply_env()?;
    if let Some(scripts) = cli.scripts {
        config.scripting.script_dir = Some(scripts);
    }

    let _log_guard =
        logging::init_logging(config.logging.file, cli.debug).context("Failed to set up logging")?;
    info!("driftwood {}", env!("VERSION_STRING"));

    let token = config.token()?.to_string();
    let manager = if config.scripting.enabled {
        Some(load_scripts(&config).await?)
    } else {
        warn!("Scripting is disabled; the bot will not respond to interactions");
        None
    };

    info!("Starting Discord bot gateway connection");
    let mut client = serenity::Client::builder(&token, GatewayIntents::GUILDS)
        .event_handler(Handler::new(manager, config.discord.guild_id))
        .await
        .context("Failed to create Discord client")?;

    tokio::select! {
        result = client.start() => {
            match result {
                Ok(_) => info!("Discord client disconnected"),
                Err(e) => error!("Discord client error: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    info!("Discord bot shut down");
    Ok(())
}

/// Start the scripting host and run every script in the configured directory
async fn load_scripts(config: &DriftwoodConfig) -> Result<Arc<ScriptManager>> {
    let manager =
        Arc::new(ScriptManager::new(Handle::current()).context("Failed to start scripting host")?);
    let script_dir = config.scripting.script_dir();

    let loader = Arc::clone(&manager);
    let summary = tokio::task::spawn_blocking(move || loader.load_scripts(&script_dir))
        .await
        .context("Script loading task failed")?;

    match summary {
        Ok(summary) => {
            for (path, message) in &summary.failed {
                warn!("Script {} failed to load: {}", path.display(), message);
            }
        }
        // A missing script directory leaves the bot running without scripts
        Err(e) => error!("{}", e),
    }

    Ok(manager)
}
