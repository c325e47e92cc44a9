use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

const APP_NAME: &str = "driftwood";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid guild id '{0}'")]
    InvalidGuildId(String),

    #[error("No Discord token configured; set DISCORD_TOKEN or [discord] token")]
    MissingToken,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub token: Option<String>,

    /// Register commands in this guild only; global when unset
    #[serde(default)]
    pub guild_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptingConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Directory containing scripts (default: <data_dir>/scripts)
    #[serde(default)]
    pub script_dir: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            script_dir: None,
        }
    }
}

impl ScriptingConfig {
    pub fn script_dir(&self) -> PathBuf {
        self.script_dir.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|d| d.data_dir().join("scripts"))
                .unwrap_or_else(|| PathBuf::from("scripts"))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to <data_dir>/logs/bot.log
    #[serde(default)]
    pub file: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftwoodConfig {
    #[serde(default)]
    pub discord: DiscordConfig,

    #[serde(default)]
    pub scripting: ScriptingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

impl DriftwoodConfig {
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|d| d.config_dir().join("config.toml"))
    }

    /// Load the config at `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `DISCORD_TOKEN`, `GUILD_ID` and `LUA_SCRIPTS_PATH` from the environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(token) = lookup("DISCORD_TOKEN") {
            self.discord.token = Some(token);
        }
        if let Some(guild_id) = lookup("GUILD_ID") {
            let parsed = guild_id
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidGuildId(guild_id.clone()))?;
            self.discord.guild_id = Some(parsed);
        }
        if let Some(path) = lookup("LUA_SCRIPTS_PATH") {
            self.scripting.script_dir = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn token(&self) -> Result<&str, ConfigError> {
        self.discord
            .token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingToken)
    }
}
