//! Application configuration management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::log_buffer::DEFAULT_LOG_CAPACITY;
use super::models::{InvocationStrategy, OutputNaming};

pub const CONFIG_PATH_ENV: &str = "TUBE_MP3_CONFIG";

/// Main application configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub download: DownloadConfig,
    pub tool: ToolConfig,
    pub logs: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Base directory; one sub-folder per sanitized folder name
    pub download_dir: PathBuf,
    pub strategy: InvocationStrategy,
    pub naming: OutputNaming,
    /// Callback strategy only: ask the tool for the title before downloading
    pub prefetch_metadata: bool,
    /// Wipe the shared status log at the start of every request
    pub clear_logs_per_request: bool,
    /// Remove the MP3 from disk once it has been sent
    pub delete_after_send: bool,
}

/// External yt-dlp invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub program: String,
    /// Placed before the generated arguments, e.g. `["-m", "yt_dlp"]`
    pub program_args: Vec<String>,
    /// Placed after the generated arguments, right before the URL
    pub extra_args: Vec<String>,
    /// None waits for the tool however long it takes
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            strategy: InvocationStrategy::Process,
            naming: OutputNaming::Title,
            prefetch_metadata: true,
            clear_logs_per_request: true,
            delete_after_send: false,
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            program_args: Vec::new(),
            extra_args: Vec::new(),
            timeout_seconds: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Load configuration from file, falling back to defaults when absent,
    /// then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::get_config_path() {
            Ok(path) if path.exists() => Self::load_from(&path)?,
            Ok(path) => {
                tracing::info!("No configuration at {:?}, using defaults", path);
                Self::default()
            }
            Err(err) => {
                tracing::warn!("{}. Using defaults", err);
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: AppConfig =
            serde_json::from_str(&content).with_context(|| "Failed to parse config file")?;

        tracing::info!("Loaded configuration from: {:?}", path);
        Ok(config)
    }

    /// `$TUBE_MP3_CONFIG`, or `config.json` in the platform config directory
    pub fn get_config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        let project_dirs = ProjectDirs::from("com", "tubemp3", "server")
            .with_context(|| "Failed to get project directories")?;

        Ok(project_dirs.config_dir().join("config.json"))
    }

    /// Apply `TUBE_MP3_*` overrides obtained through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(host) = get("TUBE_MP3_HOST") {
            self.server.host = host.trim().to_string();
        }
        if let Some(port) = get("TUBE_MP3_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid TUBE_MP3_PORT: {}", port))?;
        }
        if let Some(dir) = get("TUBE_MP3_DOWNLOAD_DIR") {
            self.download.download_dir = PathBuf::from(dir);
        }
        if let Some(strategy) = get("TUBE_MP3_STRATEGY") {
            self.download.strategy = strategy.parse()?;
        }
        if let Some(naming) = get("TUBE_MP3_NAMING") {
            self.download.naming = naming.parse()?;
        }
        if let Some(program) = get("TUBE_MP3_TOOL") {
            self.tool.program = program.trim().to_string();
        }
        Ok(())
    }

    /// Configuration as environment variables (for debugging)
    pub fn to_env_vars(&self) -> HashMap<String, String> {
        let mut env_vars = HashMap::new();
        env_vars.insert("TUBE_MP3_HOST".to_string(), self.server.host.clone());
        env_vars.insert("TUBE_MP3_PORT".to_string(), self.server.port.to_string());
        env_vars.insert(
            "TUBE_MP3_DOWNLOAD_DIR".to_string(),
            self.download.download_dir.display().to_string(),
        );
        env_vars.insert(
            "TUBE_MP3_STRATEGY".to_string(),
            format!("{:?}", self.download.strategy).to_lowercase(),
        );
        env_vars.insert(
            "TUBE_MP3_NAMING".to_string(),
            format!("{:?}", self.download.naming).to_lowercase(),
        );
        env_vars.insert("TUBE_MP3_TOOL".to_string(), self.tool.program.clone());
        env_vars
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            anyhow::bail!("Server host must not be empty");
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.download.download_dir.as_os_str().is_empty() {
            anyhow::bail!("Download directory must not be empty");
        }

        if self.tool.program.trim().is_empty() {
            anyhow::bail!("Tool program must not be empty");
        }

        if self.tool.timeout_seconds == Some(0) {
            anyhow::bail!("Tool timeout must be greater than 0 when set");
        }

        if self.logs.capacity == 0 {
            anyhow::bail!("Log capacity must be greater than 0");
        }

        Ok(())
    }
}
