//! Tube MP3 Server - Core Library
//!
//! A small HTTP front-end over yt-dlp: submit a YouTube URL and a folder
//! name, get the audio back as an MP3.

pub mod core;
pub mod server;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{
    config::AppConfig,
    download_service::DownloadService,
    log_buffer::LogBuffer,
    models::{AppError, AppResult, DownloadRequest, DownloadedFile, ErrorKind},
    youtube_downloader::{AudioFetcher, CallbackFetcher, ProcessFetcher},
};

use anyhow::Context;
use std::sync::Arc;

/// Application state shared between HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DownloadService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let service = DownloadService::new(&config);
        Self::with_service(config, service)
    }

    pub fn with_service(config: AppConfig, service: DownloadService) -> Self {
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
        }
    }

    /// Load configuration from disk and environment, falling back to defaults
    pub fn load() -> Self {
        Self::new(Self::load_or_default_config())
    }

    fn load_or_default_config() -> AppConfig {
        match AppConfig::load() {
            Ok(cfg) => {
                if let Err(err) = cfg.validate() {
                    tracing::warn!(
                        "Invalid configuration detected ({}), falling back to defaults",
                        err
                    );
                    AppConfig::default()
                } else {
                    cfg
                }
            }
            Err(err) => {
                tracing::warn!(
                    "Failed to load configuration: {:#}. Using defaults",
                    err
                );
                AppConfig::default()
            }
        }
    }
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Bind the configured address and serve until Ctrl+C
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;

    tracing::info!(
        "{} v{} listening on http://{} (downloads in {})",
        NAME,
        VERSION,
        addr,
        state.service.download_dir().display()
    );

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running HTTP server")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "tube-mp3-server");
    }

    #[test]
    fn test_state_uses_configured_log_capacity() {
        let mut config = AppConfig::default();
        config.logs.capacity = 7;
        let state = AppState::new(config);
        assert_eq!(state.service.logs().capacity(), 7);
    }
}
