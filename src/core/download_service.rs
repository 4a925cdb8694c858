//! Download orchestration
//!
//! Validates a request, prepares the target folder, hands the work to the
//! configured [`AudioFetcher`] and records every step in the shared
//! [`LogBuffer`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::core::config::{AppConfig, DownloadConfig};
use crate::core::log_buffer::LogBuffer;
use crate::core::models::{AppError, AppResult, DownloadRequest, DownloadedFile, LogLevel};
use crate::core::youtube_downloader::{build_fetcher, AudioFetcher, ProgressCallback, ToolEvent};
use crate::utils::file_utils::{ensure_dir_exists, has_mp3_extension, sanitize_path_segment};
use crate::utils::validation::{is_youtube_url, validate_url};

/// Append to the status log and mirror the line into tracing
pub fn record(logs: &LogBuffer, level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => debug!("{}", message),
        LogLevel::Info => info!("{}", message),
        LogLevel::Warn => warn!("{}", message),
        LogLevel::Error => error!("{}", message),
    }
    logs.push(format!("{} {}", level.tag(), message));
}

/// Progress callback that narrates tool events into the status log
pub fn log_progress(logs: Arc<LogBuffer>) -> ProgressCallback {
    Arc::new(move |event: &ToolEvent| match event {
        ToolEvent::Destination(path) => record(
            &logs,
            LogLevel::Debug,
            &format!("Downloading to {}", path.display()),
        ),
        ToolEvent::Progress { percent } if *percent >= 100.0 => {
            record(&logs, LogLevel::Debug, "Download complete, converting to MP3");
        }
        ToolEvent::Progress { .. } => {}
        ToolEvent::Finished(path) => record(
            &logs,
            LogLevel::Debug,
            &format!("Finished: {}", path.display()),
        ),
    })
}

pub struct DownloadService {
    download_dir: PathBuf,
    fetcher: Arc<dyn AudioFetcher>,
    logs: Arc<LogBuffer>,
    clear_logs_per_request: bool,
    delete_after_send: bool,
}

impl DownloadService {
    pub fn new(config: &AppConfig) -> Self {
        let logs = Arc::new(LogBuffer::new(config.logs.capacity));
        let fetcher = build_fetcher(
            &config.download,
            &config.tool,
            Some(log_progress(Arc::clone(&logs))),
        );
        Self::with_fetcher(&config.download, fetcher, logs)
    }

    pub fn with_fetcher(
        download: &DownloadConfig,
        fetcher: Arc<dyn AudioFetcher>,
        logs: Arc<LogBuffer>,
    ) -> Self {
        Self {
            download_dir: download.download_dir.clone(),
            fetcher,
            logs,
            clear_logs_per_request: download.clear_logs_per_request,
            delete_after_send: download.delete_after_send,
        }
    }

    pub fn logs(&self) -> Arc<LogBuffer> {
        Arc::clone(&self.logs)
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        record(&self.logs, level, message);
    }

    /// `<download_dir>/<sanitized folder>`
    pub fn target_dir(&self, folder: &str) -> AppResult<PathBuf> {
        let sanitized = sanitize_path_segment(folder);
        if sanitized.is_empty() {
            return Err(AppError::InvalidInput(
                "Folder name is empty after sanitization".to_string(),
            ));
        }
        Ok(self.download_dir.join(sanitized))
    }

    /// Fetch `request.url` as MP3 into its folder. Failures are logged with
    /// an `[ERROR]` entry before being returned.
    pub async fn download(&self, request: &DownloadRequest) -> AppResult<DownloadedFile> {
        if self.clear_logs_per_request {
            self.logs.clear();
        }

        let result = self.run(request).await;
        if let Err(err) = &result {
            self.log(LogLevel::Error, &err.to_string());
        }
        result
    }

    async fn run(&self, request: &DownloadRequest) -> AppResult<DownloadedFile> {
        let url = request.url.trim();
        validate_url(url)?;
        if !is_youtube_url(url) {
            self.log(
                LogLevel::Warn,
                &format!("{} is not a YouTube link, passing it to yt-dlp anyway", url),
            );
        }

        let dir = self.target_dir(&request.folder)?;
        ensure_dir_exists(&dir)?;

        self.log(
            LogLevel::Debug,
            &format!(
                "Starting download of {} into {} ({} strategy)",
                url,
                dir.display(),
                self.fetcher.name()
            ),
        );

        let path = self.fetcher.invoke(url, &dir).await?;
        self.log(LogLevel::Debug, "yt-dlp completed successfully");

        if !path.is_file() || !has_mp3_extension(&path) {
            return Err(AppError::MissingOutput);
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or(AppError::MissingOutput)?;

        self.log(
            LogLevel::Info,
            &format!("MP3 file found: {}", path.display()),
        );

        Ok(DownloadedFile {
            path,
            file_name,
            delete_after_send: self.delete_after_send,
        })
    }
}
