use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Form payload accepted by `POST /download`
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub folder: String,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            folder: folder.into(),
        }
    }
}

/// A finished MP3 ready to be streamed back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub file_name: String,
    /// Remove the file from disk once the response body has been sent
    pub delete_after_send: bool,
}

/// How the external tool is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStrategy {
    /// Run the tool once and inspect its exit code
    Process,
    /// Pre-fetch metadata, then follow the tool's progress output
    Callback,
}

impl Default for InvocationStrategy {
    fn default() -> Self {
        Self::Process
    }
}

impl std::str::FromStr for InvocationStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "process" | "cli" => Ok(Self::Process),
            "callback" | "library" => Ok(Self::Callback),
            other => Err(AppError::Config(format!(
                "Unknown invocation strategy: {}",
                other
            ))),
        }
    }
}

/// How the output file is named inside the target folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputNaming {
    /// Use the video title reported by the tool
    Title,
    /// Use a freshly generated UUID token
    Unique,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self::Title
    }
}

impl std::str::FromStr for OutputNaming {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "unique" | "token" => Ok(Self::Unique),
            other => Err(AppError::Config(format!("Unknown output naming: {}", other))),
        }
    }
}

/// Severity tag written in front of every log buffer entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn tag(self) -> &'static str {
        match self {
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Info => "[INFO]",
            LogLevel::Warn => "[WARN]",
            LogLevel::Error => "[ERROR]",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Coarse error classification, stable across message wording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Invocation,
    MissingOutput,
    Io,
    Config,
}

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("yt-dlp failed: {0}")]
    Invocation(String),

    #[error("MP3 file not found after download.")]
    MissingOutput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidInput(_) => ErrorKind::InvalidInput,
            AppError::Invocation(_) => ErrorKind::Invocation,
            AppError::MissingOutput => ErrorKind::MissingOutput,
            AppError::Io(_) => ErrorKind::Io,
            AppError::Config(_) => ErrorKind::Config,
        }
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            AppError::InvalidInput("x".into()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(AppError::MissingOutput.kind(), ErrorKind::MissingOutput);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(AppError::from(io).kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AppError::Invocation("ERROR: Video unavailable".into()).to_string(),
            "yt-dlp failed: ERROR: Video unavailable"
        );
        assert_eq!(
            AppError::MissingOutput.to_string(),
            "MP3 file not found after download."
        );
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "Callback".parse::<InvocationStrategy>().unwrap(),
            InvocationStrategy::Callback
        );
        assert_eq!(
            "cli".parse::<InvocationStrategy>().unwrap(),
            InvocationStrategy::Process
        );
        assert!("queue".parse::<InvocationStrategy>().is_err());
        assert_eq!("token".parse::<OutputNaming>().unwrap(), OutputNaming::Unique);
    }

    #[test]
    fn test_log_level_tags() {
        assert_eq!(LogLevel::Error.tag(), "[ERROR]");
        assert_eq!(LogLevel::Debug.to_string(), "[DEBUG]");
    }
}
