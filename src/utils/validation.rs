//! URL and input validation utilities

use url::Url;

use crate::core::models::{AppError, AppResult};

/// Parse `url` and require an http(s) scheme
pub fn validate_url(url: &str) -> AppResult<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("URL must not be empty".to_string()));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|e| AppError::InvalidInput(format!("Invalid URL format: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(AppError::InvalidInput(format!(
            "Unsupported URL scheme: {}",
            other
        ))),
    }
}

/// Check if URL points at YouTube
pub fn is_youtube_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };
    match parsed.host_str() {
        Some(host) => {
            let host = host.trim_start_matches("www.").trim_start_matches("m.");
            host == "youtube.com" || host == "youtu.be" || host == "music.youtube.com"
        }
        None => false,
    }
}
