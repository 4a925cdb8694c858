//! Core business logic module
//!
//! Configuration, domain models, the status log and the download flow that
//! drives yt-dlp.

pub mod config;
pub mod download_service;
pub mod log_buffer;
pub mod models;
pub mod youtube_downloader;

#[cfg(test)]
pub(crate) mod test_support;


// Re-export commonly used types
pub use config::AppConfig;
pub use download_service::DownloadService;
pub use log_buffer::LogBuffer;
