use axum::{
    body::Body,
    extract::State,
    http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use futures_util::StreamExt;
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;

use crate::core::models::{AppError, AppResult, DownloadRequest, DownloadedFile, LogLevel};
use crate::server::page::INDEX_HTML;
use crate::AppState;

pub const MP3_MIME: &str = "audio/mpeg";

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/download", post(download))
        .route("/logs", get(logs))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Always answers 200: the MP3 itself, or `{"error": ...}`
pub async fn download(
    State(state): State<AppState>,
    Form(request): Form<DownloadRequest>,
) -> Response {
    let file = match state.service.download(&request).await {
        Ok(file) => file,
        Err(err) => return error_response(&err),
    };

    match file_response(&file).await {
        Ok(response) => response,
        Err(err) => {
            state.service.log(LogLevel::Error, &err.to_string());
            error_response(&err)
        }
    }
}

pub async fn logs(State(state): State<AppState>) -> Json<LogsResponse> {
    Json(LogsResponse {
        logs: state.service.logs().snapshot(),
    })
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "name": crate::NAME,
        "version": crate::VERSION,
    }))
}

pub fn error_response(err: &AppError) -> Response {
    Json(ErrorResponse {
        error: err.to_string(),
    })
    .into_response()
}

/// Deletes the file when the response body is dropped
struct RemoveOnDrop(PathBuf);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => tracing::debug!("Removed sent file {}", self.0.display()),
            Err(err) => tracing::warn!("Failed to remove {}: {}", self.0.display(), err),
        }
    }
}

async fn file_response(file: &DownloadedFile) -> AppResult<Response> {
    let handle = tokio::fs::File::open(&file.path).await?;
    let length = handle.metadata().await?.len();
    let stream = ReaderStream::new(handle);

    let body = if file.delete_after_send {
        let guard = RemoveOnDrop(file.path.clone());
        Body::from_stream(stream.map(move |chunk| {
            let _keep = &guard;
            chunk
        }))
    } else {
        Body::from_stream(stream)
    };

    Response::builder()
        .header(CONTENT_TYPE, MP3_MIME)
        .header(CONTENT_LENGTH, length.to_string())
        .header(CONTENT_DISPOSITION, content_disposition(&file.file_name))
        .body(body)
        .map_err(|e| AppError::Io(std::io::Error::other(e)))
}

/// `attachment` header with an ASCII fallback name and an RFC 5987 UTF-8 name
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    let mut encoded = String::with_capacity(file_name.len());
    for byte in file_name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_buffer::LogBuffer;
    use crate::core::DownloadService;
    use axum::body::to_bytes;
    use std::sync::Arc;

    fn state_with(config: crate::core::AppConfig) -> AppState {
        AppState::new(config)
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("Fake Song.mp3"),
            "attachment; filename=\"Fake Song.mp3\"; filename*=UTF-8''Fake%20Song.mp3"
        );
        let header = content_disposition("Café \"Live\".mp3");
        assert!(header.contains("filename=\"Caf_ _Live_.mp3\""));
        assert!(header.contains("Caf%C3%A9%20%22Live%22.mp3"));
    }

    #[tokio::test]
    async fn test_index_serves_form_and_log_viewer() {
        let Html(page) = index().await;
        assert!(page.contains("action=\"/download\""));
        assert!(page.contains("name=\"folder\""));
        assert!(page.contains("setInterval(fetchLogs, 1500)"));
        assert!(page.contains("readonly"));
    }

    #[tokio::test]
    async fn test_logs_endpoint_preserves_order() {
        let state = state_with(crate::core::AppConfig::default());
        for i in 0..5 {
            state.service.logs().push(format!("entry {}", i));
        }

        let Json(body) = logs(State(state)).await;
        let expected: Vec<String> = (0..5).map(|i| format!("entry {}", i)).collect();
        assert_eq!(body.logs, expected);
    }

    #[tokio::test]
    async fn test_logs_endpoint_json_shape() {
        let state = state_with(crate::core::AppConfig::default());
        state.service.log(LogLevel::Info, "hello");

        let value = serde_json::to_value(logs(State(state)).await.0).unwrap();
        assert_eq!(value, serde_json::json!({ "logs": ["[INFO] hello"] }));
    }

    #[tokio::test]
    async fn test_invalid_request_returns_json_error_with_200() {
        let state = state_with(crate::core::AppConfig::default());
        let response = download(
            State(state),
            Form(DownloadRequest::new("not a url", "mix")),
        )
        .await;

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = json_body(response).await;
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        let Json(value) = health().await;
        assert_eq!(value["status"], "ok");
        assert_eq!(value["name"], crate::NAME);
    }

    #[cfg(unix)]
    mod with_fake_tool {
        use super::*;
        use crate::core::models::{InvocationStrategy, OutputNaming};
        use crate::core::test_support::{mp3_files, FakeTool, FAKE_MP3_BYTES};

        #[tokio::test]
        async fn test_download_streams_mp3() {
            let tool = FakeTool::new();
            let state =
                state_with(tool.config(InvocationStrategy::Process, OutputNaming::Title));

            let response = download(
                State(state),
                Form(DownloadRequest::new("https://youtu.be/ok", "mix")),
            )
            .await;

            assert_eq!(response.status(), axum::http::StatusCode::OK);
            assert_eq!(response.headers()[CONTENT_TYPE], MP3_MIME);
            assert!(response.headers()[CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .contains("Fake Song.mp3"));

            let files = mp3_files(&tool.folder("mix"));
            assert_eq!(files.len(), 1);

            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&bytes[..], &std::fs::read(&files[0]).unwrap()[..]);
            assert_eq!(&bytes[..], FAKE_MP3_BYTES);
        }

        #[tokio::test]
        async fn test_tool_failure_returns_json_error() {
            let tool = FakeTool::new();
            let state =
                state_with(tool.config(InvocationStrategy::Process, OutputNaming::Title));
            let logs = state.service.logs();

            let response = download(
                State(state),
                Form(DownloadRequest::new("https://youtu.be/fail", "mix")),
            )
            .await;

            assert_eq!(response.status(), axum::http::StatusCode::OK);
            let body = json_body(response).await;
            assert!(body["error"]
                .as_str()
                .unwrap()
                .contains("Video unavailable"));
            assert!(logs.snapshot().iter().any(|e| e.starts_with("[ERROR]")));
        }

        #[tokio::test]
        async fn test_delete_after_send() {
            let tool = FakeTool::new();
            let mut config = tool.config(InvocationStrategy::Process, OutputNaming::Unique);
            config.download.delete_after_send = true;
            let state = AppState::with_service(
                config.clone(),
                DownloadService::new(&config),
            );

            let response = download(
                State(state),
                Form(DownloadRequest::new("https://youtu.be/ok", "mix")),
            )
            .await;
            assert_eq!(mp3_files(&tool.folder("mix")).len(), 1);

            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&bytes[..], FAKE_MP3_BYTES);
            assert!(mp3_files(&tool.folder("mix")).is_empty());
        }

        #[tokio::test]
        async fn test_logs_visible_after_download() {
            let tool = FakeTool::new();
            let logs = Arc::new(LogBuffer::new(10));
            let config = tool.config(InvocationStrategy::Callback, OutputNaming::Title);
            let service = DownloadService::with_fetcher(
                &config.download,
                crate::core::youtube_downloader::build_fetcher(
                    &config.download,
                    &config.tool,
                    None,
                ),
                Arc::clone(&logs),
            );
            let state = AppState::with_service(config, service);

            let _ = download(
                State(state.clone()),
                Form(DownloadRequest::new("https://youtu.be/ok", "mix")),
            )
            .await;

            let Json(body) = super::logs(State(state)).await;
            assert_eq!(body.logs, logs.snapshot());
            assert!(body
                .logs
                .last()
                .unwrap()
                .starts_with("[INFO] MP3 file found"));
        }
    }
}
