//! YouTube audio fetching
//!
//! Drives the external `yt-dlp` tool to pull the best audio stream of a video
//! and transcode it to MP3 inside a target directory. Two strategies share one
//! contract, [`AudioFetcher::invoke`]:
//!
//! - [`ProcessFetcher`] runs the tool once and inspects its exit code.
//! - [`CallbackFetcher`] optionally asks the tool for metadata first, then
//!   follows its line-based progress output and records the final path.

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::config::{DownloadConfig, ToolConfig};
use crate::core::models::{AppError, AppResult, InvocationStrategy, OutputNaming};
use crate::utils::file_utils::{
    find_latest_mp3, has_mp3_extension, remove_partial_files, sanitize_path_segment,
    snapshot_mp3s, Mp3Snapshot,
};

const TITLE_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Event parsed from one line of yt-dlp output
#[derive(Debug, Clone, PartialEq)]
pub enum ToolEvent {
    /// The tool started writing an intermediate file
    Destination(PathBuf),
    Progress { percent: f64 },
    /// Post-processing produced the final audio file
    Finished(PathBuf),
}

/// Progress callback type for callback-driven downloads
pub type ProgressCallback = Arc<dyn Fn(&ToolEvent) + Send + Sync>;

/// What the tool writes to stdout during a download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdoutMode {
    /// Only the final file path, via `--print after_move:filepath`
    FinalPath,
    /// One line per progress update, via `--newline`
    ProgressLines,
}

/// Strategy interface over the external tool
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Download `url` as MP3 into `dest_dir` and return the produced file
    async fn invoke(&self, url: &str, dest_dir: &Path) -> AppResult<PathBuf>;

    fn name(&self) -> &'static str;
}

/// Pick the concrete strategy named by the configuration
pub fn build_fetcher(
    download: &DownloadConfig,
    tool: &ToolConfig,
    progress: Option<ProgressCallback>,
) -> Arc<dyn AudioFetcher> {
    let yt_dlp = YtDlp::new(tool.clone());
    match download.strategy {
        InvocationStrategy::Process => Arc::new(ProcessFetcher::new(yt_dlp, download.naming)),
        InvocationStrategy::Callback => {
            let mut fetcher =
                CallbackFetcher::new(yt_dlp, download.naming, download.prefetch_metadata);
            if let Some(callback) = progress {
                fetcher = fetcher.with_progress(callback);
            }
            Arc::new(fetcher)
        }
    }
}

/// Argument builder and process launcher for yt-dlp
#[derive(Debug, Clone)]
pub struct YtDlp {
    config: ToolConfig,
}

impl YtDlp {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    fn timeout(&self) -> Option<Duration> {
        self.config.timeout_seconds.map(Duration::from_secs)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.program_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, err: std::io::Error) -> AppError {
        AppError::Invocation(format!("could not be started: {}", err))
    }

    /// Audio-only, best source, MP3 at the highest VBR quality
    pub fn download_args(
        &self,
        output_template: &str,
        url: &str,
        stdout: StdoutMode,
    ) -> Vec<String> {
        let mut args: Vec<String> = [
            "-f",
            "bestaudio",
            "--extract-audio",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "0",
            "--no-playlist",
            "--no-check-certificate",
            "--geo-bypass",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        match stdout {
            StdoutMode::FinalPath => {
                args.push("--print".to_string());
                args.push("after_move:filepath".to_string());
            }
            StdoutMode::ProgressLines => args.push("--newline".to_string()),
        }
        args.push("--output".to_string());
        args.push(output_template.to_string());
        args.extend(self.config.extra_args.iter().cloned());
        args.push(url.to_string());
        args
    }

    pub fn metadata_args(&self, url: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "--dump-single-json",
            "--skip-download",
            "--no-playlist",
            "--no-warnings",
            "--no-check-certificate",
            "--geo-bypass",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(self.config.extra_args.iter().cloned());
        args.push(url.to_string());
        args
    }

    /// Run to completion and capture both streams
    pub async fn run_captured(&self, args: &[String]) -> AppResult<Output> {
        debug!("Running {} {:?}", self.config.program, args);

        let child = self
            .command()
            .args(args)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let wait = child.wait_with_output();
        let output = match self.timeout() {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| self.timeout_error(limit))??,
            None => wait.await?,
        };
        Ok(output)
    }

    /// Quiet metadata lookup used to name the output file
    pub async fn fetch_metadata(&self, url: &str) -> AppResult<VideoMetadata> {
        let output = self.run_captured(&self.metadata_args(url)).await?;
        if !output.status.success() {
            return Err(AppError::Invocation(failure_text(&output)));
        }
        serde_json::from_slice(&output.stdout)
            .map_err(|e| AppError::Invocation(format!("yt-dlp returned invalid JSON: {}", e)))
    }

    fn timeout_error(&self, limit: Duration) -> AppError {
        AppError::Invocation(format!("timed out after {}s", limit.as_secs()))
    }
}

/// Subset of `--dump-single-json` output
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoMetadata {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl VideoMetadata {
    /// File stem from the title, then the id; None when both sanitize to nothing
    pub fn file_stem(&self) -> Option<String> {
        [self.title.as_deref(), self.id.as_deref()]
            .into_iter()
            .flatten()
            .map(sanitize_path_segment)
            .find(|stem| !stem.is_empty())
    }
}

/// Best diagnostic text from a failed run
fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }
    format!("exited with {}", output.status)
}

fn unique_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Output template plus the path the final MP3 will have, when predictable
fn output_target(dest_dir: &Path, stem: Option<&str>) -> (String, Option<PathBuf>) {
    match stem {
        Some(stem) => (
            dest_dir
                .join(format!("{}.%(ext)s", stem))
                .to_string_lossy()
                .into_owned(),
            Some(dest_dir.join(format!("{}.mp3", stem))),
        ),
        None => (
            dest_dir.join(TITLE_TEMPLATE).to_string_lossy().into_owned(),
            None,
        ),
    }
}

/// Settle on the produced file. A predictable path is authoritative; only a
/// title-named run falls back to scanning the directory, and then only for
/// files that were not already there before the run.
fn resolve_output(
    dest_dir: &Path,
    reported: Option<PathBuf>,
    expected: Option<PathBuf>,
    before: &Mp3Snapshot,
) -> AppResult<PathBuf> {
    if let Some(path) = reported.filter(|p| p.is_file() && has_mp3_extension(p)) {
        return Ok(path);
    }
    match expected {
        Some(path) if path.is_file() => Ok(path),
        Some(path) => {
            warn!("Expected output missing: {}", path.display());
            Err(AppError::MissingOutput)
        }
        None => find_latest_mp3(dest_dir, before)?.ok_or(AppError::MissingOutput),
    }
}

fn progress_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[download\]\s+(\d+(?:\.\d+)?)%").expect("progress regex is valid")
    })
}

/// Parse one stdout line of a `--newline` run
pub fn parse_tool_line(line: &str) -> Option<ToolEvent> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("[ExtractAudio] Destination:") {
        let path = rest.trim();
        return (!path.is_empty()).then(|| ToolEvent::Finished(PathBuf::from(path)));
    }

    if let Some(rest) = line.strip_prefix("[ExtractAudio] Not converting audio ") {
        let path = rest.split("; file is already in target format").next()?.trim();
        return (!path.is_empty()).then(|| ToolEvent::Finished(PathBuf::from(path)));
    }

    if let Some(rest) = line.strip_prefix("[download] Destination:") {
        let path = rest.trim();
        return (!path.is_empty()).then(|| ToolEvent::Destination(PathBuf::from(path)));
    }

    if let Some(rest) = line.strip_prefix("[download] ") {
        if let Some(path) = rest.strip_suffix(" has already been downloaded") {
            return Some(ToolEvent::Destination(PathBuf::from(path.trim())));
        }
    }

    let caps = progress_regex().captures(line)?;
    let percent = caps.get(1)?.as_str().parse().ok()?;
    Some(ToolEvent::Progress { percent })
}

/// Single captured run; the output is found by name or by scanning
pub struct ProcessFetcher {
    yt_dlp: YtDlp,
    naming: OutputNaming,
}

impl ProcessFetcher {
    pub fn new(yt_dlp: YtDlp, naming: OutputNaming) -> Self {
        Self { yt_dlp, naming }
    }
}

#[async_trait]
impl AudioFetcher for ProcessFetcher {
    async fn invoke(&self, url: &str, dest_dir: &Path) -> AppResult<PathBuf> {
        let token = match self.naming {
            OutputNaming::Unique => Some(unique_token()),
            OutputNaming::Title => None,
        };
        let (template, expected) = output_target(dest_dir, token.as_deref());
        let args = self
            .yt_dlp
            .download_args(&template, url, StdoutMode::FinalPath);
        let before = snapshot_mp3s(dest_dir)?;

        let output = match self.yt_dlp.run_captured(&args).await {
            Ok(output) => output,
            Err(err) => {
                remove_partial_files(dest_dir);
                return Err(err);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            debug!("[yt-dlp] {}", line);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            debug!("[yt-dlp stderr] {}", line);
        }

        if !output.status.success() {
            let removed = remove_partial_files(dest_dir);
            if removed > 0 {
                debug!("Removed {} partial files from {}", removed, dest_dir.display());
            }
            return Err(AppError::Invocation(failure_text(&output)));
        }

        let reported = stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .map(PathBuf::from);
        resolve_output(dest_dir, reported, expected, &before)
    }

    fn name(&self) -> &'static str {
        "process"
    }
}

/// Metadata-first run that follows the tool's progress lines
pub struct CallbackFetcher {
    yt_dlp: YtDlp,
    naming: OutputNaming,
    prefetch_metadata: bool,
    progress: Option<ProgressCallback>,
}

impl CallbackFetcher {
    pub fn new(yt_dlp: YtDlp, naming: OutputNaming, prefetch_metadata: bool) -> Self {
        Self {
            yt_dlp,
            naming,
            prefetch_metadata,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    async fn file_stem(&self, url: &str) -> AppResult<Option<String>> {
        match self.naming {
            OutputNaming::Unique => Ok(Some(unique_token())),
            OutputNaming::Title if self.prefetch_metadata => {
                let metadata = self.yt_dlp.fetch_metadata(url).await?;
                info!(
                    "Fetched metadata: title={:?} duration={:?}",
                    metadata.title, metadata.duration
                );
                Ok(Some(metadata.file_stem().unwrap_or_else(unique_token)))
            }
            OutputNaming::Title => Ok(None),
        }
    }

    async fn run_with_progress(
        &self,
        args: &[String],
    ) -> AppResult<(bool, String, Option<PathBuf>)> {
        debug!("Running {} {:?}", self.yt_dlp.config().program, args);

        let mut child = self
            .yt_dlp
            .command()
            .args(args)
            .spawn()
            .map_err(|e| self.yt_dlp.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Invocation("yt-dlp stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Invocation("yt-dlp stderr unavailable".to_string()))?;

        let finished: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));
        let finished_writer = Arc::clone(&finished);
        let callback = self.progress.clone();

        let line_reader = tokio::spawn(for_each_line(stdout, move |line| {
            debug!("[yt-dlp] {}", line);
            let Some(event) = parse_tool_line(line) else {
                return;
            };
            if let ToolEvent::Finished(path) = &event {
                *finished_writer.lock() = Some(path.clone());
            }
            if let Some(callback) = &callback {
                callback(&event);
            }
        }));
        let stderr_reader = tokio::spawn(collect_lines(stderr));

        let status = match self.yt_dlp.timeout() {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    let _ = child.kill().await;
                    line_reader.abort();
                    stderr_reader.abort();
                    return Err(self.yt_dlp.timeout_error(limit));
                }
            },
            None => child.wait().await?,
        };

        let _ = line_reader.await;
        let stderr_text = stderr_reader.await.unwrap_or_default();
        let diagnostic = if stderr_text.trim().is_empty() {
            format!("exited with {}", status)
        } else {
            stderr_text.trim().to_string()
        };

        let reported = finished.lock().take();
        Ok((status.success(), diagnostic, reported))
    }
}

/// Hand each line of `reader` to `on_line` until EOF. Bytes that are not
/// UTF-8 are replaced, so the pipe is always drained to the end.
async fn for_each_line<R, F>(reader: R, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                on_line(line.trim_end_matches(|c| c == '\n' || c == '\r'));
            }
            Err(err) => {
                warn!("Reading yt-dlp output failed: {}", err);
                break;
            }
        }
    }
}

async fn collect_lines<R>(reader: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut text = String::new();
    for_each_line(reader, |line| {
        debug!("[yt-dlp stderr] {}", line);
        text.push_str(line);
        text.push('\n');
    })
    .await;
    text
}

#[async_trait]
impl AudioFetcher for CallbackFetcher {
    async fn invoke(&self, url: &str, dest_dir: &Path) -> AppResult<PathBuf> {
        let stem = self.file_stem(url).await?;
        let (template, expected) = output_target(dest_dir, stem.as_deref());
        let args = self
            .yt_dlp
            .download_args(&template, url, StdoutMode::ProgressLines);
        let before = snapshot_mp3s(dest_dir)?;

        let (success, diagnostic, reported) = match self.run_with_progress(&args).await {
            Ok(result) => result,
            Err(err) => {
                remove_partial_files(dest_dir);
                return Err(err);
            }
        };

        if !success {
            remove_partial_files(dest_dir);
            return Err(AppError::Invocation(diagnostic));
        }

        if reported.is_none() {
            warn!("yt-dlp exited cleanly without reporting a finished file");
        }
        resolve_output(dest_dir, reported, expected, &before)
    }

    fn name(&self) -> &'static str {
        "callback"
    }
}
