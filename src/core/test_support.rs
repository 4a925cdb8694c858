//! Test helpers: a POSIX `sh` stand-in for yt-dlp
//!
//! The script understands the handful of flags the fetchers pass and reacts
//! to markers in the URL: `fail` exits 1 with an error on stderr (leaving a
//! `.part` file behind), `slow` sleeps two seconds, `nofile` exits 0 without
//! writing anything, `latin1` prints Latin-1 encoded text on both streams and
//! pauses before finishing. With `--print` it behaves like `--quiet` and only
//! prints the final path.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::core::config::AppConfig;
use crate::core::models::{InvocationStrategy, OutputNaming};

pub const FAKE_MP3_BYTES: &[u8] = b"ID3fake-mp3-payload";

const FAKE_YT_DLP: &str = r#"#!/bin/sh
out=""
url=""
meta=0
print=0
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift 2 ;;
    --dump-single-json) meta=1; shift ;;
    --print) print=1; shift 2 ;;
    *) url="$1"; shift ;;
  esac
done
case "$url" in
  *fail*)
    case "$url" in *latin1*) printf 'WARNING: Caf\351 title\n' >&2 ;; esac
    if [ -n "$out" ]; then printf 'x' > "$(dirname "$out")/leftover.webm.part"; fi
    echo "ERROR: [youtube] fail: Video unavailable" >&2
    exit 1 ;;
esac
if [ "$meta" = 1 ]; then
  printf '%s\n' '{"id": "abc123", "title": "Fake/Song: Live", "duration": 212.0}'
  exit 0
fi
case "$url" in
  *slow*) sleep 2 ;;
esac
case "$url" in
  *nofile*) exit 0 ;;
  *latin1*)
    printf '[youtube] Caf\351 title\n'
    printf 'WARNING: Caf\351 title\n' >&2
    sleep 1 ;;
esac
dest=$(printf '%s' "$out" | sed -e 's/%(title)s/Fake Song/' -e 's/%(ext)s/mp3/')
printf 'ID3fake-mp3-payload' > "$dest"
if [ "$print" = 1 ]; then
  echo "$dest"
  exit 0
fi
echo "[download] Destination: $dest"
echo "[download] 100% of 1.00KiB in 00:00:01"
echo "[ExtractAudio] Destination: $dest"
exit 0
"#;

pub struct FakeTool {
    pub root: TempDir,
    pub script: PathBuf,
}

impl FakeTool {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let script = root.path().join("fake-yt-dlp.sh");
        std::fs::write(&script, FAKE_YT_DLP).unwrap();
        Self { root, script }
    }

    pub fn download_dir(&self) -> PathBuf {
        self.root.path().join("downloads")
    }

    pub fn folder(&self, name: &str) -> PathBuf {
        self.download_dir().join(name)
    }

    /// Configuration that runs the script through `sh`
    pub fn config(&self, strategy: InvocationStrategy, naming: OutputNaming) -> AppConfig {
        let mut config = AppConfig::default();
        config.download.download_dir = self.download_dir();
        config.download.strategy = strategy;
        config.download.naming = naming;
        config.tool.program = "sh".to_string();
        config.tool.program_args = vec![self.script.display().to_string()];
        config
    }
}

pub fn mp3_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().map(|ext| ext == "mp3").unwrap_or(false))
        .collect();
    files.sort();
    files
}
