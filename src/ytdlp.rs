use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::core::ProgressTracker;
use crate::download::WEB_USER_AGENT;
use crate::error::{Result, TuneGrabError};
use crate::process::{ToolEvent, locate_executable, run_tool};

const TOOL: &str = "yt-dlp";
pub const YT_DLP_CANDIDATES: [&str; 3] = [
    "/opt/homebrew/bin/yt-dlp",
    "/usr/local/bin/yt-dlp",
    "/usr/bin/yt-dlp",
];
const DOWNLOADING: &str = "Downloading...";
const UNKNOWN: &str = "Unknown";

/// yt-dlp picks the extension itself, so `song.mp3` becomes `song.%(ext)s`
pub fn output_template(output: &Path) -> String {
    let path = output.to_string_lossy();
    match path.strip_suffix(".mp3") {
        Some(stem) => format!("{}.%(ext)s", stem),
        None => path.into_owned(),
    }
}

pub fn build_args(media_url: &str, output: &Path) -> Vec<String> {
    [
        "--extract-audio",
        "--audio-format",
        "mp3",
        "--audio-quality",
        "192K",
        "--output",
        &output_template(output),
        "--no-playlist",
        "--newline",
        "--user-agent",
        WEB_USER_AGENT,
        "--referer",
        "https://www.youtube.com/",
        media_url,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Fallback extractor driving an external yt-dlp
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    timeout: Duration,
}

impl YtDlp {
    pub fn new(explicit: Option<&Path>, timeout: Duration) -> Self {
        Self {
            program: locate_executable(TOOL, explicit, &YT_DLP_CANDIDATES),
            timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Download and convert `media_url` to `output`. Succeeds only on a zero
    /// exit with no error lines on stderr.
    pub async fn download(
        &self,
        media_url: &str,
        output: &Path,
        tracker: &mut ProgressTracker,
    ) -> Result<PathBuf> {
        let args = build_args(media_url, output);
        info!("Running {} {}", self.program.display(), args.join(" "));

        let result = run_tool(&self.program, &args, self.timeout, |event| match event {
            ToolEvent::Progress(pct) => {
                tracker.update_percent(pct, DOWNLOADING, UNKNOWN);
            }
            ToolEvent::Error(line) => warn!("yt-dlp: {}", line),
            ToolEvent::Info(_) => {}
        })
        .await
        .map_err(|e| match e {
            TuneGrabError::Subprocess { reason, .. } => TuneGrabError::subprocess(TOOL, reason),
            other => other,
        })?;

        if !result.succeeded() {
            return Err(TuneGrabError::subprocess(TOOL, result.failure_reason()));
        }
        info!("yt-dlp finished: {}", output.display());
        Ok(output.to_path_buf())
    }
}
