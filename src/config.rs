use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Bootstrap placeholders; real credentials are supplied at runtime.
pub const DEFAULT_CLIENT_ID: &str = "your-spotify-client-id";
pub const DEFAULT_CLIENT_SECRET: &str = "your-spotify-client-secret";

/// Budget for every long-running stream or subprocess
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(600);
/// Courtesy pause between playlist entries
pub const TRACK_PAUSE: Duration = Duration::from_secs(1);
pub const BATCH_SEARCH_LIMIT: usize = 3;
pub const SEARCH_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: DEFAULT_CLIENT_SECRET.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub credentials: Credentials,
    /// Explicit ffmpeg executable; probed when absent
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit yt-dlp executable; probed when absent
    pub yt_dlp_path: Option<PathBuf>,
    pub tool_timeout: Duration,
    pub track_pause: Duration,
    pub batch_search_limit: usize,
    pub search_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            ffmpeg_path: None,
            yt_dlp_path: None,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            track_pause: TRACK_PAUSE,
            batch_search_limit: BATCH_SEARCH_LIMIT,
            search_limit: SEARCH_LIMIT,
        }
    }
}
