use crate::error::Result;
use crate::utils::format_bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumIter, EnumString};
use tokio::sync::mpsc::UnboundedSender;

/// Kind of entity an external music-service link points at
#[derive(EnumIter, EnumString, Display, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Track,
    Album,
    Playlist,
}

/// A parsed reference to a track/album/playlist on the music service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalLink {
    pub kind: LinkKind,
    pub id: String,
}

/// Track identity used for searching and tagging
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackDescriptor {
    pub name: String,
    /// Comma-joined display string
    pub artists: String,
    pub search_query: String,
}

impl TrackDescriptor {
    pub fn new(name: impl Into<String>, artists: impl Into<String>) -> Self {
        let name = name.into();
        let artists = artists.into();
        let search_query = format!("{} {}", artists, name);
        Self {
            name,
            artists,
            search_query,
        }
    }

    /// Case-insensitive identity used to drop duplicate scrape matches
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|||{}",
            self.name.to_lowercase(),
            self.artists.to_lowercase()
        )
    }
}

/// Ordered playlist contents; `total_tracks` always equals `tracks.len()`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistResolution {
    pub playlist_name: String,
    pub tracks: Vec<TrackDescriptor>,
    pub total_tracks: usize,
}

impl PlaylistResolution {
    pub fn new(playlist_name: impl Into<String>, tracks: Vec<TrackDescriptor>) -> Self {
        let total_tracks = tracks.len();
        Self {
            playlist_name: playlist_name.into(),
            tracks,
            total_tracks,
        }
    }
}

/// One search hit on the video platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaCandidate {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub duration: String,
    pub thumbnail: String,
    pub url: String,
}

/// Container of the selected source stream
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    Mp4,
    Webm,
}

impl AudioFormat {
    pub fn from_youtube(s: &str) -> Self {
        if s.starts_with("audio/webm") {
            return Self::Webm;
        };
        Self::Mp4
    }
}

/// The audio-only encoding picked by the stream extractor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncodingDescriptor {
    pub itag: u64,
    pub mime_type: String,
    pub bitrate: u64,
    pub content_length: Option<u64>,
    pub container: AudioFormat,
}

/// Selected encoding plus the open response body. Consumed once by the transcoder.
#[derive(Debug)]
pub struct AudioStreamHandle {
    pub encoding: EncodingDescriptor,
    pub response: reqwest::Response,
}

/// Terminal result of one track's pipeline run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DownloadOutcome {
    Saved { file_name: String, file_path: PathBuf },
    Failed { error: String },
}

impl DownloadOutcome {
    pub fn saved(file_path: &Path) -> Self {
        let file_name = file_path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::Saved {
            file_name,
            file_path: file_path.to_path_buf(),
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self::Failed {
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error } => Some(error),
            Self::Saved { .. } => None,
        }
    }
}

/// Aggregate of a playlist download
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub playlist_name: String,
    pub total_tracks: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Audio characteristics of a track as reported by the metadata service.
/// Every field is optional because either upstream request may fail on its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AudioFeatureSet {
    pub bpm: Option<u32>,
    pub key: Option<String>,
    pub energy: Option<u32>,
    pub danceability: Option<u32>,
    pub valence: Option<u32>,
    pub acousticness: Option<u32>,
    pub instrumentalness: Option<u32>,
    pub liveness: Option<u32>,
    pub speechiness: Option<u32>,
    pub loudness: Option<i32>,
    pub duration_ms: Option<u64>,
    pub popularity: Option<u32>,
    pub explicit: Option<bool>,
    pub preview_url: Option<String>,
    pub external_id: Option<String>,
    pub external_url: Option<String>,
    pub album: Option<String>,
    pub release_date: Option<String>,
    pub genres: Vec<String>,
    pub time_signature: Option<u32>,
    pub sections: Option<usize>,
    pub bars: Option<usize>,
    pub beats: Option<usize>,
    pub tatums: Option<usize>,
}

/// Byte-level progress of a single download
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadProgress {
    pub progress_id: String,
    pub percent: u8,
    pub downloaded: String,
    pub total: String,
}

/// Position inside a playlist download
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistProgress {
    pub current: usize,
    pub total: usize,
    pub track_name: String,
    pub artist: String,
    pub percent: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProgressEvent {
    Download(DownloadProgress),
    Playlist(PlaylistProgress),
}

pub type ProgressSender = UnboundedSender<ProgressEvent>;

/// Forward an event if anyone is listening. A dropped receiver is not an error.
pub fn emit(progress: Option<&ProgressSender>, event: ProgressEvent) {
    if let Some(tx) = progress {
        let _ = tx.send(event);
    }
}

/// Turns byte counts into capped, non-decreasing percentages for one download
#[derive(Debug)]
pub struct ProgressTracker {
    progress_id: String,
    sender: Option<ProgressSender>,
    last: u8,
}

impl ProgressTracker {
    pub fn new(progress_id: impl Into<String>, sender: Option<&ProgressSender>) -> Self {
        Self {
            progress_id: progress_id.into(),
            sender: sender.cloned(),
            last: 0,
        }
    }

    /// `min(downloaded / total * 100, 99)`; 0 while the total is unknown
    pub fn percent_of(downloaded: u64, total: u64) -> u8 {
        if total == 0 {
            return 0;
        }
        let pct = (downloaded as f64 / total as f64 * 100.0).floor();
        pct.clamp(0.0, 99.0) as u8
    }

    pub fn last_percent(&self) -> u8 {
        self.last
    }

    /// Report transferred bytes. Returns the percent that was emitted.
    pub fn update(&mut self, downloaded: u64, total: u64) -> u8 {
        let percent = Self::percent_of(downloaded, total).max(self.last);
        self.last = percent;
        self.send(percent, format_bytes(downloaded), format_bytes(total));
        percent
    }

    /// Report a percentage parsed from tool output, with free-form labels
    pub fn update_percent(&mut self, percent: f64, downloaded: &str, total: &str) -> u8 {
        let percent = (percent.floor().clamp(0.0, 99.0) as u8).max(self.last);
        self.last = percent;
        self.send(percent, downloaded.to_string(), total.to_string());
        percent
    }

    /// Terminal 100% event
    pub fn finish(&mut self) {
        self.last = 100;
        self.send(100, "Complete".to_string(), "Complete".to_string());
    }

    fn send(&self, percent: u8, downloaded: String, total: String) {
        emit(
            self.sender.as_ref(),
            ProgressEvent::Download(DownloadProgress {
                progress_id: self.progress_id.clone(),
                percent,
                downloaded,
                total,
            }),
        );
    }
}

/// Maps free text to ranked candidates on the video platform
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MediaCandidate>>;
}

/// Runs the whole single-track pipeline. Never fails past its own boundary.
#[async_trait::async_trait]
pub trait TrackDownloader: Send + Sync {
    async fn download_track(
        &self,
        candidate: &MediaCandidate,
        dest_dir: &Path,
        progress_id: &str,
        track: Option<&TrackDescriptor>,
        progress: Option<&ProgressSender>,
    ) -> DownloadOutcome;
}
