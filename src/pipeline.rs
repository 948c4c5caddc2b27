use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::{
    DownloadOutcome, MediaCandidate, ProgressSender, ProgressTracker, TrackDescriptor,
    TrackDownloader,
};
use crate::download::Fetch;
use crate::error::{Result, TuneGrabError};
use crate::spotify::SpotifyResolver;
use crate::tags::write_tags;
use crate::transcode::Transcoder;
use crate::utils::sanitize_filename;
use crate::youtube::StreamExtractor;
use crate::ytdlp::YtDlp;

/// `<channel> - <title>.mp3`, cleaned for the file system
pub fn file_name_for(candidate: &MediaCandidate) -> String {
    let channel = if candidate.channel.is_empty() {
        "Unknown"
    } else {
        &candidate.channel
    };
    format!(
        "{}.mp3",
        sanitize_filename(&format!("{} - {}", channel, candidate.title))
    )
}

/// Errors after which the whole track is retried with yt-dlp
fn triggers_fallback(e: &TuneGrabError) -> bool {
    matches!(e, TuneGrabError::Extraction(_) | TuneGrabError::AudioNotFound)
}

/// Single-track pipeline: extract, transcode, fall back, tag
pub struct TrackPipeline {
    extractor: StreamExtractor,
    transcoder: Transcoder,
    ytdlp: YtDlp,
    resolver: Arc<SpotifyResolver>,
}

impl TrackPipeline {
    pub fn new(fetch: Arc<dyn Fetch>, resolver: Arc<SpotifyResolver>, config: &Config) -> Self {
        Self {
            extractor: StreamExtractor::new(fetch, config.tool_timeout),
            transcoder: Transcoder::new(config.ffmpeg_path.as_deref(), config.tool_timeout),
            ytdlp: YtDlp::new(config.yt_dlp_path.as_deref(), config.tool_timeout),
            resolver,
        }
    }

    async fn primary(&self, url: &str, output: &Path, tracker: &mut ProgressTracker) -> Result<PathBuf> {
        let handle = self.extractor.extract(url).await?;
        self.transcoder.transcode(handle, output, tracker).await
    }

    async fn fallback(
        &self,
        url: &str,
        output: &Path,
        tracker: &mut ProgressTracker,
        primary_error: TuneGrabError,
    ) -> Result<PathBuf> {
        warn!("Primary extraction failed ({}), trying yt-dlp", primary_error);
        if let Err(e) = tokio::fs::remove_file(output).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!("Could not remove partial file {}: {}", output.display(), e);
        }
        self.ytdlp.download(url, output, tracker).await.map_err(|e| {
            TuneGrabError::Extraction(format!(
                "primary extractor and yt-dlp both failed: {} | {}",
                primary_error, e
            ))
        })
    }

    async fn tag(&self, output: &Path, track: &TrackDescriptor) {
        match self.resolver.track_metadata(&track.name, &track.artists).await {
            Some(features) => {
                write_tags(output, &features, track);
            }
            None => info!("No metadata for {} - {}, file left untagged", track.artists, track.name),
        }
    }

    pub async fn run(
        &self,
        candidate: &MediaCandidate,
        dest_dir: &Path,
        progress_id: &str,
        track: Option<&TrackDescriptor>,
        progress: Option<&ProgressSender>,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dest_dir).await?;
        let file_name = file_name_for(candidate);
        let output = dest_dir.join(&file_name);
        if tokio::fs::try_exists(&output).await? {
            return Err(TuneGrabError::AlreadyExists(file_name));
        }
        info!("Downloading {} to {}", candidate.url, output.display());

        let mut tracker = ProgressTracker::new(progress_id, progress);
        let saved = match self.primary(&candidate.url, &output, &mut tracker).await {
            Ok(path) => path,
            Err(e) if triggers_fallback(&e) => {
                self.fallback(&candidate.url, &output, &mut tracker, e).await?
            }
            Err(e) => return Err(e),
        };
        tracker.finish();

        if let Some(track) = track {
            self.tag(&saved, track).await;
        }
        Ok(saved)
    }
}

#[async_trait::async_trait]
impl TrackDownloader for TrackPipeline {
    async fn download_track(
        &self,
        candidate: &MediaCandidate,
        dest_dir: &Path,
        progress_id: &str,
        track: Option<&TrackDescriptor>,
        progress: Option<&ProgressSender>,
    ) -> DownloadOutcome {
        match self.run(candidate, dest_dir, progress_id, track, progress).await {
            Ok(path) => {
                info!("Saved {}", path.display());
                DownloadOutcome::saved(&path)
            }
            Err(e) => {
                error!("Download of {} failed: {}", candidate.url, e);
                DownloadOutcome::failed(e)
            }
        }
    }
}
