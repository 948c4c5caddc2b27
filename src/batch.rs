use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::core::{
    BatchResult, DownloadOutcome, PlaylistProgress, PlaylistResolution, ProgressEvent,
    ProgressSender,
    SearchProvider, TrackDescriptor, TrackDownloader, emit,
};
use crate::error::Result;
use crate::utils::sanitize_filename;

const NOT_FOUND: &str = "not found on YouTube";

/// Downloads a resolved playlist one track at a time
pub struct BatchOrchestrator<'a> {
    search: &'a dyn SearchProvider,
    downloader: &'a dyn TrackDownloader,
    search_limit: usize,
    pause: Duration,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(
        search: &'a dyn SearchProvider,
        downloader: &'a dyn TrackDownloader,
        search_limit: usize,
        pause: Duration,
    ) -> Self {
        Self {
            search,
            downloader,
            search_limit,
            pause,
        }
    }

    /// `dest/<sanitized playlist name>`, created if missing
    pub async fn playlist_dir(dest: &Path, playlist_name: &str) -> Result<PathBuf> {
        let dir = dest.join(sanitize_filename(playlist_name));
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    async fn process_track(
        &self,
        index: usize,
        track: &TrackDescriptor,
        dir: &Path,
        progress: Option<&ProgressSender>,
    ) -> std::result::Result<PathBuf, String> {
        let candidates = self
            .search
            .search(&track.search_query, self.search_limit)
            .await
            .map_err(|e| e.to_string())?;
        // First result is taken as the match
        let best = candidates.first().ok_or_else(|| NOT_FOUND.to_string())?;
        let outcome = self
            .downloader
            .download_track(best, dir, &format!("playlist-{}", index), Some(track), progress)
            .await;
        match outcome {
            DownloadOutcome::Saved { file_path, .. } => Ok(file_path),
            DownloadOutcome::Failed { error } => Err(error),
        }
    }

    /// Attempt every track in order. A failing or panicking track is counted and
    /// the batch carries on.
    pub async fn download_all(
        &self,
        playlist: &PlaylistResolution,
        dest: &Path,
        progress: Option<&ProgressSender>,
    ) -> Result<BatchResult> {
        let dir = Self::playlist_dir(dest, &playlist.playlist_name).await?;
        let total = playlist.tracks.len();
        let mut result = BatchResult {
            playlist_name: sanitize_filename(&playlist.playlist_name),
            total_tracks: total,
            ..Default::default()
        };
        info!("Downloading playlist '{}' ({} tracks)", result.playlist_name, total);

        for (i, track) in playlist.tracks.iter().enumerate() {
            let current = i + 1;
            emit(
                progress,
                ProgressEvent::Playlist(PlaylistProgress {
                    current,
                    total,
                    track_name: track.name.clone(),
                    artist: track.artists.clone(),
                    percent: (current as f64 / total as f64 * 100.0).round() as u8,
                }),
            );
            info!("Track {}/{}: {}", current, total, track.search_query);

            let attempt = AssertUnwindSafe(self.process_track(i, track, &dir, progress))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err("unexpected panic while processing track".to_string()));

            match attempt {
                Ok(path) => {
                    result.downloaded += 1;
                    info!("Downloaded {} - {} to {}", track.name, track.artists, path.display());
                }
                Err(reason) => {
                    result.failed += 1;
                    warn!("Failed {} - {}: {}", track.name, track.artists, reason);
                    result
                        .errors
                        .push(format!("{} - {}: {}", track.name, track.artists, reason));
                }
            }

            if current < total {
                tokio::time::sleep(self.pause).await;
            }
        }

        if result.failed > 0 {
            error!(
                "Playlist '{}' finished with {} failures",
                result.playlist_name, result.failed
            );
        }
        info!(
            "Playlist '{}' done: {} downloaded, {} failed",
            result.playlist_name, result.downloaded, result.failed
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MediaCandidate;
    use crate::error::TuneGrabError;
    use std::sync::Mutex;
    use tokio::time::Instant;

    struct StubSearch;

    #[async_trait::async_trait]
    impl SearchProvider for StubSearch {
        async fn search(&self, query: &str, limit: usize) -> Result<Vec<MediaCandidate>> {
            assert_eq!(limit, 3);
            if query.contains("Missing") {
                return Ok(Vec::new());
            }
            if query.contains("Offline") {
                return Err(TuneGrabError::Resolution("search unavailable".to_string()));
            }
            Ok(vec![
                MediaCandidate {
                    id: format!("{}-1", query),
                    title: query.to_string(),
                    channel: "Channel".to_string(),
                    duration: "3:00".to_string(),
                    thumbnail: String::new(),
                    url: format!("https://www.youtube.com/watch?v={}", query.len()),
                },
                MediaCandidate {
                    id: format!("{}-2", query),
                    title: "Cover".to_string(),
                    channel: "Other".to_string(),
                    duration: "3:00".to_string(),
                    thumbnail: String::new(),
                    url: String::new(),
                },
            ])
        }
    }

    #[derive(Default)]
    struct RecordingDownloader {
        calls: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait::async_trait]
    impl TrackDownloader for RecordingDownloader {
        async fn download_track(
            &self,
            candidate: &MediaCandidate,
            dest_dir: &Path,
            progress_id: &str,
            track: Option<&TrackDescriptor>,
            _progress: Option<&ProgressSender>,
        ) -> DownloadOutcome {
            let track = track.expect("playlist downloads carry the track");
            self.calls.lock().unwrap().push((
                candidate.id.clone(),
                progress_id.to_string(),
                track.name.clone(),
            ));
            if track.name == "Broken" {
                return DownloadOutcome::failed("yt-dlp failed: exit code 1");
            }
            if track.name == "Explodes" {
                panic!("decoder bug");
            }
            DownloadOutcome::saved(&dest_dir.join(format!("{}.mp3", track.name)))
        }
    }

    fn playlist(names: &[&str]) -> PlaylistResolution {
        PlaylistResolution::new(
            "Road: Trip/2024",
            names
                .iter()
                .map(|n| TrackDescriptor::new(*n, "Band"))
                .collect(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn failures_never_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = RecordingDownloader::default();
        let orchestrator =
            BatchOrchestrator::new(&StubSearch, &downloader, 3, Duration::from_secs(1));
        let playlist = playlist(&["Opener", "Missing", "Broken", "Explodes", "Offline", "Closer"]);

        let result = orchestrator
            .download_all(&playlist, dir.path(), None)
            .await
            .unwrap();

        assert_eq!(result.playlist_name, "Road Trip2024");
        assert_eq!(result.total_tracks, 6);
        assert_eq!(result.downloaded, 2);
        assert_eq!(result.failed, 4);
        assert_eq!(result.downloaded + result.failed, result.total_tracks);
        assert_eq!(
            result.errors,
            vec![
                "Missing - Band: not found on YouTube".to_string(),
                "Broken - Band: yt-dlp failed: exit code 1".to_string(),
                "Explodes - Band: unexpected panic while processing track".to_string(),
                "Offline - Band: Resolution failed: search unavailable".to_string(),
            ]
        );
        assert!(dir.path().join("Road Trip2024").is_dir());
    }

    #[tokio::test(start_paused = true)]
    async fn takes_first_candidate_in_order_with_playlist_ids() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = RecordingDownloader::default();
        let orchestrator =
            BatchOrchestrator::new(&StubSearch, &downloader, 3, Duration::from_secs(1));

        orchestrator
            .download_all(&playlist(&["One", "Two"]), dir.path(), None)
            .await
            .unwrap();

        let calls = downloader.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("Band One-1".to_string(), "playlist-0".to_string(), "One".to_string()),
                ("Band Two-1".to_string(), "playlist-1".to_string(), "Two".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_between_tracks_only() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = RecordingDownloader::default();
        let orchestrator =
            BatchOrchestrator::new(&StubSearch, &downloader, 3, Duration::from_secs(1));

        let start = Instant::now();
        orchestrator
            .download_all(&playlist(&["A1", "B2", "C3"]), dir.path(), None)
            .await
            .unwrap();
        assert_eq!(start.elapsed().as_secs(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn emits_playlist_progress_per_track() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = RecordingDownloader::default();
        let orchestrator =
            BatchOrchestrator::new(&StubSearch, &downloader, 3, Duration::from_secs(1));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        orchestrator
            .download_all(&playlist(&["First", "Second", "Third"]), dir.path(), Some(&tx))
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(ProgressEvent::Playlist(p)) = rx.try_recv() {
            seen.push((p.current, p.total, p.percent, p.track_name));
        }
        assert_eq!(
            seen,
            vec![
                (1, 3, 33, "First".to_string()),
                (2, 3, 67, "Second".to_string()),
                (3, 3, 100, "Third".to_string()),
            ]
        );
    }
}
