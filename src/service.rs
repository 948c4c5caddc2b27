//! Entry points used by the command line and any other front end.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::batch::BatchOrchestrator;
use crate::config::Config;
use crate::core::{
    AudioFeatureSet, BatchResult, DownloadOutcome, LinkKind, MediaCandidate, PlaylistResolution,
    ProgressSender, SearchProvider, TrackDescriptor, TrackDownloader,
};
use crate::download::{Fetch, HttpFetcher};
use crate::error::Result;
use crate::link::classify;
use crate::pipeline::TrackPipeline;
use crate::spotify::{SpotifyResolver, SpotifySession};
use crate::youtube::YoutubeSearch;

/// What a query turned into
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchResponse {
    Videos {
        /// The search text came from a resolved track link
        is_from_spotify: bool,
        original_query: String,
        search_query: String,
        /// Identity of the resolved track link, used for tagging
        track: Option<TrackDescriptor>,
        videos: Vec<MediaCandidate>,
    },
    Playlist(PlaylistResolution),
    /// Playlist link whose tracks could not be extracted
    ManualPlaylist {
        playlist_id: String,
        playlist_url: String,
        error: String,
    },
}

pub struct TuneGrab {
    config: Config,
    resolver: Arc<SpotifyResolver>,
    search: YoutubeSearch,
    pipeline: TrackPipeline,
}

impl TuneGrab {
    pub fn new(config: Config) -> Self {
        Self::with_fetch(Arc::new(HttpFetcher), config)
    }

    pub fn with_fetch(fetch: Arc<dyn Fetch>, config: Config) -> Self {
        let session = SpotifySession::new(fetch.clone(), config.credentials.clone());
        let resolver = Arc::new(SpotifyResolver::new(Arc::new(session)));
        Self {
            search: YoutubeSearch::new(fetch.clone()),
            pipeline: TrackPipeline::new(fetch, resolver.clone(), &config),
            resolver,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// First token acquisition with the configured credentials
    pub async fn init(&self) -> bool {
        let ok = self.resolver.session().refresh().await.is_some();
        if !ok {
            warn!("Running without a Spotify token, metadata comes from scraping only");
        }
        ok
    }

    pub async fn set_credentials(&self, client_id: &str, client_secret: &str) -> bool {
        self.resolver
            .session()
            .set_credentials(client_id, client_secret)
            .await
    }

    /// Classify `query` and either search for it or resolve the playlist it points at
    pub async fn resolve_query(&self, query: &str) -> Result<SearchResponse> {
        let mut search_query = query.to_string();
        let mut resolved = None;

        match classify(query) {
            Some(link) if link.kind == LinkKind::Track => {
                info!("Track link detected: {}", link.id);
                match self.resolver.resolve_track(&link.id).await {
                    Ok(track) => {
                        search_query = track.search_query.clone();
                        resolved = Some(track);
                    }
                    Err(e) => warn!("Track {} not resolved, searching the raw query: {}", link.id, e),
                }
            }
            Some(link) if link.kind == LinkKind::Playlist => {
                info!("Playlist link detected: {}", link.id);
                return Ok(match self.resolver.resolve_playlist(&link.id).await {
                    Ok(resolution) => SearchResponse::Playlist(resolution),
                    Err(e) => {
                        warn!("Playlist {} needs manual handling: {}", link.id, e);
                        SearchResponse::ManualPlaylist {
                            playlist_id: link.id,
                            playlist_url: query.trim().to_string(),
                            error: e.to_string(),
                        }
                    }
                });
            }
            Some(link) => info!("{} links are searched verbatim", link.kind),
            None => {}
        }

        let videos = self
            .search
            .search(&search_query, self.config.search_limit)
            .await?;
        Ok(SearchResponse::Videos {
            is_from_spotify: resolved.is_some(),
            original_query: query.to_string(),
            search_query,
            track: resolved,
            videos,
        })
    }

    /// Download one candidate into `dest_dir`; progress is keyed by the video id
    pub async fn download_track(
        &self,
        candidate: &MediaCandidate,
        dest_dir: &Path,
        track: Option<&TrackDescriptor>,
        progress: Option<&ProgressSender>,
    ) -> DownloadOutcome {
        self.pipeline
            .download_track(candidate, dest_dir, &candidate.id, track, progress)
            .await
    }

    pub async fn download_playlist(
        &self,
        playlist: &PlaylistResolution,
        dest_dir: &Path,
        progress: Option<&ProgressSender>,
    ) -> Result<BatchResult> {
        BatchOrchestrator::new(
            &self.search,
            &self.pipeline,
            self.config.batch_search_limit,
            self.config.track_pause,
        )
        .download_all(playlist, dest_dir, progress)
        .await
    }

    pub async fn track_metadata(&self, name: &str, artist: &str) -> Option<AudioFeatureSet> {
        self.resolver.track_metadata(name, artist).await
    }
}
