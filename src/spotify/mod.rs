//! Metadata resolution for music-service links.
//!
//! Each entity kind runs an ordered cascade: the authenticated API when a token
//! is held, then scraping of the public pages.

pub mod api;
pub mod features;
pub mod scrape;
pub mod session;
pub mod types;

use reqwest::header::HeaderMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cascade::{Attempt, Cascade};
use crate::core::{AudioFeatureSet, LinkKind, PlaylistResolution, TrackDescriptor};
use crate::download::browser_headers;
use crate::error::{Result, TuneGrabError};
use crate::link::{build_embed_url, build_web_url};

pub use session::SpotifySession;

pub struct SpotifyResolver {
    session: Arc<SpotifySession>,
}

impl SpotifyResolver {
    pub fn new(session: Arc<SpotifySession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SpotifySession {
        &self.session
    }

    async fn fetch_page(&self, url: &str, headers: HeaderMap) -> Result<String> {
        self.session.fetch().get_text(url, headers).await
    }

    /// Name and artists of a single track
    pub async fn resolve_track(&self, id: &str) -> Result<TrackDescriptor> {
        let mut cascade = Cascade::new("track");

        if self.session.has_token().await {
            cascade.record("api", api::track_descriptor(&self.session, id).await.into());
        } else {
            cascade.record("api", Attempt::Skip("no access token".to_string()));
        }

        if !cascade.is_done() {
            match self
                .fetch_page(&build_web_url(LinkKind::Track, id), browser_headers())
                .await
            {
                Ok(html) => {
                    cascade.run(&html, &scrape::TRACK_PAGE_STRATEGIES);
                }
                Err(e) => {
                    cascade.record("track page", Attempt::Fail(e.to_string()));
                }
            }
        }

        let track = cascade.finish().map_err(TuneGrabError::Resolution)?;
        info!("Resolved track {}: {} - {}", id, track.artists, track.name);
        Ok(track)
    }

    /// Ordered track list of a playlist
    pub async fn resolve_playlist(&self, id: &str) -> Result<PlaylistResolution> {
        let mut cascade = Cascade::new("playlist");

        if self.session.has_token().await {
            match api::playlist(&self.session, id).await {
                Ok(resolution) => return Ok(resolution),
                Err(e) => {
                    warn!("Playlist API failed for {}, scraping instead: {}", id, e);
                    cascade.record("api", Attempt::Fail(e.to_string()));
                }
            }
        } else {
            cascade.record("api", Attempt::<Vec<TrackDescriptor>>::Skip(
                "no access token".to_string(),
            ));
        }

        let default_name = format!("Playlist_{}", id);
        let mut name = default_name.clone();

        match self
            .fetch_page(&build_embed_url(LinkKind::Playlist, id), HeaderMap::new())
            .await
        {
            Ok(html) => {
                if let Some(title) = scrape::playlist_name(&html) {
                    name = title;
                }
                cascade.run(&html, &scrape::EMBED_PAGE_STRATEGIES);
            }
            Err(e) => {
                cascade.record("embed page", Attempt::Fail(e.to_string()));
            }
        }

        if !cascade.is_done() {
            match self
                .fetch_page(&build_web_url(LinkKind::Playlist, id), browser_headers())
                .await
            {
                Ok(html) => {
                    if name == default_name
                        && let Some(title) = scrape::playlist_name(&html)
                    {
                        name = title;
                    }
                    cascade.run(&html, &scrape::PLAYLIST_PAGE_STRATEGIES);
                }
                Err(e) => {
                    cascade.record("playlist page", Attempt::Fail(e.to_string()));
                }
            }
        }

        let tracks = cascade.finish().map_err(|reasons| {
            TuneGrabError::Resolution(format!(
                "could not extract the tracks of playlist {} ({})",
                id, reasons
            ))
        })?;
        info!("Playlist '{}' scraped: {} tracks", name, tracks.len());
        Ok(PlaylistResolution::new(name, tracks))
    }

    pub async fn track_metadata(&self, name: &str, artist: &str) -> Option<AudioFeatureSet> {
        features::track_metadata(&self.session, name, artist).await
    }
}
