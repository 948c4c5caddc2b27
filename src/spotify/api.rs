use tracing::{debug, info};

use crate::core::{PlaylistResolution, TrackDescriptor};
use crate::error::{Result, TuneGrabError};
use crate::spotify::session::SpotifySession;
use crate::spotify::types::{Paging, Playlist, PlaylistItem, Track, join_artists};

pub const API_BASE: &str = "https://api.spotify.com/v1";

pub fn track_url(id: &str) -> String {
    format!("{}/tracks/{}", API_BASE, id)
}

pub fn playlist_url(id: &str) -> String {
    format!("{}/playlists/{}", API_BASE, id)
}

pub fn playlist_tracks_url(id: &str) -> String {
    format!("{}/playlists/{}/tracks", API_BASE, id)
}

pub async fn get_track(session: &SpotifySession, id: &str) -> Result<Track> {
    let body = session.authorized_get(&track_url(id)).await?;
    Ok(serde_json::from_str(&body)?)
}

pub async fn track_descriptor(session: &SpotifySession, id: &str) -> Result<TrackDescriptor> {
    let track = get_track(session, id).await?;
    let artists = track.artist_names();
    if track.name.is_empty() || artists.is_empty() {
        return Err(TuneGrabError::Resolution(format!(
            "track {} has no name or artist",
            id
        )));
    }
    Ok(TrackDescriptor::new(track.name, artists))
}

/// Playlist name plus every entry, following `next` links until the last page.
/// Entries without a name or artist (local files, episodes) are dropped.
pub async fn playlist(session: &SpotifySession, id: &str) -> Result<PlaylistResolution> {
    let body = session.authorized_get(&playlist_url(id)).await?;
    let meta: Playlist = serde_json::from_str(&body)?;

    let mut tracks = Vec::new();
    let mut next = Some(playlist_tracks_url(id));
    let mut pages = 0;
    while let Some(url) = next {
        let body = session.authorized_get(&url).await?;
        let page: Paging<PlaylistItem> = serde_json::from_str(&body)?;
        pages += 1;
        for item in page.items {
            let Some(track) = item.track else { continue };
            let name = track.name.unwrap_or_default();
            let artists = track.artists.as_deref().map(join_artists).unwrap_or_default();
            if !name.is_empty() && !artists.is_empty() {
                tracks.push(TrackDescriptor::new(name, artists));
            }
        }
        next = page.next;
    }
    debug!("Fetched {} playlist pages for {}", pages, id);

    if tracks.is_empty() {
        return Err(TuneGrabError::Resolution(format!(
            "playlist {} returned no tracks",
            id
        )));
    }
    info!("Playlist '{}' resolved through the API: {} tracks", meta.name, tracks.len());
    Ok(PlaylistResolution::new(meta.name, tracks))
}
