use tracing::{info, warn};

use crate::core::AudioFeatureSet;
use crate::error::Result;
use crate::spotify::api::API_BASE;
use crate::spotify::session::SpotifySession;
use crate::spotify::types::{AudioAnalysis, AudioFeatures, SearchResponse, Track};

const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

pub fn search_url(name: &str, artist: &str) -> String {
    let query = format!("track:\"{}\" artist:\"{}\"", name, artist);
    format!(
        "{}/search?q={}&type=track&limit=1",
        API_BASE,
        urlencoding::encode(&query)
    )
}

pub fn audio_features_url(id: &str) -> String {
    format!("{}/audio-features/{}", API_BASE, id)
}

pub fn audio_analysis_url(id: &str) -> String {
    format!("{}/audio-analysis/{}", API_BASE, id)
}

/// "C# minor"; `None` when the key could not be detected
pub fn musical_key(key: i32, mode: i32) -> Option<String> {
    let pitch = PITCH_CLASSES.get(usize::try_from(key).ok()?)?;
    let mode = if mode == 1 { "major" } else { "minor" };
    Some(format!("{} {}", pitch, mode))
}

fn percent(value: f64) -> u32 {
    (value * 100.0).round().max(0.0) as u32
}

pub fn build_feature_set(
    track: &Track,
    features: Option<&AudioFeatures>,
    analysis: Option<&AudioAnalysis>,
) -> AudioFeatureSet {
    AudioFeatureSet {
        bpm: features.map(|f| f.tempo.round().max(0.0) as u32),
        key: features.and_then(|f| musical_key(f.key, f.mode)),
        energy: features.map(|f| percent(f.energy)),
        danceability: features.map(|f| percent(f.danceability)),
        valence: features.map(|f| percent(f.valence)),
        acousticness: features.map(|f| percent(f.acousticness)),
        instrumentalness: features.map(|f| percent(f.instrumentalness)),
        liveness: features.map(|f| percent(f.liveness)),
        speechiness: features.map(|f| percent(f.speechiness)),
        loudness: features.map(|f| f.loudness.round() as i32),
        duration_ms: track.duration_ms,
        popularity: track.popularity,
        explicit: track.explicit,
        preview_url: track.preview_url.clone(),
        external_id: Some(track.id.clone()),
        external_url: track.external_urls.spotify.clone(),
        album: track.album.as_ref().map(|a| a.name.clone()),
        release_date: track.album.as_ref().and_then(|a| a.release_date.clone()),
        genres: track
            .artists
            .first()
            .map(|a| a.genres.clone())
            .unwrap_or_default(),
        time_signature: features.and_then(|f| f.time_signature),
        sections: analysis.map(|a| a.sections.len()),
        bars: analysis.map(|a| a.bars.len()),
        beats: analysis.map(|a| a.beats.len()),
        tatums: analysis.map(|a| a.tatums.len()),
    }
}

async fn get_json<T: serde::de::DeserializeOwned>(session: &SpotifySession, url: &str) -> Result<T> {
    let body = session.authorized_get(url).await?;
    Ok(serde_json::from_str(&body)?)
}

/// Look a track up by name and artist and collect its audio characteristics.
///
/// Returns `None` without a token, when nothing matches, or when the search
/// itself fails. The features and analysis requests may each fail on their own;
/// the matching fields are then left empty.
pub async fn track_metadata(
    session: &SpotifySession,
    name: &str,
    artist: &str,
) -> Option<AudioFeatureSet> {
    if !session.has_token().await {
        return None;
    }

    let search: SearchResponse = match get_json(session, &search_url(name, artist)).await {
        Ok(s) => s,
        Err(e) => {
            warn!("Metadata search failed for {} - {}: {}", artist, name, e);
            return None;
        }
    };
    let track = search.tracks.items.into_iter().next()?;

    let features_url = audio_features_url(&track.id);
    let analysis_url = audio_analysis_url(&track.id);
    let (features, analysis) = tokio::join!(
        get_json::<AudioFeatures>(session, &features_url),
        get_json::<AudioAnalysis>(session, &analysis_url),
    );
    let features = features
        .inspect_err(|e| warn!("Audio features unavailable for {}: {}", track.id, e))
        .ok();
    let analysis = analysis
        .inspect_err(|e| warn!("Audio analysis unavailable for {}: {}", track.id, e))
        .ok();

    let set = build_feature_set(&track, features.as_ref(), analysis.as_ref());
    info!(
        "Metadata for {} - {}: bpm={:?} key={:?}",
        artist, name, set.bpm, set.key
    );
    Some(set)
}
