use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::{AudioFormat, AudioStreamHandle, EncodingDescriptor};
use crate::download::{Fetch, get_response, youtube_headers};
use crate::error::{Result, TuneGrabError};
use crate::utils::extract_json_after;
use crate::youtube::types::{Format, PlayerResponse};
use crate::youtube::utils::{build_watch_url, parse_id};

const PLAYER_RESPONSE_MARKER: &str = "ytInitialPlayerResponse = ";

/// Opens the best audio-only stream of a video.
///
/// Every failure comes back as [`TuneGrabError::Extraction`] so the caller can
/// hand the track to the fallback extractor. Locating and opening the stream
/// share one time budget.
pub struct StreamExtractor {
    fetch: Arc<dyn Fetch>,
    budget: Duration,
}

impl StreamExtractor {
    pub fn new(fetch: Arc<dyn Fetch>, budget: Duration) -> Self {
        Self { fetch, budget }
    }

    pub async fn extract(&self, media_url: &str) -> Result<AudioStreamHandle> {
        let opened = match tokio::time::timeout(self.budget, self.open(media_url)).await {
            Ok(opened) => opened,
            Err(_) => {
                warn!("Opening {} exceeded {:?}", media_url, self.budget);
                Err(TuneGrabError::Timeout(format!("opening {}", media_url)))
            }
        };
        opened.map_err(|e| match e {
            TuneGrabError::Extraction(_) => e,
            other => TuneGrabError::Extraction(other.to_string()),
        })
    }

    /// Selected encoding and its playable URL, without opening the stream
    pub async fn locate(&self, media_url: &str) -> Result<(EncodingDescriptor, String)> {
        let video_id = parse_id(media_url)?;
        let html = self
            .fetch
            .get_text(&build_watch_url(&video_id), youtube_headers())
            .await?;
        let player = parse_player_response(&html)?;
        let formats = playable_formats(&player)?;
        let format = select_audio_format(formats)?;
        let encoding = encoding_descriptor(format);
        info!(
            "Selected itag {} ({}, {} bps) for {}",
            encoding.itag, encoding.mime_type, encoding.bitrate, video_id
        );
        let url = self.resolve_url(format, &html).await?;
        Ok((encoding, url))
    }

    async fn open(&self, media_url: &str) -> Result<AudioStreamHandle> {
        let (mut encoding, url) = self.locate(media_url).await?;
        let response = get_response(&url, youtube_headers()).await?;
        if encoding.content_length.is_none() {
            encoding.content_length = response.content_length();
        }
        debug!("Audio stream opened, {:?} bytes", encoding.content_length);
        Ok(AudioStreamHandle { encoding, response })
    }

    #[cfg(any(feature = "qjs", feature = "boa"))]
    async fn resolve_url(&self, format: &Format, html: &str) -> Result<String> {
        let player_url = crate::youtube::utils::player_js_url(html)
            .ok_or_else(|| TuneGrabError::Extraction("player script not found".to_string()))?;
        let player = self.fetch.get_text(&player_url, youtube_headers()).await?;
        let format = format.clone();
        tokio::task::spawn_blocking(move || crate::youtube::ejs::resolve_url(&format, player))
            .await
            .map_err(|e| TuneGrabError::Extraction(format!("signature solver crashed: {}", e)))?
    }

    #[cfg(not(any(feature = "qjs", feature = "boa")))]
    async fn resolve_url(&self, format: &Format, _html: &str) -> Result<String> {
        plain_url(format)
    }
}

/// Direct URL of a format that needs no signature solving
pub fn plain_url(format: &Format) -> Result<String> {
    format.url.clone().ok_or_else(|| {
        TuneGrabError::Extraction(format!(
            "format {} is ciphered and no signature solver is enabled",
            format.itag
        ))
    })
}

pub fn parse_player_response(html: &str) -> Result<PlayerResponse> {
    let json = extract_json_after(html, PLAYER_RESPONSE_MARKER).ok_or_else(|| {
        TuneGrabError::Extraction("ytInitialPlayerResponse not found".to_string())
    })?;
    Ok(serde_json::from_str(json)?)
}

/// Adaptive formats of a playable video
pub fn playable_formats(player: &PlayerResponse) -> Result<&[Format]> {
    if let Some(status) = &player.playability_status
        && status.status != "OK"
    {
        return Err(TuneGrabError::Extraction(format!(
            "video is not playable: {}",
            status.reason.as_deref().unwrap_or(&status.status)
        )));
    }
    player
        .streaming_data
        .as_ref()
        .map(|d| d.adaptive_formats.as_slice())
        .ok_or_else(|| TuneGrabError::Extraction("no streaming data".to_string()))
}

/// Audio-only format with the highest declared bitrate; the first one wins a tie
pub fn select_audio_format(formats: &[Format]) -> Result<&Format> {
    formats
        .iter()
        .filter(|f| f.is_audio_only())
        .reduce(|best, f| if f.bitrate > best.bitrate { f } else { best })
        .ok_or(TuneGrabError::AudioNotFound)
}

pub fn encoding_descriptor(format: &Format) -> EncodingDescriptor {
    EncodingDescriptor {
        itag: format.itag,
        mime_type: format.mime_type.clone(),
        bitrate: format.bitrate,
        content_length: format.content_length(),
        container: AudioFormat::from_youtube(&format.mime_type),
    }
}
