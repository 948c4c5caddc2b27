use chrono::{Datelike, NaiveDate};
use id3::frame::{Comment, ExtendedText};
use id3::{Tag, TagLike, Timestamp, Version};
use std::path::Path;
use tracing::{info, warn};

use crate::core::{AudioFeatureSet, TrackDescriptor};
use crate::error::Result;

const DEFAULT_ALBUM: &str = "Unknown Album";
const DEFAULT_GENRE: &str = "Electronic";

/// Year of a release date; accepts `YYYY-MM-DD`, `YYYY-MM` and `YYYY`
pub fn release_year(release_date: &str) -> Option<i32> {
    if let Ok(date) = NaiveDate::parse_from_str(release_date, "%Y-%m-%d") {
        return Some(date.year());
    }
    release_date.get(..4)?.parse().ok()
}

pub fn comment_text(features: &AudioFeatureSet) -> String {
    let bpm = features
        .bpm
        .map(|b| b.to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let key = features.key.as_deref().unwrap_or("Unknown");
    format!("Downloaded from YouTube | BPM: {} | Key: {}", bpm, key)
}

/// Tag set for one file. Absent values produce no frame at all.
pub fn build_tag(features: &AudioFeatureSet, track: &TrackDescriptor) -> Tag {
    let mut tag = Tag::new();
    tag.set_title(&track.name);
    tag.set_artist(&track.artists);
    tag.set_album(features.album.as_deref().unwrap_or(DEFAULT_ALBUM));
    if let Some(year) = features.release_date.as_deref().and_then(release_year) {
        tag.set_date_recorded(Timestamp {
            year,
            month: None,
            day: None,
            hour: None,
            minute: None,
            second: None,
        });
    }
    tag.set_genre(
        features
            .genres
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_GENRE),
    );
    tag.add_frame(Comment {
        lang: "eng".to_string(),
        description: String::new(),
        text: comment_text(features),
    });

    // Read by DJ software
    if let Some(bpm) = features.bpm {
        tag.set_text("TBPM", bpm.to_string());
    }
    if let Some(key) = &features.key {
        tag.set_text("TKEY", key);
    }

    let custom = [
        ("ENERGY", features.energy.map(|v| v.to_string())),
        ("DANCEABILITY", features.danceability.map(|v| v.to_string())),
        ("VALENCE", features.valence.map(|v| v.to_string())),
        ("SPOTIFY_ID", features.external_id.clone()),
        ("SPOTIFY_URL", features.external_url.clone()),
    ];
    for (description, value) in custom {
        if let Some(value) = value {
            tag.add_frame(ExtendedText {
                description: description.to_string(),
                value,
            });
        }
    }
    tag
}

pub fn try_write_tags(path: &Path, features: &AudioFeatureSet, track: &TrackDescriptor) -> Result<()> {
    build_tag(features, track).write_to_path(path, Version::Id3v24)?;
    Ok(())
}

/// Write tags; a failure is logged and reported as `false`, never raised
pub fn write_tags(path: &Path, features: &AudioFeatureSet, track: &TrackDescriptor) -> bool {
    match try_write_tags(path, features, track) {
        Ok(()) => {
            info!("Tags written for {} - {}", track.artists, track.name);
            true
        }
        Err(e) => {
            warn!("Could not tag {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> AudioFeatureSet {
        AudioFeatureSet {
            bpm: Some(124),
            key: Some("F# minor".to_string()),
            energy: Some(81),
            danceability: Some(0),
            external_id: Some("6habFhsOp2NvshLv26DqMb".to_string()),
            album: Some("Discovery".to_string()),
            release_date: Some("2001-03-12".to_string()),
            genres: vec!["french house".to_string(), "disco".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn parses_release_years() {
        assert_eq!(release_year("2001-03-12"), Some(2001));
        assert_eq!(release_year("1997"), Some(1997));
        assert_eq!(release_year("1997-05"), Some(1997));
        assert_eq!(release_year("n/a"), None);
    }

    #[test]
    fn writes_present_fields_only() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), [0xFFu8, 0xFB, 0x90, 0x00]).unwrap();
        let track = TrackDescriptor::new("One More Time", "Daft Punk");

        assert!(write_tags(file.path(), &features(), &track));

        let tag = Tag::read_from_path(file.path()).unwrap();
        assert_eq!(tag.title(), Some("One More Time"));
        assert_eq!(tag.artist(), Some("Daft Punk"));
        assert_eq!(tag.album(), Some("Discovery"));
        assert_eq!(tag.date_recorded().map(|t| t.year), Some(2001));
        assert_eq!(tag.genre(), Some("french house"));
        assert_eq!(tag.get("TBPM").and_then(|f| f.content().text()), Some("124"));
        assert_eq!(tag.get("TKEY").and_then(|f| f.content().text()), Some("F# minor"));

        let comment = tag.comments().next().unwrap();
        assert_eq!(comment.text, "Downloaded from YouTube | BPM: 124 | Key: F# minor");

        let custom: Vec<_> = tag.extended_texts().map(|t| t.description.as_str()).collect();
        assert!(custom.contains(&"ENERGY"));
        assert!(custom.contains(&"DANCEABILITY"));
        assert!(custom.contains(&"SPOTIFY_ID"));
        assert!(!custom.contains(&"VALENCE"));
        assert!(!custom.contains(&"SPOTIFY_URL"));
    }

    #[test]
    fn falls_back_to_defaults() {
        let tag = build_tag(
            &AudioFeatureSet::default(),
            &TrackDescriptor::new("Intro", "The xx"),
        );
        assert_eq!(tag.album(), Some("Unknown Album"));
        assert_eq!(tag.genre(), Some("Electronic"));
        assert!(tag.date_recorded().is_none());
        assert!(tag.get("TBPM").is_none());
        assert_eq!(tag.extended_texts().count(), 0);
        assert_eq!(
            tag.comments().next().map(|c| c.text.clone()).as_deref(),
            Some("Downloaded from YouTube | BPM: Unknown | Key: Unknown")
        );
    }

    #[test]
    fn missing_file_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.mp3");
        let track = TrackDescriptor::new("Intro", "The xx");
        assert!(!write_tags(&path, &features(), &track));
    }
}
