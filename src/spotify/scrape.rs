//! Text extraction over public Spotify pages.
//!
//! Every function here is pure: it takes markup that was already fetched and
//! returns candidates, so each strategy can be exercised with literal fixtures.

use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use crate::cascade::{Attempt, Strategy};
use crate::core::TrackDescriptor;
use crate::utils::{decode_html_entities, extract_json_after};

const SERVICE_SUFFIX: &str = " | Spotify";
const TITLE_SEPARATORS: [&str; 2] = [" - song by ", " - song and lyrics by "];
const INITIAL_STATE_MARKER: &str = "window.__SPOTIFY_INITIAL_STATE__";
const MAX_MATCHES_PER_PATTERN: usize = 200;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>([^<]+)</title>").unwrap());
static OG_DESCRIPTION_ARTIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)by\s+(.+?)(?:\s+on\s+|$)").unwrap());
static LD_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type="application/ld\+json"[^>]*>(.*?)</script>"#).unwrap()
});

static INVALID_TRACK_TEXT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^https?://",
        r"\\[nt]",
        r"[<>{}]",
        r"^\d+$",
        r"^[^a-zA-Z]*$",
        r"(?i)playlist|album|artist|spotify",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// One markup scan: a regex whose first two groups are name and artist
pub struct TrackPattern {
    pub regex: Regex,
    /// Title/subtitle markup does not say which side is the artist; the longer
    /// string is taken as the track name.
    pub swap_if_artist_longer: bool,
}

impl TrackPattern {
    fn new(pattern: &str, swap_if_artist_longer: bool) -> Self {
        Self {
            regex: Regex::new(pattern).unwrap(),
            swap_if_artist_longer,
        }
    }

    /// Every valid pair this pattern finds, in document order
    pub fn candidates(&self, markup: &str) -> Vec<(String, String)> {
        self.regex
            .captures_iter(markup)
            .filter_map(|caps| {
                let mut name = caps.get(1)?.as_str().trim().to_string();
                let mut artist = caps.get(2)?.as_str().trim().to_string();
                if self.swap_if_artist_longer && artist.chars().count() > name.chars().count() {
                    std::mem::swap(&mut name, &mut artist);
                }
                is_valid_track_info(&name, &artist).then_some((name, artist))
            })
            .collect()
    }
}

/// Markup patterns in priority order
pub static TRACK_PATTERNS: LazyLock<Vec<TrackPattern>> = LazyLock::new(|| {
    vec![
        TrackPattern::new(
            r#""name":"([^"]{2,100})"[^}]*?"artists":\[\{"name":"([^"]{2,100})""#,
            false,
        ),
        TrackPattern::new(
            r#""track":\{"name":"([^"]{2,100})"[^}]*?"artists":\[\{"name":"([^"]{2,100})""#,
            false,
        ),
        TrackPattern::new(
            r#"\{"name":"([^"]{2,100})","artists":\[\{"name":"([^"]{2,100})""#,
            false,
        ),
        TrackPattern::new(
            r#""trackName":"([^"]{2,100})"[^}]*?"artistName":"([^"]{2,100})""#,
            false,
        ),
        TrackPattern::new(
            r#""title":"([^"]{2,100})"[^}]*?"subtitle":"([^"]{2,100})""#,
            true,
        ),
    ]
});

/// Guard against the many false positives that page-wide scans produce
pub fn is_valid_track_info(name: &str, artist: &str) -> bool {
    let length_ok = |s: &str| (2..=100).contains(&s.chars().count());
    if !length_ok(name) || !length_ok(artist) {
        return false;
    }
    !INVALID_TRACK_TEXT
        .iter()
        .any(|re| re.is_match(name) || re.is_match(artist))
}

pub fn page_title(html: &str) -> Option<String> {
    let caps = TITLE_RE.captures(html)?;
    let title = decode_html_entities(caps.get(1)?.as_str().trim());
    (!title.is_empty()).then_some(title)
}

/// Page title without the trailing service name
pub fn playlist_name(html: &str) -> Option<String> {
    let title = page_title(html)?;
    let name = title.replace(SERVICE_SUFFIX, "").trim().to_string();
    (!name.is_empty()).then_some(name)
}

/// Content of `<meta property="..." content="...">`, whatever the attribute order
pub fn meta_property(html: &str, property: &str) -> Option<String> {
    let property = regex::escape(property);
    let patterns = [
        format!(r#"(?i)<meta[^>]*property="{}"[^>]*content="([^"]*)""#, property),
        format!(r#"(?i)<meta[^>]*content="([^"]*)"[^>]*property="{}""#, property),
    ];
    patterns.iter().find_map(|p| {
        let re = Regex::new(p).ok()?;
        let caps = re.captures(html)?;
        Some(decode_html_entities(caps.get(1)?.as_str().trim()))
    })
}

fn found_track(name: &str, artist: &str) -> Attempt<TrackDescriptor> {
    if name.is_empty() || artist.is_empty() {
        return Attempt::Skip("name or artist missing".to_string());
    }
    Attempt::Found(TrackDescriptor::new(name, artist))
}

/// "Song - song by Artist | Spotify"
pub fn track_from_title(html: &str) -> Attempt<TrackDescriptor> {
    let Some(title) = page_title(html) else {
        return Attempt::Skip("no <title>".to_string());
    };
    if !title.contains(SERVICE_SUFFIX) {
        return Attempt::Skip(format!("unexpected title '{}'", title));
    }
    let clean = title.replace(SERVICE_SUFFIX, "");
    let clean = clean.trim();
    for separator in TITLE_SEPARATORS {
        if let Some((name, artist)) = clean.split_once(separator) {
            return found_track(name.trim(), artist.trim());
        }
    }
    Attempt::Skip(format!("no separator in '{}'", clean))
}

/// og:title carries the name, og:description "... by Artist on Spotify"
pub fn track_from_open_graph(html: &str) -> Attempt<TrackDescriptor> {
    let name = meta_property(html, "og:title").unwrap_or_default();
    let artist = meta_property(html, "og:description")
        .and_then(|d| {
            OG_DESCRIPTION_ARTIST_RE
                .captures(&d)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
        .unwrap_or_default();
    found_track(&name, &artist)
}

/// schema.org MusicRecording blocks
pub fn track_from_json_ld(html: &str) -> Attempt<TrackDescriptor> {
    let mut reason = Attempt::Skip("no MusicRecording block".to_string());
    for caps in LD_JSON_RE.captures_iter(html) {
        let Some(body) = caps.get(1) else { continue };
        let data: Value = match serde_json::from_str(body.as_str().trim()) {
            Ok(v) => v,
            Err(e) => {
                reason = Attempt::Fail(format!("invalid ld+json: {}", e));
                continue;
            }
        };
        if data["@type"] != "MusicRecording" {
            continue;
        }
        let name = data["name"].as_str().unwrap_or_default().trim();
        let artist = data["byArtist"]["name"].as_str().unwrap_or_default().trim();
        if let found @ Attempt::Found(_) = found_track(name, artist) {
            return found;
        }
    }
    reason
}

/// Track page strategies, in the order they are tried
pub const TRACK_PAGE_STRATEGIES: [Strategy<TrackDescriptor>; 3] = [
    ("page title", track_from_title),
    ("open graph", track_from_open_graph),
    ("json-ld", track_from_json_ld),
];

const INITIAL_STATE_PATHS: [&str; 4] = [
    "/entities/items",
    "/data/playlistV2/content/items",
    "/data/playlist/tracks/items",
    "/initialState/entities/items",
];

fn track_from_state_item(item: &Value) -> Option<TrackDescriptor> {
    let track = if item["track"].is_object() {
        &item["track"]
    } else if item["data"]["track"].is_object() {
        &item["data"]["track"]
    } else if item["name"].is_string() && !item["artists"].is_null() {
        item
    } else {
        return None;
    };

    let name = track["name"].as_str().unwrap_or_default();
    let artist = match track["artists"].as_array() {
        Some(artists) => artists
            .iter()
            .filter_map(|a| a["name"].as_str())
            .collect::<Vec<_>>()
            .join(", "),
        None => track["artist"]["name"].as_str().unwrap_or_default().to_string(),
    };

    (!name.is_empty() && !artist.is_empty() && is_valid_track_info(name, &artist))
        .then(|| TrackDescriptor::new(name, artist))
}

/// Walk the known locations of the track list inside the embedded state blob
pub fn tracks_from_state(state: &Value) -> Vec<TrackDescriptor> {
    for path in INITIAL_STATE_PATHS {
        let Some(items) = state.pointer(path) else {
            continue;
        };
        let tracks: Vec<TrackDescriptor> = match items {
            Value::Array(list) => list.iter().filter_map(track_from_state_item).collect(),
            Value::Object(map) => map.values().filter_map(track_from_state_item).collect(),
            _ => continue,
        };
        if !tracks.is_empty() {
            debug!("Found {} tracks in initial state at {}", tracks.len(), path);
            return tracks;
        }
    }
    Vec::new()
}

pub fn tracks_from_initial_state(html: &str) -> Attempt<Vec<TrackDescriptor>> {
    let Some(marker) = html.find(INITIAL_STATE_MARKER) else {
        return Attempt::Skip("no initial state".to_string());
    };
    let after = &html[marker + INITIAL_STATE_MARKER.len()..];
    let Some(eq) = after.find('=') else {
        return Attempt::Skip("no initial state assignment".to_string());
    };
    let Some(json) = extract_json_after(&after[eq + 1..], "") else {
        return Attempt::Fail("unterminated initial state".to_string());
    };
    let state: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => return Attempt::Fail(format!("invalid initial state: {}", e)),
    };
    let tracks = tracks_from_state(&state);
    if tracks.is_empty() {
        Attempt::Skip("initial state has no tracks".to_string())
    } else {
        Attempt::Found(tracks)
    }
}

/// Scan raw markup with each pattern in turn; the first pattern that yields any
/// unique pair wins. Duplicates are detected case-insensitively.
pub fn tracks_from_markup(html: &str) -> Vec<TrackDescriptor> {
    for (i, pattern) in TRACK_PATTERNS.iter().enumerate() {
        let mut seen = HashSet::new();
        let mut tracks = Vec::new();
        for (name, artist) in pattern.candidates(html) {
            if tracks.len() >= MAX_MATCHES_PER_PATTERN {
                break;
            }
            let track = TrackDescriptor::new(name, artist);
            if seen.insert(track.dedup_key()) {
                tracks.push(track);
            }
        }
        if !tracks.is_empty() {
            debug!("Pattern {} found {} unique tracks", i + 1, tracks.len());
            return tracks;
        }
    }
    Vec::new()
}

pub fn tracks_from_markup_attempt(html: &str) -> Attempt<Vec<TrackDescriptor>> {
    let tracks = tracks_from_markup(html);
    if tracks.is_empty() {
        Attempt::Skip("no pattern matched".to_string())
    } else {
        Attempt::Found(tracks)
    }
}

/// Strategies for the embeddable playlist page
pub const EMBED_PAGE_STRATEGIES: [Strategy<Vec<TrackDescriptor>>; 2] = [
    ("embed initial state", tracks_from_initial_state),
    ("embed markup", tracks_from_markup_attempt),
];

/// Strategies for the public playlist page
pub const PLAYLIST_PAGE_STRATEGIES: [Strategy<Vec<TrackDescriptor>>; 1] =
    [("page markup", tracks_from_markup_attempt)];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_rejects_bad_lengths() {
        assert!(!is_valid_track_info("A", "Daft Punk"));
        assert!(!is_valid_track_info("One More Time", "D"));
        assert!(!is_valid_track_info(&"x".repeat(101), "Daft Punk"));
        assert!(is_valid_track_info(&"x".repeat(100), "Daft Punk"));
    }

    #[test]
    fn validation_rejects_noise() {
        assert!(!is_valid_track_info("12345", "Daft Punk"));
        assert!(!is_valid_track_info("One More Time", "2001"));
        assert!(!is_valid_track_info("--- ...", "Daft Punk"));
        assert!(!is_valid_track_info("https://example.com", "Daft Punk"));
        assert!(!is_valid_track_info("Line\\nBreak", "Daft Punk"));
        assert!(!is_valid_track_info("<b>Bold</b>", "Daft Punk"));
        assert!(!is_valid_track_info("Top 50 Playlist", "Various"));
        assert!(!is_valid_track_info("One More Time", "Spotify"));
        assert!(!is_valid_track_info("One More Time", "Various Artists"));
        assert!(is_valid_track_info("One More Time", "Daft Punk"));
    }

    #[test]
    fn title_strategy_splits_on_known_separators() {
        let html = "<html><head><title>Mr. Brightside - song and lyrics by The Killers | Spotify</title></head></html>";
        assert_eq!(
            track_from_title(html),
            Attempt::Found(TrackDescriptor::new("Mr. Brightside", "The Killers"))
        );
        let html = "<title>Numb - song by Linkin Park | Spotify</title>";
        assert_eq!(
            track_from_title(html),
            Attempt::Found(TrackDescriptor::new("Numb", "Linkin Park"))
        );
        assert!(!track_from_title("<title>Spotify - Web Player</title>").is_found());
    }

    #[test]
    fn open_graph_strategy_reads_meta_tags() {
        let html = r#"<meta property="og:title" content="Blinding Lights" />
            <meta content="Listen to Blinding Lights on Spotify. Song · by The Weeknd on Spotify" property="og:description" />"#;
        let attempt = track_from_open_graph(html);
        assert_eq!(
            attempt,
            Attempt::Found(TrackDescriptor::new("Blinding Lights", "The Weeknd"))
        );
    }

    #[test]
    fn json_ld_strategy_needs_music_recording() {
        let html = r#"<script type="application/ld+json">{"@type":"WebPage","name":"x"}</script>
            <script type="application/ld+json">{"@type":"MusicRecording","name":"Levitating","byArtist":{"name":"Dua Lipa"}}</script>"#;
        assert_eq!(
            track_from_json_ld(html),
            Attempt::Found(TrackDescriptor::new("Levitating", "Dua Lipa"))
        );
        assert!(!track_from_json_ld("<html></html>").is_found());
    }

    #[test]
    fn playlist_name_drops_service_suffix() {
        assert_eq!(
            playlist_name("<title>Road Trip &amp; Chill | Spotify</title>").as_deref(),
            Some("Road Trip & Chill")
        );
        assert_eq!(playlist_name("<p>no title</p>"), None);
    }

    #[test]
    fn initial_state_walks_known_paths() {
        let html = r#"<script>window.__SPOTIFY_INITIAL_STATE__ = {"data":{"playlist":{"tracks":{"items":[
            {"track":{"name":"Hey Jude","artists":[{"name":"The Beatles"}]}},
            {"track":{"name":"Imagine","artists":[{"name":"John Lennon"},{"name":"Yoko Ono"}]}},
            {"track":{"name":"1234","artists":[{"name":"Numbers"}]}}
        ]}}}};</script>"#;
        let Attempt::Found(tracks) = tracks_from_initial_state(html) else {
            panic!("expected tracks");
        };
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].name, "Hey Jude");
        assert_eq!(tracks[1].artists, "John Lennon, Yoko Ono");
    }

    #[test]
    fn initial_state_accepts_keyed_items() {
        let html = r#"window.__SPOTIFY_INITIAL_STATE__={"entities":{"items":{
            "spotify:track:1":{"name":"Creep","artists":[{"name":"Radiohead"}]}}}};"#;
        let Attempt::Found(tracks) = tracks_from_initial_state(html) else {
            panic!("expected tracks");
        };
        assert_eq!(tracks, vec![TrackDescriptor::new("Creep", "Radiohead")]);
    }

    #[test]
    fn markup_scan_deduplicates_case_insensitively() {
        let html = r#"{"name":"Yellow","uri":"a","artists":[{"name":"Coldplay"}]}
            {"name":"YELLOW","uri":"b","artists":[{"name":"coldplay"}]}
            {"name":"Clocks","uri":"c","artists":[{"name":"Coldplay"}]}"#;
        let tracks = tracks_from_markup(html);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0], TrackDescriptor::new("Yellow", "Coldplay"));
        assert_eq!(tracks[1].name, "Clocks");
    }

    #[test]
    fn markup_scan_falls_through_to_later_patterns() {
        let html = r#"{"trackName":"Halo","id":1,"artistName":"Beyonce"}"#;
        assert_eq!(
            tracks_from_markup(html),
            vec![TrackDescriptor::new("Halo", "Beyonce")]
        );
    }

    #[test]
    fn title_subtitle_pattern_swaps_by_length() {
        let html = r#"{"title":"Adele","x":1,"subtitle":"Rolling in the Deep"}"#;
        assert_eq!(
            tracks_from_markup(html),
            vec![TrackDescriptor::new("Rolling in the Deep", "Adele")]
        );
    }

    #[test]
    fn markup_scan_skips_invalid_pairs() {
        let html = r#"{"name":"My Playlist","x":1,"artists":[{"name":"Someone"}]}"#;
        assert!(tracks_from_markup(html).is_empty());
        assert!(!tracks_from_markup_attempt(html).is_found());
    }
}
