use regex::Regex;
use std::sync::LazyLock;

use crate::error::{Result, TuneGrabError};

static PLAYER_JS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""PLAYER_JS_URL"\s*:\s*"([^"]+)""#).unwrap());
static JS_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""jsUrl"\s*:\s*"([^"]+)""#).unwrap());

/// Parse video ID from YouTube URL or direct video ID string
pub fn parse_id(url: &str) -> Result<String> {
    if is_valid_video_id(url) {
        return Ok(url.to_string());
    }

    if !is_youtube_url(url) {
        return Err(TuneGrabError::InvalidUrl(format!(
            "Not a valid YouTube URL: {}",
            url
        )));
    }

    // youtube.com/watch?v=VIDEO_ID or youtu.be/VIDEO_ID
    for marker in ["v=", "youtu.be/"] {
        if let Some(pos) = url.find(marker) {
            let id: String = url[pos + marker.len()..]
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
                .take(11)
                .collect();
            if is_valid_video_id(&id) {
                return Ok(id);
            }
        }
    }

    Err(TuneGrabError::InvalidUrl(format!(
        "Cannot extract video ID from: {}",
        url
    )))
}

/// Validate if a string is a valid YouTube video ID (11 characters, alphanumeric + - and _)
pub fn is_valid_video_id(id: &str) -> bool {
    id.len() == 11 && id.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

/// Check if URL is a YouTube link using strict domain validation
pub fn is_youtube_url(url: &str) -> bool {
    let normalized = if !url.starts_with("http://") && !url.starts_with("https://") {
        format!("https://{}", url)
    } else {
        url.to_string()
    };

    if let Ok(parsed) = url::Url::parse(&normalized)
        && let Some(domain) = parsed.domain()
    {
        return domain == "youtube.com"
            || domain.ends_with(".youtube.com")
            || domain == "youtu.be"
            || domain.ends_with(".youtu.be");
    }

    false
}

pub fn build_watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

pub fn build_search_url(query: &str) -> String {
    format!(
        "https://www.youtube.com/results?search_query={}",
        urlencoding::encode(query)
    )
}

/// Absolute URL of the player script referenced by a watch page
pub fn player_js_url(html: &str) -> Option<String> {
    [&*PLAYER_JS_RE, &*JS_URL_RE].into_iter().find_map(|re| {
        re.captures(html)
            .and_then(|c| c.get(1))
            .map(|m| format!("https://www.youtube.com{}", m.as_str().replace("\\/", "/")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_video_ids() {
        assert_eq!(
            parse_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(parse_id("https://youtu.be/dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
        assert_eq!(parse_id("dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
        assert!(parse_id("https://example.com/watch?v=dQw4w9WgXcQ").is_err());
    }

    #[test]
    fn rejects_lookalike_domains() {
        assert!(is_youtube_url("music.youtube.com/watch?v=x"));
        assert!(!is_youtube_url("https://notyoutube.com/watch?v=x"));
    }

    #[test]
    fn encodes_search_query() {
        assert_eq!(
            build_search_url("daft punk & friends"),
            "https://www.youtube.com/results?search_query=daft%20punk%20%26%20friends"
        );
    }

    #[test]
    fn finds_player_script() {
        let html = r#"ytcfg.set({"PLAYER_JS_URL":"\/s\/player\/abc\/base.js"});"#;
        assert_eq!(
            player_js_url(html).as_deref(),
            Some("https://www.youtube.com/s/player/abc/base.js")
        );
        let html = r#"{"jsUrl":"/s/player/def/base.js"}"#;
        assert_eq!(
            player_js_url(html).as_deref(),
            Some("https://www.youtube.com/s/player/def/base.js")
        );
        assert_eq!(player_js_url("<html></html>"), None);
    }
}
