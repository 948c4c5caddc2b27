use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::core::{ExternalLink, LinkKind};

static WEB_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://open\.spotify\.com/(?:intl-[a-z]{2}/)?(track|album|playlist)/([a-zA-Z0-9]+)")
        .expect("valid web link pattern")
});

static URI_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^spotify:(track|album|playlist):([a-zA-Z0-9]+)").expect("valid uri pattern")
});

/// Classify a raw query. `None` means the input is plain search text.
pub fn classify(input: &str) -> Option<ExternalLink> {
    let input = input.trim();
    [&*WEB_LINK, &*URI_LINK].into_iter().find_map(|re| {
        let caps = re.captures(input)?;
        let kind = LinkKind::from_str(caps.get(1)?.as_str()).ok()?;
        Some(ExternalLink {
            kind,
            id: caps.get(2)?.as_str().to_string(),
        })
    })
}

/// Check if the input is any supported music-service link
pub fn is_music_link(input: &str) -> bool {
    classify(input).is_some()
}

pub fn build_web_url(kind: LinkKind, id: &str) -> String {
    format!("https://open.spotify.com/{}/{}", kind, id)
}

pub fn build_embed_url(kind: LinkKind, id: &str) -> String {
    format!("https://open.spotify.com/embed/{}/{}", kind, id)
}
