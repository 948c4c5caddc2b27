use std::sync::Arc;
use tracing::{debug, info};

use crate::core::{MediaCandidate, SearchProvider};
use crate::download::{Fetch, browser_headers};
use crate::error::{Result, TuneGrabError};
use crate::utils::extract_json_after;
use crate::youtube::types::{SearchInitialData, Title, VideoRenderer};
use crate::youtube::utils::{build_search_url, build_watch_url};

const INITIAL_DATA_MARKER: &str = "var ytInitialData = ";

/// Search through the public results page
pub struct YoutubeSearch {
    fetch: Arc<dyn Fetch>,
}

impl YoutubeSearch {
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self { fetch }
    }
}

fn candidate(video: VideoRenderer) -> MediaCandidate {
    let text = |t: Option<&Title>| {
        t.and_then(|t| t.first_text()).unwrap_or_default().to_string()
    };
    MediaCandidate {
        url: build_watch_url(&video.video_id),
        title: text(Some(&video.title)),
        channel: text(video.owner_text.as_ref()),
        duration: video
            .length_text
            .as_ref()
            .and_then(|t| t.first_text())
            .unwrap_or("N/A")
            .to_string(),
        thumbnail: video
            .thumbnail
            .and_then(|t| t.thumbnails.into_iter().next())
            .map(|t| t.url)
            .unwrap_or_default(),
        id: video.video_id,
    }
}

/// Video rows of a results page, in page order
pub fn parse_search_results(html: &str) -> Result<Vec<MediaCandidate>> {
    let json = extract_json_after(html, INITIAL_DATA_MARKER)
        .ok_or_else(|| TuneGrabError::ParseError("ytInitialData not found".to_string()))?;
    let data: SearchInitialData = serde_json::from_str(json)?;

    let candidates = data
        .contents
        .two_column_search_results_renderer
        .primary_contents
        .section_list_renderer
        .contents
        .into_iter()
        .filter_map(|section| section.item_section_renderer)
        .flat_map(|section| section.contents)
        .filter_map(|item| item.video_renderer)
        .map(candidate)
        .collect();
    Ok(candidates)
}

#[async_trait::async_trait]
impl SearchProvider for YoutubeSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MediaCandidate>> {
        let url = build_search_url(query);
        debug!("Searching YouTube: {}", url);
        let html = self
            .fetch
            .get_text(&url, browser_headers())
            .await
            .map_err(|e| TuneGrabError::Resolution(format!("search for '{}' failed: {}", query, e)))?;
        let mut candidates = parse_search_results(&html)
            .map_err(|e| TuneGrabError::Resolution(format!("search for '{}' failed: {}", query, e)))?;
        candidates.truncate(limit);
        info!("Search '{}' returned {} results", query, candidates.len());
        Ok(candidates)
    }
}
