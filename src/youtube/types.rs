use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    pub playability_status: Option<PlayabilityStatus>,
    pub streaming_data: Option<StreamingData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayabilityStatus {
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingData {
    #[serde(default)]
    pub adaptive_formats: Vec<Format>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Format {
    pub itag: u64,
    pub mime_type: String,
    #[serde(default)]
    pub bitrate: u64,
    /// Sent as a decimal string
    pub content_length: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_cipher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Format {
    pub fn is_audio_only(&self) -> bool {
        self.mime_type.starts_with("audio/")
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length.as_deref()?.parse().ok()
    }
}

/// `ytInitialData` of a results page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchInitialData {
    pub contents: SearchContents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchContents {
    pub two_column_search_results_renderer: TwoColumnSearchResults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoColumnSearchResults {
    pub primary_contents: PrimaryContents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryContents {
    pub section_list_renderer: SectionList,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionList {
    #[serde(default)]
    pub contents: Vec<SectionContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionContent {
    pub item_section_renderer: Option<ItemSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSection {
    #[serde(default)]
    pub contents: Vec<SearchItem>,
}

/// Result rows; ads, shelves and channels have no `videoRenderer`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    pub video_renderer: Option<VideoRenderer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRenderer {
    pub video_id: String,
    pub title: Title,
    pub owner_text: Option<Title>,
    pub length_text: Option<Title>,
    pub thumbnail: Option<Thumbnails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Title {
    SimpleText {
        #[serde(rename = "simpleText")]
        simple_text: String,
    },
    Runs {
        runs: Vec<Run>,
    },
}

impl Title {
    /// The first run, or the simple text
    pub fn first_text(&self) -> Option<&str> {
        match self {
            Title::SimpleText { simple_text } => Some(simple_text),
            Title::Runs { runs } => runs.first().map(|r| r.text.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thumbnails {
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}
