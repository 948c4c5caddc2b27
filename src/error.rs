use thiserror::Error;

#[derive(Error, Debug)]
pub enum TuneGrabError {
    #[error("Network request failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Request timeout for URL: {0}")]
    RequestTimeout(String),

    #[error("HTTP error {status} for URL: {url}")]
    HttpError { status: u16, url: String },

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid header value: {0}")]
    HeaderError(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Resolution failed: {0}")]
    Resolution(String),

    #[error("Failed to extract audio: {0}")]
    Extraction(String),

    #[error("Audio stream not found")]
    AudioNotFound,

    #[error("{tool} failed: {reason}")]
    Subprocess { tool: String, reason: String },

    #[error("{0} timed out")]
    Timeout(String),

    #[error("Failed to write tags: {0}")]
    TagWrite(#[from] id3::Error),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("JS decryption failed: {0}")]
    JsDecryptionFailed(String),

    #[error("Cipher parse error: {0}")]
    CipherParseError(String),
}

impl TuneGrabError {
    pub fn subprocess(tool: &str, reason: impl Into<String>) -> Self {
        Self::Subprocess {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }

    /// True for HTTP 401 answers, which mean the bearer token expired.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::HttpError { status: 401, .. })
    }
}

pub type Result<T> = std::result::Result<T, TuneGrabError>;
