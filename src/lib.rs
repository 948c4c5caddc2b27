pub mod batch;
pub mod cascade;
pub mod config;
pub mod core;
pub mod download;
pub mod error;
pub mod link;
pub mod pipeline;
pub mod process;
pub mod service;
pub mod spotify;
pub mod tags;
pub mod transcode;
pub mod utils;
pub mod youtube;
pub mod ytdlp;

pub use config::{Config, Credentials};
pub use core::{
    AudioFeatureSet, BatchResult, DownloadOutcome, ExternalLink, LinkKind, MediaCandidate,
    PlaylistResolution, ProgressEvent, TrackDescriptor,
};
pub use error::{Result, TuneGrabError};
pub use link::{classify, is_music_link};
pub use service::{SearchResponse, TuneGrab};
pub use utils::sanitize_filename;
