pub mod search;
pub mod stream;
pub mod types;
pub mod utils;

#[cfg(any(feature = "qjs", feature = "boa"))]
mod ejs;

pub use search::{YoutubeSearch, parse_search_results};
pub use stream::StreamExtractor;
pub use utils::{build_watch_url, is_youtube_url, parse_id};
