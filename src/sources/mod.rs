pub mod ytdlp;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::PlaybackResult;

pub use ytdlp::YtDlpResolver;

/// Resolved metadata for one playable item.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    pub title: String,
    /// Direct audio stream locator handed to the sink.
    pub stream_url: String,
    /// Web page of the item, when the source has one.
    pub url: Option<String>,
    /// `None` for live or unlisted sources.
    pub duration: Option<Duration>,
    pub thumbnail: Option<String>,
}

/// Turns a user query (URL or search terms) into playable metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> PlaybackResult<TrackMetadata>;
}
