use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::time::Duration;

use crate::sources::TrackMetadata;

/// A playable item in a guild queue.
///
/// Everything except `volume` is fixed once the track is built from resolved
/// metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    title: String,
    stream_url: String,
    url: String,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    requested_by: UserId,
    added_at: DateTime<Utc>,
    volume: f32,
}

impl Track {
    pub const DEFAULT_VOLUME: f32 = 0.5;

    #[cfg(test)]
    pub fn new(title: impl Into<String>, stream_url: impl Into<String>, requested_by: UserId) -> Self {
        let stream_url = stream_url.into();
        Self {
            title: title.into(),
            url: stream_url.clone(),
            stream_url,
            duration: None,
            thumbnail: None,
            requested_by,
            added_at: Utc::now(),
            volume: Self::DEFAULT_VOLUME,
        }
    }

    pub fn from_metadata(meta: TrackMetadata, requested_by: UserId, volume: f32) -> Self {
        Self {
            title: meta.title,
            url: meta.url.unwrap_or_else(|| meta.stream_url.clone()),
            stream_url: meta.stream_url,
            duration: meta.duration,
            thumbnail: meta.thumbnail,
            requested_by,
            added_at: Utc::now(),
            volume: volume.clamp(0.0, 1.0),
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }
    pub fn volume(&self) -> f32 {
        self.volume
    }

    #[cfg(test)]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Sets the playback volume, clamped to `[0.0, 1.0]`. Returns the applied value.
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_is_clamped() {
        let mut track = Track::new("Song", "https://cdn.example/a.webm", UserId::new(1));
        assert_eq!(track.volume(), 0.5);
        assert_eq!(track.set_volume(1.7), 1.0);
        assert_eq!(track.set_volume(-0.2), 0.0);
        assert_eq!(track.set_volume(f32::NAN), 0.0);
        assert_eq!(track.set_volume(0.25), 0.25);
    }

    #[test]
    fn test_from_metadata_keeps_page_url_and_clamps_volume() {
        let meta = TrackMetadata {
            title: "Live set".into(),
            stream_url: "https://cdn.example/live.m3u8".into(),
            url: Some("https://youtube.com/watch?v=abc".into()),
            duration: None,
            thumbnail: Some("https://i.ytimg.com/abc.jpg".into()),
        };
        let track = Track::from_metadata(meta, UserId::new(7), 3.0);

        assert_eq!(track.url(), "https://youtube.com/watch?v=abc");
        assert_eq!(track.stream_url(), "https://cdn.example/live.m3u8");
        assert_eq!(track.duration(), None);
        assert_eq!(track.volume(), 1.0);
        assert_eq!(track.requested_by(), UserId::new(7));
    }
}
