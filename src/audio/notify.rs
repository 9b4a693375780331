use async_trait::async_trait;
use serenity::model::id::GuildId;

use crate::audio::track::Track;

/// Events the player reports to whoever renders them.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    TrackAdded { track: Track, position: usize },
    NowPlaying(Track),
    Error(String),
    Status(String),
}

/// Receives player notifications. Delivery failures are the notifier's
/// problem and never reach the player.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, guild_id: GuildId, notification: Notification);
}
