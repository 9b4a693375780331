use async_trait::async_trait;
use dashmap::DashMap;
use serenity::{
    builder::CreateMessage,
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    audio::notify::{Notification, Notifier},
    ui::embeds,
};

/// Posts player notifications as embeds in the text channel where the guild
/// last used a music command.
pub struct DiscordNotifier {
    http: Arc<Http>,
    channels: DashMap<GuildId, ChannelId>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            channels: DashMap::new(),
        }
    }

    pub fn set_channel(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.channels.insert(guild_id, channel_id);
    }

    pub fn forget(&self, guild_id: GuildId) {
        self.channels.remove(&guild_id);
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, guild_id: GuildId, notification: Notification) {
        let Some(channel_id) = self.channels.get(&guild_id).map(|c| *c) else {
            debug!("Sin canal de texto para guild {}, notificación omitida", guild_id);
            return;
        };

        let embed = match &notification {
            // The /play reply already shows this one.
            Notification::TrackAdded { .. } => return,
            Notification::NowPlaying(track) => embeds::create_now_playing_embed(track),
            Notification::Error(message) => embeds::create_error_embed("Error", message),
            Notification::Status(message) => embeds::create_info_embed("Estado", message),
        };

        if let Err(e) = channel_id
            .send_message(&self.http, CreateMessage::new().embed(embed))
            .await
        {
            error!("Error al enviar notificación en guild {}: {:?}", guild_id, e);
        }
    }
}
