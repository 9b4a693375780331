//! # Bot Module
//!
//! Discord surface of the jukebox: slash command registration, command
//! dispatch and the gateway events that affect guild sessions.
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`]. Playback itself
//! lives in the per-guild controllers held by the [`QueueRegistry`]; the bot
//! only translates interactions into controller requests.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, Guild, GuildId, Interaction, Ready, UnavailableGuild, VoiceState},
    async_trait,
};
use songbird::Songbird;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{player::PlayerState, registry::QueueRegistry},
    config::Config,
    sources::MetadataResolver,
    ui::notifier::DiscordNotifier,
    voice::SongbirdConnection,
};

/// Main Discord event handler.
pub struct JukeboxBot {
    config: Arc<Config>,
    /// Guild sessions (queue + playback controller)
    pub registry: Arc<QueueRegistry>,
    /// Turns `/play` queries into playable metadata
    pub resolver: Arc<dyn MetadataResolver>,
    /// Where player notifications are posted per guild
    pub notifier: Arc<DiscordNotifier>,
    songbird: Arc<Songbird>,
}

impl JukeboxBot {
    pub fn new(
        config: Config,
        registry: Arc<QueueRegistry>,
        resolver: Arc<dyn MetadataResolver>,
        notifier: Arc<DiscordNotifier>,
        songbird: Arc<Songbird>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            resolver,
            notifier,
            songbird,
        }
    }

    /// Voice connection of a guild, used by `/play` before the track is queued.
    pub fn voice(&self, guild_id: GuildId) -> SongbirdConnection {
        SongbirdConnection::new(guild_id, self.songbird.clone())
    }

    /// Registers slash commands with Discord.
    ///
    /// With `GUILD_ID` set, commands go to that guild only (near-instant
    /// propagation). Otherwise they are registered globally.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                let guild_id = GuildId::new(guild_id);

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registrando comandos de guild: {:?}", e);
                        anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                    })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// The bot was kicked or the guild was deleted. Outages (`unavailable`)
    /// keep the session.
    async fn guild_delete(&self, _ctx: Context, incomplete: UnavailableGuild, _full: Option<Guild>) {
        if incomplete.unavailable {
            warn!("⚠️ Guild {} no disponible temporalmente", incomplete.id);
            return;
        }

        self.notifier.forget(incomplete.id);
        if self.registry.remove(incomplete.id).await {
            info!("🚪 Bot removido de guild {}, sesión liberada", incomplete.id);
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        // Detectar si el bot fue desconectado
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        let Some(session) = self.registry.get(guild_id) else {
            return;
        };

        // Our own disconnects already left the controller in this state.
        if session.controller.state() == PlayerState::Disconnected {
            debug!("Desconexión esperada en guild {}", guild_id);
            return;
        }

        info!("🔌 Bot desconectado externamente en guild {}", guild_id);
        if let Err(e) = session.controller.stop(true).await {
            error!("Error al detener reproducción: {:?}", e);
        }
    }
}
