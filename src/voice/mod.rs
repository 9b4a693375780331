//! Songbird-backed audio sink and voice connection.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        notify::Notifier,
        player::GuildCollaborators,
        registry::GuildBackend,
        sink::{AudioSink, CompletionHandle, StreamRequest, VoiceConnection},
    },
    error::{PlaybackError, PlaybackResult},
};

/// Plays tracks on the guild's songbird `Call`.
pub struct SongbirdSink {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    http_client: reqwest::Client,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdSink {
    pub fn new(guild_id: GuildId, manager: Arc<Songbird>, http_client: reqwest::Client) -> Self {
        Self {
            guild_id,
            manager,
            http_client,
            current: Mutex::new(None),
        }
    }

    fn handle(&self) -> Option<TrackHandle> {
        self.current.lock().clone()
    }

    async fn play_mode(&self) -> Option<PlayMode> {
        let handle = self.handle()?;
        // A finished track no longer answers; that means nothing is streaming.
        handle.get_info().await.ok().map(|info| info.playing)
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn start(&self, request: StreamRequest, on_complete: CompletionHandle) -> PlaybackResult<()> {
        if matches!(self.play_mode().await, Some(PlayMode::Play | PlayMode::Pause)) {
            return Err(PlaybackError::ConcurrencyGuard(format!(
                "guild {} ya tiene un stream activo",
                self.guild_id
            )));
        }

        let call = self.manager.get(self.guild_id).ok_or_else(|| {
            PlaybackError::SinkStart("el bot no está conectado a un canal de voz".into())
        })?;

        debug!("🎯 Usando URL directa de stream: {}", request.stream_url);
        let input: Input = HttpRequest::new(self.http_client.clone(), request.stream_url).into();

        let track_handle = {
            let mut call = call.lock().await;
            call.play_input(input)
        };

        if let Err(e) = track_handle.set_volume(request.volume) {
            warn!("No se pudo ajustar el volumen inicial: {}", e);
        }

        // End and Error share one slot so the handle is taken exactly once.
        let slot = Arc::new(Mutex::new(Some(on_complete)));
        for event in [TrackEvent::End, TrackEvent::Error] {
            let registered = track_handle.add_event(
                Event::Track(event),
                TrackEndNotifier {
                    guild_id: self.guild_id,
                    slot: slot.clone(),
                },
            );
            if let Err(e) = registered {
                if let Err(stop_error) = track_handle.stop() {
                    warn!(
                        "No se pudo detener el track en guild {}: {}",
                        self.guild_id, stop_error
                    );
                }
                drop(slot.lock().take());
                return Err(PlaybackError::SinkStart(format!(
                    "error al registrar eventos: {}",
                    e
                )));
            }
        }

        *self.current.lock() = Some(track_handle);
        info!("▶️ Stream iniciado en guild {}: {}", self.guild_id, request.title);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(handle) = self.current.lock().take() {
            if let Err(e) = handle.stop() {
                warn!("No se pudo detener el track en guild {}: {}", self.guild_id, e);
            }
        }
    }

    async fn pause(&self) -> PlaybackResult<()> {
        let handle = self
            .handle()
            .ok_or_else(|| PlaybackError::SinkStart("no hay stream".into()))?;
        handle
            .pause()
            .map_err(|e| PlaybackError::SinkStart(e.to_string()))
    }

    async fn resume(&self) -> PlaybackResult<()> {
        let handle = self
            .handle()
            .ok_or_else(|| PlaybackError::SinkStart("no hay stream".into()))?;
        handle
            .play()
            .map_err(|e| PlaybackError::SinkStart(e.to_string()))
    }

    async fn set_volume(&self, volume: f32) -> PlaybackResult<()> {
        let handle = self
            .handle()
            .ok_or_else(|| PlaybackError::SinkStart("no hay stream".into()))?;
        handle
            .set_volume(volume)
            .map_err(|e| PlaybackError::SinkStart(e.to_string()))
    }

    async fn is_active(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Play))
    }

    async fn is_paused(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Pause))
    }
}

/// Forwards songbird's end/error events into the guild player's mailbox.
struct TrackEndNotifier {
    guild_id: GuildId,
    slot: Arc<Mutex<Option<CompletionHandle>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let outcome = match ctx {
            EventContext::Track(tracks) => match tracks.first().map(|(state, _)| &state.playing) {
                Some(PlayMode::Errored(e)) => Err(format!("{:?}", e)),
                _ => Ok(()),
            },
            _ => Ok(()),
        };

        if let Some(handle) = self.slot.lock().take() {
            debug!("🎵 Track terminó en guild {}", self.guild_id);
            handle.complete(outcome);
        }

        None
    }
}

/// Joins, moves and leaves voice channels through songbird.
pub struct SongbirdConnection {
    guild_id: GuildId,
    manager: Arc<Songbird>,
}

impl SongbirdConnection {
    pub fn new(guild_id: GuildId, manager: Arc<Songbird>) -> Self {
        Self { guild_id, manager }
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn join(&self, channel_id: ChannelId) -> PlaybackResult<()> {
        self.manager
            .join(self.guild_id, channel_id)
            .await
            .map_err(|e| {
                error!("Error al obtener handler de voz: {:?}", e);
                PlaybackError::Connection(e.to_string())
            })?;

        info!("🔊 Conectado al canal de voz en guild {}", self.guild_id);
        Ok(())
    }

    async fn move_to(&self, channel_id: ChannelId) -> PlaybackResult<()> {
        // Songbird moves an existing call when joining a different channel.
        self.join(channel_id).await
    }

    async fn disconnect(&self) -> PlaybackResult<()> {
        if self.manager.get(self.guild_id).is_none() {
            return Ok(());
        }

        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| PlaybackError::Connection(e.to_string()))?;

        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        Ok(())
    }

    async fn current_channel(&self) -> Option<ChannelId> {
        let call = self.manager.get(self.guild_id)?;
        let channel = call.lock().await.current_channel()?;
        Some(ChannelId::from(channel.0))
    }
}

/// Builds songbird collaborators for each guild.
pub struct SongbirdBackend {
    manager: Arc<Songbird>,
    http_client: reqwest::Client,
    notifier: Arc<dyn Notifier>,
}

impl SongbirdBackend {
    pub fn new(manager: Arc<Songbird>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            manager,
            http_client: reqwest::Client::new(),
            notifier,
        }
    }
}

impl GuildBackend for SongbirdBackend {
    fn collaborators(&self, guild_id: GuildId) -> GuildCollaborators {
        GuildCollaborators {
            sink: Arc::new(SongbirdSink::new(
                guild_id,
                self.manager.clone(),
                self.http_client.clone(),
            )),
            voice: Arc::new(SongbirdConnection::new(guild_id, self.manager.clone())),
            notifier: self.notifier.clone(),
        }
    }
}
