//! Per-guild playback controller.
//!
//! Every guild gets one actor task that owns the "what plays now" decision.
//! User commands arrive through a bounded mailbox; stream completions and
//! idle-timer firings arrive through an unbounded event channel. Events are
//! handled first, but after [`EVENT_BURST`] consecutive events one pending
//! command gets its turn. Nothing outside the actor mutates the queue.

use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::{fmt, sync::Arc, time::Duration};
use tokio::{
    sync::{
        mpsc::{self, error::TryRecvError},
        oneshot, watch,
    },
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        notify::{Notification, Notifier},
        queue::{GuildQueue, QueueInfo},
        sink::{AudioSink, CompletionHandle, StreamRequest, VoiceConnection},
        track::Track,
    },
    error::{PlaybackError, PlaybackResult},
};

/// Consecutive events handled before a waiting command is let through.
pub const EVENT_BURST: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Starting,
    Playing,
    Paused,
    /// Queue exhausted, idle timer armed.
    Draining,
    Disconnected,
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "inactivo",
            Self::Starting => "iniciando",
            Self::Playing => "reproduciendo",
            Self::Paused => "en pausa",
            Self::Draining => "esperando",
            Self::Disconnected => "desconectado",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub idle_timeout: Duration,
    pub command_buffer: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            default_volume: Track::DEFAULT_VOLUME,
            max_queue_size: 1000,
            idle_timeout: Duration::from_secs(60),
            command_buffer: 64,
        }
    }
}

/// External collaborators one guild's player talks to.
#[derive(Clone)]
pub struct GuildCollaborators {
    pub sink: Arc<dyn AudioSink>,
    pub voice: Arc<dyn VoiceConnection>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Clone)]
pub struct PlayerStatus {
    pub state: PlayerState,
    pub queue: QueueInfo,
}

enum PlayerCommand {
    Enqueue {
        track: Track,
        reply: oneshot::Sender<PlaybackResult<usize>>,
    },
    Skip {
        reply: oneshot::Sender<PlaybackResult<()>>,
    },
    Pause {
        reply: oneshot::Sender<PlaybackResult<()>>,
    },
    Resume {
        reply: oneshot::Sender<PlaybackResult<()>>,
    },
    Stop {
        disconnect: bool,
        reply: oneshot::Sender<PlaybackResult<()>>,
    },
    SetVolume {
        volume: f32,
        reply: oneshot::Sender<PlaybackResult<f32>>,
    },
    ToggleLoop {
        reply: oneshot::Sender<bool>,
    },
    ToggleLoopQueue {
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<PlayerStatus>,
    },
    Shutdown,
}

/// Signals produced outside the command path.
#[derive(Debug)]
pub enum PlayerEvent {
    TrackEnded {
        stream_id: u64,
        outcome: Result<(), String>,
    },
    IdleTimeout {
        generation: u64,
    },
}

/// Handle to a guild's player actor. Cheap to clone.
#[derive(Clone)]
pub struct PlaybackController {
    guild_id: GuildId,
    commands: mpsc::Sender<PlayerCommand>,
    state: watch::Receiver<PlayerState>,
}

impl PlaybackController {
    /// Spawns the actor for `guild_id` on the current tokio runtime.
    pub fn spawn(
        guild_id: GuildId,
        queue: Arc<Mutex<GuildQueue>>,
        collaborators: GuildCollaborators,
        settings: &PlayerSettings,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(settings.command_buffer.max(1));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PlayerState::Idle);

        let actor = PlayerActor {
            guild_id,
            queue,
            sink: collaborators.sink,
            voice: collaborators.voice,
            notifier: collaborators.notifier,
            idle_timeout: settings.idle_timeout,
            state: PlayerState::Idle,
            state_tx,
            commands: commands_rx,
            events: events_rx,
            events_tx,
            next_stream_id: 0,
            active_stream: None,
            reported_failure: None,
            idle_timer: None,
            idle_generation: 0,
        };
        tokio::spawn(actor.run());

        Self {
            guild_id,
            commands: commands_tx,
            state: state_rx,
        }
    }

    /// Last state published by the actor.
    pub fn state(&self) -> PlayerState {
        *self.state.borrow()
    }

    /// Appends a resolved track and starts playback if nothing is streaming.
    /// Returns the track's position among pending tracks.
    pub async fn enqueue(&self, track: Track) -> PlaybackResult<usize> {
        self.request(|reply| PlayerCommand::Enqueue { track, reply }).await?
    }

    pub async fn skip(&self) -> PlaybackResult<()> {
        self.request(|reply| PlayerCommand::Skip { reply }).await?
    }

    pub async fn pause(&self) -> PlaybackResult<()> {
        self.request(|reply| PlayerCommand::Pause { reply }).await?
    }

    pub async fn resume(&self) -> PlaybackResult<()> {
        self.request(|reply| PlayerCommand::Resume { reply }).await?
    }

    /// Clears the queue and stops the sink. With `disconnect` the voice
    /// connection is also dropped and the session ends.
    pub async fn stop(&self, disconnect: bool) -> PlaybackResult<()> {
        self.request(|reply| PlayerCommand::Stop { disconnect, reply })
            .await?
    }

    pub async fn set_volume(&self, volume: f32) -> PlaybackResult<f32> {
        self.request(|reply| PlayerCommand::SetVolume { volume, reply })
            .await?
    }

    pub async fn toggle_loop(&self) -> PlaybackResult<bool> {
        self.request(|reply| PlayerCommand::ToggleLoop { reply }).await
    }

    pub async fn toggle_loop_queue(&self) -> PlaybackResult<bool> {
        self.request(|reply| PlayerCommand::ToggleLoopQueue { reply })
            .await
    }

    /// State and queue as seen after every already-delivered event.
    pub async fn status(&self) -> PlaybackResult<PlayerStatus> {
        self.request(|reply| PlayerCommand::Status { reply }).await
    }

    pub async fn queue_info(&self) -> PlaybackResult<QueueInfo> {
        Ok(self.status().await?.queue)
    }

    pub async fn shutdown(&self) {
        if self.commands.send(PlayerCommand::Shutdown).await.is_err() {
            debug!("Reproductor de guild {} ya estaba cerrado", self.guild_id);
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> PlayerCommand,
    ) -> PlaybackResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| PlaybackError::SessionClosed)?;
        response.await.map_err(|_| PlaybackError::SessionClosed)
    }
}

struct PlayerActor {
    guild_id: GuildId,
    queue: Arc<Mutex<GuildQueue>>,
    sink: Arc<dyn AudioSink>,
    voice: Arc<dyn VoiceConnection>,
    notifier: Arc<dyn Notifier>,
    idle_timeout: Duration,
    state: PlayerState,
    state_tx: watch::Sender<PlayerState>,
    commands: mpsc::Receiver<PlayerCommand>,
    events: mpsc::UnboundedReceiver<PlayerEvent>,
    events_tx: mpsc::UnboundedSender<PlayerEvent>,
    next_stream_id: u64,
    /// Stream whose completion drives the next step. Completions for any
    /// other stream are stale.
    active_stream: Option<u64>,
    /// Stream whose start failure was already shown to users.
    reported_failure: Option<u64>,
    idle_timer: Option<JoinHandle<()>>,
    idle_generation: u64,
}

impl PlayerActor {
    async fn run(mut self) {
        debug!("Reproductor iniciado para guild {}", self.guild_id);

        let mut burst = 0;
        loop {
            if burst >= EVENT_BURST {
                burst = 0;
                match self.commands.try_recv() {
                    Ok(PlayerCommand::Shutdown) | Err(TryRecvError::Disconnected) => break,
                    Ok(command) => {
                        self.handle_command(command).await;
                        continue;
                    }
                    Err(TryRecvError::Empty) => {}
                }
            }

            tokio::select! {
                biased;
                Some(event) = self.events.recv() => {
                    burst += 1;
                    self.handle_event(event).await;
                }
                command = self.commands.recv() => {
                    burst = 0;
                    match command {
                        Some(PlayerCommand::Shutdown) | None => break,
                        Some(command) => self.handle_command(command).await,
                    }
                }
            }
        }

        self.cancel_idle_timer();
        if self.active_stream.take().is_some() {
            self.sink.stop().await;
        }
        info!("🛑 Reproductor cerrado para guild {}", self.guild_id);
    }

    async fn handle_command(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Enqueue { track, reply } => {
                let result = self.enqueue(track).await;
                let _ = reply.send(result);
            }
            PlayerCommand::Skip { reply } => {
                let _ = reply.send(self.skip().await);
            }
            PlayerCommand::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            PlayerCommand::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            PlayerCommand::Stop { disconnect, reply } => {
                let _ = reply.send(self.stop(disconnect).await);
            }
            PlayerCommand::SetVolume { volume, reply } => {
                let _ = reply.send(self.set_volume(volume).await);
            }
            PlayerCommand::ToggleLoop { reply } => {
                let _ = reply.send(self.queue.lock().toggle_loop_current());
            }
            PlayerCommand::ToggleLoopQueue { reply } => {
                let _ = reply.send(self.queue.lock().toggle_loop_queue());
            }
            PlayerCommand::Status { reply } => {
                let status = PlayerStatus {
                    state: self.state,
                    queue: self.queue.lock().snapshot(),
                };
                let _ = reply.send(status);
            }
            PlayerCommand::Shutdown => {}
        }
    }

    async fn handle_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::TrackEnded { stream_id, outcome } => {
                self.on_track_ended(stream_id, outcome).await
            }
            PlayerEvent::IdleTimeout { generation } => self.on_idle_timeout(generation).await,
        }
    }

    async fn enqueue(&mut self, track: Track) -> PlaybackResult<usize> {
        if self.state == PlayerState::Disconnected {
            if self.voice.current_channel().await.is_none() {
                warn!("Encolar rechazado en guild {}: sin canal de voz", self.guild_id);
                return Err(PlaybackError::Connection(
                    "el bot no está en un canal de voz".to_string(),
                ));
            }
            info!("🔄 Nueva sesión en guild {}", self.guild_id);
            self.set_state(PlayerState::Idle);
        }

        let position = self.queue.lock().add(track.clone())?;
        self.notify(Notification::TrackAdded { track, position }).await;

        self.ensure_running().await;
        Ok(position)
    }

    /// Starts the next track unless the sink is already streaming.
    async fn ensure_running(&mut self) {
        if self.sink.is_active().await || self.sink.is_paused().await {
            debug!("Sink ocupado en guild {}, nada que iniciar", self.guild_id);
            return;
        }

        let (before, next) = {
            let mut queue = self.queue.lock();
            let before = queue.clone();
            (before, queue.get_next())
        };
        match next {
            Some(track) => self.start_track(track, before).await,
            None => {
                self.queue.lock().set_playing(false);
                self.enter_draining();
            }
        }
    }

    /// `before` is the queue as it was before `track` was selected.
    async fn start_track(&mut self, track: Track, before: GuildQueue) {
        let previous_stream = self.active_stream;
        self.set_state(PlayerState::Starting);
        self.queue.lock().set_playing(true);

        self.next_stream_id += 1;
        let stream_id = self.next_stream_id;
        self.active_stream = Some(stream_id);

        let request = StreamRequest {
            title: track.title().to_string(),
            stream_url: track.stream_url().to_string(),
            volume: track.volume(),
        };
        let on_complete = CompletionHandle::new(stream_id, self.events_tx.clone());

        match self.sink.start(request, on_complete).await {
            Ok(()) => {
                info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, track.title());
                self.set_state(PlayerState::Playing);
                self.notify(Notification::NowPlaying(track)).await;
            }
            Err(PlaybackError::ConcurrencyGuard(reason)) => {
                error!(
                    "❌ Doble inicio detectado en guild {} (defecto): {}",
                    self.guild_id, reason
                );
                // The stream already running keeps its completion; the track waits.
                *self.queue.lock() = before;
                self.active_stream = previous_stream;
                let restored = if self.sink.is_paused().await {
                    PlayerState::Paused
                } else {
                    PlayerState::Playing
                };
                self.set_state(restored);
            }
            Err(e) => {
                // The dropped handle ends the cycle; the error is shown here only.
                warn!("❌ No se pudo iniciar {}: {}", track.title(), e);
                self.reported_failure = Some(stream_id);
                self.notify(Notification::Error(format!(
                    "No se pudo reproducir **{}**: {}",
                    track.title(),
                    e
                )))
                .await;
            }
        }
    }

    async fn on_track_ended(&mut self, stream_id: u64, outcome: Result<(), String>) {
        if self.active_stream != Some(stream_id) {
            debug!(
                "Fin de stream {} ignorado en guild {} (activo: {:?})",
                stream_id, self.guild_id, self.active_stream
            );
            return;
        }
        self.active_stream = None;

        if let Err(e) = outcome {
            self.queue.lock().discard_current();
            if self.reported_failure.take() == Some(stream_id) {
                debug!("Fallo de inicio del stream {} ya notificado", stream_id);
            } else {
                error!("❌ Error de reproducción en guild {}: {}", self.guild_id, e);
                self.notify(Notification::Error(format!("Error de reproducción: {}", e)))
                    .await;
            }
        }

        self.ensure_running().await;
    }

    async fn skip(&mut self) -> PlaybackResult<()> {
        self.require(&[PlayerState::Playing, PlayerState::Paused], "saltar")?;
        self.sink.stop().await;
        info!("⏭️ Track saltado en guild {}", self.guild_id);
        Ok(())
    }

    async fn pause(&mut self) -> PlaybackResult<()> {
        self.require(&[PlayerState::Playing], "pausar")?;
        self.sink.pause().await?;
        self.set_state(PlayerState::Paused);
        Ok(())
    }

    async fn resume(&mut self) -> PlaybackResult<()> {
        self.require(&[PlayerState::Paused], "reanudar")?;
        self.sink.resume().await?;
        self.set_state(PlayerState::Playing);
        Ok(())
    }

    async fn stop(&mut self, disconnect: bool) -> PlaybackResult<()> {
        if self.state == PlayerState::Disconnected {
            return Err(self.invalid("detener"));
        }

        self.queue.lock().clear();
        self.active_stream = None;
        self.sink.stop().await;

        if disconnect {
            self.set_state(PlayerState::Disconnected);
            if let Err(e) = self.voice.disconnect().await {
                error!("Error al desconectar en guild {}: {}", self.guild_id, e);
            }
        } else {
            self.set_state(PlayerState::Idle);
        }

        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
        Ok(())
    }

    async fn set_volume(&mut self, volume: f32) -> PlaybackResult<f32> {
        let applied = match self.queue.lock().current_mut() {
            Some(track) => track.set_volume(volume),
            None => return Err(self.invalid("cambiar el volumen")),
        };

        if matches!(self.state, PlayerState::Playing | PlayerState::Paused) {
            self.sink.set_volume(applied).await?;
        }

        info!("🔊 Volumen ajustado a {}%", (applied * 100.0).round() as u8);
        Ok(applied)
    }

    async fn on_idle_timeout(&mut self, generation: u64) {
        if generation != self.idle_generation || self.state != PlayerState::Draining {
            debug!("Temporizador de inactividad obsoleto en guild {}", self.guild_id);
            return;
        }
        self.idle_timer = None;

        if self.sink.is_active().await || !self.queue.lock().is_empty() {
            self.ensure_running().await;
            return;
        }

        info!("🚪 Desconectando por inactividad en guild {}", self.guild_id);
        self.queue.lock().clear();
        self.set_state(PlayerState::Disconnected);
        if let Err(e) = self.voice.disconnect().await {
            error!("Error al desconectar en guild {}: {}", self.guild_id, e);
        }
        self.notify(Notification::Status(
            "👋 Desconectado por inactividad".to_string(),
        ))
        .await;
    }

    fn enter_draining(&mut self) {
        if self.state == PlayerState::Draining && self.idle_timer.is_some() {
            return;
        }
        self.set_state(PlayerState::Draining);

        self.idle_generation += 1;
        let generation = self.idle_generation;
        let events = self.events_tx.clone();
        let timeout = self.idle_timeout;
        self.idle_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(PlayerEvent::IdleTimeout { generation });
        }));

        debug!(
            "⏳ Cola agotada en guild {}, desconexión en {}",
            self.guild_id,
            humantime::format_duration(timeout)
        );
    }

    /// Aborts the timer task and invalidates any firing already in flight.
    fn cancel_idle_timer(&mut self) {
        if let Some(timer) = self.idle_timer.take() {
            timer.abort();
        }
        self.idle_generation += 1;
    }

    fn set_state(&mut self, next: PlayerState) {
        if self.state == PlayerState::Draining && next != PlayerState::Draining {
            self.cancel_idle_timer();
        }
        if self.state != next {
            debug!("Guild {}: {} -> {}", self.guild_id, self.state, next);
        }
        self.state = next;
        self.state_tx.send_replace(next);
    }

    fn require(&self, allowed: &[PlayerState], operation: &'static str) -> PlaybackResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn invalid(&self, operation: &'static str) -> PlaybackError {
        warn!(
            "Operación '{}' rechazada en guild {} (estado: {})",
            operation, self.guild_id, self.state
        );
        PlaybackError::InvalidState {
            operation,
            state: self.state,
        }
    }

    async fn notify(&self, notification: Notification) {
        self.notifier.notify(self.guild_id, notification).await;
    }
}
