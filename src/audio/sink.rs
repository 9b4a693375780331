use async_trait::async_trait;
use serenity::model::id::ChannelId;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::{audio::player::PlayerEvent, error::PlaybackResult};

/// What the sink needs to start streaming one track.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub title: String,
    pub stream_url: String,
    pub volume: f32,
}

/// Audio output for one guild.
///
/// `start` receives a [`CompletionHandle`] and must either keep it until the
/// stream ends and then call [`CompletionHandle::complete`], or drop it.
/// Dropping counts as an error completion, so every started stream reports
/// back exactly once.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn start(&self, request: StreamRequest, on_complete: CompletionHandle) -> PlaybackResult<()>;

    /// Stops the current stream. Its completion fires through the normal path.
    async fn stop(&self);

    async fn pause(&self) -> PlaybackResult<()>;

    async fn resume(&self) -> PlaybackResult<()>;

    async fn set_volume(&self, volume: f32) -> PlaybackResult<()>;

    /// A stream is running and not paused.
    async fn is_active(&self) -> bool;

    async fn is_paused(&self) -> bool;
}

/// Voice channel membership for one guild.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    async fn join(&self, channel_id: ChannelId) -> PlaybackResult<()>;

    async fn move_to(&self, channel_id: ChannelId) -> PlaybackResult<()>;

    async fn disconnect(&self) -> PlaybackResult<()>;

    async fn current_channel(&self) -> Option<ChannelId>;
}

/// One-shot completion signal for a started stream.
///
/// Completing only posts an event into the guild's player mailbox, so it is
/// safe to call from the audio pipeline's own threads.
#[derive(Debug)]
pub struct CompletionHandle {
    stream_id: u64,
    events: Option<UnboundedSender<PlayerEvent>>,
}

impl CompletionHandle {
    pub(crate) fn new(stream_id: u64, events: UnboundedSender<PlayerEvent>) -> Self {
        Self {
            stream_id,
            events: Some(events),
        }
    }

    pub fn complete(mut self, outcome: Result<(), String>) {
        self.fire(outcome);
    }

    fn fire(&mut self, outcome: Result<(), String>) {
        let Some(events) = self.events.take() else {
            return;
        };

        let event = PlayerEvent::TrackEnded {
            stream_id: self.stream_id,
            outcome,
        };
        if events.send(event).is_err() {
            debug!("Stream {} terminó después de cerrar la sesión", self.stream_id);
        }
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        if self.events.is_some() {
            warn!("⚠️ Stream {} descartado sin señal de fin", self.stream_id);
            self.fire(Err("el stream se descartó sin terminar".to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_complete_fires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        CompletionHandle::new(3, tx).complete(Ok(()));

        match rx.try_recv() {
            Ok(PlayerEvent::TrackEnded { stream_id, outcome }) => {
                assert_eq!(stream_id, 3);
                assert!(outcome.is_ok());
            }
            other => panic!("evento inesperado: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_drop_reports_error_completion() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        drop(CompletionHandle::new(9, tx));

        match rx.try_recv() {
            Ok(PlayerEvent::TrackEnded { stream_id, outcome }) => {
                assert_eq!(stream_id, 9);
                assert!(outcome.is_err());
            }
            other => panic!("evento inesperado: {other:?}"),
        }
    }

    #[test]
    fn test_complete_after_session_closed_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        CompletionHandle::new(1, tx).complete(Err("boom".into()));
    }
}
