//! Error types for guild playback.

use thiserror::Error;

use crate::audio::player::PlayerState;

pub type PlaybackResult<T> = std::result::Result<T, PlaybackError>;

/// Errors raised by the queue, the playback controller and their collaborators.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlaybackError {
    /// Metadata lookup failed. The queue is left untouched.
    #[error("no se pudo resolver la canción: {0}")]
    Resolution(String),

    /// The sink could not start the stream or it died mid-stream.
    #[error("error al iniciar el stream: {0}")]
    SinkStart(String),

    /// Command issued in a state that forbids it.
    #[error("no se puede {operation} mientras el reproductor está {state}")]
    InvalidState {
        operation: &'static str,
        state: PlayerState,
    },

    /// The queue reached its configured capacity.
    #[error("la cola está llena (máximo {0} canciones)")]
    QueueFull(usize),

    /// Voice connection join/move/disconnect failed.
    #[error("error de conexión de voz: {0}")]
    Connection(String),

    /// The guild's session was torn down while the request was in flight.
    #[error("la sesión del servidor fue cerrada")]
    SessionClosed,

    /// Serialization was bypassed somewhere. Always a defect.
    #[error("violación de serialización: {0}")]
    ConcurrencyGuard(String),
}

impl PlaybackError {
    /// Whether the error is a rejection meant for the requester rather than a defect.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::ConcurrencyGuard(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrency_guard_is_not_user_facing() {
        assert!(!PlaybackError::ConcurrencyGuard("doble inicio".into()).is_user_facing());
        assert!(PlaybackError::QueueFull(10).is_user_facing());
        assert!(PlaybackError::InvalidState {
            operation: "pausar",
            state: PlayerState::Idle,
        }
        .is_user_facing());
    }

    #[test]
    fn test_invalid_state_message_names_operation_and_state() {
        let err = PlaybackError::InvalidState {
            operation: "reanudar",
            state: PlayerState::Playing,
        };
        assert_eq!(
            err.to_string(),
            "no se puede reanudar mientras el reproductor está reproduciendo"
        );
    }
}
