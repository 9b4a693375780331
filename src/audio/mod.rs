//! # Audio Module
//!
//! Queue and playback lifecycle for every guild the bot plays in.
//!
//! ## Architecture
//!
//! ### [`track`] - Track
//! - One playable item built from resolved metadata
//! - Only the volume changes after creation
//!
//! ### [`queue`] - Queue Management
//! - FIFO of pending tracks plus the current one
//! - Loop-current and loop-queue selection rules
//!
//! ### [`player`] - Playback Controller
//! - One actor task per guild owns the "what plays now" decision
//! - Sink completions are re-dispatched into the actor's mailbox
//! - Idle timer disconnects after the queue drains
//!
//! ### [`registry`] - Queue Registry
//! - Atomic get-or-create of the per-guild queue/controller pair
//!
//! ### [`sink`] / [`notify`] - Collaborators
//! - Traits for the audio output, the voice connection and notifications
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let registry = QueueRegistry::new(backend, PlayerSettings::default());
//! let session = registry.get_or_create(guild_id);
//!
//! session.controller.enqueue(track).await?;
//! session.controller.pause().await?;
//! session.controller.resume().await?;
//! session.controller.skip().await?;
//! ```

pub mod notify;
pub mod player;
pub mod queue;
pub mod registry;
pub mod sink;
pub mod track;
