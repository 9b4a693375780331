use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    audio::{
        player::{GuildCollaborators, PlaybackController, PlayerSettings},
        queue::GuildQueue,
        sink::VoiceConnection,
        track::Track,
    },
    error::{PlaybackError, PlaybackResult},
    sources::MetadataResolver,
};

/// Builds the external collaborators for a guild the first time it is seen.
pub trait GuildBackend: Send + Sync {
    fn collaborators(&self, guild_id: GuildId) -> GuildCollaborators;
}

/// The canonical queue/controller pair of one guild.
pub struct GuildSession {
    /// Shared with the controller's actor, which is the only writer.
    pub queue: Arc<Mutex<GuildQueue>>,
    pub controller: PlaybackController,
}

/// Process-wide map of guild sessions.
///
/// Sessions survive idle disconnects and are reused by the next play
/// request. They are only dropped through [`QueueRegistry::remove`], which
/// the bot calls when it leaves a guild, so memory stays bounded by the
/// number of guilds the bot is in.
pub struct QueueRegistry {
    sessions: DashMap<GuildId, Arc<GuildSession>>,
    backend: Arc<dyn GuildBackend>,
    settings: PlayerSettings,
}

impl QueueRegistry {
    pub fn new(backend: Arc<dyn GuildBackend>, settings: PlayerSettings) -> Self {
        Self {
            sessions: DashMap::new(),
            backend,
            settings,
        }
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    /// Returns the guild's session, creating it atomically on first use.
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildSession> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                info!("🆕 Creando sesión de reproducción para guild {}", guild_id);
                let queue = Arc::new(Mutex::new(GuildQueue::new(self.settings.max_queue_size)));
                let controller = PlaybackController::spawn(
                    guild_id,
                    queue.clone(),
                    self.backend.collaborators(guild_id),
                    &self.settings,
                );
                Arc::new(GuildSession {
                    queue,
                    controller,
                })
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildSession>> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    /// Tears the guild's session down. Returns whether one existed.
    pub async fn remove(&self, guild_id: GuildId) -> bool {
        let Some((_, session)) = self.sessions.remove(&guild_id) else {
            return false;
        };
        session.controller.shutdown().await;
        info!("🗑️ Sesión eliminada para guild {}", guild_id);
        true
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Resolves `query`, joins `channel_id` and enqueues the result.
    ///
    /// Resolution runs before the guild's player or voice connection is
    /// touched, so a slow or failing lookup never blocks other commands and
    /// never leaves a partial entry behind. The join happens right before the
    /// enqueue so an idle disconnect during the lookup cannot strand the track.
    pub async fn enqueue_query(
        &self,
        guild_id: GuildId,
        resolver: &dyn MetadataResolver,
        query: &str,
        requested_by: UserId,
        voice: &dyn VoiceConnection,
        channel_id: ChannelId,
    ) -> PlaybackResult<(Track, usize)> {
        let metadata = resolver.resolve(query).await?;
        let track = Track::from_metadata(metadata, requested_by, self.settings.default_volume);

        let session = self.get_or_create(guild_id);
        connect_voice(voice, channel_id).await?;

        let position = match session.controller.enqueue(track.clone()).await {
            // The idle timer disconnected us between the join and the enqueue.
            Err(PlaybackError::Connection(reason)) => {
                debug!("Reconectando en guild {} antes de encolar: {}", guild_id, reason);
                connect_voice(voice, channel_id).await?;
                session.controller.enqueue(track.clone()).await?
            }
            result => result?,
        };
        Ok((track, position))
    }
}

/// Joins `channel_id`, or moves there if the bot sits in another channel.
async fn connect_voice(voice: &dyn VoiceConnection, channel_id: ChannelId) -> PlaybackResult<()> {
    match voice.current_channel().await {
        None => voice.join(channel_id).await,
        Some(current) if current != channel_id => voice.move_to(channel_id).await,
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::player::{
            tests::{FakeNotifier, FakeSink, FakeVoice},
            PlayerState,
        },
        sources::{MockMetadataResolver, TrackMetadata},
    };
    use async_trait::async_trait;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    /// Every guild shares one sink and one voice connection so tests can
    /// drive them.
    #[derive(Default)]
    struct FakeBackend {
        built: AtomicUsize,
        sink: Arc<FakeSink>,
        voice: Arc<FakeVoice>,
    }

    impl GuildBackend for FakeBackend {
        fn collaborators(&self, _guild_id: GuildId) -> GuildCollaborators {
            self.built.fetch_add(1, Ordering::SeqCst);
            GuildCollaborators {
                sink: self.sink.clone(),
                voice: self.voice.clone(),
                notifier: Arc::new(FakeNotifier::default()),
            }
        }
    }

    /// Loses the first join, like a connection dropped right after joining.
    struct FirstJoinLost {
        inner: Arc<FakeVoice>,
        joins: AtomicUsize,
    }

    #[async_trait]
    impl VoiceConnection for FirstJoinLost {
        async fn join(&self, channel_id: ChannelId) -> PlaybackResult<()> {
            if self.joins.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(());
            }
            self.inner.join(channel_id).await
        }

        async fn move_to(&self, channel_id: ChannelId) -> PlaybackResult<()> {
            self.join(channel_id).await
        }

        async fn disconnect(&self) -> PlaybackResult<()> {
            self.inner.disconnect().await
        }

        async fn current_channel(&self) -> Option<ChannelId> {
            self.inner.current_channel().await
        }
    }

    fn registry() -> (Arc<QueueRegistry>, Arc<FakeBackend>) {
        let backend = Arc::new(FakeBackend::default());
        let registry = Arc::new(QueueRegistry::new(backend.clone(), PlayerSettings::default()));
        (registry, backend)
    }

    fn echo_resolver() -> MockMetadataResolver {
        let mut resolver = MockMetadataResolver::new();
        resolver.expect_resolve().returning(|query| {
            Ok(TrackMetadata {
                title: query.to_string(),
                stream_url: format!("https://cdn.example/{query}"),
                url: None,
                duration: None,
                thumbnail: None,
            })
        });
        resolver
    }

    const VOICE: ChannelId = ChannelId::new(10);

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create_yields_one_session() {
        let (registry, backend) = registry();
        let guild = GuildId::new(7);

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.get_or_create(guild) })
            })
            .collect();
        let sessions: Vec<Arc<GuildSession>> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let first = &sessions[0];
        assert!(sessions.iter().all(|s| Arc::ptr_eq(&s.queue, &first.queue)));
        assert!(sessions.iter().all(|s| Arc::ptr_eq(s, first)));
        assert_eq!(registry.len(), 1);
        assert_eq!(backend.built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_guilds_are_independent() {
        let (registry, _) = registry();
        let a = registry.get_or_create(GuildId::new(1));
        let b = registry.get_or_create(GuildId::new(2));

        assert!(!Arc::ptr_eq(&a.queue, &b.queue));
        assert_eq!(registry.len(), 2);
        assert!(registry.get(GuildId::new(3)).is_none());
    }

    #[tokio::test]
    async fn test_enqueue_query_resolves_joins_then_plays() {
        let (registry, backend) = registry();
        let mut resolver = MockMetadataResolver::new();
        resolver
            .expect_resolve()
            .withf(|query| query == "lofi beats")
            .times(1)
            .returning(|_| {
                Ok(TrackMetadata {
                    title: "Lofi".into(),
                    stream_url: "https://cdn.example/lofi".into(),
                    url: None,
                    duration: None,
                    thumbnail: None,
                })
            });

        let (track, position) = registry
            .enqueue_query(
                GuildId::new(1),
                &resolver,
                "lofi beats",
                UserId::new(5),
                backend.voice.as_ref(),
                VOICE,
            )
            .await
            .unwrap();

        assert_eq!(track.title(), "Lofi");
        assert_eq!(track.volume(), registry.settings().default_volume);
        assert_eq!(position, 1);
        assert_eq!(backend.voice.current_channel().await, Some(VOICE));

        let session = registry.get(GuildId::new(1)).unwrap();
        let status = session.controller.status().await.unwrap();
        assert_eq!(status.state, PlayerState::Playing);
        assert_eq!(status.queue.current.unwrap().title(), "Lofi");
    }

    #[tokio::test]
    async fn test_resolution_failure_leaves_queue_and_voice_untouched() {
        let (registry, backend) = registry();
        let session = registry.get_or_create(GuildId::new(1));

        let mut resolver = MockMetadataResolver::new();
        resolver
            .expect_resolve()
            .returning(|_| Err(PlaybackError::Resolution("video privado".into())));

        let result = registry
            .enqueue_query(
                GuildId::new(1),
                &resolver,
                "https://youtu.be/x",
                UserId::new(5),
                backend.voice.as_ref(),
                VOICE,
            )
            .await;

        assert_eq!(
            result.unwrap_err(),
            PlaybackError::Resolution("video privado".into())
        );
        let status = session.controller.status().await.unwrap();
        assert_eq!(status.state, PlayerState::Idle);
        assert!(status.queue.is_empty());
        assert_eq!(backend.voice.current_channel().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_after_idle_disconnect_rejoins_voice() {
        let (registry, backend) = registry();
        let resolver = echo_resolver();
        let guild = GuildId::new(1);

        registry
            .enqueue_query(guild, &resolver, "a", UserId::new(5), backend.voice.as_ref(), VOICE)
            .await
            .unwrap();
        backend.sink.finish(Ok(()));
        tokio::time::sleep(Duration::from_secs(61)).await;

        let session = registry.get(guild).unwrap();
        assert_eq!(
            session.controller.status().await.unwrap().state,
            PlayerState::Disconnected
        );
        assert_eq!(backend.voice.current_channel().await, None);

        registry
            .enqueue_query(guild, &resolver, "b", UserId::new(5), backend.voice.as_ref(), VOICE)
            .await
            .unwrap();

        let status = session.controller.status().await.unwrap();
        assert_eq!(status.state, PlayerState::Playing);
        assert_eq!(status.queue.current.unwrap().title(), "b");
        assert_eq!(backend.voice.current_channel().await, Some(VOICE));
    }

    #[tokio::test]
    async fn test_lost_join_is_retried_before_enqueue() {
        let (registry, backend) = registry();
        let guild = GuildId::new(1);
        let session = registry.get_or_create(guild);
        session.controller.stop(true).await.unwrap();

        let voice = FirstJoinLost {
            inner: backend.voice.clone(),
            joins: AtomicUsize::new(0),
        };
        let (_, position) = registry
            .enqueue_query(guild, &echo_resolver(), "b", UserId::new(5), &voice, VOICE)
            .await
            .unwrap();

        assert_eq!(position, 1);
        assert_eq!(voice.joins.load(Ordering::SeqCst), 2);
        assert_eq!(backend.sink.titles(), vec!["b"]);
        assert_eq!(
            session.controller.status().await.unwrap().state,
            PlayerState::Playing
        );
    }

    #[tokio::test]
    async fn test_remove_tears_down_and_next_access_recreates() {
        let (registry, backend) = registry();
        let old = registry.get_or_create(GuildId::new(1));

        assert!(registry.remove(GuildId::new(1)).await);
        assert!(!registry.remove(GuildId::new(1)).await);
        assert!(registry.is_empty());
        assert_eq!(old.controller.status().await.unwrap_err(), PlaybackError::SessionClosed);

        let fresh = registry.get_or_create(GuildId::new(1));
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert_eq!(backend.built.load(Ordering::SeqCst), 2);
    }
}
