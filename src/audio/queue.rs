use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use crate::{
    audio::track::Track,
    error::{PlaybackError, PlaybackResult},
};

/// Per-guild pending tracks, the current track and the loop flags.
///
/// `is_playing` only says whether the queue believes something is in flight.
/// The audio sink stays the authority on whether a stream is running.
#[derive(Debug, Clone)]
pub struct GuildQueue {
    items: VecDeque<Track>,
    current: Option<Track>,
    is_playing: bool,
    loop_current: bool,
    loop_queue: bool,
    max_size: usize,
}

impl GuildQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            current: None,
            is_playing: false,
            loop_current: false,
            loop_queue: false,
            max_size,
        }
    }

    /// Agrega un track al final de la cola. Devuelve su posición (1-based).
    pub fn add(&mut self, track: Track) -> PlaybackResult<usize> {
        if self.items.len() >= self.max_size {
            return Err(PlaybackError::QueueFull(self.max_size));
        }

        info!("➕ Agregado a la cola: {}", track.title());
        self.items.push_back(track);

        Ok(self.items.len())
    }

    /// Selects the next track.
    ///
    /// Loop-current wins over loop-queue, and both only apply while a current
    /// track exists. `None` means there is no work; `current` is left as it was.
    pub fn get_next(&mut self) -> Option<Track> {
        if let Some(current) = &self.current {
            if self.loop_current {
                info!("🔂 Repitiendo track: {}", current.title());
                return Some(current.clone());
            }

            if self.loop_queue {
                debug!("🔁 Track devuelto al final por loop de cola: {}", current.title());
                self.items.push_back(current.clone());
            }
        }

        match self.items.pop_front() {
            Some(next) => {
                info!("➡️ Siguiente en cola (FIFO): {}", next.title());
                self.current = Some(next.clone());
                Some(next)
            }
            None => {
                info!("📭 Cola vacía, no hay siguiente track");
                None
            }
        }
    }

    /// Vacía la cola, olvida el track actual y marca la cola como detenida.
    pub fn clear(&mut self) {
        self.items.clear();
        self.current = None;
        self.is_playing = false;
        info!("🗑️ Cola limpiada");
    }

    pub fn toggle_loop_current(&mut self) -> bool {
        self.loop_current = !self.loop_current;
        if self.loop_current {
            info!("🔂 Repetir canción activado");
        } else {
            info!("➡️ Repetir canción desactivado");
        }
        self.loop_current
    }

    pub fn toggle_loop_queue(&mut self) -> bool {
        self.loop_queue = !self.loop_queue;
        if self.loop_queue {
            info!("🔁 Repetir cola activado");
        } else {
            info!("➡️ Repetir cola desactivado");
        }
        self.loop_queue
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.is_playing = playing;
    }

    /// Forgets the current track so neither loop mode brings it back.
    pub fn discard_current(&mut self) -> Option<Track> {
        let discarded = self.current.take();
        if let Some(track) = &discarded {
            debug!("🚫 Track descartado de la rotación: {}", track.title());
        }
        discarded
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut Track> {
        self.current.as_mut()
    }

    /// Number of pending tracks, not counting the current one.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn snapshot(&self) -> QueueInfo {
        QueueInfo {
            current: self.current.clone(),
            pending: self.items.iter().cloned().collect(),
            loop_current: self.loop_current,
            loop_queue: self.loop_queue,
            is_playing: self.is_playing,
            total_duration: self.calculate_total_duration(),
        }
    }

    fn calculate_total_duration(&self) -> Duration {
        let queue_duration: Duration = self.items.iter().filter_map(|t| t.duration()).sum();

        let current_duration = self
            .current
            .as_ref()
            .and_then(|c| c.duration())
            .unwrap_or_default();

        queue_duration + current_duration
    }
}

#[derive(Debug, Clone)]
pub struct QueueInfo {
    pub current: Option<Track>,
    pub pending: Vec<Track>,
    pub loop_current: bool,
    pub loop_queue: bool,
    pub is_playing: bool,
    pub total_duration: Duration,
}

impl QueueInfo {
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.pending.is_empty()
    }

    /// Obtiene una página específica de la cola
    pub fn get_page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let items_per_page = items_per_page.max(1);
        let safe_page = page.max(1);
        let start = (safe_page - 1) * items_per_page;
        let end = (start + items_per_page).min(self.pending.len());
        let total_pages = self.pending.len().div_ceil(items_per_page).max(1);

        QueuePage {
            items: if start < self.pending.len() {
                self.pending[start..end].to_vec()
            } else {
                Vec::new()
            },
            first_position: start + 1,
            current_page: safe_page,
            total_pages,
            remaining: self.pending.len().saturating_sub(end),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Track>,
    pub first_position: usize,
    pub current_page: usize,
    pub total_pages: usize,
    /// Pending tracks after this page.
    pub remaining: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn track(title: &str) -> Track {
        Track::new(title, format!("https://cdn.example/{title}"), UserId::new(1))
    }

    fn titles(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|t| t.title()).collect()
    }

    #[test]
    fn test_fifo_each_track_exactly_once() {
        let mut queue = GuildQueue::new(100);
        for name in ["a", "b", "c", "d"] {
            queue.add(track(name)).unwrap();
        }

        let mut played = Vec::new();
        while let Some(next) = queue.get_next() {
            played.push(next.title().to_string());
        }

        assert_eq!(played, vec!["a", "b", "c", "d"]);
        assert!(queue.get_next().is_none());
    }

    #[test]
    fn test_add_reports_position_and_enforces_capacity() {
        let mut queue = GuildQueue::new(2);
        assert_eq!(queue.add(track("a")), Ok(1));
        assert_eq!(queue.add(track("b")), Ok(2));
        assert_eq!(queue.add(track("c")), Err(PlaybackError::QueueFull(2)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_loop_current_repeats_without_consuming() {
        let mut queue = GuildQueue::new(100);
        queue.add(track("t1")).unwrap();
        queue.add(track("t2")).unwrap();
        assert_eq!(queue.get_next().unwrap().title(), "t1");

        queue.toggle_loop_current();
        for _ in 0..5 {
            assert_eq!(queue.get_next().unwrap().title(), "t1");
            assert_eq!(queue.len(), 1);
        }
        assert_eq!(titles(&queue.snapshot().pending), vec!["t2"]);
    }

    #[test]
    fn test_loop_current_without_current_falls_through() {
        let mut queue = GuildQueue::new(100);
        queue.toggle_loop_current();
        queue.add(track("a")).unwrap();
        queue.add(track("b")).unwrap();

        assert_eq!(queue.get_next().unwrap().title(), "a");
        assert_eq!(queue.get_next().unwrap().title(), "a");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_loop_queue_cycles_in_original_order() {
        let mut queue = GuildQueue::new(100);
        for name in ["a", "b", "c"] {
            queue.add(track(name)).unwrap();
        }
        queue.toggle_loop_queue();

        let played: Vec<String> = (0..9)
            .map(|_| queue.get_next().unwrap().title().to_string())
            .collect();

        assert_eq!(played, vec!["a", "b", "c", "a", "b", "c", "a", "b", "c"]);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.current().unwrap().title(), "c");
    }

    #[test]
    fn test_loop_queue_single_track_repeats() {
        let mut queue = GuildQueue::new(100);
        queue.add(track("solo")).unwrap();
        queue.toggle_loop_queue();

        for _ in 0..3 {
            assert_eq!(queue.get_next().unwrap().title(), "solo");
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_loop_current_takes_precedence_over_loop_queue() {
        let mut queue = GuildQueue::new(100);
        queue.add(track("a")).unwrap();
        queue.add(track("b")).unwrap();
        queue.get_next();
        queue.toggle_loop_queue();
        queue.toggle_loop_current();

        assert_eq!(queue.get_next().unwrap().title(), "a");
        assert_eq!(titles(&queue.snapshot().pending), vec!["b"]);
    }

    #[test]
    fn test_exhausted_queue_keeps_current_but_returns_none() {
        let mut queue = GuildQueue::new(100);
        queue.add(track("a")).unwrap();
        queue.get_next();

        assert!(queue.get_next().is_none());
        assert_eq!(queue.current().unwrap().title(), "a");
    }

    #[test]
    fn test_clear_then_get_next_is_none() {
        let mut queue = GuildQueue::new(100);
        queue.add(track("a")).unwrap();
        queue.add(track("b")).unwrap();
        queue.toggle_loop_current();
        queue.toggle_loop_queue();
        queue.get_next();
        queue.set_playing(true);

        queue.clear();
        queue.clear();

        assert!(queue.get_next().is_none());
        assert!(queue.current().is_none());
        assert!(!queue.snapshot().is_playing);
    }

    #[test]
    fn test_discarded_current_is_not_replayed_by_loops() {
        let mut queue = GuildQueue::new(100);
        queue.add(track("broken")).unwrap();
        queue.add(track("next")).unwrap();
        queue.get_next();
        queue.toggle_loop_current();
        queue.toggle_loop_queue();

        assert_eq!(queue.discard_current().unwrap().title(), "broken");
        assert_eq!(queue.get_next().unwrap().title(), "next");
        assert_eq!(queue.get_next().unwrap().title(), "next");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_snapshot_total_duration_and_pages() {
        let mut queue = GuildQueue::new(100);
        for i in 0..12 {
            queue
                .add(track(&format!("t{i}")).with_duration(Duration::from_secs(60)))
                .unwrap();
        }
        queue.get_next();

        let info = queue.snapshot();
        assert_eq!(info.total_duration, Duration::from_secs(12 * 60));

        let first = info.get_page(1, 10);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.first_position, 1);
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.remaining, 1);

        let second = info.get_page(2, 10);
        assert_eq!(titles(&second.items), vec!["t11"]);
        assert_eq!(second.remaining, 0);

        assert!(info.get_page(5, 10).items.is_empty());
    }
}
