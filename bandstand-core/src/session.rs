//! The playback session state machine.

use crate::notify::{NoteKind, Notifier};
use crate::output::{AudioEvent, AudioOutput, PlayOutcome};
use crate::shuffle::{ShuffleOrder, ShuffleSequencer};
use crate::storage::{keys, StateStore};
use crate::track::{Catalog, Track};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

/// Prompt surfaced when the platform refuses to start playback.
const PLAYBACK_BLOCKED_PROMPT: &str = "Music is ready - press play to start it.";

/// Message surfaced when the current track cannot be decoded or reached.
const TRACK_ERROR_MESSAGE: &str =
    "This track can't be played right now. Skip to the next one to keep listening.";

/// Events emitted as session state settles, for UI binding.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A new catalog track was loaded into the output.
    TrackChanged { index: usize, title: String },
    /// Playback started or resumed.
    PlaybackResumed,
    /// Playback was paused.
    PlaybackPaused,
    /// Shuffle mode was flipped.
    ShuffleToggled { enabled: bool },
    /// Output volume changed.
    VolumeChanged { volume: f32 },
    /// An operator-broadcast track took over the output.
    OverrideStarted { title: Option<String> },
}

/// Read-only view of the current session state.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub position: usize,
    pub elapsed_secs: f64,
    pub is_playing: bool,
    pub shuffle_enabled: bool,
    pub volume: f32,
    pub track: Option<Track>,
}

/// Session-scoped slice of the playback state, stored as one JSON value so a
/// reload within the same session resumes where it left off.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ResumeState {
    position: usize,
    elapsed_secs: f64,
    is_playing: bool,
}

struct SessionInner {
    /// Logical position: an index into the shuffle order when shuffle is
    /// enabled, a catalog index otherwise.
    position: usize,
    elapsed_secs: f64,
    is_playing: bool,
    shuffle_enabled: bool,
    volume: f32,
    shuffle_order: Option<ShuffleOrder>,
    /// Whether any source has been loaded into the output yet.
    loaded: bool,
    /// A start request was refused; retry on the next user gesture.
    pending_play: bool,
}

impl Default for SessionInner {
    fn default() -> Self {
        Self {
            position: 0,
            elapsed_secs: 0.0,
            is_playing: false,
            shuffle_enabled: false,
            volume: 1.0,
            shuffle_order: None,
            loaded: false,
            pending_play: false,
        }
    }
}

/// Owns the shared audio output and the logical playback position.
///
/// All transport mutations funnel through this type; the catalog is read-only
/// after construction. Transport operations are no-ops while the catalog is
/// empty. Nothing here raises: a refused start request is recorded as a
/// pending retry, a bad track surfaces a notification, and corrupt persisted
/// state falls back to track zero.
pub struct PlaybackSession {
    catalog: Catalog,
    output: Arc<dyn AudioOutput>,
    durable: Arc<dyn StateStore>,
    session_store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    sequencer: ShuffleSequencer,
    default_volume: f32,
    inner: RwLock<SessionInner>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl PlaybackSession {
    #[must_use]
    pub fn new(
        catalog: Catalog,
        output: Arc<dyn AudioOutput>,
        durable: Arc<dyn StateStore>,
        session_store: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        default_volume: f32,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);
        let sequencer = ShuffleSequencer::new(Arc::clone(&session_store));

        Arc::new(Self {
            catalog,
            output,
            durable,
            session_store,
            notifier,
            sequencer,
            default_volume,
            inner: RwLock::new(SessionInner::default()),
            event_tx,
        })
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Restore persisted state and either resume playback at the stored
    /// position or load the stored track paused.
    pub async fn initialize(&self) {
        // Durable settings layer under the session-scoped resume state
        let shuffle_enabled = self.durable_flag(keys::SHUFFLE_ENABLED).await;
        let pending_play = self.durable_flag(keys::PENDING_PLAY).await;
        let volume = self.restore_volume().await;
        self.output.set_volume(volume);

        let len = self.catalog.len();
        let shuffle_order = if shuffle_enabled && len > 0 {
            let order = match self.sequencer.restore(len).await {
                Some(order) => order,
                None => self.sequencer.generate(len).await,
            };
            Some(order)
        } else {
            None
        };

        let resume = self.restore_resume_state().await;

        {
            let mut inner = self.inner.write().await;
            inner.shuffle_enabled = shuffle_enabled;
            inner.pending_play = pending_play;
            inner.volume = volume;
            inner.shuffle_order = shuffle_order;
            inner.position = resume.position;
            inner.elapsed_secs = resume.elapsed_secs;
            inner.is_playing = false;
        }

        if self.catalog.is_empty() {
            debug!("Catalog is empty; transport controls are inert");
            return;
        }

        if resume.is_playing {
            self.play(resume.position, false).await;
        } else {
            self.load_track(resume.position).await;
        }
    }

    /// Load and start the track at a logical position.
    ///
    /// The position resolves through the shuffle order when shuffle is
    /// enabled, wrapping modulo the catalog length either way. With
    /// `reset_position` false the stored elapsed time is kept, which is how
    /// a reload resumes mid-track.
    pub async fn play(&self, index: usize, reset_position: bool) {
        let len = self.catalog.len();
        if len == 0 {
            return;
        }

        let expected_url = {
            let mut inner = self.inner.write().await;
            let logical = index % len;
            let catalog_index = Self::resolve_index(&inner, len, logical);
            let Some(track) = self.catalog.get(catalog_index) else {
                return;
            };

            self.output.set_source(&track.source_url);
            if reset_position {
                inner.elapsed_secs = 0.0;
            }
            self.output.seek_to(inner.elapsed_secs);
            inner.position = logical;
            inner.loaded = true;
            self.emit(SessionEvent::TrackChanged {
                index: catalog_index,
                title: track.title.clone(),
            });
            track.source_url.clone()
        };

        self.start_playback(Some(expected_url)).await;
    }

    /// Toggle between playing and paused. With nothing loaded yet this
    /// starts the first track; a resume here is the user gesture that
    /// retries a previously refused start.
    pub async fn toggle_play_pause(&self) {
        if self.catalog.is_empty() {
            return;
        }

        let (loaded, is_playing) = {
            let inner = self.inner.read().await;
            (inner.loaded, inner.is_playing)
        };

        if !loaded {
            self.play(0, true).await;
            return;
        }

        if is_playing {
            self.pause().await;
        } else {
            self.start_playback(None).await;
        }
    }

    /// Pause the output. Unlike the catalog transport operations this works
    /// regardless of catalog state, since broadcast overrides must be
    /// pausable too.
    pub async fn pause(&self) {
        self.output.pause();
        let mut inner = self.inner.write().await;
        if inner.is_playing {
            inner.is_playing = false;
            self.persist_resume(&inner).await;
            self.emit(SessionEvent::PlaybackPaused);
        }
    }

    /// Advance to the next track, wrapping past the end.
    pub async fn play_next(&self) {
        let len = self.catalog.len();
        if len == 0 {
            return;
        }
        let next = (self.inner.read().await.position + 1) % len;
        self.play(next, true).await;
    }

    /// Step back to the previous track, wrapping before the start.
    pub async fn play_previous(&self) {
        let len = self.catalog.len();
        if len == 0 {
            return;
        }
        let previous = (self.inner.read().await.position + len - 1) % len;
        self.play(previous, true).await;
    }

    /// Flip shuffle mode. Turning shuffle on regenerates the order; current
    /// playback is never interrupted, only subsequent track resolution
    /// changes.
    pub async fn toggle_shuffle(&self) {
        let enabled = {
            let mut inner = self.inner.write().await;
            inner.shuffle_enabled = !inner.shuffle_enabled;
            if inner.shuffle_enabled && !self.catalog.is_empty() {
                inner.shuffle_order = Some(self.sequencer.generate(self.catalog.len()).await);
            }
            inner.shuffle_enabled
        };

        self.durable
            .set(keys::SHUFFLE_ENABLED, bool_value(enabled))
            .await;
        self.emit(SessionEvent::ShuffleToggled { enabled });
    }

    /// Set the output volume, clamped to `[0, 1]`, and persist it durably.
    pub async fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.output.set_volume(volume);
        {
            let mut inner = self.inner.write().await;
            inner.volume = volume;
        }
        self.durable.set(keys::VOLUME, &format!("{volume}")).await;
        self.emit(SessionEvent::VolumeChanged { volume });
    }

    /// Apply a settled output transition to the session state.
    pub async fn handle_output_event(&self, event: AudioEvent) {
        match event {
            AudioEvent::Ended => {
                debug!("Track ended; advancing");
                self.play_next().await;
            }
            AudioEvent::Played => {
                let mut inner = self.inner.write().await;
                if !inner.is_playing {
                    inner.is_playing = true;
                    self.persist_resume(&inner).await;
                    self.emit(SessionEvent::PlaybackResumed);
                }
            }
            AudioEvent::Paused => {
                let mut inner = self.inner.write().await;
                if inner.is_playing {
                    inner.is_playing = false;
                    self.persist_resume(&inner).await;
                    self.emit(SessionEvent::PlaybackPaused);
                }
            }
            AudioEvent::Error { message } => {
                // No automatic retry of the same track; the recovery path is
                // the user advancing to the next one.
                warn!("Audio output error: {message}");
                self.notifier.notify(TRACK_ERROR_MESSAGE, NoteKind::Error);
                let mut inner = self.inner.write().await;
                inner.is_playing = false;
                self.persist_resume(&inner).await;
            }
        }
    }

    /// Point the output at an operator-broadcast track without starting it.
    ///
    /// Catalog indices are deliberately not reconciled here: broadcast
    /// playback is an out-of-band override mode with its own source.
    pub async fn override_source(&self, url: &str) {
        self.output.set_source(url);
        self.output.seek_to(0.0);
        let mut inner = self.inner.write().await;
        inner.loaded = true;
        inner.elapsed_secs = 0.0;
    }

    /// Start playing an operator-broadcast track immediately.
    pub async fn start_override(&self, url: &str, title: Option<&str>) {
        self.override_source(url).await;
        self.emit(SessionEvent::OverrideStarted {
            title: title.map(str::to_string),
        });
        self.start_playback(Some(url.to_string())).await;
    }

    /// Refresh the persisted elapsed position from the output. Called on an
    /// interval while playback runs.
    pub async fn sync_position(&self) {
        let mut inner = self.inner.write().await;
        if inner.is_playing {
            let position = self.output.position_secs();
            if position.is_finite() && position >= 0.0 {
                inner.elapsed_secs = position;
                self.persist_resume(&inner).await;
            }
        }
    }

    pub async fn is_playing(&self) -> bool {
        self.inner.read().await.is_playing
    }

    pub async fn current_index(&self) -> usize {
        self.inner.read().await.position
    }

    pub async fn shuffle_enabled(&self) -> bool {
        self.inner.read().await.shuffle_enabled
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.read().await;
        let track = if self.catalog.is_empty() {
            None
        } else {
            let index = Self::resolve_index(&inner, self.catalog.len(), inner.position);
            self.catalog.get(index).cloned()
        };

        SessionSnapshot {
            position: inner.position,
            elapsed_secs: inner.elapsed_secs,
            is_playing: inner.is_playing,
            shuffle_enabled: inner.shuffle_enabled,
            volume: inner.volume,
            track,
        }
    }

    /// Load a track into the output at the stored elapsed position without
    /// requesting playback.
    async fn load_track(&self, index: usize) {
        let len = self.catalog.len();
        if len == 0 {
            return;
        }

        let mut inner = self.inner.write().await;
        let logical = index % len;
        let catalog_index = Self::resolve_index(&inner, len, logical);
        let Some(track) = self.catalog.get(catalog_index) else {
            return;
        };

        self.output.set_source(&track.source_url);
        self.output.seek_to(inner.elapsed_secs);
        inner.position = logical;
        inner.loaded = true;
        self.persist_resume(&inner).await;
        self.emit(SessionEvent::TrackChanged {
            index: catalog_index,
            title: track.title.clone(),
        });
    }

    /// Issue the asynchronous start request and settle state by its outcome.
    async fn start_playback(&self, expected_source: Option<String>) {
        let outcome = self.output.request_play().await;
        let mut inner = self.inner.write().await;

        match outcome {
            PlayOutcome::Started => {
                // A later play() may have superseded this request while it
                // was in flight; only the most recent requested track may
                // persist a playing status.
                let actual = self.output.current_source();
                let superseded = match (&expected_source, &actual) {
                    (Some(expected), Some(current)) => expected != current,
                    (Some(_), None) => true,
                    (None, _) => false,
                };

                if !superseded {
                    inner.is_playing = true;
                    if inner.pending_play {
                        inner.pending_play = false;
                        self.durable.set(keys::PENDING_PLAY, bool_value(false)).await;
                    }
                    self.emit(SessionEvent::PlaybackResumed);
                }
            }
            PlayOutcome::Deferred { reason } => {
                debug!("Playback start deferred: {reason}");
                inner.is_playing = false;
                if !inner.pending_play {
                    inner.pending_play = true;
                    self.durable.set(keys::PENDING_PLAY, bool_value(true)).await;
                    self.notifier.notify(PLAYBACK_BLOCKED_PROMPT, NoteKind::Info);
                }
            }
            PlayOutcome::Failed { message } => {
                warn!("Playback start failed: {message}");
                inner.is_playing = false;
                self.notifier.notify(TRACK_ERROR_MESSAGE, NoteKind::Error);
            }
        }

        self.persist_resume(&inner).await;
    }

    fn resolve_index(inner: &SessionInner, len: usize, logical: usize) -> usize {
        if inner.shuffle_enabled {
            if let Some(order) = &inner.shuffle_order {
                if let Some(index) = order.resolve(logical) {
                    return index;
                }
            }
        }
        logical % len
    }

    async fn restore_resume_state(&self) -> ResumeState {
        let Some(raw) = self.session_store.get(keys::RESUME_STATE).await else {
            return ResumeState::default();
        };

        match serde_json::from_str::<ResumeState>(&raw) {
            Ok(state)
                if state.elapsed_secs.is_finite()
                    && state.elapsed_secs >= 0.0
                    && (self.catalog.is_empty() || state.position < self.catalog.len()) =>
            {
                state
            }
            Ok(_) | Err(_) => {
                warn!("Discarding unusable stored playback state");
                ResumeState::default()
            }
        }
    }

    async fn restore_volume(&self) -> f32 {
        match self
            .durable
            .get(keys::VOLUME)
            .await
            .and_then(|raw| raw.parse::<f32>().ok())
        {
            Some(volume) if (0.0..=1.0).contains(&volume) => volume,
            _ => self.default_volume,
        }
    }

    async fn durable_flag(&self, key: &str) -> bool {
        self.durable.get(key).await.as_deref() == Some("true")
    }

    async fn persist_resume(&self, inner: &SessionInner) {
        let state = ResumeState {
            position: inner.position,
            elapsed_secs: inner.elapsed_secs,
            is_playing: inner.is_playing,
        };
        match serde_json::to_string(&state) {
            Ok(encoded) => self.session_store.set(keys::RESUME_STATE, &encoded).await,
            Err(e) => warn!("Failed to encode playback state: {e}"),
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}

const fn bool_value(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::testkit::{sample_catalog, CapturingNotifier, FakeAudioOutput};

    struct Harness {
        session: Arc<PlaybackSession>,
        output: Arc<FakeAudioOutput>,
        durable: Arc<MemoryStore>,
        session_store: Arc<MemoryStore>,
        notifier: Arc<CapturingNotifier>,
    }

    fn harness(tracks: usize) -> Harness {
        let output = FakeAudioOutput::new();
        let durable = Arc::new(MemoryStore::new());
        let session_store = Arc::new(MemoryStore::new());
        let notifier = CapturingNotifier::new();

        let session = PlaybackSession::new(
            sample_catalog(tracks),
            Arc::clone(&output) as Arc<dyn AudioOutput>,
            Arc::clone(&durable) as Arc<dyn StateStore>,
            Arc::clone(&session_store) as Arc<dyn StateStore>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            0.6,
        );

        Harness {
            session,
            output,
            durable,
            session_store,
            notifier,
        }
    }

    #[tokio::test]
    async fn test_empty_catalog_transport_is_inert() {
        let h = harness(0);
        h.session.initialize().await;
        h.session.play(0, true).await;
        h.session.play_next().await;
        h.session.play_previous().await;
        h.session.toggle_play_pause().await;

        assert_eq!(h.output.play_requests(), 0);
        assert_eq!(h.output.source(), None);
        assert!(!h.session.is_playing().await);
    }

    #[tokio::test]
    async fn test_play_loads_resolved_track_and_starts() {
        let h = harness(3);
        h.session.play(1, true).await;

        assert_eq!(
            h.output.source().as_deref(),
            Some("http://games.example/music/track-2.mp3")
        );
        assert_eq!(h.output.play_requests(), 1);
        assert!(h.session.is_playing().await);
        assert_eq!(h.session.current_index().await, 1);
    }

    #[tokio::test]
    async fn test_play_wraps_modulo_catalog_length() {
        let h = harness(3);
        h.session.play(7, true).await;
        assert_eq!(h.session.current_index().await, 1);
    }

    #[tokio::test]
    async fn test_play_next_cycles_back_to_start() {
        let h = harness(4);
        h.session.play(2, true).await;

        for _ in 0..4 {
            h.session.play_next().await;
        }
        assert_eq!(h.session.current_index().await, 2);
    }

    #[tokio::test]
    async fn test_play_previous_wraps_before_start() {
        let h = harness(3);
        h.session.play(0, true).await;
        h.session.play_previous().await;
        assert_eq!(h.session.current_index().await, 2);
    }

    #[tokio::test]
    async fn test_toggle_from_nothing_loaded_plays_first_track() {
        let h = harness(3);
        h.session.toggle_play_pause().await;

        assert_eq!(
            h.output.source().as_deref(),
            Some("http://games.example/music/track-1.mp3")
        );
        assert!(h.session.is_playing().await);
    }

    #[tokio::test]
    async fn test_toggle_pauses_and_resumes() {
        let h = harness(2);
        h.session.play(0, true).await;
        assert!(h.session.is_playing().await);

        h.session.toggle_play_pause().await;
        assert!(!h.session.is_playing().await);
        assert_eq!(h.output.pauses(), 1);

        h.session.toggle_play_pause().await;
        assert!(h.session.is_playing().await);
    }

    #[tokio::test]
    async fn test_shuffle_resolution_stays_in_range() {
        let h = harness(5);
        h.session.initialize().await;
        h.session.toggle_shuffle().await;

        for logical in 0..5 {
            h.session.play(logical, true).await;
            let snapshot = h.session.snapshot().await;
            assert!(matches!(snapshot.track, Some(ref t) if t.index < 5));
        }
    }

    #[tokio::test]
    async fn test_shuffle_toggled_off_restores_direct_indexing() {
        let h = harness(4);
        h.session.toggle_shuffle().await;
        h.session.toggle_shuffle().await;

        h.session.play(3, true).await;
        assert_eq!(
            h.output.source().as_deref(),
            Some("http://games.example/music/track-4.mp3")
        );
        assert_eq!(
            h.durable.get(keys::SHUFFLE_ENABLED).await.as_deref(),
            Some("false")
        );
    }

    #[tokio::test]
    async fn test_initialize_resumes_stored_position_without_reset() {
        let h = harness(5);
        h.session_store
            .set(
                keys::RESUME_STATE,
                r#"{"position":2,"elapsed_secs":37.5,"is_playing":true}"#,
            )
            .await;

        h.session.initialize().await;

        assert_eq!(
            h.output.source().as_deref(),
            Some("http://games.example/music/track-3.mp3")
        );
        assert_eq!(h.output.play_requests(), 1);
        assert!(h.session.is_playing().await);

        // The stored elapsed time survives: the seek targets 37.5, not 0
        assert_eq!(h.output.seeks().last().copied(), Some(37.5));
    }

    #[tokio::test]
    async fn test_initialize_with_stored_paused_state_loads_without_playing() {
        let h = harness(5);
        h.session_store
            .set(
                keys::RESUME_STATE,
                r#"{"position":1,"elapsed_secs":10.0,"is_playing":false}"#,
            )
            .await;

        h.session.initialize().await;

        assert_eq!(
            h.output.source().as_deref(),
            Some("http://games.example/music/track-2.mp3")
        );
        assert_eq!(h.output.play_requests(), 0);
        assert!(!h.session.is_playing().await);
    }

    #[tokio::test]
    async fn test_initialize_tolerates_corrupt_resume_state() {
        let h = harness(3);
        h.session_store.set(keys::RESUME_STATE, "garbage").await;

        h.session.initialize().await;

        let snapshot = h.session.snapshot().await;
        assert_eq!(snapshot.position, 0);
        assert!((snapshot.elapsed_secs - 0.0).abs() < f64::EPSILON);
        assert!(!snapshot.is_playing);
    }

    #[tokio::test]
    async fn test_initialize_discards_position_beyond_catalog() {
        let h = harness(2);
        h.session_store
            .set(
                keys::RESUME_STATE,
                r#"{"position":9,"elapsed_secs":5.0,"is_playing":false}"#,
            )
            .await;

        h.session.initialize().await;
        assert_eq!(h.session.current_index().await, 0);
    }

    #[tokio::test]
    async fn test_initialize_restores_durable_volume() {
        let h = harness(2);
        h.durable.set(keys::VOLUME, "0.25").await;

        h.session.initialize().await;
        assert!((h.output.volume() - 0.25).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_deferred_start_records_pending_retry_and_prompts_once() {
        let h = harness(3);
        h.output.set_next_outcome(PlayOutcome::Deferred {
            reason: "blocked".into(),
        });

        h.session.play(0, true).await;

        assert!(!h.session.is_playing().await);
        assert_eq!(
            h.durable.get(keys::PENDING_PLAY).await.as_deref(),
            Some("true")
        );
        assert_eq!(h.notifier.count(), 1);

        // Still deferred: no second prompt while the retry is pending
        h.session.play(1, true).await;
        assert_eq!(h.notifier.count(), 1);

        // The next successful user gesture clears the pending flag
        h.output.set_next_outcome(PlayOutcome::Started);
        h.session.toggle_play_pause().await;
        assert!(h.session.is_playing().await);
        assert_eq!(
            h.durable.get(keys::PENDING_PLAY).await.as_deref(),
            Some("false")
        );
    }

    #[tokio::test]
    async fn test_failed_start_notifies_and_stays_paused() {
        let h = harness(2);
        h.output.set_next_outcome(PlayOutcome::Failed {
            message: "decode error".into(),
        });

        h.session.play(0, true).await;

        assert!(!h.session.is_playing().await);
        assert_eq!(h.notifier.count(), 1);
        assert_eq!(
            h.durable.get(keys::PENDING_PLAY).await,
            None,
            "a hard failure is not a pending retry"
        );
    }

    #[tokio::test]
    async fn test_superseded_start_does_not_mark_playing() {
        let h = harness(3);
        // While the start request is in flight, a later call repoints the
        // output at a different track
        h.output
            .set_source_after_play("http://games.example/music/track-3.mp3");

        h.session.play(0, true).await;
        assert!(!h.session.is_playing().await);
    }

    #[tokio::test]
    async fn test_ended_event_advances_and_wraps() {
        let h = harness(2);
        h.session.play(1, true).await;

        h.session.handle_output_event(AudioEvent::Ended).await;

        assert_eq!(h.session.current_index().await, 0);
        assert_eq!(
            h.output.source().as_deref(),
            Some("http://games.example/music/track-1.mp3")
        );
        assert!(h.session.is_playing().await);
    }

    #[tokio::test]
    async fn test_error_event_notifies_and_pauses() {
        let h = harness(2);
        h.session.play(0, true).await;

        h.session
            .handle_output_event(AudioEvent::Error {
                message: "unsupported format".into(),
            })
            .await;

        assert!(!h.session.is_playing().await);
        assert_eq!(h.notifier.count(), 1);
    }

    #[tokio::test]
    async fn test_play_pause_events_settle_state() {
        let h = harness(2);
        h.session.play(0, true).await;

        h.session.handle_output_event(AudioEvent::Paused).await;
        assert!(!h.session.is_playing().await);

        h.session.handle_output_event(AudioEvent::Played).await;
        assert!(h.session.is_playing().await);
    }

    #[tokio::test]
    async fn test_set_volume_clamps_and_persists() {
        let h = harness(2);
        h.session.set_volume(1.7).await;

        assert!((h.output.volume() - 1.0).abs() < f32::EPSILON);
        assert_eq!(h.durable.get(keys::VOLUME).await.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_sync_position_persists_elapsed_while_playing() {
        let h = harness(2);
        h.session.play(0, true).await;
        h.output.set_position(12.25);

        h.session.sync_position().await;

        let snapshot = h.session.snapshot().await;
        assert!((snapshot.elapsed_secs - 12.25).abs() < f64::EPSILON);
        let stored = h.session_store.get(keys::RESUME_STATE).await;
        assert!(matches!(stored, Some(ref raw) if raw.contains("12.25")));
    }

    #[tokio::test]
    async fn test_transitions_are_published_to_subscribers() {
        let h = harness(3);
        let mut events = h.session.subscribe();

        h.session.play(1, true).await;
        h.session.toggle_shuffle().await;

        assert!(matches!(
            events.recv().await,
            Ok(SessionEvent::TrackChanged { index: 1, .. })
        ));
        assert!(matches!(events.recv().await, Ok(SessionEvent::PlaybackResumed)));
        assert!(matches!(
            events.recv().await,
            Ok(SessionEvent::ShuffleToggled { enabled: true })
        ));
    }

    #[tokio::test]
    async fn test_override_without_start_leaves_playback_paused() {
        let h = harness(2);
        h.session
            .override_source("http://games.example/music/announcement.mp3")
            .await;

        assert_eq!(
            h.output.source().as_deref(),
            Some("http://games.example/music/announcement.mp3")
        );
        assert_eq!(h.output.play_requests(), 0);
        assert!(!h.session.is_playing().await);
    }

    #[tokio::test]
    async fn test_start_override_plays_out_of_band_track() {
        let h = harness(2);
        h.session.play(1, true).await;
        let before = h.session.current_index().await;

        h.session
            .start_override("http://games.example/music/announcement.mp3", Some("Event"))
            .await;

        assert!(h.session.is_playing().await);
        assert_eq!(
            h.output.source().as_deref(),
            Some("http://games.example/music/announcement.mp3")
        );
        // The catalog position is deliberately left alone
        assert_eq!(h.session.current_index().await, before);
    }
}
