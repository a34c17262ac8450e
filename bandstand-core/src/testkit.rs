//! In-memory fakes for exercising the engine without a real audio backend.
//!
//! Compiled for this crate's own tests and, behind the `test-util` feature,
//! for downstream crates' tests.

use crate::notify::{NoteKind, Notifier};
use crate::output::{AudioEvent, AudioOutput, PlayOutcome};
use crate::track::{Catalog, Track};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Build a small catalog of numbered tracks for tests.
#[must_use]
pub fn sample_catalog(len: usize) -> Catalog {
    let tracks = (0..len)
        .map(|index| {
            let number = index + 1;
            Track::new(
                index,
                format!("Track {number}"),
                format!("http://games.example/music/track-{number}.mp3"),
            )
        })
        .collect();
    Catalog::new(tracks)
}

/// Scriptable audio output recording every interaction.
pub struct FakeAudioOutput {
    source: Mutex<Option<String>>,
    playing: Mutex<bool>,
    position: Mutex<f64>,
    volume: Mutex<f32>,
    next_outcome: Mutex<PlayOutcome>,
    source_after_play: Mutex<Option<String>>,
    seeks: Mutex<Vec<f64>>,
    play_requests: AtomicUsize,
    pauses: AtomicUsize,
    event_tx: broadcast::Sender<AudioEvent>,
}

impl FakeAudioOutput {
    #[must_use]
    pub fn new() -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(16);
        Arc::new(Self {
            source: Mutex::new(None),
            playing: Mutex::new(false),
            position: Mutex::new(0.0),
            volume: Mutex::new(1.0),
            next_outcome: Mutex::new(PlayOutcome::Started),
            source_after_play: Mutex::new(None),
            seeks: Mutex::new(Vec::new()),
            play_requests: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            event_tx,
        })
    }

    /// Configure the outcome every subsequent start request returns.
    pub fn set_next_outcome(&self, outcome: PlayOutcome) {
        if let Ok(mut next) = self.next_outcome.lock() {
            *next = outcome;
        }
    }

    /// Simulate a superseding source change landing while a start request
    /// is in flight.
    pub fn set_source_after_play(&self, url: &str) {
        if let Ok(mut pending) = self.source_after_play.lock() {
            *pending = Some(url.to_string());
        }
    }

    pub fn set_position(&self, seconds: f64) {
        if let Ok(mut position) = self.position.lock() {
            *position = seconds;
        }
    }

    /// Publish a settled transition to subscribers.
    pub fn emit(&self, event: AudioEvent) {
        let _ = self.event_tx.send(event);
    }

    #[must_use]
    pub fn source(&self) -> Option<String> {
        self.source.lock().ok().and_then(|source| source.clone())
    }

    #[must_use]
    pub fn seeks(&self) -> Vec<f64> {
        self.seeks.lock().map(|seeks| seeks.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn play_requests(&self) -> usize {
        self.play_requests.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        self.volume.lock().map(|volume| *volume).unwrap_or(1.0)
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing.lock().map(|playing| *playing).unwrap_or(false)
    }
}

#[async_trait]
impl AudioOutput for FakeAudioOutput {
    fn set_source(&self, url: &str) {
        if let Ok(mut source) = self.source.lock() {
            *source = Some(url.to_string());
        }
    }

    fn current_source(&self) -> Option<String> {
        self.source()
    }

    fn seek_to(&self, seconds: f64) {
        if let Ok(mut seeks) = self.seeks.lock() {
            seeks.push(seconds);
        }
        self.set_position(seconds);
    }

    fn position_secs(&self) -> f64 {
        self.position.lock().map(|position| *position).unwrap_or(0.0)
    }

    async fn request_play(&self) -> PlayOutcome {
        self.play_requests.fetch_add(1, Ordering::SeqCst);

        if let Ok(mut pending) = self.source_after_play.lock() {
            if let Some(url) = pending.take() {
                if let Ok(mut source) = self.source.lock() {
                    *source = Some(url);
                }
            }
        }

        let outcome = self
            .next_outcome
            .lock()
            .map(|outcome| outcome.clone())
            .unwrap_or(PlayOutcome::Started);

        if let Ok(mut playing) = self.playing.lock() {
            *playing = matches!(outcome, PlayOutcome::Started);
        }

        outcome
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut playing) = self.playing.lock() {
            *playing = false;
        }
    }

    fn set_volume(&self, volume: f32) {
        if let Ok(mut current) = self.volume.lock() {
            *current = volume;
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AudioEvent> {
        self.event_tx.subscribe()
    }
}

/// Notifier that captures every message for assertion.
#[derive(Default)]
pub struct CapturingNotifier {
    notes: Mutex<Vec<(String, NoteKind)>>,
}

impl CapturingNotifier {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn notes(&self) -> Vec<(String, NoteKind)> {
        self.notes.lock().map(|notes| notes.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.notes.lock().map(|notes| notes.len()).unwrap_or(0)
    }
}

impl Notifier for CapturingNotifier {
    fn notify(&self, message: &str, kind: NoteKind) {
        if let Ok(mut notes) = self.notes.lock() {
            notes.push((message.to_string(), kind));
        }
    }
}
