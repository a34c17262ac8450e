//! The audio output seam.
//!
//! Exactly one output exists per process and every component operates on the
//! same shared handle. Starting playback is modeled as a fallible,
//! asynchronous, best-effort request: the platform may refuse to start audio,
//! and that refusal is an outcome to recover from, not an error to raise.

use async_trait::async_trait;
use tokio::sync::broadcast;

/// Outcome of an asynchronous playback-start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Audio is (or is about to be) audible.
    Started,
    /// The platform refused to start playback right now; retry on the next
    /// user gesture.
    Deferred { reason: String },
    /// The track cannot be played at all (bad source, decode failure).
    Failed { message: String },
}

/// Events emitted by the audio output as transitions settle.
#[derive(Debug, Clone)]
pub enum AudioEvent {
    /// Playback actually began or resumed.
    Played,
    /// Playback was paused.
    Paused,
    /// The current track ran to completion.
    Ended,
    /// A runtime error occurred (decode failure, unsupported format).
    Error { message: String },
}

/// Handle to the single shared audio output.
///
/// Setters are fire-and-forget; [`AudioOutput::request_play`] is the only
/// operation whose result callers must inspect. Implementations publish
/// settled transitions through [`AudioOutput::subscribe`].
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Point the output at a new source URL. Does not start playback.
    fn set_source(&self, url: &str);

    /// The URL the output is currently pointed at, if any.
    fn current_source(&self) -> Option<String>;

    /// Seek to an absolute position in seconds.
    fn seek_to(&self, seconds: f64);

    /// Current playback position in seconds.
    fn position_secs(&self) -> f64;

    /// Ask the platform to begin playback of the current source.
    async fn request_play(&self) -> PlayOutcome;

    /// Pause playback. Always permitted.
    fn pause(&self);

    /// Set the output volume, in `[0, 1]`.
    fn set_volume(&self, volume: f32);

    /// Subscribe to settled output transitions.
    fn subscribe(&self) -> broadcast::Receiver<AudioEvent>;
}
