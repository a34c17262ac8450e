//! Control surface bindings.
//!
//! Declarative glue translating typed UI control events into session
//! operations, so any concrete surface (a page button, a terminal key) only
//! has to produce events.

use crate::session::PlaybackSession;
use std::sync::Arc;

/// A control interaction from the user-facing surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    /// The play/pause toggle was activated.
    PlayPausePressed,
    /// The volume slider moved, value in `[0, 1]`.
    VolumeChanged(f32),
    /// The spacebar shortcut fired. Ignored while focus sits in a text
    /// input, where space must keep typing spaces.
    Spacebar { focus_in_input: bool },
}

/// Routes control events to the playback session.
pub struct ControlSurface {
    session: Arc<PlaybackSession>,
}

impl ControlSurface {
    #[must_use]
    pub fn new(session: Arc<PlaybackSession>) -> Self {
        Self { session }
    }

    pub async fn dispatch(&self, event: ControlEvent) {
        match event {
            ControlEvent::PlayPausePressed => self.session.toggle_play_pause().await,
            ControlEvent::VolumeChanged(volume) => self.session.set_volume(volume).await,
            ControlEvent::Spacebar { focus_in_input } => {
                if !focus_in_input {
                    self.session.toggle_play_pause().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notifier;
    use crate::output::AudioOutput;
    use crate::storage::{keys, MemoryStore, StateStore};
    use crate::testkit::{sample_catalog, CapturingNotifier, FakeAudioOutput};

    fn surface(tracks: usize) -> (ControlSurface, Arc<FakeAudioOutput>, Arc<MemoryStore>) {
        let output = FakeAudioOutput::new();
        let durable = Arc::new(MemoryStore::new());
        let session = PlaybackSession::new(
            sample_catalog(tracks),
            Arc::clone(&output) as Arc<dyn AudioOutput>,
            Arc::clone(&durable) as Arc<dyn StateStore>,
            Arc::new(MemoryStore::new()) as Arc<dyn StateStore>,
            CapturingNotifier::new() as Arc<dyn Notifier>,
            0.6,
        );
        (ControlSurface::new(session), output, durable)
    }

    #[tokio::test]
    async fn test_button_toggles_playback() {
        let (surface, output, _) = surface(2);
        surface.dispatch(ControlEvent::PlayPausePressed).await;
        assert_eq!(output.play_requests(), 1);
    }

    #[tokio::test]
    async fn test_spacebar_outside_input_toggles() {
        let (surface, output, _) = surface(2);
        surface
            .dispatch(ControlEvent::Spacebar {
                focus_in_input: false,
            })
            .await;
        assert_eq!(output.play_requests(), 1);
    }

    #[tokio::test]
    async fn test_spacebar_in_input_is_ignored() {
        let (surface, output, _) = surface(2);
        surface
            .dispatch(ControlEvent::Spacebar {
                focus_in_input: true,
            })
            .await;
        assert_eq!(output.play_requests(), 0);
    }

    #[tokio::test]
    async fn test_volume_event_applies_and_persists() {
        let (surface, output, durable) = surface(2);
        surface.dispatch(ControlEvent::VolumeChanged(0.3)).await;

        assert!((output.volume() - 0.3).abs() < f32::EPSILON);
        assert_eq!(durable.get(keys::VOLUME).await.as_deref(), Some("0.3"));
    }
}
