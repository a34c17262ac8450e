//! One-time durable opt-in for remotely started audio.
//!
//! Starting sound without a user gesture can surprise people, so broadcast
//! playback stays muted until the user enables audio once. Pausing never
//! needs consent. Once granted, the flag is never asked for again.

use bandstand_core::storage::{keys, StateStore};

/// Whether the user has opted in to remotely started audio.
pub async fn granted(store: &dyn StateStore) -> bool {
    store.get(keys::AUDIO_CONSENT).await.as_deref() == Some("true")
}

/// Record the one-time opt-in.
pub async fn grant(store: &dyn StateStore) {
    store.set(keys::AUDIO_CONSENT, "true").await;
}
