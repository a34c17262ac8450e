//! Shuffle order generation and session persistence.

use crate::storage::{keys, StateStore};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// A permutation of catalog indices defining the randomized playback order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShuffleOrder(Vec<usize>);

impl ShuffleOrder {
    /// Produce a uniformly random permutation of `[0, len)` with an
    /// in-place Fisher-Yates shuffle.
    pub fn generate<R: Rng>(len: usize, rng: &mut R) -> Self {
        let mut order: Vec<usize> = (0..len).collect();
        for i in (1..len).rev() {
            let j = rng.gen_range(0..=i);
            order.swap(i, j);
        }
        Self(order)
    }

    /// Translate a logical position into a catalog index, wrapping modulo
    /// the permutation length. Returns `None` for an empty order.
    #[must_use]
    pub fn resolve(&self, logical: usize) -> Option<usize> {
        if self.0.is_empty() {
            return None;
        }
        self.0.get(logical % self.0.len()).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// A stored order is only usable if it is still a permutation of the
    /// current catalog: right length, every index present exactly once.
    #[must_use]
    pub fn is_permutation_of(&self, len: usize) -> bool {
        if self.0.len() != len {
            return false;
        }
        let mut seen = vec![false; len];
        for &index in &self.0 {
            match seen.get_mut(index) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }
}

/// Generates shuffle orders and keeps the current one in the session store,
/// so the order is stable across reloads within a session until shuffle is
/// toggled or the catalog changes.
pub struct ShuffleSequencer {
    store: Arc<dyn StateStore>,
}

impl ShuffleSequencer {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Generate a fresh permutation and persist it immediately.
    pub async fn generate(&self, len: usize) -> ShuffleOrder {
        let order = ShuffleOrder::generate(len, &mut rand::thread_rng());
        self.persist(&order).await;
        order
    }

    /// Restore the stored permutation for this session, if it is still
    /// valid for a catalog of `len` tracks.
    pub async fn restore(&self, len: usize) -> Option<ShuffleOrder> {
        let raw = self.store.get(keys::SHUFFLE_ORDER).await?;
        let order: ShuffleOrder = match serde_json::from_str(&raw) {
            Ok(order) => order,
            Err(e) => {
                warn!("Discarding unreadable stored shuffle order: {e}");
                return None;
            }
        };

        if !order.is_permutation_of(len) {
            debug!(
                "Stored shuffle order no longer matches catalog ({} vs {len} tracks)",
                order.len()
            );
            return None;
        }

        Some(order)
    }

    async fn persist(&self, order: &ShuffleOrder) {
        match serde_json::to_string(order) {
            Ok(encoded) => self.store.set(keys::SHUFFLE_ORDER, &encoded).await,
            Err(e) => warn!("Failed to encode shuffle order: {e}"),
        }
    }
}
