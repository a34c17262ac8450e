//! Polling loop for operator broadcast commands.

use crate::command::{BroadcastAction, BroadcastCommand};
use crate::consent;
use crate::error::{BroadcastError, Result};
use bandstand_core::storage::keys;
use bandstand_core::{BroadcastConfig, NoteKind, Notifier, PlaybackSession, StateStore};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Prompt surfaced when a broadcast track arrives before the user has
/// enabled remote audio.
const CONSENT_PROMPT: &str =
    "An announcement track is ready - enable audio once to hear broadcasts.";

/// Connect timeout for poll requests (seconds)
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Polls the operator-published command document and applies play/pause
/// directives to the playback session.
///
/// Fetch failures and malformed bodies are "no update": nothing is surfaced
/// and the next tick simply tries again. Commands are deduplicated by their
/// timestamp token, persisted session-scoped, so a document left in place
/// is applied once rather than on every tick.
pub struct BroadcastPoller {
    client: reqwest::Client,
    command_url: String,
    poll_interval: Duration,
    session: Arc<PlaybackSession>,
    durable: Arc<dyn StateStore>,
    session_store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    cancel_token: CancellationToken,
}

impl BroadcastPoller {
    /// Create a new poller.
    ///
    /// # Arguments
    /// * `config` - The broadcast section of the config
    /// * `session` - Playback session the commands are applied to
    /// * `durable` - Durable store holding the consent flag
    /// * `session_store` - Session store holding the last-applied token
    /// * `notifier` - Sink for the consent prompt
    /// * `cancel_token` - Optional external cancellation token for graceful shutdown
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        config: &BroadcastConfig,
        session: Arc<PlaybackSession>,
        durable: Arc<dyn StateStore>,
        session_store: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        cancel_token: Option<CancellationToken>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            command_url: config.command_url.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            session,
            durable,
            session_store,
            notifier,
            cancel_token: cancel_token.unwrap_or_default(),
        })
    }

    /// Start polling in a background task
    #[must_use]
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Poll until cancelled.
    pub async fn run(&self) {
        info!(
            "Starting broadcast listener, polling every {:?}",
            self.poll_interval
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("Broadcast listener shutting down");
                    break;
                }
                () = tokio::time::sleep(self.poll_interval) => {
                    self.poll_once().await;
                }
            }
        }
    }

    /// Get the cancellation token for this poller.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Signal the poller to stop.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    /// Record the user's one-time opt-in to remotely started audio.
    pub async fn grant_consent(&self) {
        consent::grant(self.durable.as_ref()).await;
    }

    async fn poll_once(&self) {
        match self.fetch_command().await {
            Ok(command) => self.apply_command(command).await,
            // Unreachable or malformed is indistinguishable from "nothing
            // published"; the next tick retries anyway
            Err(e) => debug!("No broadcast update: {e}"),
        }
    }

    async fn fetch_command(&self) -> Result<BroadcastCommand> {
        // Cache-defeating query parameter, so intermediaries cannot pin an
        // old command document
        let buster = Utc::now().timestamp_millis();
        let url = format!("{}?_={buster}", self.command_url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BroadcastError::Status {
                status: response.status(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Apply a fetched command, once per distinct timestamp token.
    pub async fn apply_command(&self, command: BroadcastCommand) {
        let last = self.session_store.get(keys::LAST_BROADCAST_TOKEN).await;
        if last.as_deref() == Some(command.timestamp.as_str()) {
            debug!("Broadcast command {} already applied", command.timestamp);
            return;
        }
        self.session_store
            .set(keys::LAST_BROADCAST_TOKEN, &command.timestamp)
            .await;

        match command.action {
            BroadcastAction::Play => {
                let Some(url) = command.track_url else {
                    warn!("Broadcast play command without a track URL; ignoring");
                    return;
                };

                if consent::granted(self.durable.as_ref()).await {
                    info!("Applying broadcast play: {url}");
                    self.session
                        .start_override(&url, command.title.as_deref())
                        .await;
                } else {
                    // Load the track so an opt-in can start it, but never
                    // surprise the user with sound
                    info!("Broadcast track held for consent: {url}");
                    self.session.override_source(&url).await;
                    self.notifier.notify(CONSENT_PROMPT, NoteKind::Info);
                }
            }
            BroadcastAction::Pause => {
                info!("Applying broadcast pause");
                self.session.pause().await;
            }
        }
    }
}
