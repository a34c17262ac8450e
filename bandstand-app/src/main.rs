mod audio;
mod console;

use crate::audio::RodioOutput;
use bandstand_broadcast::BroadcastPoller;
use bandstand_core::{
    AudioOutput, CatalogLoader, Config, CoreError, MemoryStore, Notifier, PlaybackSession,
    SessionEvent, SqliteStore, StateStore, StoredNotifier,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() {
    init_tracing();

    let config = match Config::load_or_create() {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            // First run: the template was just written; defaults are usable
            info!(
                "Created config template at {}; edit it if the defaults don't fit",
                path.display()
            );
            Config::default()
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    // Durable scope survives restarts; the session scope dies with us
    let (durable, durable_db): (Arc<dyn StateStore>, Option<Arc<SqliteStore>>) =
        match SqliteStore::new().await {
            Ok(store) => {
                let store = Arc::new(store);
                (Arc::clone(&store) as Arc<dyn StateStore>, Some(store))
            }
            Err(e) => {
                warn!("Durable state unavailable ({e}); settings will not survive restarts");
                (Arc::new(MemoryStore::new()), None)
            }
        };
    let session_store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let notifier = Arc::new(StoredNotifier::new(Arc::clone(&durable)));

    let output = match RodioOutput::new() {
        Ok(output) => output,
        Err(e) => {
            error!("Failed to create audio output: {e}");
            std::process::exit(1);
        }
    };

    let loader = match CatalogLoader::new(&config.catalog) {
        Ok(loader) => loader,
        Err(e) => {
            error!("Failed to create catalog loader: {e}");
            std::process::exit(1);
        }
    };
    let catalog = loader.load().await;
    info!("Catalog ready with {} track(s)", catalog.len());

    let session = PlaybackSession::new(
        catalog,
        Arc::clone(&output) as Arc<dyn AudioOutput>,
        Arc::clone(&durable),
        Arc::clone(&session_store),
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        config.audio.default_volume,
    );
    session.initialize().await;

    // Shared cancellation for all background loops
    let cancel_token = CancellationToken::new();
    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        warn!("Could not install Ctrl+C handler: {e}");
    }

    // Feed settled output transitions back into the session
    let forwarder = {
        let mut events = output.subscribe();
        let session = Arc::clone(&session);
        let cancel = cancel_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(event) => session.handle_output_event(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Dropped {skipped} audio event(s)");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        })
    };

    // Surface session transitions on the console, the way the page mirrors
    // them into its player UI
    let ui_bridge = {
        let mut events = session.subscribe();
        let cancel = cancel_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(SessionEvent::TrackChanged { title, .. }) => {
                            println!("Now playing: {title}");
                        }
                        Ok(SessionEvent::OverrideStarted { title }) => {
                            let title = title.unwrap_or_else(|| "announcement".to_string());
                            println!("Broadcast: {title}");
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Dropped {skipped} session event(s)");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        })
    };

    // Periodic position save, so a restart within the session resumes
    // mid-track
    let position_sync = {
        let session = Arc::clone(&session);
        let cancel = cancel_token.clone();
        let interval = Duration::from_secs(config.audio.position_save_interval_secs.max(1));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(interval) => session.sync_position().await,
                }
            }
        })
    };

    // Remote broadcast listener
    let poller = if config.broadcast.enabled {
        match BroadcastPoller::new(
            &config.broadcast,
            Arc::clone(&session),
            Arc::clone(&durable),
            Arc::clone(&session_store),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Some(cancel_token.clone()),
        ) {
            Ok(poller) => {
                let poller = Arc::new(poller);
                let _ = Arc::clone(&poller).start();
                Some(poller)
            }
            Err(e) => {
                warn!("Broadcast listener disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    console::run(Arc::clone(&session), poller, cancel_token.clone()).await;

    cancel_token.cancel();
    let _ = forwarder.await;
    let _ = ui_bridge.await;
    let _ = position_sync.await;

    if let Some(db) = durable_db {
        if let Err(e) = db.checkpoint().await {
            warn!("State checkpoint failed: {e}");
        }
    }
    info!("Goodbye");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
