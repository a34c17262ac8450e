//! Rodio-backed audio output.
//!
//! The cpal output stream is not `Send`, so a dedicated thread owns the
//! stream and sink; the async side talks to it over a command channel and
//! reads position/playing state from shared atomics the thread keeps
//! refreshed. Track bytes are fetched over HTTP and kept in a small LRU so
//! replaying a track does not re-download it.

use async_trait::async_trait;
use bandstand_core::{AudioEvent, AudioOutput, PlayOutcome};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use lru::LruCache;
use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

/// How often the audio thread refreshes shared state and checks for track end
const TICK: Duration = Duration::from_millis(200);

/// How many fetched tracks to keep in memory
const CACHE_CAPACITY: usize = 16;

/// Timeout for fetching track bytes (seconds)
const FETCH_TIMEOUT_SECS: u64 = 60;

enum AudioCmd {
    Load {
        bytes: Vec<u8>,
        position_secs: f64,
        reply: oneshot::Sender<Result<(), String>>,
    },
    Resume {
        reply: oneshot::Sender<()>,
    },
    Pause,
    Seek(f64),
    SetVolume(f32),
}

/// State the audio thread keeps visible to the async side.
struct SharedAudio {
    position_ms: AtomicU64,
    seek_target_ms: AtomicU64,
    playing: AtomicBool,
    /// Whether the sink currently holds an undrained source
    active: AtomicBool,
    device_error: Mutex<Option<String>>,
    /// URL of the source currently sitting in the sink
    loaded_url: Mutex<Option<String>>,
    /// URL the output is pointed at (what a play request would load)
    current_url: Mutex<Option<String>>,
}

impl SharedAudio {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            position_ms: AtomicU64::new(0),
            seek_target_ms: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            active: AtomicBool::new(false),
            device_error: Mutex::new(None),
            loaded_url: Mutex::new(None),
            current_url: Mutex::new(None),
        })
    }

    fn device_error(&self) -> Option<String> {
        self.device_error.lock().ok().and_then(|e| e.clone())
    }

    fn set_device_error(&self, message: String) {
        if let Ok(mut error) = self.device_error.lock() {
            *error = Some(message);
        }
    }

    fn loaded_url(&self) -> Option<String> {
        self.loaded_url.lock().ok().and_then(|url| url.clone())
    }

    fn set_loaded_url(&self, url: Option<String>) {
        if let Ok(mut loaded) = self.loaded_url.lock() {
            *loaded = url;
        }
    }

    fn current_url(&self) -> Option<String> {
        self.current_url.lock().ok().and_then(|url| url.clone())
    }

    fn set_current_url(&self, url: Option<String>) {
        if let Ok(mut current) = self.current_url.lock() {
            *current = url;
        }
    }
}

/// The single shared audio output, backed by a rodio sink on its own thread.
pub struct RodioOutput {
    commands: Sender<AudioCmd>,
    shared: Arc<SharedAudio>,
    event_tx: broadcast::Sender<AudioEvent>,
    client: reqwest::Client,
    cache: Mutex<LruCache<String, Arc<Vec<u8>>>>,
}

impl RodioOutput {
    /// Spawn the audio thread and return the shared handle.
    ///
    /// A missing output device is not fatal here: play requests will come
    /// back deferred until one is available at the next process start.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Arc<Self>, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;

        let (commands, receiver) = crossbeam_channel::unbounded();
        let (event_tx, _) = broadcast::channel(64);
        let shared = SharedAudio::new();

        let thread_shared = Arc::clone(&shared);
        let thread_events = event_tx.clone();
        thread::spawn(move || run_audio_thread(&receiver, &thread_shared, &thread_events));

        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Ok(Arc::new(Self {
            commands,
            shared,
            event_tx,
            client,
            cache: Mutex::new(LruCache::new(capacity)),
        }))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, String> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(bytes) = cache.get(url) {
                debug!("Track cache hit: {url}");
                return Ok(bytes.as_ref().clone());
            }
        }

        debug!("Fetching track bytes: {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| e.to_string())?;
        let bytes = response.bytes().await.map_err(|e| e.to_string())?.to_vec();

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(url.to_string(), Arc::new(bytes.clone()));
        }
        Ok(bytes)
    }

    fn unavailable(&self) -> PlayOutcome {
        PlayOutcome::Deferred {
            reason: self
                .shared
                .device_error()
                .unwrap_or_else(|| "audio output unavailable".to_string()),
        }
    }
}

#[async_trait]
impl AudioOutput for RodioOutput {
    fn set_source(&self, url: &str) {
        self.shared.set_current_url(Some(url.to_string()));
    }

    fn current_source(&self) -> Option<String> {
        self.shared.current_url()
    }

    fn seek_to(&self, seconds: f64) {
        let target_ms = millis_from_secs(seconds);
        self.shared.seek_target_ms.store(target_ms, Ordering::SeqCst);

        if self.shared.active.load(Ordering::SeqCst) {
            let _ = self.commands.send(AudioCmd::Seek(seconds));
        } else {
            self.shared.position_ms.store(target_ms, Ordering::SeqCst);
        }
    }

    fn position_secs(&self) -> f64 {
        secs_from_millis(self.shared.position_ms.load(Ordering::SeqCst))
    }

    async fn request_play(&self) -> PlayOutcome {
        if let Some(reason) = self.shared.device_error() {
            return PlayOutcome::Deferred { reason };
        }

        let Some(url) = self.shared.current_url() else {
            return PlayOutcome::Failed {
                message: "no track selected".to_string(),
            };
        };

        // Same source still sitting in the sink: just resume it
        if self.shared.active.load(Ordering::SeqCst) && self.shared.loaded_url() == Some(url.clone())
        {
            let (reply, rx) = oneshot::channel();
            if self.commands.send(AudioCmd::Resume { reply }).is_err() {
                return self.unavailable();
            }
            return match rx.await {
                Ok(()) => PlayOutcome::Started,
                Err(_) => self.unavailable(),
            };
        }

        let bytes = match self.fetch_bytes(&url).await {
            Ok(bytes) => bytes,
            Err(message) => return PlayOutcome::Failed { message },
        };

        let position_secs = secs_from_millis(self.shared.seek_target_ms.load(Ordering::SeqCst));
        let (reply, rx) = oneshot::channel();
        let command = AudioCmd::Load {
            bytes,
            position_secs,
            reply,
        };
        if self.commands.send(command).is_err() {
            return self.unavailable();
        }

        match rx.await {
            Ok(Ok(())) => {
                self.shared.set_loaded_url(Some(url));
                PlayOutcome::Started
            }
            Ok(Err(message)) => PlayOutcome::Failed { message },
            Err(_) => self.unavailable(),
        }
    }

    fn pause(&self) {
        if self.commands.send(AudioCmd::Pause).is_err() {
            self.shared.playing.store(false, Ordering::SeqCst);
        }
    }

    fn set_volume(&self, volume: f32) {
        let _ = self.commands.send(AudioCmd::SetVolume(volume));
    }

    fn subscribe(&self) -> broadcast::Receiver<AudioEvent> {
        self.event_tx.subscribe()
    }
}

/// The audio thread: owns the output stream and sink, serves commands, and
/// watches for the sink draining to surface track-end.
fn run_audio_thread(
    commands: &Receiver<AudioCmd>,
    shared: &Arc<SharedAudio>,
    events: &broadcast::Sender<AudioEvent>,
) {
    let (stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            warn!("No audio output device: {e}");
            shared.set_device_error(format!("no audio output device: {e}"));
            return;
        }
    };
    // The stream must outlive the sink; dropping it silences everything
    let _stream = stream;

    let sink = match Sink::try_new(&handle) {
        Ok(sink) => sink,
        Err(e) => {
            warn!("Audio sink unavailable: {e}");
            shared.set_device_error(format!("audio sink unavailable: {e}"));
            return;
        }
    };

    info!("Audio output ready");

    loop {
        match commands.recv_timeout(TICK) {
            Ok(AudioCmd::Load {
                bytes,
                position_secs,
                reply,
            }) => {
                let result = match Decoder::new(Cursor::new(bytes)) {
                    Ok(source) => {
                        sink.clear();
                        sink.append(source);
                        if position_secs > 0.0 {
                            if let Err(e) =
                                sink.try_seek(Duration::from_secs_f64(position_secs.max(0.0)))
                            {
                                debug!("Seek after load failed: {e}");
                            }
                        }
                        sink.play();
                        shared.active.store(true, Ordering::SeqCst);
                        shared.playing.store(true, Ordering::SeqCst);
                        shared
                            .position_ms
                            .store(millis_from_secs(position_secs), Ordering::SeqCst);
                        let _ = events.send(AudioEvent::Played);
                        Ok(())
                    }
                    Err(e) => {
                        let message = format!("could not decode track: {e}");
                        let _ = events.send(AudioEvent::Error {
                            message: message.clone(),
                        });
                        Err(message)
                    }
                };
                let _ = reply.send(result);
            }
            Ok(AudioCmd::Resume { reply }) => {
                sink.play();
                shared.playing.store(!sink.empty(), Ordering::SeqCst);
                let _ = events.send(AudioEvent::Played);
                let _ = reply.send(());
            }
            Ok(AudioCmd::Pause) => {
                sink.pause();
                shared.playing.store(false, Ordering::SeqCst);
                let _ = events.send(AudioEvent::Paused);
            }
            Ok(AudioCmd::Seek(seconds)) => {
                match sink.try_seek(Duration::from_secs_f64(seconds.max(0.0))) {
                    Ok(()) => shared
                        .position_ms
                        .store(millis_from_secs(seconds), Ordering::SeqCst),
                    Err(e) => debug!("Seek failed: {e}"),
                }
            }
            Ok(AudioCmd::SetVolume(volume)) => {
                sink.set_volume(volume.clamp(0.0, 1.0));
            }
            Err(RecvTimeoutError::Timeout) => {
                if shared.active.load(Ordering::SeqCst) {
                    if sink.empty() {
                        // The source drained on its own: the track ended
                        shared.active.store(false, Ordering::SeqCst);
                        shared.playing.store(false, Ordering::SeqCst);
                        shared.position_ms.store(0, Ordering::SeqCst);
                        shared.seek_target_ms.store(0, Ordering::SeqCst);
                        shared.set_loaded_url(None);
                        let _ = events.send(AudioEvent::Ended);
                    } else {
                        let position = duration_to_millis(sink.get_pos());
                        shared.position_ms.store(position, Ordering::SeqCst);
                        shared
                            .playing
                            .store(!sink.is_paused(), Ordering::SeqCst);
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Audio command channel closed; stopping audio thread");
                break;
            }
        }
    }
}

fn millis_from_secs(seconds: f64) -> u64 {
    Duration::try_from_secs_f64(seconds.max(0.0)).map_or(0, duration_to_millis)
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn secs_from_millis(millis: u64) -> f64 {
    Duration::from_millis(millis).as_secs_f64()
}
