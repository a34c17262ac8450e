pub mod catalog;
pub mod config;
pub mod controls;
pub mod error;
pub mod notify;
pub mod output;
pub mod paths;
pub mod session;
pub mod shuffle;
pub mod storage;
pub mod track;

#[cfg(any(test, feature = "test-util"))]
pub mod testkit;

pub use catalog::CatalogLoader;
pub use config::{AudioConfig, BroadcastConfig, CatalogConfig, Config};
pub use controls::{ControlEvent, ControlSurface};
pub use error::CoreError;
pub use notify::{NoteKind, Notifier, StoredNote, StoredNotifier};
pub use output::{AudioEvent, AudioOutput, PlayOutcome};
pub use paths::{config_dir, config_path, state_db_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME, STATE_DB_FILE_NAME};
pub use session::{PlaybackSession, SessionEvent, SessionSnapshot};
pub use shuffle::{ShuffleOrder, ShuffleSequencer};
pub use storage::{keys, MemoryStore, SqliteStore, StateStore};
pub use track::{title_from_filename, Catalog, Track};

/// Re-export toml error type for config parsing error handling
pub use toml::de::Error as TomlParseError;
