//! Track catalog loading.

use crate::config::CatalogConfig;
use crate::error::Result;
use crate::track::{title_from_filename, Catalog, Track};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connect timeout for the listing request (seconds)
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Response from the track listing endpoint
#[derive(Debug, Deserialize)]
struct ListingResponse {
    files: Vec<String>,
}

/// Resolves the ordered list of playable tracks.
///
/// The listing endpoint is best-effort: any failure (network, status, parse)
/// falls back to a deterministic built-in sequence so playback is never
/// blocked by an unavailable catalog source.
pub struct CatalogLoader {
    client: reqwest::Client,
    api_base: String,
    music_path: String,
    fallback_track_count: usize,
}

impl CatalogLoader {
    /// Create a new loader from the catalog section of the config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            music_path: config.music_path.trim_end_matches('/').to_string(),
            fallback_track_count: config.fallback_track_count,
        })
    }

    /// Load the catalog. Never raises; failures yield the built-in fallback
    /// sequence.
    pub async fn load(&self) -> Catalog {
        match self.fetch_listing().await {
            Ok(files) => {
                info!("Loaded track listing with {} file(s)", files.len());
                self.catalog_from_files(&files)
            }
            Err(e) => {
                warn!("Track listing unavailable, using fallback catalog: {e}");
                self.fallback_catalog()
            }
        }
    }

    async fn fetch_listing(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/music-files", self.api_base);
        debug!("Fetching track listing from {url}");

        let response = self.client.get(&url).send().await?;
        let response = response.error_for_status()?;
        let listing: ListingResponse = response.json().await?;

        Ok(listing.files)
    }

    /// Map listed filenames to tracks, titled by the file stem.
    fn catalog_from_files(&self, files: &[String]) -> Catalog {
        let tracks = files
            .iter()
            .enumerate()
            .map(|(index, filename)| {
                Track::new(
                    index,
                    title_from_filename(filename),
                    format!("{}{}/{filename}", self.api_base, self.music_path),
                )
            })
            .collect();
        Catalog::new(tracks)
    }

    /// Deterministic placeholder sequence used when the listing is
    /// unreachable.
    fn fallback_catalog(&self) -> Catalog {
        let tracks = (0..self.fallback_track_count)
            .map(|index| {
                let number = index + 1;
                Track::new(
                    index,
                    format!("Track {number}"),
                    format!("{}{}/track-{number}.mp3", self.api_base, self.music_path),
                )
            })
            .collect();
        Catalog::new(tracks)
    }
}
