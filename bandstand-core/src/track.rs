//! Track and catalog types.

/// A single playable track.
///
/// Immutable once loaded; the catalog owns the full set for the lifetime of
/// a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Position of the track within the catalog
    pub index: usize,
    /// Display title, derived from the filename
    pub title: String,
    /// Absolute URL the audio bytes are served from
    pub source_url: String,
}

impl Track {
    /// Create a new track
    pub fn new(index: usize, title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            source_url: source_url.into(),
        }
    }
}

/// Derive a display title from a filename by stripping the extension.
///
/// Filenames without an extension are used as-is.
#[must_use]
pub fn title_from_filename(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => filename.to_string(),
    }
}

/// The ordered list of playable tracks for the current session.
///
/// Built once by the catalog loader and read-only thereafter. May be empty,
/// in which case no playback is possible.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: Vec<Track>,
}

impl Catalog {
    #[must_use]
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Track> {
        self.tracks.iter()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Track;
    type IntoIter = std::slice::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_strips_extension() {
        assert_eq!(title_from_filename("midnight-drive.mp3"), "midnight-drive");
        assert_eq!(title_from_filename("01 - Opening Theme.ogg"), "01 - Opening Theme");
    }

    #[test]
    fn test_title_keeps_inner_dots() {
        assert_eq!(title_from_filename("v1.2-theme.mp3"), "v1.2-theme");
    }

    #[test]
    fn test_title_without_extension() {
        assert_eq!(title_from_filename("untitled"), "untitled");
    }

    #[test]
    fn test_title_of_dotfile() {
        // A leading dot is not an extension separator
        assert_eq!(title_from_filename(".hidden"), ".hidden");
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = Catalog::new(vec![
            Track::new(0, "a", "http://host/music/a.mp3"),
            Track::new(1, "b", "http://host/music/b.mp3"),
        ]);
        assert_eq!(catalog.len(), 2);
        assert!(!catalog.is_empty());
        assert_eq!(catalog.get(1).map(|t| t.title.as_str()), Some("b"));
        assert!(catalog.get(2).is_none());
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = Catalog::default();
        assert!(catalog.is_empty());
        assert!(catalog.get(0).is_none());
    }
}
