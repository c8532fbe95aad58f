//! Discovery-marker persistence.
//!
//! A marker records "discovery already published" for a system id, so a
//! restart does not spam the broker with the same retained setup messages.
//! Deleting the marker forces re-publication on next start.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Default marker directory; tmpfs, so a reboot clears the markers.
pub const DEFAULT_MARKER_DIR: &str = "/dev/shm";

const MARKER_PREFIX: &str = "homa_init.";

/// Persisted "discovery already sent" facts, keyed by system id.
pub trait MarkerStore: Send + Sync {
    fn exists(&self, key: &str) -> bool;
    fn create(&self, key: &str) -> io::Result<()>;
}

/// Marker files named `homa_init.{key}` in one directory.
#[derive(Debug, Clone)]
pub struct FileMarkerStore {
    dir: PathBuf,
}

impl FileMarkerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn marker_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{MARKER_PREFIX}{key}"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for FileMarkerStore {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER_DIR)
    }
}

impl MarkerStore for FileMarkerStore {
    fn exists(&self, key: &str) -> bool {
        self.marker_path(key).is_file()
    }

    fn create(&self, key: &str) -> io::Result<()> {
        File::create(self.marker_path(key)).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMarkerStore::new(dir.path());

        assert!(!store.exists("123456-gas-meter"));
        store.create("123456-gas-meter").unwrap();
        assert!(store.exists("123456-gas-meter"));
        assert!(dir.path().join("homa_init.123456-gas-meter").is_file());

        // Other keys are unaffected.
        assert!(!store.exists("other-system"));
    }

    #[test]
    fn create_fails_in_missing_directory() {
        let store = FileMarkerStore::new("/nonexistent/gasbridge-markers");
        assert!(store.create("sys").is_err());
    }
}
