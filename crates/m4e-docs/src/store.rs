//! Document cache store.
//!
//! One file per document, named by its ETag, holding a record as described
//! in [`crate::record`]. The directory is resolved on first use; if it cannot
//! be created the store stays unavailable for its lifetime and every
//! operation reports a miss or failure.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use m4e_core::{app_data_dir, days_to_millis, now_millis};

use crate::document::Document;
use crate::error::RecordResult;
use crate::record::{
    HEADER_READ_LEN, LAST_FETCH_FIELD, RecordHeader, decode_record, encode_record, parse_header,
    timestamp_field,
};

/// Subfolder of the application data directory holding the cache.
pub const CACHE_DIR_NAME: &str = "doccache";

/// Default age in days after which unused records are purged.
pub const DEFAULT_EXPIRATION_DAYS: u64 = 30;

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Cache directory; the platform data directory when unset.
    pub directory: Option<PathBuf>,
    /// Default maximum age for purging, in days.
    pub expiration_days: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            expiration_days: DEFAULT_EXPIRATION_DAYS,
        }
    }
}

impl CacheConfig {
    /// Configuration with an explicit directory.
    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(directory.into()),
            ..Default::default()
        }
    }

    /// The directory the store will use.
    pub fn cache_dir(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| app_data_dir().join(CACHE_DIR_NAME))
    }
}

/// Outcome of a purge sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Expired records deleted.
    pub removed: usize,
    /// Records still in use.
    pub kept: usize,
    /// Files that could not be parsed or deleted, left in place.
    pub skipped: usize,
}

#[derive(Debug)]
enum StoreState {
    Uninitialized,
    Ready(PathBuf),
    Unavailable,
}

/// Content-addressed document cache in a local directory.
///
/// Not safe for several processes sharing one directory.
#[derive(Debug)]
pub struct DocumentStore {
    config: CacheConfig,
    state: StoreState,
}

impl DocumentStore {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: StoreState::Uninitialized,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns false once the directory could not be created.
    pub fn is_available(&self) -> bool {
        !matches!(self.state, StoreState::Unavailable)
    }

    fn directory(&mut self) -> Option<&Path> {
        if let StoreState::Uninitialized = self.state {
            let dir = self.config.cache_dir();
            self.state = match fs::create_dir_all(&dir) {
                Ok(()) => {
                    debug!(path = %dir.display(), "document cache ready");
                    StoreState::Ready(dir)
                }
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "document cache unavailable");
                    StoreState::Unavailable
                }
            };
        }

        match &self.state {
            StoreState::Ready(dir) => Some(dir.as_path()),
            _ => None,
        }
    }

    fn record_path(&mut self, etag: &str) -> Option<PathBuf> {
        if !is_safe_etag(etag) {
            warn!(etag = %etag, "refusing unsafe ETag as cache key");
            return None;
        }
        self.directory().map(|dir| dir.join(etag))
    }

    /// Looks up the document cached under `etag`.
    ///
    /// A hit refreshes the record's last fetch time in place. A record that
    /// fails to parse is deleted and reported as a miss.
    pub fn lookup(&mut self, document_id: &str, etag: &str) -> Option<Document> {
        self.lookup_at(document_id, etag, now_millis())
    }

    /// [`DocumentStore::lookup`] with an explicit clock.
    pub fn lookup_at(&mut self, document_id: &str, etag: &str, now_ms: u64) -> Option<Document> {
        let path = self.record_path(etag)?;
        if !path.is_file() {
            trace!(document_id, etag, "cache miss");
            return None;
        }

        match read_and_touch(&path, now_ms) {
            Ok(document) => {
                if document.id != document_id {
                    debug!(document_id, cached_id = %document.id, etag, "cached document has a different id");
                }
                trace!(document_id, etag, "cache hit");
                Some(document)
            }
            Err(e) if e.is_corrupt() => {
                debug!(etag, error = %e, "removing corrupt cache record");
                if let Err(e) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "could not remove corrupt cache record");
                }
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read cache record");
                None
            }
        }
    }

    /// Caches `document` under its ETag.
    ///
    /// Returns true without writing when a record for the ETag already exists.
    pub fn store(&mut self, document: &Document) -> bool {
        self.store_at(document, now_millis())
    }

    /// [`DocumentStore::store`] with an explicit clock.
    pub fn store_at(&mut self, document: &Document, now_ms: u64) -> bool {
        let Some(path) = self.record_path(&document.etag) else {
            return false;
        };

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                trace!(etag = %document.etag, "document already cached");
                return true;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not create cache record");
                return false;
            }
        };

        let record = encode_record(document, now_ms);
        if let Err(e) = file.write_all(&record).and_then(|()| file.sync_data()) {
            warn!(path = %path.display(), error = %e, "could not write cache record");
            drop(file);
            let _ = fs::remove_file(&path);
            return false;
        }

        debug!(etag = %document.etag, bytes = record.len(), "document cached");
        true
    }

    /// Deletes records not fetched for more than `max_age_days`.
    ///
    /// Only record headers are read. Unparseable files are left alone.
    pub fn purge(&mut self, max_age_days: u64) -> PurgeReport {
        self.purge_at(max_age_days, now_millis())
    }

    /// [`DocumentStore::purge`] with an explicit clock.
    pub fn purge_at(&mut self, max_age_days: u64, now_ms: u64) -> PurgeReport {
        let mut report = PurgeReport::default();
        let Some(dir) = self.directory() else {
            return report;
        };
        let max_age = days_to_millis(max_age_days);

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "could not scan document cache");
                return report;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let header = match read_header(&path) {
                Ok(header) => header,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable cache record");
                    report.skipped += 1;
                    continue;
                }
            };

            let age = now_ms.saturating_sub(header.last_fetch);
            if age <= max_age {
                report.kept += 1;
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), age_ms = age, "removed expired cache record");
                    report.removed += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not remove expired cache record");
                    report.skipped += 1;
                }
            }
        }

        info!(
            removed = report.removed,
            kept = report.kept,
            skipped = report.skipped,
            "document cache purged"
        );
        report
    }

    /// Deletes the whole cache directory.
    ///
    /// The directory is recreated on the next operation.
    pub fn clear(&mut self) -> bool {
        if !self.is_available() {
            return false;
        }

        let dir = match &self.state {
            StoreState::Ready(dir) => dir.clone(),
            _ => self.config.cache_dir(),
        };
        self.state = StoreState::Uninitialized;

        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!(path = %dir.display(), "document cache cleared");
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "could not clear document cache");
                false
            }
        }
    }
}

/// Returns true if `etag` can be used as a file name inside the cache
/// directory.
pub fn is_safe_etag(etag: &str) -> bool {
    !etag.is_empty()
        && etag != "."
        && etag != ".."
        && !etag.contains(['/', '\\', '\0'])
}

fn read_and_touch(path: &Path, now_ms: u64) -> RecordResult<Document> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let (header, document) = decode_record(&bytes)?;

    // Same width as the old field, so the file length never changes.
    let field = timestamp_field(LAST_FETCH_FIELD, now_ms);
    file.seek(SeekFrom::Start(header.last_fetch_offset as u64))?;
    file.write_all(&field)?;

    Ok(document)
}

fn read_header(path: &Path) -> RecordResult<RecordHeader> {
    let mut bytes = Vec::with_capacity(HEADER_READ_LEN);
    File::open(path)?
        .take(HEADER_READ_LEN as u64)
        .read_to_end(&mut bytes)?;
    parse_header(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FORMAT_FIELD;
    use m4e_core::MILLIS_PER_DAY;
    use tempfile::TempDir;

    const NOW: u64 = 1_700_000_000_000;

    fn store_in(dir: &TempDir) -> DocumentStore {
        DocumentStore::new(CacheConfig::with_directory(dir.path().join("doccache")))
    }

    fn avatar(etag: &str) -> Document {
        Document::new("42", etag)
            .with_name("avatar.png")
            .with_type("image/png")
            .with_content(vec![7u8; 300])
    }

    fn record_file(dir: &TempDir, etag: &str) -> PathBuf {
        dir.path().join("doccache").join(etag)
    }

    #[test]
    fn store_then_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let doc = avatar("abc");

        assert!(store.store(&doc));
        assert_eq!(store.lookup("42", "abc"), Some(doc));
        assert_eq!(store.lookup("42", "other"), None);
    }

    #[test]
    fn second_store_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        assert!(store.store_at(&avatar("abc"), NOW));
        let first = fs::read(record_file(&dir, "abc")).unwrap();

        let changed = avatar("abc").with_content(b"different".to_vec());
        assert!(store.store_at(&changed, NOW + 5_000));
        let second = fs::read(record_file(&dir, "abc")).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read_dir(dir.path().join("doccache")).unwrap().count(), 1);
        assert_eq!(parse_header(&second).unwrap().created, NOW);
    }

    #[test]
    fn lookup_touches_last_fetch_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let path = record_file(&dir, "abc");

        store.store_at(&avatar("abc"), NOW);
        let len = fs::metadata(&path).unwrap().len();

        for i in 1..=5 {
            let now = NOW + i * 1_000;
            assert!(store.lookup_at("42", "abc", now).is_some());

            let bytes = fs::read(&path).unwrap();
            let header = parse_header(&bytes).unwrap();
            assert_eq!(bytes.len() as u64, len);
            assert_eq!(header.created, NOW);
            assert_eq!(header.last_fetch, now);
        }
    }

    #[test]
    fn purge_threshold_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let max_age = 30 * MILLIS_PER_DAY;

        store.store_at(&avatar("expired"), NOW - (max_age + 1));
        store.store_at(&avatar("fresh"), NOW - (max_age - 1));
        store.store_at(&avatar("exact"), NOW - max_age);

        let report = store.purge_at(30, NOW);

        assert_eq!(report, PurgeReport { removed: 1, kept: 2, skipped: 0 });
        assert!(!record_file(&dir, "expired").exists());
        assert!(record_file(&dir, "fresh").exists());
        assert!(record_file(&dir, "exact").exists());
    }

    #[test]
    fn corrupt_record_deleted_by_lookup_kept_by_purge() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.store_at(&avatar("abc"), NOW);

        let path = record_file(&dir, "abc");
        let mut bytes = fs::read(&path).unwrap();
        let version_at = "|22:".len() + FORMAT_FIELD.len() + 1;
        assert_eq!(bytes[version_at], b'1');
        bytes[version_at] = b'9';
        fs::write(&path, &bytes).unwrap();

        let report = store.purge_at(0, NOW + 10 * MILLIS_PER_DAY);
        assert_eq!(report.skipped, 1);
        assert_eq!(fs::read(&path).unwrap(), bytes);

        assert_eq!(store.lookup_at("42", "abc", NOW), None);
        assert!(!path.exists());
    }

    #[test]
    fn unsafe_etags_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        for etag in ["", ".", "..", "../escape", "a/b", "a\\b"] {
            assert!(!store.store(&avatar(etag)), "{etag:?}");
            assert_eq!(store.lookup("42", etag), None);
        }
        assert!(!dir.path().join("escape").exists());
    }

    #[test]
    fn unavailable_directory_degrades_to_misses() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        let mut store = DocumentStore::new(CacheConfig::with_directory(blocker.join("doccache")));
        assert!(!store.store(&avatar("abc")));
        assert!(!store.is_available());
        assert_eq!(store.lookup("42", "abc"), None);
        assert_eq!(store.purge(30), PurgeReport::default());
        assert!(!store.clear());
    }

    #[test]
    fn clear_removes_everything_and_recreates_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.store(&avatar("abc"));

        assert!(store.clear());
        assert!(!dir.path().join("doccache").exists());

        assert_eq!(store.lookup("42", "abc"), None);
        assert!(dir.path().join("doccache").is_dir());
        assert!(store.store(&avatar("abc")));
    }

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.expiration_days, 30);
        assert!(config.cache_dir().ends_with("m4e/doccache"));
    }
}
