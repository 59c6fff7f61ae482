//! File-backed [`MessageStore`].
//!
//! Each session lives in five files under one directory:
//!
//! | file                       | content                                  |
//! |----------------------------|------------------------------------------|
//! | `<id>.body`                | raw message bytes, concatenated          |
//! | `<id>.header`              | `seqnum,offset,size` lines               |
//! | `<id>.session`             | RFC 3339 creation timestamp              |
//! | `<id>.senderseqnums`       | 19-digit next sender seq num             |
//! | `<id>.targetseqnums`       | 19-digit next target seq num             |
//!
//! Every mutation is flushed before it returns, so `refresh` never discards
//! in-memory state that disk does not already have.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::cache::SequenceCache;
use crate::config::{FileStoreConfig, SessionSettings};
use crate::counter::SeqCounterFile;
use crate::error::{StoreError, StoreResult};
use crate::log::FileLog;
use crate::meta::SessionMetaFile;
use crate::store::{MessageStore, MessageStoreFactory, check_seq_num};

// ── file helpers ─────────────────────────────────────────────────────

/// Open `path` for read/write, creating it if it does not exist.
pub(crate) fn open_or_create(path: &Path) -> StoreResult<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o660);
    }
    options
        .open(path)
        .map_err(|e| StoreError::io("opening or creating", path, e))
}

/// Delete `path`; a file that is already gone is not an error.
pub(crate) fn remove_if_exists(path: &Path) -> StoreResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io("removing", path, e)),
    }
}

fn validate_session_id(session_id: &str) -> StoreResult<()> {
    let invalid = session_id.is_empty()
        || session_id == "."
        || session_id == ".."
        || session_id.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StoreError::InvalidSessionId(session_id.to_string()));
    }
    Ok(())
}

// ── paths ────────────────────────────────────────────────────────────

/// The five file paths belonging to one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub body: PathBuf,
    pub header: PathBuf,
    pub session: PathBuf,
    pub sender_seq_nums: PathBuf,
    pub target_seq_nums: PathBuf,
}

impl StorePaths {
    pub fn new(directory: &Path, session_id: &str) -> Self {
        let file = |suffix: &str| directory.join(format!("{session_id}.{suffix}"));
        Self {
            body: file("body"),
            header: file("header"),
            session: file("session"),
            sender_seq_nums: file("senderseqnums"),
            target_seq_nums: file("targetseqnums"),
        }
    }

    pub fn all(&self) -> [&Path; 5] {
        [
            &self.body,
            &self.header,
            &self.session,
            &self.sender_seq_nums,
            &self.target_seq_nums,
        ]
    }
}

// ── FileStore ────────────────────────────────────────────────────────

/// A session store kept in plain files under one directory.
#[derive(Debug)]
pub struct FileStore {
    session_id: String,
    directory: PathBuf,
    cache: SequenceCache,
    log: FileLog,
    session: SessionMetaFile,
    sender_seq_nums: SeqCounterFile,
    target_seq_nums: SeqCounterFile,
}

impl FileStore {
    /// Open the store for `session_id` under `directory`, creating the
    /// directory and any missing files.
    pub fn open(session_id: impl Into<String>, directory: impl AsRef<Path>) -> StoreResult<Self> {
        let session_id = session_id.into();
        validate_session_id(&session_id)?;

        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)
            .map_err(|e| StoreError::io("creating directory", &directory, e))?;

        let paths = StorePaths::new(&directory, &session_id);
        let mut store = Self {
            session_id,
            directory,
            cache: SequenceCache::new(),
            log: FileLog::new(paths.body, paths.header),
            session: SessionMetaFile::new(paths.session),
            sender_seq_nums: SeqCounterFile::new(paths.sender_seq_nums),
            target_seq_nums: SeqCounterFile::new(paths.target_seq_nums),
        };
        store.refresh()?;

        info!(
            session_id = %store.session_id,
            directory = %store.directory.display(),
            messages = store.log.len(),
            next_sender_seq_num = store.cache.next_sender_seq_num(),
            next_target_seq_num = store.cache.next_target_seq_num(),
            "file store opened"
        );
        Ok(store)
    }

    pub fn with_config(session_id: impl Into<String>, config: &FileStoreConfig) -> StoreResult<Self> {
        Self::open(session_id, &config.storage_directory)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn paths(&self) -> StorePaths {
        StorePaths::new(&self.directory, &self.session_id)
    }

    /// Number of distinct sequence numbers currently indexed.
    pub fn message_count(&self) -> usize {
        self.log.len()
    }

    pub fn is_open(&self) -> bool {
        self.log.is_open()
    }

    /// Load whatever persisted state parses into the (already reset) cache
    /// and rebuild the message index. Returns whether a creation time was
    /// found on disk.
    fn populate_cache(&mut self) -> StoreResult<bool> {
        self.log.rebuild_index()?;

        let creation_time = self.session.read();
        if let Some(creation_time) = creation_time {
            self.cache.set_creation_time(creation_time);
        }
        if let Some(next) = self.sender_seq_nums.read() {
            self.cache.set_next_sender_seq_num(next);
        }
        if let Some(next) = self.target_seq_nums.read() {
            self.cache.set_next_target_seq_num(next);
        }
        Ok(creation_time.is_some())
    }

    fn open_files(&mut self) -> StoreResult<()> {
        self.log.open()?;
        self.session.open()?;
        self.sender_seq_nums.open()?;
        self.target_seq_nums.open()
    }

    fn release_files(&mut self) {
        self.log.close();
        self.session.close();
        self.sender_seq_nums.close();
        self.target_seq_nums.close();
    }
}

impl MessageStore for FileStore {
    fn next_sender_seq_num(&self) -> u64 {
        self.cache.next_sender_seq_num()
    }

    fn next_target_seq_num(&self) -> u64 {
        self.cache.next_target_seq_num()
    }

    fn set_next_sender_seq_num(&mut self, next: u64) -> StoreResult<()> {
        check_seq_num(next)?;
        self.cache.set_next_sender_seq_num(next);
        self.sender_seq_nums.write(next)
    }

    fn set_next_target_seq_num(&mut self, next: u64) -> StoreResult<()> {
        check_seq_num(next)?;
        self.cache.set_next_target_seq_num(next);
        self.target_seq_nums.write(next)
    }

    fn incr_next_sender_seq_num(&mut self) -> StoreResult<()> {
        check_seq_num(self.cache.next_sender_seq_num().saturating_add(1))?;
        self.cache.incr_next_sender_seq_num();
        self.sender_seq_nums.write(self.cache.next_sender_seq_num())
    }

    fn incr_next_target_seq_num(&mut self) -> StoreResult<()> {
        check_seq_num(self.cache.next_target_seq_num().saturating_add(1))?;
        self.cache.incr_next_target_seq_num();
        self.target_seq_nums.write(self.cache.next_target_seq_num())
    }

    fn creation_time(&self) -> DateTime<Utc> {
        self.cache.creation_time()
    }

    fn save_message(&mut self, seq_num: u64, msg: &[u8]) -> StoreResult<()> {
        self.log.save(seq_num, msg)
    }

    fn get_messages(&self, begin: u64, end: u64) -> StoreResult<Vec<Vec<u8>>> {
        self.log.get_range(begin, end)
    }

    #[instrument(skip(self), fields(session_id = %self.session_id))]
    fn reset(&mut self) -> StoreResult<()> {
        self.cache.reset();
        self.release_files();

        self.log.remove()?;
        self.session.remove()?;
        self.sender_seq_nums.remove()?;
        self.target_seq_nums.remove()?;

        self.refresh()?;
        info!("file store reset");
        Ok(())
    }

    #[instrument(skip(self), fields(session_id = %self.session_id))]
    fn refresh(&mut self) -> StoreResult<()> {
        self.cache.reset();
        self.release_files();

        let creation_time_found = self.populate_cache()?;

        if let Err(err) = self.open_files() {
            self.release_files();
            return Err(err);
        }

        if !creation_time_found {
            self.session.write(&self.cache.creation_time())?;
        }
        self.sender_seq_nums
            .write(self.cache.next_sender_seq_num())?;
        self.target_seq_nums
            .write(self.cache.next_target_seq_num())?;

        debug!(
            messages = self.log.len(),
            creation_time_found,
            next_sender_seq_num = self.cache.next_sender_seq_num(),
            next_target_seq_num = self.cache.next_target_seq_num(),
            "file store refreshed"
        );
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        self.release_files();
        Ok(())
    }
}

/// Factory for [`FileStore`]; requires the `storage_directory` setting.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStoreFactory;

impl MessageStoreFactory for FileStoreFactory {
    fn create(
        &self,
        session_id: &str,
        settings: &SessionSettings,
    ) -> StoreResult<Box<dyn MessageStore>> {
        let config = FileStoreConfig::from_settings(session_id, settings)?;
        Ok(Box::new(FileStore::with_config(session_id, &config)?))
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::MAX_SEQ_NUM;

    fn open_store(dir: &tempfile::TempDir) -> FileStore {
        FileStore::open("FIX.4.4-SENDER-TARGET", dir.path()).unwrap()
    }

    #[test]
    fn store_paths_use_session_id_and_suffix() {
        let paths = StorePaths::new(Path::new("/data"), "S");
        assert_eq!(paths.body, PathBuf::from("/data/S.body"));
        assert_eq!(paths.header, PathBuf::from("/data/S.header"));
        assert_eq!(paths.session, PathBuf::from("/data/S.session"));
        assert_eq!(paths.sender_seq_nums, PathBuf::from("/data/S.senderseqnums"));
        assert_eq!(paths.target_seq_nums, PathBuf::from("/data/S.targetseqnums"));
    }

    #[test]
    fn rejects_session_ids_that_escape_directory() {
        let dir = tempfile::tempdir().unwrap();
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            let err = FileStore::open(bad, dir.path()).unwrap_err();
            assert!(matches!(err, StoreError::InvalidSessionId(_)), "{bad:?}");
        }
    }

    #[test]
    fn open_creates_directory_and_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileStore::open("S", &nested).unwrap();

        for path in store.paths().all() {
            assert!(path.exists(), "{} missing", path.display());
        }
        assert_eq!(
            std::fs::read_to_string(&store.paths().sender_seq_nums).unwrap(),
            "0000000000000000001"
        );
    }

    #[test]
    fn counter_writes_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        store.set_next_sender_seq_num(42).unwrap();
        store.incr_next_target_seq_num().unwrap();

        let paths = store.paths();
        assert_eq!(
            std::fs::read_to_string(paths.sender_seq_nums).unwrap(),
            "0000000000000000042"
        );
        assert_eq!(
            std::fs::read_to_string(paths.target_seq_nums).unwrap(),
            "0000000000000000002"
        );
    }

    #[test]
    fn invalid_seq_nums_leave_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);
        store.set_next_sender_seq_num(5).unwrap();

        assert!(matches!(
            store.set_next_sender_seq_num(0),
            Err(StoreError::InvalidSeqNum(0))
        ));
        assert_eq!(store.next_sender_seq_num(), 5);

        store.set_next_target_seq_num(MAX_SEQ_NUM).unwrap();
        assert!(store.incr_next_target_seq_num().is_err());
        assert_eq!(store.next_target_seq_num(), MAX_SEQ_NUM);
    }

    #[test]
    fn unparseable_counter_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);
        store.set_next_sender_seq_num(9).unwrap();
        store.close().unwrap();

        std::fs::write(&store.paths().sender_seq_nums, "not a number").unwrap();
        store.refresh().unwrap();
        assert_eq!(store.next_sender_seq_num(), 1);
        assert_eq!(
            std::fs::read_to_string(&store.paths().sender_seq_nums).unwrap(),
            "0000000000000000001"
        );
    }

    #[test]
    fn oversized_counter_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths::new(dir.path(), "FIX.4.4-SENDER-TARGET");
        std::fs::write(&paths.sender_seq_nums, "12345678901234567890").unwrap();
        std::fs::write(&paths.target_seq_nums, "0000000000000000006").unwrap();

        let store = open_store(&dir);
        assert_eq!(store.next_sender_seq_num(), 1);
        assert_eq!(store.next_target_seq_num(), 6);
        assert_eq!(
            std::fs::read_to_string(&paths.sender_seq_nums).unwrap(),
            "0000000000000000001"
        );
    }

    #[test]
    fn missing_session_file_records_new_creation_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);
        let first = store.creation_time();
        store.close().unwrap();

        std::fs::remove_file(&store.paths().session).unwrap();
        store.refresh().unwrap();

        assert!(store.creation_time() >= first);
        let on_disk = std::fs::read_to_string(&store.paths().session).unwrap();
        assert_eq!(on_disk, crate::meta::encode_timestamp(&store.creation_time()));
    }

    #[test]
    fn close_is_idempotent_and_blocks_io() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);
        store.save_message(1, b"x").unwrap();

        store.close().unwrap();
        store.close().unwrap();
        assert!(!store.is_open());

        assert_eq!(store.next_sender_seq_num(), 1);
        assert_eq!(store.message_count(), 1);
        assert!(matches!(store.save_message(2, b"y"), Err(StoreError::Closed)));
        assert!(matches!(store.incr_next_sender_seq_num(), Err(StoreError::Closed)));

        store.refresh().unwrap();
        assert_eq!(store.get_messages(1, 1).unwrap(), vec![b"x".to_vec()]);
    }

    #[test]
    fn factory_requires_storage_directory() {
        let err = FileStoreFactory
            .create("S", &SessionSettings::new())
            .err()
            .expect("missing setting must fail");
        assert!(matches!(err, StoreError::MissingSetting { .. }));
    }

    #[test]
    fn factory_opens_store_in_configured_directory() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SessionSettings::new().with(
            crate::config::STORAGE_DIRECTORY,
            dir.path().display().to_string(),
        );
        let mut store = FileStoreFactory.create("S", &settings).unwrap();
        store.save_message(1, b"hi").unwrap();

        assert!(dir.path().join("S.body").exists());
        assert_eq!(store.get_messages(1, 1).unwrap(), vec![b"hi".to_vec()]);
    }
}
