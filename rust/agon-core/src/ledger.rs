//! Durable ordered event log
//!
//! One JSON file per event, named by zero-padded six-digit sequence number
//! (`000001.json`, `000002.json`, ...). Files are written to a temp name
//! and atomically renamed into place, so a reader never observes a torn
//! write: after a crash the tail event is either fully present or absent.
//!
//! The ledger directory is a single-writer resource. A writer takes an
//! advisory `ledger.lock` file on open and releases it on drop; reader
//! processes open read-only and skip the lock.

use crate::error::{CoreError, CoreResult};
use crate::event::Event;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Advisory single-writer lock file name
const LOCK_FILE: &str = "ledger.lock";

/// Width of the zero-padded sequence number in file names
const SEQ_WIDTH: usize = 6;

/// Ledger configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Directory holding the per-event files
    pub dir: PathBuf,
    /// Fsync each event file before renaming it into place
    pub sync_on_append: bool,
}

impl LedgerConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sync_on_append: true,
        }
    }
}

/// Outcome of a compare-and-set append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The event was appended at this sequence number
    Committed(u64),
    /// The latest sequence moved; the caller must re-read and revalidate
    Conflict { latest: u64 },
}

/// Append-only event log over a directory of JSON files
#[derive(Debug)]
pub struct Ledger {
    config: LedgerConfig,
    latest: Mutex<u64>,
    lock: Option<LockFile>,
}

impl Ledger {
    /// Open the ledger for writing, taking the advisory single-writer lock.
    /// Creates the directory if needed.
    pub fn open(config: LedgerConfig) -> CoreResult<Self> {
        fs::create_dir_all(&config.dir)
            .map_err(|e| CoreError::ledger_io("create_dir", &config.dir, e))?;
        let lock = LockFile::acquire(&config.dir)?;
        let latest = discover_latest(&config.dir)?;
        info!(dir = %config.dir.display(), latest, "ledger opened for writing");
        Ok(Self {
            config,
            latest: Mutex::new(latest),
            lock: Some(lock),
        })
    }

    /// Open the ledger for reading only. No lock is taken; appends are
    /// rejected.
    pub fn open_read_only(config: LedgerConfig) -> CoreResult<Self> {
        let latest = discover_latest(&config.dir)?;
        Ok(Self {
            config,
            latest: Mutex::new(latest),
            lock: None,
        })
    }

    /// Directory this ledger persists into
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Number of events (equal to the highest sequence number)
    pub fn count(&self) -> u64 {
        *self.latest.lock()
    }

    /// Highest assigned sequence number; 0 when empty
    pub fn latest_seq(&self) -> u64 {
        *self.latest.lock()
    }

    /// Append an event, assigning the next sequence number
    pub fn append(&self, event: &Event) -> CoreResult<u64> {
        let mut latest = self.latest.lock();
        let seq = *latest + 1;
        self.write_event(seq, event)?;
        *latest = seq;
        debug!(seq, event_type = event.type_name(), "event appended");
        Ok(seq)
    }

    /// Append only if the current latest sequence equals `expected_latest`.
    ///
    /// This is the optimistic-concurrency primitive: intents validate
    /// against a snapshot at `expected_latest` and commit here; a conflict
    /// means another intent landed first and the caller must re-read.
    pub fn append_cas(&self, event: &Event, expected_latest: u64) -> CoreResult<CasOutcome> {
        let mut latest = self.latest.lock();
        if *latest != expected_latest {
            debug!(
                expected = expected_latest,
                actual = *latest,
                "compare-and-set conflict"
            );
            return Ok(CasOutcome::Conflict { latest: *latest });
        }
        let seq = *latest + 1;
        self.write_event(seq, event)?;
        *latest = seq;
        debug!(seq, event_type = event.type_name(), "event appended via CAS");
        Ok(CasOutcome::Committed(seq))
    }

    /// Iterate raw events in ascending sequence order. Stops at the first
    /// error `f` returns.
    pub fn scan<F>(&self, mut f: F) -> CoreResult<()>
    where
        F: FnMut(u64, &[u8]) -> CoreResult<()>,
    {
        for (seq, path) in self.event_files()? {
            let bytes =
                fs::read(&path).map_err(|e| CoreError::ledger_io("read", &path, e))?;
            f(seq, &bytes)?;
        }
        Ok(())
    }

    /// Parse every event in sequence order
    pub fn read_all(&self) -> CoreResult<Vec<(u64, Event)>> {
        let mut events = Vec::new();
        self.scan(|seq, bytes| {
            let event: Event = serde_json::from_slice(bytes)
                .map_err(|source| CoreError::InvalidJson { seq, source })?;
            events.push((seq, event));
            Ok(())
        })?;
        Ok(events)
    }

    /// Path of the file holding sequence `seq`
    pub fn event_path(&self, seq: u64) -> PathBuf {
        self.config.dir.join(format!("{:0width$}.json", seq, width = SEQ_WIDTH))
    }

    fn write_event(&self, seq: u64, event: &Event) -> CoreResult<u64> {
        if self.lock.is_none() {
            return Err(CoreError::ledger_io(
                "append",
                &self.config.dir,
                std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "ledger opened read-only",
                ),
            ));
        }
        let bytes = serde_json::to_vec(event).map_err(|source| CoreError::InvalidJson {
            seq,
            source,
        })?;

        let final_path = self.event_path(seq);
        let tmp_path = final_path.with_extension("json.tmp");

        let mut tmp = File::create(&tmp_path)
            .map_err(|e| CoreError::ledger_io("create", &tmp_path, e))?;
        tmp.write_all(&bytes)
            .map_err(|e| CoreError::ledger_io("write", &tmp_path, e))?;
        if self.config.sync_on_append {
            tmp.sync_all()
                .map_err(|e| CoreError::ledger_io("sync", &tmp_path, e))?;
        }
        drop(tmp);

        fs::rename(&tmp_path, &final_path)
            .map_err(|e| CoreError::ledger_io("rename", &final_path, e))?;
        if self.config.sync_on_append {
            // Persist the rename itself; best effort on platforms where
            // directories cannot be opened for sync.
            if let Ok(dir) = File::open(&self.config.dir) {
                let _ = dir.sync_all();
            }
        }
        Ok(seq)
    }

    /// Sequence-ordered event files, ignoring temp files and the lock file
    fn event_files(&self) -> CoreResult<Vec<(u64, PathBuf)>> {
        let entries = fs::read_dir(&self.config.dir)
            .map_err(|e| CoreError::ledger_io("read_dir", &self.config.dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| CoreError::ledger_io("read_dir", &self.config.dir, e))?;
            let path = entry.path();
            if let Some(seq) = parse_event_file_name(&path) {
                files.push((seq, path));
            }
        }
        files.sort_by_key(|(seq, _)| *seq);
        Ok(files)
    }
}

impl Drop for Ledger {
    fn drop(&mut self) {
        self.lock.take();
    }
}

/// Sequence number encoded in an event file name, if it is one
fn parse_event_file_name(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(".json")?;
    if stem.len() != SEQ_WIDTH || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

fn discover_latest(dir: &Path) -> CoreResult<u64> {
    if !dir.exists() {
        return Err(CoreError::ledger_io(
            "open",
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "ledger directory missing"),
        ));
    }
    let entries =
        fs::read_dir(dir).map_err(|e| CoreError::ledger_io("read_dir", dir, e))?;
    let mut latest = 0;
    for entry in entries {
        let entry = entry.map_err(|e| CoreError::ledger_io("read_dir", dir, e))?;
        if let Some(seq) = parse_event_file_name(&entry.path()) {
            latest = latest.max(seq);
        }
    }
    Ok(latest)
}

/// Advisory lock file: created exclusively on acquire, removed on drop
#[derive(Debug)]
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    fn acquire(dir: &Path) -> CoreResult<Self> {
        let path = dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| CoreError::ledger_io("lock", &path, e))?;
        let _ = writeln!(file, "{}", std::process::id());
        Ok(Self { path })
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
