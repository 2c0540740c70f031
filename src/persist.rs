//! Keeping the cache in a file.
//!
//! The cache file is a plain text file with one record per line. Each
//! record has the form
//!
//! ```text
//! <stored_at>-><key>-><addr>,<addr>,...
//! ```
//!
//! where `stored_at` is the time of the resolution in seconds since the
//! Unix epoch, `key` is the normalized `host:port` target, and the
//! addresses are the resolved `ip:port` strings in resolver order. There
//! is no version field.
//!
//! During normal operation, the flush pass appends records for every entry
//! that hasn't been written yet. Every eviction pass replaces the file with
//! one holding the entries that survived eviction, which also gets rid of
//! the outdated records that appending leaves behind. If persistence is
//! disabled, the replacement only keeps entries that came from the file
//! in the first place. On start-up, all records younger than the
//! staleness window are loaded back into the store. Later records win over
//! earlier ones for the same key.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::Error;
use crate::store::{unix_now, Entry, Store};

/// The delimiter between the fields of a record.
pub const DELIMITER: &str = "->";

//------------ Record --------------------------------------------------------

/// A single line of the cache file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    /// When the addresses were resolved.
    stored_at: u64,

    /// The normalized target.
    key: String,

    /// The resolved addresses.
    addrs: Vec<String>,
}

impl Record {
    /// Creates the record for a cache entry.
    pub fn from_entry(key: &str, entry: &Entry) -> Self {
        Self {
            stored_at: entry.stored_at(),
            key: key.into(),
            addrs: entry.addrs().into(),
        }
    }

    /// Parses a record from a line without its line feed.
    ///
    /// Returns `None` for lines that don't have exactly three fields, have
    /// a malformed timestamp, or are missing the key or addresses.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.split(DELIMITER);
        let (stored_at, key, addrs) =
            (fields.next()?, fields.next()?, fields.next()?);
        if fields.next().is_some() || key.is_empty() {
            return None;
        }
        let addrs: Vec<String> = addrs
            .split(',')
            .filter(|addr| !addr.is_empty())
            .map(Into::into)
            .collect();
        if addrs.is_empty() {
            return None;
        }
        Some(Self {
            stored_at: stored_at.parse().ok()?,
            key: key.into(),
            addrs,
        })
    }

    /// Returns the key of the record.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns when the addresses were resolved.
    pub fn stored_at(&self) -> u64 {
        self.stored_at
    }

    /// Returns the addresses.
    pub fn addrs(&self) -> &[String] {
        &self.addrs
    }

    /// Converts the record into a key and an entry marked as persisted.
    pub fn into_entry(self) -> Option<(String, Entry)> {
        let entry = Entry::new(self.addrs, self.stored_at, true)?;
        Some((self.key, entry))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{DELIMITER}{}{DELIMITER}{}",
            self.stored_at,
            self.key,
            self.addrs.join(",")
        )
    }
}

//------------ CacheFile -----------------------------------------------------

/// The cache file.
///
/// All operations that write to the file are serialized.
#[derive(Debug)]
pub struct CacheFile {
    /// Where the file lives.
    path: PathBuf,

    /// Serializes access to the file.
    lock: Mutex<()>,
}

impl CacheFile {
    /// Creates a new value for the file at `path`.
    ///
    /// The file itself is only touched when needed.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads all records younger than `window` into `store`.
    ///
    /// Loaded entries are marked as persisted. A missing or unreadable file
    /// is treated as empty and unparsable lines are skipped. Returns the
    /// number of records loaded.
    pub async fn load(&self, store: &Store, window: Duration) -> usize {
        let _guard = self.lock.lock().await;
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(err) => {
                debug!("not loading {}: {err}", self.path.display());
                return 0;
            }
        };
        let now = unix_now();
        let mut lines = BufReader::new(file).lines();
        let mut loaded = 0;
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    debug!("error reading {}: {err}", self.path.display());
                    break;
                }
            };
            let Some((key, entry)) =
                Record::parse(&line).and_then(Record::into_entry)
            else {
                trace!("skipping malformed record '{line}'");
                continue;
            };
            if entry.is_stale(now, window) {
                trace!("skipping stale record for {key}");
                continue;
            }
            store.insert(&key, entry).await;
            loaded += 1;
        }
        debug!("loaded {loaded} records from {}", self.path.display());
        loaded
    }

    /// Appends all entries not yet persisted to the file.
    ///
    /// Every record is flushed to disk before its entry is marked as
    /// persisted. Returns the number of records written.
    pub async fn flush(&self, store: &Store) -> Result<usize, Error> {
        let _guard = self.lock.lock().await;
        let pending: Vec<_> = store
            .snapshot()
            .into_iter()
            .filter(|(_, entry)| !entry.persisted())
            .collect();
        if pending.is_empty() {
            return Ok(0);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut writer = BufWriter::new(file);
        let mut written = 0;
        for (key, entry) in pending {
            write_record(&mut writer, &Record::from_entry(&key, &entry))
                .await?;
            writer.flush().await?;
            store.mark_persisted(&key, &entry).await;
            written += 1;
        }
        debug!("flushed {written} records to {}", self.path.display());
        Ok(written)
    }

    /// Replaces the file with one holding the current entries.
    ///
    /// If `pending` is false, entries not yet persisted are left out and
    /// only what was already on disk is kept. The new file is written next
    /// to the old one and then moved into place. If there is nothing to
    /// write, the file is removed. All written entries are marked as
    /// persisted. Returns the number of records written.
    pub async fn rewrite(
        &self,
        store: &Store,
        pending: bool,
    ) -> Result<usize, Error> {
        let _guard = self.lock.lock().await;
        let entries: Vec<_> = store
            .snapshot()
            .into_iter()
            .filter(|(_, entry)| pending || entry.persisted())
            .collect();
        if entries.is_empty() {
            return match fs::remove_file(&self.path).await {
                Err(err) if err.kind() != io::ErrorKind::NotFound => {
                    Err(err.into())
                }
                _ => Ok(0),
            };
        }

        let tmp_path = self.tmp_path();
        let mut writer = BufWriter::new(File::create(&tmp_path).await?);
        for (key, entry) in &entries {
            write_record(&mut writer, &Record::from_entry(key, entry))
                .await?;
        }
        writer.flush().await?;
        writer.get_ref().sync_all().await?;
        drop(writer);
        fs::rename(&tmp_path, &self.path).await?;

        for (key, entry) in &entries {
            store.mark_persisted(key, entry).await;
        }
        debug!(
            "rewrote {} with {} records",
            self.path.display(),
            entries.len()
        );
        Ok(entries.len())
    }

    /// Returns the path of the temporary file used by a rewrite.
    fn tmp_path(&self) -> PathBuf {
        let mut path = OsString::from(self.path.as_os_str());
        path.push(".tmp");
        path.into()
    }
}

/// Writes a record and a line feed.
async fn write_record(
    writer: &mut BufWriter<File>,
    record: &Record,
) -> Result<(), io::Error> {
    writer.write_all(format!("{record}\n").as_bytes()).await
}

//------------ evict ---------------------------------------------------------

/// Runs an eviction pass.
///
/// Removes all entries from `store` that are at least `window` old and
/// then rewrites `file`. Unless `persist` is set, entries that were never
/// written stay out of the file. Returns the number of evicted entries.
pub async fn evict(
    store: &Store,
    file: &CacheFile,
    window: Duration,
    persist: bool,
) -> Result<usize, Error> {
    let evicted = store.evict_stale(unix_now(), window).await;
    if evicted > 0 {
        debug!("evicted {evicted} stale entries");
    }
    file.rewrite(store, persist).await?;
    Ok(evicted)
}

//============ Testing =======================================================
