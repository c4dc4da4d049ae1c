//! Persisted reboot counter
//!
//! One plain-text file per host, `<short-hostname>_reboot_count.txt`, holding a
//! decimal integer. A missing file reads as zero. Every access holds an exclusive
//! lock on a sidecar file, and writes replace the counter file atomically.
//! Reads fall back to an unlocked read when the lock cannot be taken, so the
//! cap still holds on a read-only state directory.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("Error reading file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Error converting {content:?} in {path} to integer: {source}")]
    Parse {
        path: PathBuf,
        content: String,
        source: ParseIntError,
    },

    #[error("Error writing file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Error locking {path}: {source}")]
    Lock { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone)]
pub struct RebootCounter {
    path: PathBuf,
    lock_path: PathBuf,
}

/// Held for the duration of one read or write.
struct CounterLock {
    file: File,
}

impl Drop for CounterLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl RebootCounter {
    pub fn new(dir: &Path, short_hostname: &str) -> Self {
        Self {
            path: dir.join(format!("{}_reboot_count.txt", short_hostname)),
            lock_path: dir.join(format!(".{}_reboot_count.lock", short_hostname)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current value; zero when the file does not exist yet.
    pub fn read(&self) -> Result<u32, CounterError> {
        let _lock = match self.lock() {
            Ok(lock) => Some(lock),
            Err(e) => {
                warn!("{}, reading without lock", e);
                None
            }
        };

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(CounterError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let trimmed = content.trim();
        trimmed.parse().map_err(|source| CounterError::Parse {
            path: self.path.clone(),
            content: trimmed.to_string(),
            source,
        })
    }

    /// Replace the stored value with `count`.
    pub fn write(&self, count: u32) -> Result<(), CounterError> {
        let _lock = self.lock()?;

        let tmp_path = self.path.with_extension("txt.tmp");
        replace_file(&tmp_path, &self.path, count.to_string().as_bytes()).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            CounterError::Write {
                path: self.path.clone(),
                source,
            }
        })
    }

    fn lock(&self) -> Result<CounterLock, CounterError> {
        let lock_err = |source| CounterError::Lock {
            path: self.lock_path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(lock_err)?;
        file.lock_exclusive().map_err(lock_err)?;

        Ok(CounterLock { file })
    }
}

/// Write `content` beside `path`, flush it, then rename over `path`.
fn replace_file(tmp_path: &Path, path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = File::create(tmp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    fs::rename(tmp_path, path)
}
