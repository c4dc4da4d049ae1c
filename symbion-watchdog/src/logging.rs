//! File logging
//!
//! Events go to `<executable-stem>.log`, opened in append mode, one line per
//! event with an RFC3339 timestamp. `RUST_LOG` overrides the default `info` level.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::EnvFilter;

/// Log file name derived from the executable, e.g. `watchdog.exe` -> `watchdog.log`.
pub fn log_file_path(dir: &Path, exe: &Path) -> PathBuf {
    let stem = exe
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
    dir.join(format!("{}.log", stem))
}

pub fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Error opening log file {}", path.display()))
}

/// Install the global subscriber writing to `path`.
pub fn init(path: &Path) -> Result<()> {
    let file = open_log_file(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Error installing logger: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_log_file_named_after_executable() {
        let dir = Path::new("/opt/watchdog");
        assert_eq!(
            log_file_path(dir, Path::new("/usr/bin/symbion-watchdog")),
            PathBuf::from("/opt/watchdog/symbion-watchdog.log")
        );
        assert_eq!(
            log_file_path(dir, Path::new("C:/tools/watchdog.exe")),
            PathBuf::from("/opt/watchdog/watchdog.log")
        );
    }

    #[test]
    fn test_log_file_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchdog.log");

        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_unopenable_log_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("watchdog.log");
        assert!(open_log_file(&path).is_err());
    }
}
