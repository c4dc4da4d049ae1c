//! Watchdog configuration
//!
//! Handles:
//! - Command-line flags (single-dash long form kept for compatibility)
//! - Optional TOML file providing defaults
//! - Validation into an immutable `WatchdogConfig`

use crate::supervisor::SupervisorMode;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Deserializer};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_DURATION: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_MAX_COUNT: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Address cannot be empty")]
    MissingAddress,

    #[error("Probe timeout must be at least one second")]
    InvalidTimeout,

    #[error("Failed to read config file {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Command-line flags. Every value is optional so the file layer can fill gaps.
#[derive(Debug, Default, Parser)]
#[command(
    name = "symbion-watchdog",
    version,
    about = "Probes a TCP endpoint and reboots the host when it stops answering"
)]
pub struct Cli {
    /// Address to ping
    #[arg(long)]
    pub address: Option<String>,

    /// Port number to use when pinging the address [default: 80]
    #[arg(long)]
    pub port: Option<u16>,

    /// Interval between pings, e.g. 30s, 1m [default: 1m]
    #[arg(long, value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,

    /// Duration to run the program [default: 10m]
    #[arg(long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Connect timeout of a single ping, in seconds [default: 3]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Maximum number of reboots allowed [default: 5]
    #[arg(long = "max-count")]
    pub max_count: Option<u32>,

    /// TOML file providing default values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the reboot counter and the log file [default: executable directory]
    #[arg(long = "state-dir")]
    pub state_dir: Option<PathBuf>,

    /// Stay attached to the terminal instead of re-launching in the background
    #[arg(long)]
    pub foreground: bool,

    /// Log reboots without issuing them
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

impl Cli {
    /// Parse the process arguments, accepting `-flag` as well as `--flag`.
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_flags(std::env::args_os()))
    }
}

/// Rewrite single-dash long flags (`-max-count=5`) to their double-dash form.
///
/// Only names the parser knows are rewritten; everything after `--` is left alone.
pub fn normalize_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let command = Cli::command();
    let mut known: Vec<String> = command
        .get_arguments()
        .filter_map(|arg| arg.get_long().map(str::to_string))
        .collect();
    known.extend(["help".to_string(), "version".to_string()]);

    let mut passthrough = false;
    args.into_iter()
        .enumerate()
        .map(|(index, arg)| {
            if index == 0 || passthrough {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                passthrough = true;
                return arg;
            }
            match text.strip_prefix('-') {
                Some(rest) if !rest.starts_with('-') => {
                    let name = rest.split('=').next().unwrap_or_default();
                    if known.iter().any(|k| k == name) {
                        OsString::from(format!("-{text}"))
                    } else {
                        arg
                    }
                }
                _ => arg,
            }
        })
        .collect()
}

/// Optional configuration file, same keys as the flags.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub address: Option<String>,
    pub port: Option<u16>,
    #[serde(default, deserialize_with = "humantime_opt")]
    pub interval: Option<Duration>,
    #[serde(default, deserialize_with = "humantime_opt")]
    pub duration: Option<Duration>,
    pub timeout: Option<u64>,
    pub max_count: Option<u32>,
    pub state_dir: Option<PathBuf>,
    pub foreground: Option<bool>,
    pub dry_run: Option<bool>,
}

fn humantime_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
        .transpose()
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::File {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Explicit path must exist; the default location is used only when present.
    pub fn discover(explicit: Option<&Path>) -> Result<Option<Self>, ConfigError> {
        match explicit {
            Some(path) => Self::load(path).map(Some),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load(&path).map(Some),
                _ => Ok(None),
            },
        }
    }

    /// OS-specific default location
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("symbion-watchdog");
        path.push("config.toml");
        Some(path)
    }
}

/// Immutable runtime configuration, built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchdogConfig {
    pub address: String,
    pub port: u16,
    pub interval: Duration,
    pub duration: Duration,
    pub probe_timeout: Duration,
    pub max_reboots: u32,
    pub state_dir: PathBuf,
    pub supervisor: SupervisorMode,
    pub dry_run: bool,
}

impl WatchdogConfig {
    /// Merge flags over file values over defaults, then validate.
    pub fn resolve(
        cli: Cli,
        file: Option<FileConfig>,
        default_state_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();

        let address = cli
            .address
            .or(file.address)
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or(ConfigError::MissingAddress)?;

        let timeout_secs = cli.timeout.or(file.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let foreground = cli.foreground || file.foreground.unwrap_or(false);

        Ok(Self {
            address,
            port: cli.port.or(file.port).unwrap_or(DEFAULT_PORT),
            interval: cli.interval.or(file.interval).unwrap_or(DEFAULT_INTERVAL),
            duration: cli.duration.or(file.duration).unwrap_or(DEFAULT_DURATION),
            probe_timeout: Duration::from_secs(timeout_secs),
            max_reboots: cli.max_count.or(file.max_count).unwrap_or(DEFAULT_MAX_COUNT),
            state_dir: cli
                .state_dir
                .or(file.state_dir)
                .unwrap_or_else(|| default_state_dir.to_path_buf()),
            supervisor: if foreground {
                SupervisorMode::Foreground
            } else {
                SupervisorMode::Background
            },
            dry_run: cli.dry_run || file.dry_run.unwrap_or(false),
        })
    }
}
