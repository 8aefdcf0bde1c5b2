//! Tracing setup for the library and the `dash-headers` binary.
//!
//! Console output goes to stderr. File output goes to `<log_dir>/run.log`;
//! the log of the previous run is archived as
//! `dash-headers.<YYYY-MM-DD.HHMMSS>.log` on startup and only the newest
//! `max_archives` archives are kept.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{LoggingError, LoggingResult};

const ARCHIVE_PREFIX: &str = "dash-headers.";
const ACTIVE_LOG: &str = "run.log";
const ARCHIVE_TIME_FORMAT: &str = "%Y-%m-%d.%H%M%S";

/// Keeps the non-blocking file writer alive. Buffered lines are flushed when
/// it is dropped.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_writer: Option<WorkerGuard>,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Explicit level. `None` reads `RUST_LOG`, then falls back to INFO.
    pub level: Option<LevelFilter>,
    pub console: bool,
    pub file: Option<LogFileConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            console: true,
            file: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogFileConfig {
    pub log_dir: PathBuf,
    /// Archived logs to keep besides the active one.
    pub max_archives: usize,
}

impl LogFileConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            max_archives: 10,
        }
    }
}

/// Parses `error`, `warn`, `info`, `debug`, `trace` or `off`.
pub fn parse_level(level: &str) -> LoggingResult<LevelFilter> {
    LevelFilter::from_str(level)
        .map_err(|_| LoggingError::SubscriberInit(format!("unknown log level '{}'", level)))
}

/// Console-only logging at `level`.
pub fn init_console_logging(level: LevelFilter) -> LoggingResult<LoggingGuard> {
    init_logging(LoggingConfig {
        level: Some(level),
        console: true,
        file: None,
    })
}

/// Installs the global subscriber.
///
/// With neither console nor file output nothing is installed and the
/// tracing macros stay no-ops. Fails if a global subscriber already exists.
pub fn init_logging(config: LoggingConfig) -> LoggingResult<LoggingGuard> {
    if !config.console && config.file.is_none() {
        return Ok(LoggingGuard {
            _file_writer: None,
        });
    }

    let filter = match config.level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let mut file_writer = None;
    let file_layer = match &config.file {
        Some(file_config) => {
            let (writer, guard) = open_log_file(file_config)?;
            file_writer = Some(guard);
            Some(fmt::layer().with_ansi(false).with_writer(writer))
        }
        None => None,
    };
    let console_layer = config.console.then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::SubscriberInit(e.to_string()))?;

    Ok(LoggingGuard {
        _file_writer: file_writer,
    })
}

fn open_log_file(config: &LogFileConfig) -> LoggingResult<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(&config.log_dir)?;

    let archive = LogArchive::new(&config.log_dir);
    archive.rotate()?;
    archive.prune(config.max_archives)?;

    let file = File::create(config.log_dir.join(ACTIVE_LOG))?;
    Ok(tracing_appender::non_blocking(file))
}

/// Archived logs of earlier runs inside one directory.
struct LogArchive<'a> {
    dir: &'a Path,
}

impl<'a> LogArchive<'a> {
    fn new(dir: &'a Path) -> Self {
        Self {
            dir,
        }
    }

    fn is_archive_name(name: &str) -> bool {
        name.starts_with(ARCHIVE_PREFIX) && name.ends_with(".log")
    }

    /// Archive names for `stamp`, first the plain one, then numbered ones.
    fn candidate_names(stamp: DateTime<Local>) -> impl Iterator<Item = String> {
        let stamp = stamp.format(ARCHIVE_TIME_FORMAT).to_string();
        std::iter::once(format!("{}{}.log", ARCHIVE_PREFIX, stamp))
            .chain((1..1000).map(move |n| format!("{}{}-{}.log", ARCHIVE_PREFIX, stamp, n)))
    }

    /// Moves the previous `run.log` aside, named after its mtime.
    fn rotate(&self) -> LoggingResult<Option<PathBuf>> {
        let active = self.dir.join(ACTIVE_LOG);
        let Ok(metadata) = fs::metadata(&active) else {
            return Ok(None);
        };

        let stamp = metadata.modified().map(DateTime::<Local>::from).unwrap_or_else(|_| Local::now());
        let target = Self::candidate_names(stamp)
            .map(|name| self.dir.join(name))
            .find(|path| !path.exists())
            .ok_or_else(|| LoggingError::RotationFailed(format!("no free archive name for {}", stamp)))?;

        fs::rename(&active, &target).map_err(|e| LoggingError::RotationFailed(e.to_string()))?;
        Ok(Some(target))
    }

    /// Deletes the oldest archives beyond `keep`.
    fn prune(&self, keep: usize) -> LoggingResult<()> {
        let entries = fs::read_dir(self.dir)
            .map_err(|e| LoggingError::RotationFailed(format!("cannot list {:?}: {}", self.dir, e)))?;

        let mut archives: Vec<_> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_str().is_some_and(Self::is_archive_name))
            .map(|entry| {
                let modified = entry.metadata().and_then(|m| m.modified()).ok();
                (modified, entry.path())
            })
            .collect();

        if archives.len() <= keep {
            return Ok(());
        }

        // Oldest first; ties broken by name, which embeds the timestamp.
        archives.sort();
        let excess = archives.len() - keep;
        for (_, path) in archives.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!("Could not remove old log {:?}: {}", path, e);
            }
        }
        Ok(())
    }
}
