use crate::config::ensure_logs_dir;
use crate::error::ProtectorError;
use crate::events::MonitorEvent;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, Once};
use tracing::warn;
use tracing_subscriber::{
    fmt::{self},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub const APP_LOG_FILE: &str = "dirguard.log";
pub const EVENTS_LOG_FILE: &str = "events.log";

const MAX_JOURNAL_SIZE: u64 = 10 * 1024 * 1024; // 10MB
const MAX_JOURNAL_BACKUPS: u32 = 5;

static LOGGER_INITIALIZED: Once = Once::new();

// Keep the guard alive for the lifetime of the program
static FILE_APPENDER_GUARD: LazyLock<Mutex<Option<tracing_appender::non_blocking::WorkerGuard>>> =
    LazyLock::new(|| Mutex::new(None));

/// Install the console and file subscribers. Safe to call more than once.
pub fn init_logging(logs_dir: &Path) -> Result<(), ProtectorError> {
    ensure_logs_dir(logs_dir)?;

    LOGGER_INITIALIZED.call_once(|| {
        let console_layer = fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_filter(env_filter());

        let file_appender = tracing_appender::rolling::never(logs_dir, APP_LOG_FILE);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if let Ok(mut guard_mutex) = FILE_APPENDER_GUARD.lock() {
            *guard_mutex = Some(guard);
        }

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_filter(env_filter());

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .init();
    });

    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Append-only JSON-lines record of monitor events, rotated by size.
#[derive(Debug, Clone)]
pub struct EventJournal {
    path: PathBuf,
}

impl EventJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Journal at the default file name inside `logs_dir`
    pub fn in_dir(logs_dir: &Path) -> Self {
        Self::new(logs_dir.join(EVENTS_LOG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, event: &MonitorEvent) -> Result<(), ProtectorError> {
        if should_rotate_log(&self.path, MAX_JOURNAL_SIZE)? {
            rotate_log_file(&self.path)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json_line = serde_json::to_string(event)?;
        writeln!(file, "{}", json_line)?;
        file.flush()?;

        Ok(())
    }

    /// Read entries newest first, optionally keeping only the first `max_entries`.
    pub fn read(&self, max_entries: Option<usize>) -> Result<Vec<MonitorEvent>, ProtectorError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();

        for line in reader.lines() {
            match line {
                Ok(content) => match serde_json::from_str::<MonitorEvent>(&content) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => warn!("Skipping malformed journal line: {}", e),
                },
                Err(e) => warn!("Error reading journal line: {}", e),
            }
        }

        entries.reverse();

        if let Some(max) = max_entries {
            entries.truncate(max);
        }

        Ok(entries)
    }
}

fn should_rotate_log(log_file_path: &Path, max_size: u64) -> Result<bool, ProtectorError> {
    if !log_file_path.exists() {
        return Ok(false);
    }

    let metadata = std::fs::metadata(log_file_path)?;
    Ok(metadata.len() > max_size)
}

fn rotate_log_file(log_file_path: &Path) -> Result<(), ProtectorError> {
    // Shift existing backups up one generation (4 -> 5, 3 -> 4, ...)
    for i in (1..MAX_JOURNAL_BACKUPS).rev() {
        let current_backup = log_file_path.with_extension(format!("log.{}", i));
        let next_backup = log_file_path.with_extension(format!("log.{}", i + 1));

        if current_backup.exists() {
            std::fs::rename(&current_backup, &next_backup)?;
        }
    }

    if log_file_path.exists() {
        let first_backup = log_file_path.with_extension("log.1");
        std::fs::rename(log_file_path, first_backup)?;
    }

    Ok(())
}
