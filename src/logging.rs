//! Logger setup
//!
//! One env_logger is installed for the life of the process. Its target is a
//! sink that always writes to stderr and, while `enableLogging` is on, also
//! appends to `logs/log_YYYYMMDD.txt`. `reconfigure` swaps the file and the
//! verbosity in place when settings change.

use crate::constants::CURRENT_VERSION;
use crate::settings::Settings;
use log::LevelFilter;
use parking_lot::{const_mutex, Mutex};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

static LOG_FILE: Mutex<Option<File>> = const_mutex(None);
static INITIALIZED: OnceLock<()> = OnceLock::new();
static ENV_FILTER: AtomicBool = AtomicBool::new(false);

struct LogSink;

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = io::stderr().write_all(buf);
        if let Some(file) = LOG_FILE.lock().as_mut() {
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        if let Some(file) = LOG_FILE.lock().as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Install the process logger and apply the logging settings
///
/// Safe to call more than once; only the first call installs the logger.
pub fn init(settings: &Settings, log_dir: &Path) {
    INITIALIZED.get_or_init(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(LevelFilter::Trace);
        if std::env::var_os("RUST_LOG").is_some() {
            builder.parse_default_env();
            ENV_FILTER.store(true, Ordering::Relaxed);
        }
        builder
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{}] {:<5} {}: {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .target(env_logger::Target::Pipe(Box::new(LogSink)));
        // Another logger (e.g. a test harness) may already be installed
        let _ = builder.try_init();
    });

    reconfigure(settings, log_dir);
}

/// Re-apply `enableLogging` and `debugMode`
pub fn reconfigure(settings: &Settings, log_dir: &Path) {
    if !ENV_FILTER.load(Ordering::Relaxed) {
        log::set_max_level(level_for(settings));
    }

    if !settings.enable_logging {
        *LOG_FILE.lock() = None;
        return;
    }

    match open_log_file(log_dir, settings.debug_mode) {
        Ok(file) => {
            *LOG_FILE.lock() = Some(file);
            log::info!("Logging to {}", log_dir.display());
        }
        Err(e) => {
            *LOG_FILE.lock() = None;
            log::warn!("Failed to open log file in {}: {}", log_dir.display(), e);
        }
    }
}

pub fn level_for(settings: &Settings) -> LevelFilter {
    if settings.debug_mode {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Daily log file path inside `log_dir`
pub fn log_file_path(log_dir: &Path, date: chrono::NaiveDate) -> PathBuf {
    log_dir.join(format!("log_{}.txt", date.format("%Y%m%d")))
}

fn open_log_file(log_dir: &Path, debug_mode: bool) -> io::Result<File> {
    fs::create_dir_all(log_dir)?;
    let now = chrono::Local::now();
    let path = log_file_path(log_dir, now.date_naive());
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    write!(
        file,
        "==================== Ruanm Screensaver log ====================\n\
         Started: {}\n\
         Version: {}\n\
         Debug mode: {}\n\
         ===============================================================\n\n",
        now.format("%Y-%m-%d %H:%M:%S"),
        CURRENT_VERSION,
        if debug_mode { "on" } else { "off" }
    )?;
    Ok(file)
}
