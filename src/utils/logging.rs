// Tue Jan 13 2026 - Alex

use crate::config::Config;
use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

pub struct LoggingUtils;

impl LoggingUtils {
    pub fn init_logger(level: LevelFilter) -> bool {
        let installed = log::set_boxed_logger(Box::new(ColoredLogger::new(level))).is_ok();
        if installed {
            log::set_max_level(level);
        }
        installed
    }

    pub fn init_logger_with_file(level: LevelFilter, file_path: &Path) -> std::io::Result<bool> {
        let file = OpenOptions::new().create(true).append(true).open(file_path)?;

        let installed = log::set_boxed_logger(Box::new(FileLogger::new(level, file))).is_ok();
        if installed {
            log::set_max_level(level);
        }
        Ok(installed)
    }
}

/// Installs the logger for a dumping session inside the target process.
///
/// A configured log file wins. Otherwise `RUST_LOG` selects env_logger, and
/// without it the colored stderr logger is used. A logger the host process
/// already installed is left alone.
pub fn init_for_session(config: &Config) {
    let level = if config.verbose { LevelFilter::Debug } else { LevelFilter::Info };

    if let Some(path) = &config.log_file {
        match LoggingUtils::init_logger_with_file(level, path) {
            Ok(_) => return,
            Err(err) => eprintln!("module-dumper: cannot open log file {:?}: {}", path, err),
        }
    }

    if std::env::var_os("RUST_LOG").is_some() {
        let _ = env_logger::Builder::from_default_env().try_init();
        return;
    }

    LoggingUtils::init_logger(level);
}

struct ColoredLogger {
    level: LevelFilter,
}

impl ColoredLogger {
    fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    fn format_level(&self, level: Level) -> ColoredString {
        match level {
            Level::Error => "ERROR".red().bold(),
            Level::Warn => "WARN ".yellow().bold(),
            Level::Info => "INFO ".green().bold(),
            Level::Debug => "DEBUG".blue().bold(),
            Level::Trace => "TRACE".magenta().bold(),
        }
    }
}

impl Log for ColoredLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let target = format!("[{} {}]", record.target(), std::process::id());
            eprintln!("{} {} {}", self.format_level(record.level()), target.dimmed(), record.args());
        }
    }

    fn flush(&self) {}
}

struct FileLogger {
    level: LevelFilter,
    file: Mutex<File>,
}

impl FileLogger {
    fn new(level: LevelFilter, file: File) -> Self {
        Self {
            level,
            file: Mutex::new(file),
        }
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let line = format_line(record.level(), record.target(), &record.args().to_string());
            let _ = self.file.lock().write_all(line.as_bytes());
        }
    }

    fn flush(&self) {
        let _ = self.file.lock().flush();
    }
}

fn format_line(level: Level, target: &str, message: &str) -> String {
    format!("{} {:5} [{}] {}\n", timestamp(), level, target, message)
}

fn timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    format!("{}.{:03}", duration.as_secs(), duration.subsec_millis())
}

pub struct ScopedTimer {
    name: String,
    start: Instant,
}

impl ScopedTimer {
    pub fn new(name: &str) -> Self {
        log::debug!("[TIMER] {} started", name);
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        log::debug!("[TIMER] {} took {:.2}ms", self.name, elapsed.as_secs_f64() * 1000.0);
    }
}
