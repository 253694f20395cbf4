// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicU8, Ordering};

use colored::Colorize;
use log::{Level, LevelFilter, Log, Metadata, Record};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Normal as u8);

pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    log::set_max_level(level.filter());
}

pub fn log_level() -> LogLevel {
    match LOG_LEVEL.load(Ordering::Relaxed) {
        0 => LogLevel::Quiet,
        2 => LogLevel::Verbose,
        _ => LogLevel::Normal,
    }
}

impl LogLevel {
    fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Quiet => LevelFilter::Error,
            LogLevel::Normal => LevelFilter::Warn,
            LogLevel::Verbose => LevelFilter::Debug,
        }
    }
}

/// Routes `log` records from the library crates to stderr.
struct CliLogger;

static LOGGER: CliLogger = CliLogger;

impl Log for CliLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log_level().filter()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = record.args().to_string();
        let line = match record.level() {
            Level::Error => msg.red().bold(),
            Level::Warn => msg.yellow(),
            Level::Info => msg.normal(),
            Level::Debug | Level::Trace => msg.dimmed(),
        };
        eprintln!("{} {line}", "[pmpctl]".dimmed());
    }

    fn flush(&self) {}
}

/// Installs the logger; a second call only changes the level.
pub fn init(level: LogLevel) {
    let _ = log::set_logger(&LOGGER);
    set_log_level(level);
}

#[macro_export]
macro_rules! log_normal {
    ($($arg:tt)*) => {
        println!("[pmpctl] {}", format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if $crate::utils::log_level() != $crate::utils::LogLevel::Quiet {
            println!("[pmpctl] {}", format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_verbose {
    ($($arg:tt)*) => {
        if $crate::utils::log_level() == $crate::utils::LogLevel::Verbose {
            println!("[pmpctl] {}", format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_ok {
    ($($arg:tt)*) => {
        if $crate::utils::log_level() != $crate::utils::LogLevel::Quiet {
            println!("[pmpctl] {} {}", colored::Colorize::green("✓"), format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_fail {
    ($($arg:tt)*) => {
        eprintln!("[pmpctl] {} {}", colored::Colorize::red("✗"), format_args!($($arg)*))
    };
}
