use std::sync::atomic::{AtomicU64, Ordering};

use crate::timeq::Cycle;

#[derive(PartialEq, PartialOrd, Debug, Default, Clone, Copy)]
pub enum LogLevel {
    #[default]
    NONE,
    INFO,
    DEBUG,
}

impl LogLevel {
    fn to_string(&self) -> &str {
        match self {
            LogLevel::NONE => "NONE",
            LogLevel::INFO => "INFO",
            LogLevel::DEBUG => "DEBUG",
        }
    }
}

pub fn to_loglevel(ulevel: u64) -> LogLevel {
    match ulevel {
        0 => LogLevel::NONE,
        1 => LogLevel::INFO,
        2 => LogLevel::DEBUG,
        _ => LogLevel::NONE,
    }
}

/// Console logger for simulation events, stamped with the cycle the driver last published.
#[derive(Debug)]
pub struct Logger {
    level: LogLevel,
    cycle: AtomicU64,
}

impl Logger {
    pub fn new(ulevel: u64) -> Self {
        let level = to_loglevel(ulevel);
        Logger {
            level,
            cycle: AtomicU64::new(0),
        }
    }

    pub fn silent() -> Self {
        Logger::new(0)
    }

    pub fn set_cycle(&self, cycle: Cycle) {
        self.cycle.store(cycle, Ordering::Relaxed);
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::NONE && level <= self.level
    }

    pub fn log(&self, level: LogLevel, args: std::fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        println!(
            "[{}] @{:>10} {}",
            level.to_string(),
            self.cycle.load(Ordering::Relaxed),
            args
        );
    }
}

#[macro_export]
macro_rules! log {
    // usage: log!(logger, "a {} event", "clock")
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        $logger.log($level, format_args!($($arg)+));
    }};
}
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => ( $crate::log!($logger, $crate::sim::log::LogLevel::INFO, $($arg)+); )
}
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => ( $crate::log!($logger, $crate::sim::log::LogLevel::DEBUG, $($arg)+); )
}
