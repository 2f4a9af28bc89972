// SPDX-License-Identifier: MIT

use colored::Colorize;
use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogLevel {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

/// Console logger handed to every component of a run.
#[derive(Clone, Debug)]
pub struct Log {
    level: LogLevel,
    tag: &'static str,
}

impl Default for Log {
    fn default() -> Self {
        Self::new(LogLevel::Normal)
    }
}

impl Log {
    pub fn new(level: LogLevel) -> Self {
        Self { level, tag: "sqlvm" }
    }

    pub fn is_quiet(&self) -> bool {
        self.level == LogLevel::Quiet
    }

    pub fn is_verbose(&self) -> bool {
        self.level == LogLevel::Verbose
    }

    /// Always printed.
    pub fn normal(&self, args: fmt::Arguments<'_>) {
        println!("{} {args}", self.prefix());
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        if !self.is_quiet() {
            println!("{} {args}", self.prefix());
        }
    }

    pub fn verbose(&self, args: fmt::Arguments<'_>) {
        if self.is_verbose() {
            let now = time::OffsetDateTime::now_utc();
            println!(
                "{} {} {args}",
                self.prefix(),
                format!("{:02}:{:02}:{:02}", now.hour(), now.minute(), now.second()).dimmed()
            );
        }
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        eprintln!("{} {} {args}", self.prefix(), "warning:".yellow().bold());
    }

    pub fn success(&self, args: fmt::Arguments<'_>) {
        if !self.is_quiet() {
            println!("{} {} {args}", self.prefix(), "[OK]".green().bold());
        }
    }

    fn prefix(&self) -> String {
        format!("[{}]", self.tag).cyan().to_string()
    }
}

#[macro_export]
macro_rules! log_normal {
    ($log:expr, $($arg:tt)*) => {
        $log.normal(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($log:expr, $($arg:tt)*) => {
        $log.info(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_verbose {
    ($log:expr, $($arg:tt)*) => {
        $log.verbose(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($log:expr, $($arg:tt)*) => {
        $log.warn(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_ok {
    ($log:expr, $($arg:tt)*) => {
        $log.success(format_args!($($arg)*))
    };
}
