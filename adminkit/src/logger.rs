use chrono::Local;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => write!(f, "INFO"),
            Level::Warn => write!(f, "WARN"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

pub fn format_line(level: Level, args: fmt::Arguments) -> String {
    let now = Local::now();
    format!("[{}] {} {}", now.format("%Y-%m-%d %H:%M:%S"), level, args)
}

pub fn info(args: fmt::Arguments) {
    println!("{}", format_line(Level::Info, args));
}

pub fn warn(args: fmt::Arguments) {
    println!("{}", format_line(Level::Warn, args));
}

pub fn error(args: fmt::Arguments) {
    eprintln!("{}", format_line(Level::Error, args));
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::logger::info(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::logger::warn(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::logger::error(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_carries_level_and_message() {
        let line = format_line(Level::Warn, format_args!("view {} registered twice", "users"));
        assert!(line.starts_with('['));
        assert!(line.ends_with("WARN view users registered twice"));
    }
}
