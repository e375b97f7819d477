use chrono::Local;
use simplelog::*;
use std::fs::{File, OpenOptions};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// map the string log level used in solver settings to a filter.
/// "off" and "none" switch logging off and give Ok(None)
pub fn loglevel_from_str(level: &str) -> Result<Option<LevelFilter>, String> {
    match level.to_lowercase().as_str() {
        "off" | "none" => Ok(None),
        "trace" => Ok(Some(LevelFilter::Trace)),
        "debug" => Ok(Some(LevelFilter::Debug)),
        "info" => Ok(Some(LevelFilter::Info)),
        "warn" => Ok(Some(LevelFilter::Warn)),
        "error" => Ok(Some(LevelFilter::Error)),
        other => Err(format!(
            "loglevel must be trace, debug, info, warn, error or off, got '{}'",
            other
        )),
    }
}

/// "auto" gives a timestamped file name, anything else is used as is
pub fn log_file_name(log_file: &str) -> String {
    if log_file == "auto" {
        let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
        format!("log_{}.txt", date_and_time)
    } else {
        log_file.to_string()
    }
}

/// open a log file for appending, an existing log is never truncated
pub fn open_log_file(path: &str) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// set once the global logger has been claimed, by this module or by anyone else
static LOGGER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Initialize the global logger: terminal output plus an optional log file.
/// Returns Ok(false) if a global logger was already installed, the log file is then not touched
pub fn init_logger(level: LevelFilter, log_file: Option<&str>) -> io::Result<bool> {
    if LOGGER_INSTALLED.load(Ordering::Acquire) {
        return Ok(false);
    }
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    loggers.push(TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ));
    if let Some(name) = log_file {
        let file = open_log_file(&log_file_name(name))?;
        loggers.push(WriteLogger::new(level, Config::default(), file));
    }
    let installed = CombinedLogger::init(loggers).is_ok();
    LOGGER_INSTALLED.store(true, Ordering::Release);
    Ok(installed)
}
