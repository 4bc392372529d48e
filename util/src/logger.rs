//! # Logging
//!
//! Every line is prefixed with the seconds elapsed since the session epoch and a coloured level
//! tag. The terminal only shows `INFO` and above so that it stays usable alongside the operator
//! console, the session log file receives everything down to the requested level.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{self, info, Level};
use colored::{ColoredString, Colorize};
use thiserror::Error;

use crate::session;

pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Could not open the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("Could not install the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Install the logger for this process, writing to the terminal and to the session's log file.
///
/// `min_level` must be `Info` or more verbose. Only the first call in a process can succeed.
pub fn logger_init(
    min_level: LevelFilter,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if min_level < LevelFilter::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    let terminal = fern::Dispatch::new()
        .level(LevelFilter::Info)
        .chain(std::io::stdout());

    fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!(
            "{}{}",
            prefix(session::get_elapsed_seconds(), record.level(), record.target()),
            message
        )))
        .level(min_level)
        .level_for("zmq", LevelFilter::Info)
        .level_for("rustyline", LevelFilter::Warn)
        .chain(terminal)
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Ok(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", min_level);
    info!("    Log file: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Prefix of a log line. Debug and trace lines also name their target.
fn prefix(elapsed_s: f64, level: Level, target: &str) -> String {
    match level {
        Level::Debug | Level::Trace =>
            format!("[{:10.6} {}] {}: ", elapsed_s, level_tag(level), target),
        _ => format!("[{:10.6} {}] ", elapsed_s, level_tag(level))
    }
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Trace => "TRC".dimmed().italic(),
        Level::Debug => "DBG".dimmed(),
        Level::Info  => "INF".normal(),
        Level::Warn  => "WRN".yellow(),
        Level::Error => "ERR".red().bold()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
