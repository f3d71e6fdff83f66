//! # Logging
//!
//! Log records are written through `fern` to both stdout and the session's
//! log file, each stamped with the seconds since the session started.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::info;
use thiserror::Error;

// Internal imports
use crate::session::{self, Session};

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Log target of the controllers library, which logs every control step at
/// `TRACE`.
pub const CTRL_TARGET: &str = "motion_lib";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
/// 
/// `ctrl_level` applies to the controllers library only, so the per-step
/// output can be enabled without flooding the log with everything else at
/// `TRACE`.
/// 
/// # Notes
/// 
/// - `min_level` must be `INFO` or more verbose, so that the startup 
///   information is always recorded.
/// - Only the first call in a process succeeds.
pub fn logger_init(
    min_level: LevelFilter, 
    ctrl_level: LevelFilter,
    session: &Session
) -> Result<(), LoggerInitError> {

    if min_level < LevelFilter::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            let time_s = session::elapsed_seconds().unwrap_or(f64::NAN);

            // Debug and trace records also show where they came from
            if record.level() > log::Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}] {}: {}",
                    time_s,
                    level_to_str(record.level()),
                    record.target(),
                    message
                ))
            }
            else {
                out.finish(format_args!(
                    "[{:10.6} {}] {}",
                    time_s,
                    level_to_str(record.level()),
                    message
                ))
            }
        })
        .level(min_level)
        .level_for(CTRL_TARGET, ctrl_level)
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;
    
    info!("Logging initialised");
    if let Some(epoch) = session::epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?} ({}: {:?})", min_level, CTRL_TARGET, ctrl_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Three letter, coloured, tag of a log level
fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info  => "INF".normal(),
        log::Level::Warn  => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold()
    }
}
