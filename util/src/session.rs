//! # Sessions
//!
//! A session is one run of an executable. Every session gets its own 
//! directory, named after the executable and the time it started, holding the
//! log file and an `arch` directory for the CSV archives.
//!
//! The session epoch is process wide and can only be set once, so only one
//! session may be started per process.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// chrono strftime format of the timestamp in the session directory name.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Name of the archive directory inside the session directory.
const ARCH_DIR: &str = "arch";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Paths belonging to the current session
#[derive(Clone, Debug)]
pub struct Session {
    /// `{sessions_dir}/{exec_name}_{timestamp}`
    pub session_root: PathBuf,

    /// Directory that archives are written into
    pub arch_root: PathBuf,

    /// `{session_root}/{exec_name}.log`
    pub log_file_path: PathBuf,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors that can occur when starting a session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("The software root environment variable ({}) is not set", crate::host::SW_ROOT_ENV_VAR)]
    SwRootNotSet,

    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error("A session has already been started in this process ({0})")]
    CannotInitEpoch(conquer_once::TryInitError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start a new session in `sessions_dir`, relative to the software root.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        let root = crate::host::get_sw_root()
            .map_err(|_| SessionError::SwRootNotSet)?;

        Self::new_in(exec_name, root.join(sessions_dir))
    }

    /// Start a new session in an explicit directory.
    pub fn new_in<P: AsRef<Path>>(
        exec_name: &str, 
        sessions_dir: P
    ) -> Result<Self, SessionError> {
        let epoch = Utc::now();
        SESSION_EPOCH.try_init_once(|| epoch)
            .map_err(SessionError::CannotInitEpoch)?;

        let session_root = sessions_dir.as_ref().join(
            format!("{}_{}", exec_name, epoch.format(TIMESTAMP_FORMAT))
        );
        let arch_root = session_root.join(ARCH_DIR);

        // Creates the session root as well
        fs::create_dir_all(&arch_root).map_err(SessionError::CannotCreateDir)?;

        debug!("Session created in {:?}", session_root);

        Ok(Session {
            log_file_path: session_root.join(format!("{}.log", exec_name)),
            session_root,
            arch_root,
        })
    }

    /// Path of a file inside the archive directory.
    pub fn arch_path<P: AsRef<Path>>(&self, rel_path: P) -> PathBuf {
        self.arch_root.join(rel_path)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Seconds elapsed since the session started, or `None` if no session has
/// been started.
pub fn elapsed_seconds() -> Option<f64> {
    SESSION_EPOCH.get()
        .and_then(|e| (Utc::now() - *e).num_nanoseconds())
        .map(|ns| ns as f64 * 1e-9)
}

/// The time the session started, or `None` if no session has been started.
pub fn epoch() -> Option<&'static DateTime<Utc>> {
    SESSION_EPOCH.get()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_session() {
        let dir = std::env::temp_dir()
            .join(format!("util_session_test_{}", std::process::id()));

        let session = Session::new_in("test_exec", &dir).unwrap();

        assert!(session.session_root.starts_with(&dir));
        assert!(session.arch_root.is_dir());
        assert_eq!(session.log_file_path.file_name().unwrap(), "test_exec.log");
        assert_eq!(session.arch_path("a.csv"), session.arch_root.join("a.csv"));

        assert!(epoch().is_some());
        assert!(elapsed_seconds().unwrap() >= 0.0);

        // Only one session per process
        match Session::new_in("test_exec", &dir) {
            Err(SessionError::CannotInitEpoch(_)) => (),
            r => panic!("Expected CannotInitEpoch, got {:?}", r)
        }
    }
}
