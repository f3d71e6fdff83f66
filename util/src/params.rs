//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::Path;
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (MOTION_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot load the parmeter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the "$MOTION_SW_ROOT/params" directory
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError> 
where
    P: DeserializeOwned
{
    // Get the params dir
    let mut path = crate::host::get_sw_root()
        .map_err(|_| LoadError::SwRootNotSet)?;
    path.push("params");
    path.push(param_file_path);

    load_from_path(path)
}

/// Load a parameter file from an explicit path, ignoring the software root.
pub fn load_from_path<P, F>(path: F) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    F: AsRef<Path>
{
    // Load the file into a string
    let params_str = match read_to_string(path) {
        Ok(s) => s,
        Err(e) => return Err(LoadError::FileLoadError(e))
    };

    from_str(params_str.as_str())
}

/// Parse parameters from a TOML string.
pub fn from_str<P>(params_str: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    match toml::from_str(params_str) {
        Ok(p) => Ok(p),
        Err(e) => Err(LoadError::DeserialiseError(e))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    struct Gains {
        k_p: f64,
        k_i: f64,
        k_d: f64
    }

    #[test]
    fn test_from_str() {
        let g: Gains = from_str("k_p = 1.5\nk_i = 0.0\nk_d = 0.25\n").unwrap();
        assert_eq!(g.k_p, 1.5);
        assert_eq!(g.k_i, 0.0);
        assert_eq!(g.k_d, 0.25);
    }

    #[test]
    fn test_load_from_path() {
        let path = std::env::temp_dir()
            .join(format!("util_params_test_gains_{}.toml", std::process::id()));
        std::fs::write(&path, "k_p = 2.0\nk_i = 0.1\nk_d = 0.0\n").unwrap();

        let g: Gains = load_from_path(&path).unwrap();
        assert_eq!(g.k_p, 2.0);
        assert_eq!(g.k_i, 0.1);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_bad_params() {
        match from_str::<Gains>("k_p = 1.0\n") {
            Err(LoadError::DeserialiseError(_)) => (),
            r => panic!("Expected a deserialise error, got {:?}", r)
        }

        match load_from_path::<Gains, _>("/nonexistent/params.toml") {
            Err(LoadError::FileLoadError(_)) => (),
            r => panic!("Expected a file load error, got {:?}", r)
        }
    }
}
