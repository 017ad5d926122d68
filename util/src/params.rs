//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable holding the root directory of the software checkout.
pub const SW_ROOT_ENV_VAR: &str = "ROVER_SW_ROOT";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (ROVER_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot load the parmeter file {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the root directory of the software, as given by `ROVER_SW_ROOT`.
pub fn get_sw_root() -> Result<PathBuf, LoadError> {
    std::env::var_os(SW_ROOT_ENV_VAR)
        .map(PathBuf::from)
        .ok_or(LoadError::SwRootNotSet)
}

/// Get the full path to a file in the "params" directory.
pub fn params_path<P: AsRef<Path>>(param_file_path: P) -> Result<PathBuf, LoadError> {
    let mut path = get_sw_root()?;
    path.push("params");
    path.push(param_file_path);
    Ok(path)
}

/// Load a parameter file
///
/// The file path is relative to the "params" directory under the software root.
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    load_from_path(params_path(param_file_path)?)
}

/// Load a parameter file from an explicit path.
pub fn load_from_path<P, F>(path: F) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    F: AsRef<Path>
{
    let params_str = read_to_string(path.as_ref())
        .map_err(|e| LoadError::FileLoadError(path.as_ref().to_path_buf(), e))?;

    from_str(&params_str)
}

/// Parse a parameter struct from a TOML string.
pub fn from_str<P>(params_str: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    toml::from_str(params_str).map_err(LoadError::DeserialiseError)
}
