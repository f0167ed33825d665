//! Common functionality for geox-prep.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod clip;
pub mod country;
pub mod exclusion;
pub mod hexagon;
pub mod hydro;
pub mod id;
pub mod log;
pub mod output;
pub mod pipeline;
pub mod settings;
pub mod template;
pub mod toolkit;
pub mod units;
pub mod utm;
pub mod vector;
pub mod workspace;

#[cfg(test)]
mod fixture;

/// Get config dir for program.
///
/// Falls back to the current directory if the platform has no notion of a config dir.
pub fn get_geox_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        return PathBuf::from(".");
    };
    config_dir.push("geox-prep");

    config_dir
}
