//! Init command - write a config file populated with defaults.

use std::path::PathBuf;

use geovisit::config::{ConfigError, ConfigFile};

use crate::error::CliError;

/// Writes the default configuration to `path` (or the default location).
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn run(path: Option<PathBuf>, force: bool) -> Result<PathBuf, CliError> {
    let path = match path {
        Some(path) => path,
        None => ConfigFile::default_path().ok_or(ConfigError::NoConfigDir)?,
    };

    if path.exists() && !force {
        return Err(CliError::Input(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    ConfigFile::default().save(&path)?;
    Ok(path)
}
