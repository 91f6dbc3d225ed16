//! Helpers shared across CLI commands.

use std::path::Path;

use geovisit::config::ConfigFile;
use geovisit::logging::{init_logging, LoggingConfig, WorkerGuard};
use serde::de::DeserializeOwned;
use tokio::runtime::Runtime;

use crate::error::CliError;

/// Loads the config file: `--config`, else the default location if present,
/// else built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    Ok(ConfigFile::load_or_default(path)?)
}

/// Installs logging; `-v` raises the level to debug, `-vv` to trace.
pub fn start_logging(config: &LoggingConfig, verbose: u8) -> Result<Option<WorkerGuard>, CliError> {
    let config = match verbose {
        0 => config.clone(),
        1 => config.clone().with_level("debug"),
        _ => config.clone().with_level("trace"),
    };
    Ok(init_logging(&config)?)
}

pub fn runtime() -> Result<Runtime, CliError> {
    Runtime::new().map_err(CliError::Runtime)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geovisit::NewZone;

    #[test]
    fn test_read_json_reports_path() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("zones.json");
        std::fs::write(&path, "[{\"name\": \"A\"}]").unwrap();

        let err = read_json::<Vec<NewZone>>(&path).unwrap_err();
        assert!(err.to_string().contains("zones.json"));
    }

    #[test]
    fn test_read_json_missing_file() {
        let err = read_json::<Vec<NewZone>>(Path::new("/nonexistent/zones.json")).unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
    }
}
