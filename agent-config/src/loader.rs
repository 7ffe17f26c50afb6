//! Loading [`RunConfig`] from files and the environment.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::RunConfig;

/// Reads a TOML file, applies `AGENT_*` overrides, and validates the result.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read, or any error of
/// [`RunConfig::from_toml_str`] and [`RunConfig::apply_env`].
pub fn load(path: impl AsRef<Path>) -> ConfigResult<RunConfig> {
    let path = path.as_ref();
    let document = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config = RunConfig::from_toml_str(&document)?.apply_env()?;
    config.validate()?;
    info!(path = %path.display(), max_turns = config.max_turns(), "loaded run configuration");
    Ok(config)
}

/// Like [`load`], but falls back to defaults plus environment overrides when
/// no path is given.
///
/// # Errors
///
/// See [`load`].
pub fn load_or_default(path: Option<&Path>) -> ConfigResult<RunConfig> {
    if let Some(path) = path {
        return load(path);
    }

    let config = RunConfig::default().apply_env()?;
    config.validate()?;
    debug!(max_turns = config.max_turns(), "using default run configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn loads_file() {
        let path = std::env::temp_dir().join(format!("run-config-{}.toml", std::process::id()));
        fs::write(&path, "[run]\nmodel_timeout_ms = 2000\n").unwrap();

        let config = load(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(config.model_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load("/nonexistent/run-config.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
