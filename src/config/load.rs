use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::merge::{apply_env_overrides, merge_layers};
use super::{Config, ConfigLayer};

/// Per-directory config, picked up from the working directory.
pub const LOCAL_CONFIG_NAME: &str = "kana-upgrade.toml";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub fn config_path() -> PathBuf {
    crate::paths::config_dir().join("config.toml")
}

pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(LOCAL_CONFIG_NAME)
}

/// Reads one layer; a missing file is not an error.
pub fn load_layer(path: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// User config, then `kana-upgrade.toml` in `cwd`, then `KANA_*` env vars.
pub fn load_from(user_path: &Path, cwd: Option<&Path>) -> Result<Config, ConfigError> {
    let user = load_layer(user_path)?;
    let local = match cwd {
        Some(dir) => load_layer(&local_config_path(dir))?,
        None => None,
    };
    let mut config = merge_layers(user, local);
    apply_env_overrides(&mut config);
    Ok(config)
}

pub fn load() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().ok();
    load_from(&config_path(), cwd.as_deref())
}

/// Like [`load`], but falls back to defaults (plus env overrides) when a
/// config file is unusable. The error is returned so it can be logged once
/// logging is up.
pub fn load_or_default() -> (Config, Option<ConfigError>) {
    match load() {
        Ok(config) => (config, None),
        Err(err) => {
            let mut config = Config::default();
            apply_env_overrides(&mut config);
            (config, Some(err))
        }
    }
}
