//! XDG directory helpers for config and log locations.

use std::path::PathBuf;

const APP_DIR: &str = "kana-state-upgrade";

/// Base directory for configuration files.
///
/// Uses `KANA_CONFIG_DIR` if set, otherwise `$XDG_CONFIG_HOME/kana-state-upgrade`
/// or `~/.config/kana-state-upgrade`.
pub(crate) fn config_dir() -> PathBuf {
    config_dir_from(|key| std::env::var(key).ok())
}

/// Default directory for rolling log files.
///
/// Uses `KANA_DATA_DIR` if set, otherwise `$XDG_DATA_HOME/kana-state-upgrade/logs`
/// or `~/.local/share/kana-state-upgrade/logs`.
pub(crate) fn log_dir() -> PathBuf {
    data_dir_from(|key| std::env::var(key).ok()).join("logs")
}

fn config_dir_from(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    xdg_dir(&env, "KANA_CONFIG_DIR", "XDG_CONFIG_HOME", &[".config"])
}

fn data_dir_from(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    xdg_dir(&env, "KANA_DATA_DIR", "XDG_DATA_HOME", &[".local", "share"])
}

fn xdg_dir(
    env: &impl Fn(&str) -> Option<String>,
    override_var: &str,
    xdg_var: &str,
    home_fallback: &[&str],
) -> PathBuf {
    if let Some(dir) = env(override_var)
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }

    env(xdg_var)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
            home_fallback.iter().fold(home, |path, part| path.join(part))
        })
        .join(APP_DIR)
}
