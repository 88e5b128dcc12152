use std::path::PathBuf;

use super::{Config, ConfigLayer, LogFormat};

/// Later layers win.
pub fn merge_layers(user: Option<ConfigLayer>, local: Option<ConfigLayer>) -> Config {
    let mut config = Config::default();
    for layer in [user, local].into_iter().flatten() {
        layer.apply_to(&mut config);
    }
    config
}

/// Runs before tracing is installed, so rejected values go to stderr directly.
pub fn apply_env_overrides(config: &mut Config) {
    for rejected in apply_overrides_from(config, |key| std::env::var(key).ok()) {
        eprintln!("{rejected}");
    }
}

/// Applies `KANA_*` overrides read through `env`. Blank values are ignored.
///
/// Returns a message per override that could not be applied.
pub(crate) fn apply_overrides_from(
    config: &mut Config,
    env: impl Fn(&str) -> Option<String>,
) -> Vec<String> {
    let mut rejected = Vec::new();
    let var = |key: &str| {
        env(key)
            .map(|raw| raw.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    if let Some(dir) = var("KANA_OUTPUT_DIR") {
        config.output.dir = Some(PathBuf::from(dir));
    }
    if let Some(name) = var("KANA_INTERMEDIATE_NAME") {
        config.output.intermediate_name = name;
    }
    if let Some(name) = var("KANA_OUTPUT_NAME") {
        config.output.combined_name = name;
    }
    if let Some(raw) = var("KANA_LOG_FORMAT") {
        match raw.parse::<LogFormat>() {
            Ok(format) => config.logging.stderr_format = format,
            Err(err) => rejected.push(format!("invalid KANA_LOG_FORMAT, ignoring: {err}")),
        }
    }
    rejected
}
