//! Config loading and layering.

mod load;
mod merge;
mod schema;

pub use load::{
    ConfigError, LOCAL_CONFIG_NAME, config_path, load, load_from, load_layer, load_or_default,
    local_config_path,
};
pub use merge::{apply_env_overrides, merge_layers};
pub use schema::{
    Config, ConfigLayer, DEFAULT_COMBINED_NAME, DEFAULT_INTERMEDIATE_NAME, FileLoggingConfig,
    FileLoggingConfigOverride, LogFormat, LogRotation, LoggingConfig, LoggingConfigOverride,
    OutputConfig, OutputConfigOverride,
};
