//! Application configuration

mod app_config;

pub use app_config::{
    parse_bool_env, parse_key_list, AppConfig, LogFormat, LoggingConfig, ServerConfig,
    StorageBackend, StorageConfig,
};
