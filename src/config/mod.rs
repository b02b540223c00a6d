//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, AwsConfig, DirectoryConfig, GcpConfig, LogFormat, LoggingConfig, ServerConfig,
};
