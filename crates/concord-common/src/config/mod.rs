//! Configuration structs

mod client_config;

pub use client_config::{
    AppSettings, BackoffConfig, CacheConfig, ClientConfig, ConfigError, Environment,
    GatewayConfig, HttpConfig,
};
