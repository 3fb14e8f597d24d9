//! # concord-common
//!
//! Shared utilities including configuration, the failure taxonomy, and telemetry.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppSettings, BackoffConfig, CacheConfig, ClientConfig, ConfigError, Environment,
    GatewayConfig, HttpConfig,
};
pub use error::{default_error_hook, Classify, ErrorHook, ErrorReport, FailureClass};
pub use telemetry::{
    init_tracing, init_tracing_with_config, shard_span, try_init_tracing,
    try_init_tracing_with_config, TracingConfig, TracingError,
};
