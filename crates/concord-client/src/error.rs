use thiserror::Error;

use concord_common::{Classify, ConfigError, FailureClass};
use concord_gateway::{GatewayError, SupervisorError};
use concord_http::HttpError;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0} is required")]
    Missing(&'static str),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

impl Classify for ClientError {
    fn failure_class(&self) -> FailureClass {
        match self {
            Self::Config(_) | Self::Missing(_) => FailureClass::Fatal,
            Self::Http(e) => e.failure_class(),
            Self::Gateway(e) => e.failure_class(),
            Self::Supervisor(e) => e.failure_class(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Missing(_) => "MISSING_COMPONENT",
            Self::Http(e) => e.error_code(),
            Self::Gateway(e) => e.error_code(),
            Self::Supervisor(e) => e.error_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_component() {
        let err = ClientError::Missing("event handler");
        assert_eq!(err.to_string(), "event handler is required");
        assert!(err.is_fatal());
        assert_eq!(err.error_code(), "MISSING_COMPONENT");
    }

    #[test]
    fn test_supervisor_code_passes_through() {
        let err: ClientError = SupervisorError::AlreadyRunning.into();
        assert_eq!(err.error_code(), "ALREADY_RUNNING");
    }
}
