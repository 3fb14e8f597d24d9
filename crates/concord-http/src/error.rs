use thiserror::Error;

use concord_common::{Classify, FailureClass};

pub type HttpResult<T> = Result<T, HttpError>;

/// REST client errors
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Token contains characters not allowed in a header")]
    InvalidToken,

    #[error("Request to {route} failed: {source}")]
    Transport {
        route: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{route} returned {status}: {body}")]
    Status {
        route: String,
        status: u16,
        body: String,
    },

    #[error("{route} still rate limited after {attempts} attempts")]
    RateLimited { route: String, attempts: u32 },

    #[error("Failed to decode response of {route}: {source}")]
    Decode {
        route: String,
        #[source]
        source: serde_json::Error,
    },
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

impl Classify for HttpError {
    fn failure_class(&self) -> FailureClass {
        match self {
            Self::Transport { .. } => FailureClass::Transient,
            Self::Status { status, .. } if *status >= 500 => FailureClass::Transient,
            Self::RateLimited { .. } => FailureClass::RateLimited,
            Self::Build(_) | Self::InvalidToken | Self::Status { .. } | Self::Decode { .. } => FailureClass::Fatal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Build(_) => "HTTP_BUILD",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::Transport { .. } => "HTTP_TRANSPORT",
            Self::Status { status: 401, .. } => "UNAUTHORIZED",
            Self::Status { status: 403, .. } => "FORBIDDEN",
            Self::Status { status: 404, .. } => "NOT_FOUND",
            Self::Status { .. } => "HTTP_STATUS",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Decode { .. } => "HTTP_DECODE",
        }
    }
}
