//! Failure classes and error reporting
//!
//! Every crate maps its own error enum onto `FailureClass` so that the
//! link, the supervisor and the REST client agree on what gets retried.

use std::fmt;
use std::sync::Arc;

/// How a failure is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Connection drop, DNS failure or timeout; retried with backoff
    Transient,
    /// Reconnect request or resumable invalid session; retried via resume
    ResumableSessionLoss,
    /// Session discarded; retried via a fresh identify
    NonResumableSessionLoss,
    /// Bad token, disallowed intents, invalid shard; never retried
    Fatal,
    /// Rejected by the service's rate limiter; retried after the indicated wait
    RateLimited,
    /// A user callback returned an error or panicked
    Callback,
}

impl FailureClass {
    /// Whether the failure is retried by the client itself
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Fatal | Self::Callback)
    }

    /// Get the class name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::ResumableSessionLoss => "resumable_session_loss",
            Self::NonResumableSessionLoss => "non_resumable_session_loss",
            Self::Fatal => "fatal",
            Self::RateLimited => "rate_limited",
            Self::Callback => "callback",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classification helpers implemented by every error enum in the workspace
pub trait Classify {
    fn failure_class(&self) -> FailureClass;

    /// Stable code for logs and reports
    fn error_code(&self) -> &'static str;

    fn is_retryable(&self) -> bool {
        self.failure_class().is_retryable()
    }

    fn is_fatal(&self) -> bool {
        self.failure_class() == FailureClass::Fatal
    }
}

/// A failure delivered to the error hook
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub class: FailureClass,
    pub shard_id: Option<u32>,
    /// Event or operation that failed
    pub context: String,
    pub message: String,
}

impl ErrorReport {
    pub fn new(class: FailureClass, context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class,
            shard_id: None,
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn with_shard(mut self, shard_id: u32) -> Self {
        self.shard_id = Some(shard_id);
        self
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shard_id {
            Some(shard) => write!(
                f,
                "[{}] shard {shard} {}: {}",
                self.class, self.context, self.message
            ),
            None => write!(f, "[{}] {}: {}", self.class, self.context, self.message),
        }
    }
}

/// Error-notification path for failures that must not propagate
pub type ErrorHook = Arc<dyn Fn(&ErrorReport) + Send + Sync>;

/// Hook that logs every report through `tracing`
pub fn default_error_hook() -> ErrorHook {
    Arc::new(|report: &ErrorReport| {
        tracing::error!(
            class = %report.class,
            shard_id = ?report.shard_id,
            context = %report.context,
            "{}",
            report.message
        );
    })
}
