use thiserror::Error;

use crate::value_objects::SnowflakeParseError;

/// Errors produced while turning wire payloads into domain types
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to decode {event} payload: {source}")]
    Decode {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Dispatch frame is missing its event name")]
    MissingEventName,

    #[error("Invalid snowflake: {0}")]
    InvalidSnowflake(#[from] SnowflakeParseError),
}

impl ModelError {
    /// Build a decode error for the named event
    pub fn decode(event: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            event: event.into(),
            source,
        }
    }

    /// Get an error code string for reporting
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "DECODE_ERROR",
            Self::MissingEventName => "MISSING_EVENT_NAME",
            Self::InvalidSnowflake(_) => "INVALID_SNOWFLAKE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let source = serde_json::from_str::<u64>("\"x\"").unwrap_err();
        let err = ModelError::decode("GUILD_CREATE", source);
        assert!(err.to_string().starts_with("Failed to decode GUILD_CREATE payload"));
        assert_eq!(err.code(), "DECODE_ERROR");
    }

    #[test]
    fn test_from_snowflake_error() {
        let err: ModelError = SnowflakeParseError::InvalidFormat.into();
        assert_eq!(err.code(), "INVALID_SNOWFLAKE");
    }
}
