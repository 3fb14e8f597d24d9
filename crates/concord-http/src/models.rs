use serde::{Deserialize, Serialize};

use concord_core::Snowflake;

/// Response of `GET /gateway/bot`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayBot {
    pub url: String,
    /// Recommended shard count
    pub shards: u32,
    pub session_start_limit: SessionStartLimit,
}

/// How many identifies the token may still perform, and how fast
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until `remaining` resets
    pub reset_after: u64,
    /// Identifies allowed per 5 second window
    pub max_concurrency: u32,
}

/// Body of `POST /channels/{channel_id}/messages`
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateMessage {
    pub content: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub tts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<MessageReference>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageReference {
    pub message_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Snowflake>,
}

impl CreateMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn reply_to(mut self, message_id: Snowflake) -> Self {
        self.message_reference = Some(MessageReference {
            message_id,
            channel_id: None,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_bot_decode() {
        let bot: GatewayBot = serde_json::from_str(
            r#"{"url":"wss://gateway.discord.gg","shards":4,
                "session_start_limit":{"total":1000,"remaining":998,"reset_after":14400000,"max_concurrency":1}}"#,
        )
        .unwrap();
        assert_eq!(bot.shards, 4);
        assert_eq!(bot.session_start_limit.max_concurrency, 1);
    }

    #[test]
    fn test_create_message_body() {
        let body = serde_json::to_value(CreateMessage::text("pong").reply_to(Snowflake::new(42))).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"content": "pong", "message_reference": {"message_id": "42"}})
        );
    }
}
