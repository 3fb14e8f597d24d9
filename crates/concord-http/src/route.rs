use std::fmt;

use reqwest::Method;

use concord_core::Snowflake;

/// A REST call target
///
/// Two calls share a rate-limit bucket when they share the route key and the
/// major parameter, or when the service reported the same bucket hash for
/// their route keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    /// Path with major parameter placeholders, e.g. `/channels/{channel_id}/messages`
    pub template: &'static str,
    /// Concrete path sent on the wire
    pub path: String,
    /// Channel, guild or webhook id the bucket is scoped by
    pub major: Option<Snowflake>,
}

impl Route {
    pub fn new(method: Method, template: &'static str, path: impl Into<String>) -> Self {
        Self {
            method,
            template,
            path: path.into(),
            major: None,
        }
    }

    #[must_use]
    pub fn with_major(mut self, major: Snowflake) -> Self {
        self.major = Some(major);
        self
    }

    /// Method and template, the key bucket hashes are learned under
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.template)
    }

    pub fn get_gateway_bot() -> Self {
        Self::new(Method::GET, "/gateway/bot", "/gateway/bot")
    }

    pub fn get_current_user() -> Self {
        Self::new(Method::GET, "/users/@me", "/users/@me")
    }

    pub fn get_user(user_id: Snowflake) -> Self {
        Self::new(Method::GET, "/users/{user_id}", format!("/users/{user_id}"))
    }

    pub fn get_channel(channel_id: Snowflake) -> Self {
        Self::new(
            Method::GET,
            "/channels/{channel_id}",
            format!("/channels/{channel_id}"),
        )
        .with_major(channel_id)
    }

    pub fn create_message(channel_id: Snowflake) -> Self {
        Self::new(
            Method::POST,
            "/channels/{channel_id}/messages",
            format!("/channels/{channel_id}/messages"),
        )
        .with_major(channel_id)
    }

    pub fn delete_message(channel_id: Snowflake, message_id: Snowflake) -> Self {
        Self::new(
            Method::DELETE,
            "/channels/{channel_id}/messages/{message_id}",
            format!("/channels/{channel_id}/messages/{message_id}"),
        )
        .with_major(channel_id)
    }

    pub fn get_guild_member(guild_id: Snowflake, user_id: Snowflake) -> Self {
        Self::new(
            Method::GET,
            "/guilds/{guild_id}/members/{user_id}",
            format!("/guilds/{guild_id}/members/{user_id}"),
        )
        .with_major(guild_id)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}
