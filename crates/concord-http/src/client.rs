//! REST client
//!
//! Every request resolves its bucket, waits on the shared [`RateLimiter`],
//! then records the response headers before looking at the status.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use concord_common::HttpConfig;
use concord_core::{Channel, MemberData, Message, Snowflake, User};

use crate::error::{HttpError, HttpResult};
use crate::models::{CreateMessage, GatewayBot};
use crate::ratelimit::{seconds, RateLimitBody, RateLimitHeaders, RateLimiter};
use crate::route::Route;

/// Wait used when a 429 carries no usable retry-after
const FALLBACK_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Base of the linear delay between retries of 502/503/504
const SERVER_ERROR_DELAY: Duration = Duration::from_millis(500);

/// Cheaply cloneable REST client; clones share one rate limiter
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    limiter: Arc<RateLimiter>,
    max_retries: u32,
}

impl HttpClient {
    pub fn new(token: &str, config: &HttpConfig) -> HttpResult<Self> {
        Self::with_limiter(token, config, Arc::new(RateLimiter::new()))
    }

    /// Build a client around an existing limiter
    pub fn with_limiter(
        token: &str,
        config: &HttpConfig,
        limiter: Arc<RateLimiter>,
    ) -> HttpResult<Self> {
        let mut headers = HeaderMap::new();
        let mut auth =
            HeaderValue::try_from(format!("Bot {token}")).map_err(|_| HttpError::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("DiscordBot (concord, ", env!("CARGO_PKG_VERSION"), ")")),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(HttpError::Build)?;

        Ok(Self {
            http,
            base_url: Arc::from(config.api_base_url.trim_end_matches('/')),
            limiter,
            max_retries: config.max_retries,
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    // === Endpoints ===

    pub async fn get_gateway_bot(&self) -> HttpResult<GatewayBot> {
        self.request(&Route::get_gateway_bot(), None::<&()>).await
    }

    pub async fn get_current_user(&self) -> HttpResult<User> {
        self.request(&Route::get_current_user(), None::<&()>).await
    }

    pub async fn get_user(&self, user_id: Snowflake) -> HttpResult<User> {
        self.request(&Route::get_user(user_id), None::<&()>).await
    }

    pub async fn get_channel(&self, channel_id: Snowflake) -> HttpResult<Channel> {
        self.request(&Route::get_channel(channel_id), None::<&()>).await
    }

    pub async fn get_guild_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> HttpResult<MemberData> {
        self.request(&Route::get_guild_member(guild_id, user_id), None::<&()>)
            .await
    }

    pub async fn create_message(
        &self,
        channel_id: Snowflake,
        message: &CreateMessage,
    ) -> HttpResult<Message> {
        self.request(&Route::create_message(channel_id), Some(message))
            .await
    }

    pub async fn delete_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> HttpResult<()> {
        self.send(&Route::delete_message(channel_id, message_id), None::<&()>)
            .await
            .map(|_| ())
    }

    // === Transport ===

    /// Send a request and decode its JSON body
    pub async fn request<T, B>(&self, route: &Route, body: Option<&B>) -> HttpResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let bytes = self.send(route, body).await?;
        serde_json::from_slice(&bytes).map_err(|source| HttpError::Decode {
            route: route.to_string(),
            source,
        })
    }

    /// Send a request through the rate limiter, retrying 429 and 502/503/504
    #[instrument(skip(self, body), fields(route = %route))]
    pub async fn send<B>(&self, route: &Route, body: Option<&B>) -> HttpResult<Vec<u8>>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, route.path);
        let mut attempt = 0;

        loop {
            self.limiter.acquire(route).await;

            let mut request = self.http.request(route.method.clone(), &url);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await.map_err(|source| HttpError::Transport {
                route: route.to_string(),
                source,
            })?;

            let status = response.status();
            let headers = RateLimitHeaders::from_headers(response.headers());
            self.limiter.update(route, &headers);

            let bytes = response
                .bytes()
                .await
                .map_err(|source| HttpError::Transport {
                    route: route.to_string(),
                    source,
                })?;

            if status.is_success() {
                debug!(status = status.as_u16(), attempt, "request completed");
                return Ok(bytes.to_vec());
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let limited: RateLimitBody = serde_json::from_slice(&bytes).unwrap_or_default();
                let wait = limited
                    .retry_after_duration()
                    .or_else(|| headers.retry_after.and_then(seconds))
                    .unwrap_or(FALLBACK_RETRY_AFTER);

                if limited.global || headers.global {
                    self.limiter.set_global(wait);
                } else {
                    self.limiter.exhaust(route, wait);
                }

                if attempt >= self.max_retries {
                    return Err(HttpError::RateLimited {
                        route: route.to_string(),
                        attempts: attempt + 1,
                    });
                }
                warn!(
                    attempt,
                    retry_after_ms = wait.as_millis() as u64,
                    global = limited.global || headers.global,
                    "rate limited, retrying"
                );
                attempt += 1;
                continue;
            }

            if is_retryable_server_error(status) && attempt < self.max_retries {
                attempt += 1;
                let delay = SERVER_ERROR_DELAY * attempt;
                warn!(
                    status = status.as_u16(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "server error, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(HttpError::Status {
                route: route.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
    }
}

fn is_retryable_server_error(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_server_errors() {
        assert!(is_retryable_server_error(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_server_error(StatusCode::GATEWAY_TIMEOUT));
        assert!(!is_retryable_server_error(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_retryable_server_error(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let config = HttpConfig {
            api_base_url: "http://127.0.0.1:9/api/v10/".into(),
            ..HttpConfig::default()
        };
        let client = HttpClient::new("token", &config).unwrap();
        assert_eq!(&*client.base_url, "http://127.0.0.1:9/api/v10");
    }

    #[test]
    fn test_clones_share_limiter() {
        let client = HttpClient::new("token", &HttpConfig::default()).unwrap();
        let clone = client.clone();
        assert!(Arc::ptr_eq(client.limiter(), clone.limiter()));
    }
}
