use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::Deserialize;

/// Rate-limit information carried by a response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    /// `x-ratelimit-limit`
    pub limit: Option<u32>,
    /// `x-ratelimit-remaining`
    pub remaining: Option<u32>,
    /// `x-ratelimit-reset-after`, in seconds
    pub reset_after: Option<f64>,
    /// `x-ratelimit-bucket`
    pub bucket: Option<String>,
    /// `x-ratelimit-global`
    pub global: bool,
    /// `x-ratelimit-scope`: user, global or shared
    pub scope: Option<String>,
    /// `retry-after`, in seconds; only sent with 429
    pub retry_after: Option<f64>,
}

impl RateLimitHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            limit: parse(headers, "x-ratelimit-limit"),
            remaining: parse(headers, "x-ratelimit-remaining"),
            reset_after: parse(headers, "x-ratelimit-reset-after"),
            bucket: text(headers, "x-ratelimit-bucket"),
            global: text(headers, "x-ratelimit-global").is_some_and(|v| v == "true"),
            scope: text(headers, "x-ratelimit-scope"),
            retry_after: parse(headers, "retry-after"),
        }
    }

    pub fn reset_after_duration(&self) -> Option<Duration> {
        self.reset_after.and_then(seconds)
    }

    /// Whether the response said anything about its bucket at all
    pub fn has_bucket_info(&self) -> bool {
        self.bucket.is_some() || self.remaining.is_some() || self.reset_after.is_some()
    }
}

/// JSON body of a 429 response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimitBody {
    #[serde(default)]
    pub retry_after: f64,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub message: String,
}

impl RateLimitBody {
    pub fn retry_after_duration(&self) -> Option<Duration> {
        seconds(self.retry_after)
    }
}

/// Seconds as sent by the service, rejecting negative and non-finite values
pub(crate) fn seconds(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

fn text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

fn parse<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    text(headers, name).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_parses_bucket_headers() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[
            ("x-ratelimit-limit", "5"),
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset-after", "2.5"),
            ("x-ratelimit-bucket", "abcd1234"),
        ]));
        assert_eq!(parsed.limit, Some(5));
        assert_eq!(parsed.remaining, Some(0));
        assert_eq!(parsed.reset_after_duration(), Some(Duration::from_millis(2500)));
        assert_eq!(parsed.bucket.as_deref(), Some("abcd1234"));
        assert!(!parsed.global);
        assert!(parsed.has_bucket_info());
    }

    #[test]
    fn test_parses_global_429_headers() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[
            ("x-ratelimit-global", "true"),
            ("x-ratelimit-scope", "global"),
            ("retry-after", "3"),
        ]));
        assert!(parsed.global);
        assert_eq!(parsed.scope.as_deref(), Some("global"));
        assert_eq!(parsed.retry_after, Some(3.0));
        assert!(!parsed.has_bucket_info());
    }

    #[test]
    fn test_garbage_values_are_ignored() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[
            ("x-ratelimit-remaining", "lots"),
            ("x-ratelimit-reset-after", "-1"),
        ]));
        assert_eq!(parsed.remaining, None);
        assert_eq!(parsed.reset_after_duration(), None);
    }

    #[test]
    fn test_body_defaults() {
        let body: RateLimitBody =
            serde_json::from_str(r#"{"message":"You are being rate limited.","retry_after":0.75}"#)
                .unwrap();
        assert!(!body.global);
        assert_eq!(body.retry_after_duration(), Some(Duration::from_millis(750)));
    }
}
