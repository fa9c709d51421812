//! User-timeline source backed by the Twitter v1.1 REST API, using
//! application-only (bearer token) authentication.

use super::{FetchError, TimelineItem, TimelineSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";
const PAGE_SIZE: u32 = 100;

#[derive(Deserialize)]
struct TokenResponse {
    token_type: String,
    access_token: String,
}

#[derive(Deserialize)]
struct Tweet {
    id: u64,
    #[serde(default, alias = "full_text")]
    text: String,
}

pub struct TwitterSource {
    client: Client,
    api_base: String,
    consumer_key: String,
    consumer_secret: String,
    screen_name: String,
    bearer: Mutex<Option<String>>,
}

impl TwitterSource {
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        screen_name: impl Into<String>,
    ) -> Self {
        Self::with_api_base(DEFAULT_API_BASE, consumer_key, consumer_secret, screen_name)
    }

    pub fn with_api_base(
        api_base: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        screen_name: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            screen_name: screen_name.into(),
            bearer: Mutex::new(None),
        }
    }

    pub fn screen_name(&self) -> &str {
        &self.screen_name
    }

    async fn bearer_token(&self) -> Result<String, FetchError> {
        let cached = self.bearer.lock().clone();
        if let Some(token) = cached {
            return Ok(token);
        }

        let response = self
            .client
            .post(format!("{}/oauth2/token", self.api_base))
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Auth(format!("token request returned {}", response.status())));
        }

        let token: TokenResponse = response.json().await?;
        if !token.token_type.eq_ignore_ascii_case("bearer") {
            return Err(FetchError::Auth(format!("unexpected token type {}", token.token_type)));
        }

        info!(screen_name = %self.screen_name, "obtained timeline bearer token");
        *self.bearer.lock() = Some(token.access_token.clone());
        Ok(token.access_token)
    }
}

/// Time until the window in `x-rate-limit-reset` (epoch seconds) reopens,
/// plus a second of slack.
fn rate_limit_wait(response: &Response) -> Duration {
    let reset = response
        .headers()
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    match reset {
        Some(reset) => Duration::from_secs(reset.saturating_sub(now) + 1),
        None => Duration::ZERO,
    }
}

#[async_trait]
impl TimelineSource for TwitterSource {
    async fn fetch_page(
        &self,
        since_id: u64,
        max_id: Option<u64>,
    ) -> Result<Vec<TimelineItem>, FetchError> {
        let token = self.bearer_token().await?;

        let mut query = vec![
            ("count", PAGE_SIZE.to_string()),
            ("screen_name", self.screen_name.clone()),
        ];
        if let Some(max_id) = max_id {
            query.push(("max_id", max_id.to_string()));
        }
        if since_id != 0 {
            query.push(("since_id", since_id.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/1.1/statuses/user_timeline.json", self.api_base))
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited {
                retry_after: rate_limit_wait(&response),
            }),
            StatusCode::UNAUTHORIZED => {
                self.bearer.lock().take();
                Err(FetchError::Auth("bearer token rejected".to_string()))
            }
            status if !status.is_success() => Err(FetchError::Status(status.as_u16())),
            _ => {
                let tweets: Vec<Tweet> = response.json().await?;
                debug!(count = tweets.len(), "fetched tweets");
                Ok(tweets
                    .into_iter()
                    .map(|tweet| TimelineItem {
                        id: tweet.id,
                        text: tweet.text,
                    })
                    .collect())
            }
        }
    }
}
