// Discord REST client

use crate::config::{DiscordConfig, MAX_RATE_LIMIT_WAIT};
use crate::models::{self, Channel, CreateChannel, Message, MessageBody, RateLimited, User};
use queuebot_core::port::{ChannelError, MessageId};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Messages per history page (platform maximum)
const PAGE_SIZE: usize = 100;

fn map_reqwest_error(err: reqwest::Error) -> ChannelError {
    if err.is_timeout() {
        ChannelError::Timeout(err.to_string())
    } else {
        ChannelError::Transport(err.to_string())
    }
}

fn bad_snowflake(raw: &str) -> ChannelError {
    ChannelError::Transport(format!("malformed snowflake {:?}", raw))
}

pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    auth: String,
}

impl DiscordClient {
    pub fn new(config: &DiscordConfig) -> Result<Self, ChannelError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("queuebot (", env!("CARGO_PKG_VERSION"), ")"))
            .build()
            .map_err(map_reqwest_error)?;

        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            auth: format!("Bot {}", config.token),
        })
    }

    /// Id of the bot account behind the token
    pub async fn current_user_id(&self) -> Result<u64, ChannelError> {
        let user: User = self.get("/users/@me").await?;
        models::parse_snowflake(&user.id).ok_or_else(|| bad_snowflake(&user.id))
    }

    pub async fn guild_channels(&self, guild: u64) -> Result<Vec<Channel>, ChannelError> {
        self.get(&format!("/guilds/{}/channels", guild)).await
    }

    pub async fn create_channel(
        &self,
        guild: u64,
        body: &CreateChannel,
    ) -> Result<Channel, ChannelError> {
        let response = self
            .request(Method::POST, &format!("/guilds/{}/channels", guild), Some(body))
            .await?;
        decode(response).await
    }

    /// Every message of the channel, oldest first
    pub async fn channel_messages(&self, channel: u64) -> Result<Vec<Message>, ChannelError> {
        let mut all: Vec<(u64, Message)> = Vec::new();
        let mut after = 0u64;

        loop {
            let page: Vec<Message> = self
                .get(&format!(
                    "/channels/{}/messages?limit={}&after={}",
                    channel, PAGE_SIZE, after
                ))
                .await?;
            let count = page.len();

            for message in page {
                let id = models::parse_snowflake(&message.id)
                    .ok_or_else(|| bad_snowflake(&message.id))?;
                after = after.max(id);
                all.push((id, message));
            }

            if count < PAGE_SIZE {
                break;
            }
        }

        all.sort_by_key(|(id, _)| *id);
        debug!(channel, messages = all.len(), "Channel history read");
        Ok(all.into_iter().map(|(_, m)| m).collect())
    }

    pub async fn create_message(&self, channel: u64, content: &str) -> Result<MessageId, ChannelError> {
        let response = self
            .request(
                Method::POST,
                &format!("/channels/{}/messages", channel),
                Some(&MessageBody { content }),
            )
            .await?;
        let message: Message = decode(response).await?;
        models::parse_snowflake(&message.id).ok_or_else(|| bad_snowflake(&message.id))
    }

    pub async fn edit_message(
        &self,
        channel: u64,
        id: MessageId,
        content: &str,
    ) -> Result<(), ChannelError> {
        self.request(
            Method::PATCH,
            &format!("/channels/{}/messages/{}", channel, id),
            Some(&MessageBody { content }),
        )
        .await?;
        Ok(())
    }

    pub async fn delete_message(&self, channel: u64, id: MessageId) -> Result<(), ChannelError> {
        self.request::<()>(
            Method::DELETE,
            &format!("/channels/{}/messages/{}", channel, id),
            None,
        )
        .await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ChannelError> {
        let response = self.request::<()>(Method::GET, path, None).await?;
        decode(response).await
    }

    /// Send a request, waiting out one short rate limit
    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ChannelError> {
        let url = format!("{}{}", self.api_base, path);
        let mut waited = false;

        loop {
            let mut builder = self
                .http
                .request(method.clone(), &url)
                .header(reqwest::header::AUTHORIZATION, &self.auth);
            if let Some(body) = body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(map_reqwest_error)?;
            match check(response).await {
                Err(ChannelError::RateLimited { retry_after_ms }) if !waited => {
                    let wait = Duration::from_millis(retry_after_ms);
                    if wait > MAX_RATE_LIMIT_WAIT {
                        return Err(ChannelError::RateLimited { retry_after_ms });
                    }
                    warn!(%method, path, retry_after_ms, "Rate limited, retrying once");
                    tokio::time::sleep(wait).await;
                    waited = true;
                }
                other => return other,
            }
        }
    }
}

/// Map non-success statuses to port errors
async fn check(response: Response) -> Result<Response, ChannelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => ChannelError::NotFound(body),
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
            ChannelError::Forbidden(format!("{}: {}", status, body))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = serde_json::from_str::<RateLimited>(&body)
                .map(|r| r.retry_after)
                .unwrap_or(1.0);
            ChannelError::RateLimited {
                retry_after_ms: (retry_after * 1000.0).ceil() as u64,
            }
        }
        StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => {
            ChannelError::Timeout(format!("{}", status))
        }
        _ => ChannelError::Transport(format!("{}: {}", status, body)),
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ChannelError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ChannelError::Transport(format!("unexpected response body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> DiscordClient {
        DiscordClient::new(&DiscordConfig::new("tkn").with_api_base(server.uri())).unwrap()
    }

    fn message(id: u64, author: u64, content: &str) -> serde_json::Value {
        serde_json::json!({"id": id.to_string(), "author": {"id": author.to_string()}, "content": content})
    }

    #[tokio::test]
    async fn test_sends_bot_authorization() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/users/@me"))
            .and(matchers::header("authorization", "Bot tkn"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "77"})))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(client(&server).current_user_id().await.unwrap(), 77);
    }

    #[tokio::test]
    async fn test_history_paginates_and_sorts() {
        let server = MockServer::start().await;
        // Newest first, as the platform returns them
        let first: Vec<_> = (1..=100u64).rev().map(|id| message(id, 1, "x")).collect();
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/channels/5/messages"))
            .and(matchers::query_param("after", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(first))
            .mount(&server)
            .await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/channels/5/messages"))
            .and(matchers::query_param("after", "100"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(vec![message(102, 1, "y"), message(101, 1, "y")]),
            )
            .mount(&server)
            .await;

        let messages = client(&server).channel_messages(5).await.unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids.len(), 102);
        assert_eq!(ids[0], "1");
        assert_eq!(ids[101], "102");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("PATCH"))
            .and(matchers::path("/channels/5/messages/1"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Unknown Message"))
            .mount(&server)
            .await;
        Mock::given(matchers::method("PATCH"))
            .and(matchers::path("/channels/5/messages/2"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(matchers::method("PATCH"))
            .and(matchers::path("/channels/5/messages/3"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(matches!(
            client.edit_message(5, 1, "c").await,
            Err(ChannelError::NotFound(_))
        ));
        assert!(matches!(
            client.edit_message(5, 2, "c").await,
            Err(ChannelError::Forbidden(_))
        ));
        assert!(matches!(
            client.edit_message(5, 3, "c").await,
            Err(ChannelError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_long_rate_limit_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("DELETE"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(serde_json::json!({"retry_after": 30.0, "global": false})),
            )
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(
            client(&server).delete_message(5, 1).await,
            Err(ChannelError::RateLimited {
                retry_after_ms: 30_000
            })
        );
    }

    #[tokio::test]
    async fn test_short_rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/channels/5/messages"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(serde_json::json!({"retry_after": 0.01})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/channels/5/messages"))
            .and(matchers::body_json(serde_json::json!({"content": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(message(9, 1, "hello")))
            .mount(&server)
            .await;

        assert_eq!(client(&server).create_message(5, "hello").await.unwrap(), 9);
    }
}
