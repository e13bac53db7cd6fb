// Storage channel lookup / creation per guild

use crate::channel::DiscordCarrierChannel;
use crate::client::DiscordClient;
use crate::config::DiscordConfig;
use crate::models::{self, CreateChannel, GUILD_TEXT};
use async_trait::async_trait;
use queuebot_core::domain::ServerId;
use queuebot_core::port::{CarrierChannel, ChannelError, ChannelProvider};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::info;

pub struct DiscordChannelProvider {
    client: Arc<DiscordClient>,
    storage_channel: String,
    bot_id: OnceCell<u64>,
    channels: Mutex<HashMap<ServerId, Arc<DiscordCarrierChannel>>>,
}

impl DiscordChannelProvider {
    pub fn new(config: &DiscordConfig) -> Result<Self, ChannelError> {
        Ok(Self {
            client: Arc::new(DiscordClient::new(config)?),
            storage_channel: config.storage_channel.clone(),
            bot_id: OnceCell::new(),
            channels: Mutex::new(HashMap::new()),
        })
    }

    /// Bot account id, fetched once
    pub async fn bot_id(&self) -> Result<u64, ChannelError> {
        self.bot_id
            .get_or_try_init(|| self.client.current_user_id())
            .await
            .copied()
    }

    async fn find_or_create(&self, guild: ServerId, bot_id: u64) -> Result<u64, ChannelError> {
        let existing = self
            .client
            .guild_channels(guild)
            .await?
            .into_iter()
            .filter(|c| c.kind == GUILD_TEXT && c.name.as_deref() == Some(self.storage_channel.as_str()))
            .find_map(|c| models::parse_snowflake(&c.id));
        if let Some(id) = existing {
            return Ok(id);
        }

        let created = self
            .client
            .create_channel(
                guild,
                &CreateChannel::hidden_text(&self.storage_channel, guild, bot_id),
            )
            .await?;
        let id = models::parse_snowflake(&created.id)
            .ok_or_else(|| ChannelError::Transport(format!("malformed channel id {:?}", created.id)))?;
        info!(guild, channel = id, name = %self.storage_channel, "Created storage channel");
        Ok(id)
    }
}

#[async_trait]
impl ChannelProvider for DiscordChannelProvider {
    async fn open(&self, server: ServerId) -> Result<Arc<dyn CarrierChannel>, ChannelError> {
        let cached = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&server)
            .cloned();
        if let Some(channel) = cached {
            return Ok(channel);
        }

        let bot_id = self.bot_id().await?;
        let channel_id = self.find_or_create(server, bot_id).await?;
        let channel = Arc::new(DiscordCarrierChannel::new(
            self.client.clone(),
            channel_id,
            bot_id,
        ));

        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(server, channel.clone());
        Ok(channel)
    }

    fn invalidate(&self, server: ServerId) {
        let dropped = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&server);
        if let Some(channel) = dropped {
            info!(guild = server, channel = channel.channel_id(), "Dropped cached storage channel");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    async fn mock_me(server: &MockServer) {
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/users/@me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "99"})))
            .expect(1)
            .mount(server)
            .await;
    }

    fn provider(server: &MockServer) -> DiscordChannelProvider {
        DiscordChannelProvider::new(&DiscordConfig::new("t").with_api_base(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_reuses_existing_channel() {
        let server = MockServer::start().await;
        mock_me(&server).await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/guilds/7/channels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "1", "type": 2, "name": "queue-storage"},
                {"id": "2", "type": 0, "name": "general"},
                {"id": "3", "type": 0, "name": "queue-storage"}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/guilds/7/channels"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let provider = provider(&server);
        provider.open(7).await.unwrap();
        // Second open is served from the cache
        provider.open(7).await.unwrap();
        assert_eq!(provider.channels.lock().unwrap()[&7].channel_id(), 3);
    }

    #[tokio::test]
    async fn test_creates_hidden_channel() {
        let server = MockServer::start().await;
        mock_me(&server).await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/guilds/7/channels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/guilds/7/channels"))
            .and(matchers::body_partial_json(serde_json::json!({
                "name": "queue-storage",
                "type": 0,
                "permission_overwrites": [
                    {"id": "7", "type": 0, "deny": "1024"},
                    {"id": "99", "type": 1, "allow": "68608"}
                ]
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"id": "55", "type": 0, "name": "queue-storage"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server);
        provider.open(7).await.unwrap();
        assert_eq!(provider.channels.lock().unwrap()[&7].channel_id(), 55);
    }

    #[tokio::test]
    async fn test_invalidate_recreates_deleted_channel() {
        let server = MockServer::start().await;
        mock_me(&server).await;
        // First lookup sees the channel, the second sees it deleted
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/guilds/7/channels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "3", "type": 0, "name": "queue-storage"}
            ])))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/guilds/7/channels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/guilds/7/channels"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"id": "56", "type": 0, "name": "queue-storage"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server);
        provider.open(7).await.unwrap();
        assert_eq!(provider.channels.lock().unwrap()[&7].channel_id(), 3);

        provider.invalidate(7);
        assert!(provider.channels.lock().unwrap().get(&7).is_none());
        provider.open(7).await.unwrap();
        assert_eq!(provider.channels.lock().unwrap()[&7].channel_id(), 56);
    }

    #[tokio::test]
    async fn test_missing_access_is_forbidden() {
        let server = MockServer::start().await;
        mock_me(&server).await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/guilds/7/channels"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Missing Access"))
            .mount(&server)
            .await;

        assert!(matches!(
            provider(&server).open(7).await,
            Err(ChannelError::Forbidden(_))
        ));
    }
}
