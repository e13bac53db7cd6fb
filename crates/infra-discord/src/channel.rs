// Discord storage channel (CarrierChannel implementation)

use crate::client::DiscordClient;
use crate::models;
use async_trait::async_trait;
use queuebot_core::port::{CarrierChannel, ChannelError, ChannelMessage, MessageId};
use std::sync::Arc;

/// One server's hidden storage channel
pub struct DiscordCarrierChannel {
    client: Arc<DiscordClient>,
    channel_id: u64,
    bot_id: u64,
}

impl DiscordCarrierChannel {
    pub fn new(client: Arc<DiscordClient>, channel_id: u64, bot_id: u64) -> Self {
        Self {
            client,
            channel_id,
            bot_id,
        }
    }

    pub fn channel_id(&self) -> u64 {
        self.channel_id
    }
}

#[async_trait]
impl CarrierChannel for DiscordCarrierChannel {
    async fn list_messages(&self) -> Result<Vec<ChannelMessage>, ChannelError> {
        let messages = self.client.channel_messages(self.channel_id).await?;
        Ok(messages
            .into_iter()
            .filter_map(|m| {
                let id = models::parse_snowflake(&m.id)?;
                let author = models::parse_snowflake(&m.author.id);
                Some(ChannelMessage {
                    id,
                    authored_by_self: author == Some(self.bot_id),
                    content: m.content,
                })
            })
            .collect())
    }

    async fn send(&self, content: &str) -> Result<MessageId, ChannelError> {
        self.client.create_message(self.channel_id, content).await
    }

    async fn edit(&self, id: MessageId, content: &str) -> Result<(), ChannelError> {
        self.client.edit_message(self.channel_id, id, content).await
    }

    async fn delete(&self, id: MessageId) -> Result<(), ChannelError> {
        self.client.delete_message(self.channel_id, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscordConfig;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_marks_own_messages() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/channels/3/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "11", "author": {"id": "99"}, "content": "[QUEUE_STORE] g=1 p=1/1\n{}"},
                {"id": "10", "author": {"id": "42"}, "content": "hello"}
            ])))
            .mount(&server)
            .await;

        let client =
            Arc::new(DiscordClient::new(&DiscordConfig::new("t").with_api_base(server.uri())).unwrap());
        let channel = DiscordCarrierChannel::new(client, 3, 99);

        let messages = channel.list_messages().await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, 10);
        assert!(!messages[0].authored_by_self);
        assert!(messages[1].authored_by_self);
    }
}
