//! Store bootstrap over the Discord REST adapter against a mock API

use std::sync::Arc;

use queuebot_core::application::{StoreConfig, StoreRegistry, StoreState};
use queuebot_infra_discord::{DiscordChannelProvider, DiscordConfig};
use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

const BOT: &str = "99";
const GUILD: u64 = 7;

async fn mock_guild(server: &MockServer, history: serde_json::Value) {
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/users/@me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": BOT})))
        .mount(server)
        .await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/guilds/7/channels"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": "500", "type": 0, "name": "queue-storage"}])),
        )
        .mount(server)
        .await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/channels/500/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history))
        .mount(server)
        .await;
}

fn registry(server: &MockServer) -> StoreRegistry {
    let provider = DiscordChannelProvider::new(
        &DiscordConfig::new("token").with_api_base(server.uri()),
    )
    .unwrap();
    StoreRegistry::new(Arc::new(provider), StoreConfig::default()).unwrap()
}

#[tokio::test]
async fn test_empty_channel_gets_initial_carrier() {
    let server = MockServer::start().await;
    mock_guild(&server, json!([])).await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/channels/500/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "900", "author": {"id": BOT}, "content": ""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = registry(&server).get(GUILD).await.unwrap();
    assert_eq!(engine.state(), StoreState::Loaded);

    let requests = server.received_requests().await.unwrap();
    let post = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&post.body).unwrap();
    assert_eq!(
        body["content"],
        "[QUEUE_STORE] g=1 p=1/1\n{\"v\":1,\"queues\":{},\"settings\":{\"lang\":\"en\"}}"
    );
}

#[tokio::test]
async fn test_existing_carriers_are_loaded() {
    let server = MockServer::start().await;
    mock_guild(
        &server,
        json!([
            {"id": "902", "author": {"id": "12"}, "content": "[QUEUE_STORE] g=1 p=1/1\n{\"v\":1,\"queues\":{\"fake\":[1]}}"},
            {"id": "901", "author": {"id": BOT}, "content": "[QUEUE_STORE] g=3 p=1/1\n{\"v\":1,\"queues\":{\"boss-a\":[5,6]},\"settings\":{\"lang\":\"vi\"}}"}
        ]),
    )
    .await;

    let engine = registry(&server).get(GUILD).await.unwrap();
    assert_eq!(engine.keys(), vec!["boss-a"]);
    assert_eq!(engine.list("boss-a").unwrap(), vec![5, 6]);
    assert_eq!(engine.language(), "vi");
}
