//! Multi-carrier snapshots: splitting, growth, shrinking and damaged sequences

use std::sync::Arc;

use queuebot_core::application::{QueueEngine, StoreConfig, StoreFault, StoreState};
use queuebot_core::domain::Role;
use queuebot_core::error::AppError;
use queuebot_core::port::mocks::MemoryChannel;

const SERVER: u64 = 77;
const BASE_ID: u64 = 420_000_000_000_000_000;

async fn open(channel: &Arc<MemoryChannel>) -> QueueEngine {
    QueueEngine::open(SERVER, channel.clone(), &StoreConfig::default())
        .await
        .unwrap()
}

async fn fill(engine: &QueueEngine, key: &str, count: u64) {
    for i in 0..count {
        engine.join(key, BASE_ID + i).await.unwrap();
    }
}

#[tokio::test]
async fn test_500_members_span_carriers_and_reload() {
    let channel = Arc::new(MemoryChannel::new());
    let engine = open(&channel).await;
    fill(&engine, "raid", 500).await;

    let carriers = channel.own_message_ids();
    assert!(carriers.len() >= 2, "expected several carriers, got {}", carriers.len());
    // Growth only appends carriers
    assert_eq!(channel.delete_count(), 0);
    for message in channel.messages() {
        assert!(message.content.chars().count() <= 2000);
    }

    let restarted = open(&channel).await;
    let members = restarted.list("raid").unwrap();
    assert_eq!(members.len(), 500);
    assert_eq!(members[0], BASE_ID);
    assert_eq!(members[499], BASE_ID + 499);
}

#[tokio::test]
async fn test_shrinking_snapshot_deletes_leftovers() {
    let channel = Arc::new(MemoryChannel::new());
    let engine = open(&channel).await;
    fill(&engine, "raid", 500).await;
    let before = channel.own_message_ids();

    engine.reset("raid", Role::Admin).await.unwrap();

    let after = channel.own_message_ids();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0], before[0]);
    assert_eq!(channel.delete_count(), before.len() - 1);

    let restarted = open(&channel).await;
    assert!(restarted.list("raid").unwrap().is_empty());
}

#[tokio::test]
async fn test_small_carriers() {
    let channel = Arc::new(MemoryChannel::new());
    let config = StoreConfig::default().with_max_chunk_chars(16);
    let engine = QueueEngine::open(SERVER, channel.clone(), &config)
        .await
        .unwrap();
    engine.join("k", 1).await.unwrap();
    engine.join("k", 2).await.unwrap();

    assert!(channel.own_message_ids().len() > 2);
    let restarted = QueueEngine::open(SERVER, channel.clone(), &config)
        .await
        .unwrap();
    assert_eq!(restarted.list("k").unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn test_mixed_generations_are_corrupt() {
    let channel = Arc::new(MemoryChannel::new());
    channel.inject("[QUEUE_STORE] g=4 p=1/2\n{\"v\":1,\"queues\":{\"k\":", true);
    channel.inject("[QUEUE_STORE] g=5 p=2/2\n[1]},\"settings\":{\"lang\":\"en\"}}", true);

    let engine = open(&channel).await;
    assert!(matches!(
        engine.state(),
        StoreState::Faulted(StoreFault::Corrupt(_))
    ));
    assert!(matches!(
        engine.join("k", 2).await,
        Err(AppError::CorruptRecord(_))
    ));
}

#[tokio::test]
async fn test_missing_part_is_corrupt() {
    let channel = Arc::new(MemoryChannel::new());
    channel.inject("[QUEUE_STORE] g=4 p=1/3\n{\"v\":1,", true);
    channel.inject("[QUEUE_STORE] g=4 p=3/3\n\"settings\":{}}", true);

    let engine = open(&channel).await;
    assert!(engine.state().is_faulted());
    assert!(engine.keys().is_empty());
}

#[tokio::test]
async fn test_foreign_and_unmarked_messages_are_ignored() {
    let channel = Arc::new(MemoryChannel::new());
    channel.inject("hello from a moderator", false);
    channel.inject("[QUEUE_INDEX]\n{}", true);
    channel.inject("[QUEUE_STORE] g=1 p=1/1\n{\"v\":1,\"queues\":{\"k\":[8]}}", false);

    let engine = open(&channel).await;
    // No carriers of ours: a fresh store was written
    assert_eq!(engine.state(), StoreState::Loaded);
    assert!(engine.keys().is_empty());
    assert_eq!(channel.messages().len(), 4);
}
