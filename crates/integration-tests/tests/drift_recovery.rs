//! External tampering with the storage channel, and admin recovery

use std::sync::Arc;

use queuebot_core::application::engine::ReinitOutcome;
use queuebot_core::application::{QueueEngine, StoreConfig, StoreFault, StoreState};
use queuebot_core::domain::Role;
use queuebot_core::error::AppError;
use queuebot_core::port::mocks::{MemoryChannel, MemoryChannelProvider};
use queuebot_core::port::ChannelError;

const SERVER: u64 = 5;

async fn open(channel: &Arc<MemoryChannel>) -> QueueEngine {
    QueueEngine::open(SERVER, channel.clone(), &StoreConfig::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_deleted_carrier_between_load_and_save() {
    let channel = Arc::new(MemoryChannel::new());
    let engine = open(&channel).await;
    engine.join("k", 1).await.unwrap();

    channel.external_delete(channel.own_message_ids()[0]);

    assert!(matches!(
        engine.join("k", 2).await,
        Err(AppError::StorageDrift(_))
    ));
    assert!(matches!(
        engine.state(),
        StoreState::Faulted(StoreFault::Drift(_))
    ));

    // Every write is refused, including other keys and settings
    assert!(engine.join("other", 3).await.is_err());
    assert!(engine.set_language("fr", Role::Admin).await.is_err());
    assert!(channel.messages().is_empty());

    assert_eq!(
        engine.reinitialize(Role::Admin).await.unwrap(),
        ReinitOutcome::Rewritten { queues: 1 }
    );
    engine.join("k", 2).await.unwrap();

    let restarted = open(&channel).await;
    assert_eq!(restarted.list("k").unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn test_one_of_many_carriers_deleted() {
    let channel = Arc::new(MemoryChannel::new());
    let engine = open(&channel).await;
    for id in 0..400u64 {
        engine.join("raid", 500_000_000_000_000_000 + id).await.unwrap();
    }
    let carriers = channel.own_message_ids();
    assert!(carriers.len() >= 2);

    channel.external_delete(carriers[1]);

    // A fresh process cannot decode the damaged record
    let fresh = open(&channel).await;
    assert!(fresh.state().is_faulted());

    // The running engine refuses to write over it
    assert!(matches!(
        engine.leave("raid", 500_000_000_000_000_000).await,
        Err(AppError::StorageDrift(_))
    ));

    // Recovery from the process that still holds the full state
    engine.reinitialize(Role::Admin).await.unwrap();
    let restarted = open(&channel).await;
    assert_eq!(restarted.list("raid").unwrap().len(), 400);
}

#[tokio::test]
async fn test_edited_carrier_is_drift() {
    let channel = Arc::new(MemoryChannel::new());
    let engine = open(&channel).await;
    engine.join("k", 1).await.unwrap();

    let id = channel.own_message_ids()[0];
    let tampered = channel.messages()[0].content.replace("[1]", "[1,99]");
    channel.external_edit(id, &tampered);

    assert!(matches!(
        engine.join("k", 2).await,
        Err(AppError::StorageDrift(_))
    ));

    // The edit decodes, so recovery adopts it
    assert_eq!(
        engine.reinitialize(Role::Admin).await.unwrap(),
        ReinitOutcome::Adopted { queues: 1 }
    );
    assert_eq!(engine.list("k").unwrap(), vec![1, 99]);
}

#[tokio::test]
async fn test_failed_write_midway_then_retry() {
    let channel = Arc::new(MemoryChannel::new());
    let engine = open(&channel).await;
    for id in 0..300u64 {
        engine.join("raid", 600_000_000_000_000_000 + id).await.unwrap();
    }
    let carriers = channel.own_message_ids().len();

    // First carrier edit succeeds, the second write fails
    channel.fail_writes_after(1, 1, ChannelError::Transport("connection reset".to_string()));
    let err = engine.join("raid", 1).await.unwrap_err();
    assert!(matches!(err, AppError::PersistenceFailure(_)));
    assert_eq!(engine.state(), StoreState::Loaded);
    assert_eq!(engine.count("raid").unwrap(), 300);

    // The adapter tracked the partial write, so the retry is not drift
    engine.join("raid", 1).await.unwrap();
    assert_eq!(engine.count("raid").unwrap(), 301);
    assert!(channel.own_message_ids().len() >= carriers);

    let restarted = open(&channel).await;
    assert_eq!(restarted.count("raid").unwrap(), 301);
}

#[tokio::test]
async fn test_failed_write_midway_then_restart() {
    let config = StoreConfig::default().with_max_chunk_chars(64);
    let channel = Arc::new(MemoryChannel::new());
    let engine = QueueEngine::open(SERVER, channel.clone(), &config).await.unwrap();
    for id in 0..30u64 {
        engine.join("raid", 700_000_000_000_000_000 + id).await.unwrap();
    }
    assert!(channel.own_message_ids().len() >= 2);

    channel.fail_writes_after(1, 1, ChannelError::Timeout("gateway timeout".to_string()));
    assert!(matches!(
        engine.join("raid", 31).await,
        Err(AppError::PersistenceFailure(_))
    ));

    // Process dies here; the next one must still see the committed store
    drop(engine);
    let restarted = QueueEngine::open(SERVER, channel.clone(), &config).await.unwrap();
    assert_eq!(restarted.state(), StoreState::Loaded);
    assert_eq!(restarted.count("raid").unwrap(), 30);
    assert!(!restarted.list("raid").unwrap().contains(&31));
}

#[tokio::test]
async fn test_storage_channel_deleted_then_setup() {
    let provider = Arc::new(MemoryChannelProvider::new());
    let config = StoreConfig::default();
    let engine = QueueEngine::connect(SERVER, provider.clone(), &config)
        .await
        .unwrap();
    engine.join("k", 1).await.unwrap();

    provider.delete_channel(SERVER);
    assert!(matches!(
        engine.join("k", 2).await,
        Err(AppError::StorageDrift(_))
    ));

    // Setup finds no channel, creates a new one and rewrites from memory
    assert_eq!(
        engine.reinitialize(Role::Admin).await.unwrap(),
        ReinitOutcome::Rewritten { queues: 1 }
    );
    engine.join("k", 2).await.unwrap();
    assert_eq!(provider.open_count(), 2);

    let restarted = QueueEngine::open(SERVER, provider.channel(SERVER), &config)
        .await
        .unwrap();
    assert_eq!(restarted.list("k").unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn test_unsupported_version_waits_for_setup() {
    let channel = Arc::new(MemoryChannel::new());
    channel.inject("[QUEUE_STORE] g=3 p=1/1\n{\"v\":2,\"queues\":{}}", true);

    let engine = open(&channel).await;
    assert_eq!(
        engine.state(),
        StoreState::Faulted(StoreFault::UnsupportedVersion(2))
    );
    assert!(matches!(
        engine.create("k", Role::Admin).await,
        Err(AppError::UnsupportedVersion(2))
    ));

    engine.reinitialize(Role::Admin).await.unwrap();
    engine.create("k", Role::Admin).await.unwrap();
    let restarted = open(&channel).await;
    assert!(restarted.contains_key("k").unwrap());
}
