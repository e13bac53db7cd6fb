// Carrier Channel Port
// Message operations on the hidden storage channel of one server

use crate::domain::ServerId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Platform message id (chronologically increasing)
pub type MessageId = u64;

/// A message as read from the storage channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub id: MessageId,
    /// True when the bot identity wrote this message
    pub authored_by_self: bool,
    pub content: String,
}

/// Channel errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Storage channel of one server
///
/// Implementations:
/// - DiscordCarrierChannel: platform REST API (infra-discord crate)
/// - mocks::MemoryChannel: in-memory, with failure injection
#[async_trait]
pub trait CarrierChannel: Send + Sync {
    /// All messages in chronological order (oldest first)
    async fn list_messages(&self) -> Result<Vec<ChannelMessage>, ChannelError>;

    /// Post a new message, returns its id
    async fn send(&self, content: &str) -> Result<MessageId, ChannelError>;

    /// Replace the content of a message
    ///
    /// # Errors
    /// - ChannelError::NotFound if the message no longer exists
    async fn edit(&self, id: MessageId, content: &str) -> Result<(), ChannelError>;

    /// Delete a message
    async fn delete(&self, id: MessageId) -> Result<(), ChannelError>;
}

/// Locates (or creates, with restricted visibility) the storage channel of a server
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    async fn open(&self, server: ServerId) -> Result<Arc<dyn CarrierChannel>, ChannelError>;

    /// Forget any cached handle so the next `open` looks the channel up again
    fn invalidate(&self, _server: ServerId) {}
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MemoryState {
        messages: Vec<ChannelMessage>,
        next_id: MessageId,
        /// Remaining writes allowed before injected failures start
        writes_before_failure: Option<usize>,
        /// Number of writes that fail once failures start
        failing_writes: usize,
        failure: Option<ChannelError>,
        write_delay: Option<Duration>,
        /// The channel itself was deleted
        gone: bool,
        sends: usize,
        edits: usize,
        deletes: usize,
    }

    /// In-memory storage channel
    #[derive(Default)]
    pub struct MemoryChannel {
        state: Mutex<MemoryState>,
    }

    impl MemoryChannel {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the next `count` write operations with `error`
        pub fn fail_next_writes(&self, count: usize, error: ChannelError) {
            self.fail_writes_after(0, count, error);
        }

        /// Let `ok` writes succeed, then fail the following `count` writes
        pub fn fail_writes_after(&self, ok: usize, count: usize, error: ChannelError) {
            let mut state = self.state.lock().unwrap();
            state.writes_before_failure = Some(ok);
            state.failing_writes = count;
            state.failure = Some(error);
        }

        /// Sleep inside every write (widens race windows in tests)
        pub fn set_write_delay(&self, delay: Duration) {
            self.state.lock().unwrap().write_delay = Some(delay);
        }

        /// Simulate the whole channel being deleted: every call fails from now on
        pub fn vanish(&self) {
            self.state.lock().unwrap().gone = true;
        }

        fn check_exists(&self) -> Result<(), ChannelError> {
            if self.state.lock().unwrap().gone {
                Err(ChannelError::NotFound("Unknown Channel".to_string()))
            } else {
                Ok(())
            }
        }

        /// Simulate a moderator deleting a message
        pub fn external_delete(&self, id: MessageId) -> bool {
            let mut state = self.state.lock().unwrap();
            let before = state.messages.len();
            state.messages.retain(|m| m.id != id);
            state.messages.len() != before
        }

        /// Simulate a message edited outside the bot
        pub fn external_edit(&self, id: MessageId, content: &str) -> bool {
            let mut state = self.state.lock().unwrap();
            match state.messages.iter_mut().find(|m| m.id == id) {
                Some(m) => {
                    m.content = content.to_string();
                    true
                }
                None => false,
            }
        }

        /// Append a message directly, bypassing failure injection
        pub fn inject(&self, content: &str, authored_by_self: bool) -> MessageId {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = state.next_id;
            state.messages.push(ChannelMessage {
                id,
                authored_by_self,
                content: content.to_string(),
            });
            id
        }

        pub fn messages(&self) -> Vec<ChannelMessage> {
            self.state.lock().unwrap().messages.clone()
        }

        /// Ids of bot-authored messages, oldest first
        pub fn own_message_ids(&self) -> Vec<MessageId> {
            self.messages()
                .into_iter()
                .filter(|m| m.authored_by_self)
                .map(|m| m.id)
                .collect()
        }

        pub fn send_count(&self) -> usize {
            self.state.lock().unwrap().sends
        }

        pub fn edit_count(&self) -> usize {
            self.state.lock().unwrap().edits
        }

        pub fn delete_count(&self) -> usize {
            self.state.lock().unwrap().deletes
        }

        async fn before_write(&self) -> Result<(), ChannelError> {
            self.check_exists()?;
            let delay = self.state.lock().unwrap().write_delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = self.state.lock().unwrap();
            let gate = state.writes_before_failure;
            match gate {
                Some(0) if state.failing_writes > 0 => {
                    state.failing_writes -= 1;
                    Err(state
                        .failure
                        .clone()
                        .unwrap_or_else(|| ChannelError::Transport("injected".to_string())))
                }
                Some(0) => {
                    state.writes_before_failure = None;
                    Ok(())
                }
                Some(n) => {
                    state.writes_before_failure = Some(n - 1);
                    Ok(())
                }
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl CarrierChannel for MemoryChannel {
        async fn list_messages(&self) -> Result<Vec<ChannelMessage>, ChannelError> {
            self.check_exists()?;
            Ok(self.messages())
        }

        async fn send(&self, content: &str) -> Result<MessageId, ChannelError> {
            self.before_write().await?;
            let id = self.inject(content, true);
            self.state.lock().unwrap().sends += 1;
            Ok(id)
        }

        async fn edit(&self, id: MessageId, content: &str) -> Result<(), ChannelError> {
            self.before_write().await?;
            let mut state = self.state.lock().unwrap();
            let message = state
                .messages
                .iter_mut()
                .find(|m| m.id == id)
                .ok_or_else(|| ChannelError::NotFound(format!("message {}", id)))?;
            if !message.authored_by_self {
                return Err(ChannelError::Forbidden(format!("message {} not ours", id)));
            }
            message.content = content.to_string();
            state.edits += 1;
            Ok(())
        }

        async fn delete(&self, id: MessageId) -> Result<(), ChannelError> {
            self.before_write().await?;
            let mut state = self.state.lock().unwrap();
            let before = state.messages.len();
            state.messages.retain(|m| m.id != id);
            if state.messages.len() == before {
                return Err(ChannelError::NotFound(format!("message {}", id)));
            }
            state.deletes += 1;
            Ok(())
        }
    }

    /// One MemoryChannel per server
    #[derive(Default)]
    pub struct MemoryChannelProvider {
        channels: Mutex<HashMap<ServerId, Arc<MemoryChannel>>>,
        unreachable: Mutex<Option<ChannelError>>,
        opens: Mutex<usize>,
    }

    impl MemoryChannelProvider {
        pub fn new() -> Self {
            Self::default()
        }

        /// Channel for `server`, created on first use
        pub fn channel(&self, server: ServerId) -> Arc<MemoryChannel> {
            self.channels
                .lock()
                .unwrap()
                .entry(server)
                .or_insert_with(|| Arc::new(MemoryChannel::new()))
                .clone()
        }

        /// Delete the server's channel; the next `open` creates a fresh one
        pub fn delete_channel(&self, server: ServerId) {
            if let Some(channel) = self.channels.lock().unwrap().remove(&server) {
                channel.vanish();
            }
        }

        /// Successful `open` calls so far
        pub fn open_count(&self) -> usize {
            *self.opens.lock().unwrap()
        }

        /// Make `open` fail with `error` (None restores access)
        pub fn set_unreachable(&self, error: Option<ChannelError>) {
            *self.unreachable.lock().unwrap() = error;
        }
    }

    #[async_trait]
    impl ChannelProvider for MemoryChannelProvider {
        async fn open(&self, server: ServerId) -> Result<Arc<dyn CarrierChannel>, ChannelError> {
            if let Some(err) = self.unreachable.lock().unwrap().clone() {
                return Err(err);
            }
            *self.opens.lock().unwrap() += 1;
            Ok(self.channel(server))
        }
    }
}
