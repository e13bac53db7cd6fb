// Channel Store Adapter
// Loads and saves one server's Store as framed carrier messages

use crate::codec::{self, CarrierFrame, CARRIER_MARKER};
use crate::domain::{ServerId, Store};
use crate::error::{AppError, Result};
use crate::port::{CarrierChannel, ChannelError, ChannelMessage, MessageId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Carrier as last seen or written by this adapter
#[derive(Debug, Clone, PartialEq, Eq)]
struct TrackedCarrier {
    id: MessageId,
    content: String,
}

impl From<ChannelMessage> for TrackedCarrier {
    fn from(msg: ChannelMessage) -> Self {
        Self {
            id: msg.id,
            content: msg.content,
        }
    }
}

/// Result of reading the channel
#[derive(Debug)]
pub enum LoadedRecord {
    /// No carriers present
    Empty,
    Snapshot(Store),
}

/// Durable side of one server's Store
///
/// Not internally synchronized: the engine keeps it behind its persistence
/// mutex, so loads and saves of one store never interleave.
pub struct ChannelStore {
    server: ServerId,
    channel: Arc<dyn CarrierChannel>,
    max_chunk_chars: usize,
    expected: Vec<TrackedCarrier>,
    generation: u64,
}

impl ChannelStore {
    pub fn new(server: ServerId, channel: Arc<dyn CarrierChannel>, max_chunk_chars: usize) -> Self {
        Self {
            server,
            channel,
            max_chunk_chars,
            expected: Vec::new(),
            generation: 0,
        }
    }

    /// Generation of the last snapshot read or written
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of carriers this adapter believes exist
    pub fn carrier_count(&self) -> usize {
        self.expected.len()
    }

    /// Point the adapter at another channel (the old one was deleted or
    /// replaced). Nothing is expected there until the next `load`.
    pub fn replace_channel(&mut self, channel: Arc<dyn CarrierChannel>) {
        self.channel = channel;
        self.expected.clear();
    }

    /// True when the carriers left by the last save belong to more than one
    /// snapshot, i.e. a save failed after some of its writes landed
    pub fn holds_partial_write(&self) -> bool {
        let mut headers = self
            .expected
            .iter()
            .filter_map(|c| CarrierFrame::parse(&c.content)?.ok())
            .map(|f| (f.generation, f.total));
        match headers.next() {
            Some(first) => first.1 != self.expected.len() || headers.any(|h| h != first),
            None => false,
        }
    }

    /// Read all carriers and decode them.
    ///
    /// The carriers seen become the expected set even when decoding fails,
    /// so a later `overwrite` replaces exactly those messages.
    pub async fn load(&mut self) -> Result<LoadedRecord> {
        let carriers = self.read_carriers().await?;
        self.expected = carriers.into_iter().map(TrackedCarrier::from).collect();

        if self.expected.is_empty() {
            info!(server = %self.server, "Storage channel has no carriers");
            return Ok(LoadedRecord::Empty);
        }

        let frames = self
            .expected
            .iter()
            .filter_map(|c| CarrierFrame::parse(&c.content))
            .collect::<Result<Vec<_>>>()?;

        let (generation, chunks) = codec::assemble(&frames)?;
        self.generation = generation;
        let store = codec::decode(&chunks)?;

        info!(
            server = %self.server,
            generation,
            carriers = frames.len(),
            queues = store.len(),
            members = store.member_count(),
            "Loaded store from storage channel"
        );

        Ok(LoadedRecord::Snapshot(store))
    }

    /// Persist `store`, refusing to write if the carriers changed behind our back
    pub async fn save(&mut self, store: &Store) -> Result<()> {
        let current: Vec<TrackedCarrier> = self
            .read_carriers()
            .await?
            .into_iter()
            .map(TrackedCarrier::from)
            .collect();

        if let Some(reason) = self.drift(&current) {
            warn!(server = %self.server, reason = %reason, "Storage drift detected");
            return Err(AppError::StorageDrift(reason));
        }

        self.write_snapshot(store).await
    }

    /// Replace whatever carriers exist with `store` (admin recovery path)
    pub async fn overwrite(&mut self, store: &Store) -> Result<()> {
        let current = self.read_carriers().await?;
        self.expected = current.into_iter().map(TrackedCarrier::from).collect();
        warn!(
            server = %self.server,
            carriers = self.expected.len(),
            "Overwriting storage carriers"
        );
        self.write_snapshot(store).await
    }

    /// Bot-authored carrier messages, oldest first
    async fn read_carriers(&self) -> Result<Vec<ChannelMessage>> {
        let messages = self
            .channel
            .list_messages()
            .await
            .map_err(|e| self.map_channel_error(e))?;

        Ok(messages
            .into_iter()
            .filter(|m| m.authored_by_self && m.content.starts_with(CARRIER_MARKER))
            .collect())
    }

    fn drift(&self, current: &[TrackedCarrier]) -> Option<String> {
        if current.len() != self.expected.len() {
            return Some(format!(
                "expected {} carriers, found {}",
                self.expected.len(),
                current.len()
            ));
        }
        for (seen, expected) in current.iter().zip(&self.expected) {
            if seen.id != expected.id {
                return Some(format!(
                    "expected carrier {}, found {}",
                    expected.id, seen.id
                ));
            }
            if seen.content != expected.content {
                return Some(format!("carrier {} was edited externally", seen.id));
            }
        }
        None
    }

    /// Edit carriers in place, append extra ones, then delete leftovers.
    ///
    /// `expected` is updated after every successful write so a failure
    /// midway leaves an accurate picture of the channel.
    async fn write_snapshot(&mut self, store: &Store) -> Result<()> {
        let chunks = codec::encode(store, self.max_chunk_chars)?;
        self.generation += 1;
        let frames = CarrierFrame::frame_all(self.generation, chunks);
        let wanted = frames.len();

        for (pos, frame) in frames.iter().enumerate() {
            let content = frame.render();
            if let Some(existing) = self.expected.get(pos) {
                let id = existing.id;
                self.channel
                    .edit(id, &content)
                    .await
                    .map_err(|e| self.map_channel_error(e))?;
                self.expected[pos].content = content;
            } else {
                let id = self
                    .channel
                    .send(&content)
                    .await
                    .map_err(|e| self.map_channel_error(e))?;
                self.expected.push(TrackedCarrier { id, content });
            }
        }

        while self.expected.len() > wanted {
            let Some(id) = self.expected.last().map(|c| c.id) else {
                break;
            };
            self.channel
                .delete(id)
                .await
                .map_err(|e| self.map_channel_error(e))?;
            self.expected.pop();
        }

        debug!(
            server = %self.server,
            generation = self.generation,
            carriers = wanted,
            "Snapshot written"
        );
        Ok(())
    }

    fn map_channel_error(&self, err: ChannelError) -> AppError {
        match err {
            ChannelError::NotFound(what) => {
                AppError::StorageDrift(format!("storage message or channel vanished: {}", what))
            }
            other => AppError::PersistenceFailure(other.to_string()),
        }
    }
}
