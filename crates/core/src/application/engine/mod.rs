// Queue State Engine - authoritative in-memory queues of one server

pub mod key_locks;
pub mod outcome;
pub mod state;


pub use key_locks::KeyLocks;
pub use outcome::{
    BulkKickOutcome, CreateOutcome, DeleteOutcome, JoinOutcome, KickOutcome, LeaveOutcome,
    ReinitOutcome,
};
pub use state::{StoreFault, StoreState};

use crate::application::channel_store::{ChannelStore, LoadedRecord};
use crate::application::config::StoreConfig;
use crate::domain::{store::validate_language, Queue, QueueKey, Role, ServerId, Store, UserId};
use crate::error::{AppError, Result};
use crate::port::{CarrierChannel, ChannelProvider};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

/// Planned change of one queue, computed from its current value
struct Plan<T> {
    outcome: T,
    next: Option<Queue>,
}

impl<T> Plan<T> {
    fn keep(outcome: T) -> Self {
        Self {
            outcome,
            next: None,
        }
    }

    fn write(outcome: T, queue: Queue) -> Self {
        Self {
            outcome,
            next: Some(queue),
        }
    }
}

/// Queue State Engine
///
/// Mutations on one key are serialized by a per-key lock held through the
/// flush. The committed store only changes after the channel write succeeds,
/// and only while the persistence mutex is held, so a failed flush leaves
/// nothing behind and never leaks into another key's snapshot.
pub struct QueueEngine {
    server: ServerId,
    committed: RwLock<Store>,
    state: Mutex<StoreState>,
    locks: KeyLocks,
    persistence: AsyncMutex<ChannelStore>,
    /// Source of a fresh channel handle when storage is re-initialized
    provider: Option<Arc<dyn ChannelProvider>>,
    closed: AtomicBool,
}

impl QueueEngine {
    /// Load the server's store from its storage channel.
    ///
    /// An empty channel gets an initial carrier. Undecodable carriers leave
    /// the engine empty and faulted instead of failing.
    ///
    /// # Errors
    /// Channel access failures (the store cannot be read or initialized at all)
    pub async fn open(
        server: ServerId,
        channel: Arc<dyn CarrierChannel>,
        config: &StoreConfig,
    ) -> Result<Self> {
        Self::load(server, channel, None, config).await
    }

    /// Open the server's storage channel through `provider` and load it.
    ///
    /// Storage setup asks the provider again, so a deleted channel is
    /// looked up or re-created instead of being retried forever.
    pub async fn connect(
        server: ServerId,
        provider: Arc<dyn ChannelProvider>,
        config: &StoreConfig,
    ) -> Result<Self> {
        let channel = provider.open(server).await?;
        Self::load(server, channel, Some(provider), config).await
    }

    async fn load(
        server: ServerId,
        channel: Arc<dyn CarrierChannel>,
        provider: Option<Arc<dyn ChannelProvider>>,
        config: &StoreConfig,
    ) -> Result<Self> {
        config.validate()?;

        let engine = Self {
            server,
            committed: RwLock::new(Store::new()),
            state: Mutex::new(StoreState::Uninitialized),
            locks: KeyLocks::new(),
            persistence: AsyncMutex::new(ChannelStore::new(
                server,
                channel,
                config.max_chunk_chars,
            )),
            provider,
            closed: AtomicBool::new(false),
        };

        {
            let mut persistence = engine.persistence.lock().await;
            match persistence.load().await {
                Ok(LoadedRecord::Snapshot(store)) => engine.adopt(store),
                Ok(LoadedRecord::Empty) => {
                    persistence.overwrite(&Store::new()).await?;
                    engine.set_state(StoreState::Loaded);
                    info!(server = %server, "Initialized empty store");
                }
                Err(err) => match StoreFault::from_error(&err) {
                    Some(fault) => {
                        warn!(
                            server = %server,
                            error = %err,
                            "Stored queues are unreadable; starting empty, writes refused until storage is re-initialized"
                        );
                        engine.set_state(StoreState::Faulted(fault));
                    }
                    None => return Err(err),
                },
            }
        }

        Ok(engine)
    }

    pub fn server(&self) -> ServerId {
        self.server
    }

    pub fn state(&self) -> StoreState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Copy of the committed store
    pub fn snapshot(&self) -> Store {
        self.read_store().clone()
    }

    // ------------------------------------------------------------------
    // Member operations
    // ------------------------------------------------------------------

    /// Append `member` to the queue, creating the key if needed
    pub async fn join(&self, key: &str, member: UserId) -> Result<JoinOutcome> {
        let key = QueueKey::parse(key)?;
        let outcome = self
            .mutate_queue(&key, |current| {
                let mut queue = current.cloned().unwrap_or_default();
                match queue.position(member) {
                    Some(position) => Plan::keep(JoinOutcome::AlreadyJoined { position }),
                    None => {
                        queue.push(member);
                        let position = queue.len();
                        Plan::write(JoinOutcome::Joined { position }, queue)
                    }
                }
            })
            .await?;

        info!(server = %self.server, key = %key, member, outcome = ?outcome, "join");
        Ok(outcome)
    }

    /// Remove `member` if queued
    pub async fn leave(&self, key: &str, member: UserId) -> Result<LeaveOutcome> {
        let key = QueueKey::parse(key)?;
        let outcome = self
            .mutate_queue(&key, |current| remove_one(current, member))
            .await?;

        let outcome = if outcome {
            LeaveOutcome::Left
        } else {
            LeaveOutcome::NotInQueue
        };
        info!(server = %self.server, key = %key, member, outcome = ?outcome, "leave");
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Admin operations
    // ------------------------------------------------------------------

    /// Remove `member` on an admin's behalf
    pub async fn kick(&self, key: &str, member: UserId, role: Role) -> Result<KickOutcome> {
        require_admin(role, "kick")?;
        let key = QueueKey::parse(key)?;
        let removed = self
            .mutate_queue(&key, |current| remove_one(current, member))
            .await?;

        let outcome = if removed {
            KickOutcome::Kicked
        } else {
            KickOutcome::NotInQueue
        };
        info!(server = %self.server, key = %key, member, outcome = ?outcome, "kick");
        Ok(outcome)
    }

    /// Remove several members with a single flush
    pub async fn kick_many(
        &self,
        key: &str,
        members: &[UserId],
        role: Role,
    ) -> Result<BulkKickOutcome> {
        require_admin(role, "kick")?;
        let key = QueueKey::parse(key)?;
        let outcome = self
            .mutate_queue(&key, |current| {
                let Some(current) = current else {
                    return Plan::keep(BulkKickOutcome {
                        removed: Vec::new(),
                        absent: dedup(members),
                    });
                };
                let mut queue = current.clone();
                let mut outcome = BulkKickOutcome::default();
                for &member in &dedup(members) {
                    if queue.remove(member) {
                        outcome.removed.push(member);
                    } else {
                        outcome.absent.push(member);
                    }
                }
                if outcome.removed.is_empty() {
                    Plan::keep(outcome)
                } else {
                    Plan::write(outcome, queue)
                }
            })
            .await?;

        info!(
            server = %self.server,
            key = %key,
            removed = outcome.removed.len(),
            absent = outcome.absent.len(),
            "kick_many"
        );
        Ok(outcome)
    }

    /// Empty the queue, keeping the key. Returns how many members were cleared.
    pub async fn reset(&self, key: &str, role: Role) -> Result<usize> {
        require_admin(role, "reset")?;
        let key = QueueKey::parse(key)?;
        let cleared = self
            .mutate_queue(&key, |current| match current {
                Some(queue) if queue.is_empty() => Plan::keep(0),
                Some(queue) => Plan::write(queue.len(), Queue::new()),
                None => Plan::write(0, Queue::new()),
            })
            .await?;

        info!(server = %self.server, key = %key, cleared, "reset");
        Ok(cleared)
    }

    /// Ensure the key exists
    pub async fn create(&self, key: &str, role: Role) -> Result<CreateOutcome> {
        require_admin(role, "create")?;
        let key = QueueKey::parse(key)?;
        let outcome = self
            .mutate_queue(&key, |current| match current {
                Some(_) => Plan::keep(CreateOutcome::AlreadyExists),
                None => Plan::write(CreateOutcome::Created, Queue::new()),
            })
            .await?;

        info!(server = %self.server, key = %key, outcome = ?outcome, "create");
        Ok(outcome)
    }

    /// Remove the key from the store entirely
    pub async fn delete(&self, key: &str, role: Role) -> Result<DeleteOutcome> {
        require_admin(role, "delete")?;
        let key = QueueKey::parse(key)?;
        self.ensure_writable()?;
        let _guard = self.locks.acquire(&key).await;

        let outcome = self
            .mutate_store(|store| match store.remove(&key) {
                Some(queue) => (
                    DeleteOutcome::Deleted {
                        members: queue.len(),
                    },
                    true,
                ),
                None => (DeleteOutcome::NotFound, false),
            })
            .await?;

        info!(server = %self.server, key = %key, outcome = ?outcome, "delete");
        Ok(outcome)
    }

    /// Remove and return up to `count` members from the front
    pub async fn remove_front(&self, key: &str, count: usize, role: Role) -> Result<Vec<UserId>> {
        require_admin(role, "remove_front")?;
        let key = QueueKey::parse(key)?;
        let removed = self
            .mutate_queue(&key, |current| match current {
                Some(queue) if count > 0 && !queue.is_empty() => {
                    let mut queue = queue.clone();
                    let removed = queue.drain_front(count);
                    Plan::write(removed, queue)
                }
                _ => Plan::keep(Vec::new()),
            })
            .await?;

        info!(server = %self.server, key = %key, removed = removed.len(), "remove_front");
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Reads (served from the committed snapshot, also while faulted)
    // ------------------------------------------------------------------

    /// Members oldest to newest; empty for unknown keys
    pub fn list(&self, key: &str) -> Result<Vec<UserId>> {
        let key = QueueKey::parse(key)?;
        Ok(self
            .read_store()
            .queue(&key)
            .map(|q| q.members().to_vec())
            .unwrap_or_default())
    }

    /// First `limit` members
    pub fn list_front(&self, key: &str, limit: usize) -> Result<Vec<UserId>> {
        let mut members = self.list(key)?;
        members.truncate(limit);
        Ok(members)
    }

    /// 1-based position of `member`
    pub fn position(&self, key: &str, member: UserId) -> Result<Option<usize>> {
        let key = QueueKey::parse(key)?;
        Ok(self
            .read_store()
            .queue(&key)
            .and_then(|q| q.position(member)))
    }

    pub fn count(&self, key: &str) -> Result<usize> {
        let key = QueueKey::parse(key)?;
        Ok(self.read_store().queue(&key).map_or(0, Queue::len))
    }

    pub fn contains_key(&self, key: &str) -> Result<bool> {
        let key = QueueKey::parse(key)?;
        Ok(self.read_store().contains_key(&key))
    }

    /// All keys in lexicographic order
    pub fn keys(&self) -> Vec<String> {
        self.read_store()
            .keys()
            .map(|k| k.as_str().to_string())
            .collect()
    }

    // ------------------------------------------------------------------
    // Settings & storage administration
    // ------------------------------------------------------------------

    pub fn language(&self) -> String {
        self.read_store().settings.language.clone()
    }

    /// Persist the server language. Returns false when unchanged.
    pub async fn set_language(&self, code: &str, role: Role) -> Result<bool> {
        require_admin(role, "set_language")?;
        validate_language(code)?;
        self.ensure_writable()?;

        let changed = self
            .mutate_store(|store| {
                if store.settings.language == code {
                    (false, false)
                } else {
                    store.settings.language = code.to_string();
                    (true, true)
                }
            })
            .await?;

        info!(server = %self.server, language = %code, changed, "set_language");
        Ok(changed)
    }

    /// Re-read the storage channel and leave any faulted state.
    ///
    /// Readable carriers are adopted as the new state. Missing or unreadable
    /// carriers are overwritten with the last good in-memory snapshot; queues
    /// that only existed in the unreadable carriers are lost.
    pub async fn reinitialize(&self, role: Role) -> Result<ReinitOutcome> {
        require_admin(role, "storage setup")?;
        let mut persistence = self.persistence.lock().await;
        self.ensure_open()?;

        if let Some(provider) = &self.provider {
            provider.invalidate(self.server);
            let channel = provider.open(self.server).await?;
            persistence.replace_channel(channel);
        }

        let outcome = match persistence.load().await {
            Ok(LoadedRecord::Snapshot(store)) => {
                let queues = store.len();
                self.adopt(store);
                ReinitOutcome::Adopted { queues }
            }
            Ok(LoadedRecord::Empty) => self.rewrite(&mut persistence).await?,
            Err(err) => match StoreFault::from_error(&err) {
                Some(fault) => {
                    warn!(
                        server = %self.server,
                        error = %err,
                        "Carriers unreadable, rewriting from memory"
                    );
                    self.set_state(StoreState::Faulted(fault));
                    self.rewrite(&mut persistence).await?
                }
                None => return Err(err),
            },
        };

        info!(server = %self.server, outcome = ?outcome, "Storage re-initialized");
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Run `plan` under the key lock; flush and commit if it changes the queue
    async fn mutate_queue<T, F>(&self, key: &QueueKey, plan: F) -> Result<T>
    where
        F: Fn(Option<&Queue>) -> Plan<T>,
    {
        self.ensure_writable()?;
        let _guard = self.locks.acquire(key).await;

        // No-ops never touch the channel
        let preview = plan(self.read_store().queue(key));
        if preview.next.is_none() {
            debug!(server = %self.server, key = %key, "No change, flush skipped");
            return Ok(preview.outcome);
        }

        // Re-plan on the latest committed store: a re-initialization may have
        // replaced it while we waited for the persistence mutex
        let mut persistence = self.persistence.lock().await;
        self.ensure_writable()?;
        let mut next = self.snapshot();
        let Plan {
            outcome,
            next: queue,
        } = plan(next.queue(key));
        let Some(queue) = queue else {
            return Ok(outcome);
        };
        next.put(key.clone(), queue);

        self.flush(&mut persistence, next).await?;
        Ok(outcome)
    }

    /// Store-wide change under the persistence mutex
    async fn mutate_store<T>(&self, plan: impl FnOnce(&mut Store) -> (T, bool)) -> Result<T> {
        let mut persistence = self.persistence.lock().await;
        self.ensure_writable()?;
        let mut next = self.snapshot();
        let (outcome, changed) = plan(&mut next);
        if changed {
            self.flush(&mut persistence, next).await?;
        }
        Ok(outcome)
    }

    /// Persist `next`; commit it in memory only if the write succeeded
    async fn flush(&self, persistence: &mut ChannelStore, next: Store) -> Result<()> {
        self.set_state(StoreState::Dirty);

        match persistence.save(&next).await {
            Ok(()) => {
                *self.write_store() = next;
                self.set_state(StoreState::Loaded);
                Ok(())
            }
            Err(err) => {
                match StoreFault::from_error(&err) {
                    Some(fault) => {
                        error!(
                            server = %self.server,
                            error = %err,
                            "Store faulted; writes refused until storage is re-initialized"
                        );
                        self.set_state(StoreState::Faulted(fault));
                    }
                    None => {
                        warn!(
                            server = %self.server,
                            error = %err,
                            "Flush failed, mutation rolled back"
                        );
                        self.restore(persistence).await;
                        self.set_state(StoreState::Loaded);
                    }
                }
                Err(err)
            }
        }
    }

    /// Put the committed snapshot back when a failed save left carriers of
    /// two snapshots behind; otherwise the channel would not decode after a
    /// restart. A failed restore is left to the next save.
    async fn restore(&self, persistence: &mut ChannelStore) {
        if !persistence.holds_partial_write() {
            return;
        }
        let committed = self.snapshot();
        match persistence.save(&committed).await {
            Ok(()) => info!(server = %self.server, "Committed snapshot restored after partial write"),
            Err(err) => warn!(
                server = %self.server,
                error = %err,
                "Carriers still hold a partial write; the next save replaces them"
            ),
        }
    }

    /// Refuse further writes once the in-flight flush (if any) has finished
    pub async fn close(&self) {
        let _persistence = self.persistence.lock().await;
        self.closed.store(true, Ordering::Release);
        debug!(server = %self.server, "Store closed");
    }

    async fn rewrite(&self, persistence: &mut ChannelStore) -> Result<ReinitOutcome> {
        let snapshot = self.snapshot();
        persistence.overwrite(&snapshot).await?;
        self.set_state(StoreState::Loaded);
        Ok(ReinitOutcome::Rewritten {
            queues: snapshot.len(),
        })
    }

    fn adopt(&self, store: Store) {
        *self.write_store() = store;
        self.set_state(StoreState::Loaded);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AppError::PersistenceFailure(
                "store is shutting down".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        self.ensure_open()?;
        match self.state() {
            StoreState::Faulted(fault) => Err(fault.to_error()),
            StoreState::Uninitialized => {
                Err(AppError::Internal("store is not loaded yet".to_string()))
            }
            StoreState::Loaded | StoreState::Dirty => Ok(()),
        }
    }

    fn set_state(&self, state: StoreState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn read_store(&self) -> RwLockReadGuard<'_, Store> {
        self.committed.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, Store> {
        self.committed.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn require_admin(role: Role, action: &str) -> Result<()> {
    if role.is_admin() {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!("{} requires admin", action)))
    }
}

/// Plan for removing one member; the outcome says whether it was queued
fn remove_one(current: Option<&Queue>, member: UserId) -> Plan<bool> {
    match current {
        Some(queue) if queue.contains(member) => {
            let mut queue = queue.clone();
            queue.remove(member);
            Plan::write(true, queue)
        }
        _ => Plan::keep(false),
    }
}

fn dedup(members: &[UserId]) -> Vec<UserId> {
    let mut seen = Vec::with_capacity(members.len());
    for &m in members {
        if !seen.contains(&m) {
            seen.push(m);
        }
    }
    seen
}
