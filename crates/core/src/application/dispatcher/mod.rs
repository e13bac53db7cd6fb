// Interaction Dispatcher - routes UI events onto per-(server, key) lanes

mod render;
mod types;


pub use render::{render_members, KnownNames};
pub use types::{Action, InteractionRequest, InteractionResult, Status};

use crate::application::constants::DEFAULT_LIST_LIMIT;
use crate::application::engine::{
    CreateOutcome, DeleteOutcome, JoinOutcome, KickOutcome, LeaveOutcome, QueueEngine,
    ReinitOutcome,
};
use crate::application::registry::StoreRegistry;
use crate::domain::{Member, QueueKey, Role, ServerId};
use crate::error::{AppError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

type LaneId = (ServerId, String);
type LaneMap = Mutex<HashMap<LaneId, mpsc::UnboundedSender<Job>>>;

/// A request waiting on its lane
struct Job {
    engine: Arc<QueueEngine>,
    request: InteractionRequest,
    reply: oneshot::Sender<InteractionResult>,
}

impl Job {
    async fn run(self) {
        let Job {
            engine,
            request,
            reply,
        } = self;
        let result = run_isolated(engine, request).await;
        // The caller may have stopped waiting; the mutation still completed
        let _ = reply.send(result);
    }
}

/// Interaction Dispatcher
///
/// Requests for the same (server, key) run one at a time, in arrival order,
/// on a lane task. Lanes retire after `lane_idle_timeout` without traffic.
/// Store-level actions bypass the lanes.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<StoreRegistry>,
    lanes: Arc<LaneMap>,
    idle_timeout: Duration,
    closing: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        let idle_timeout = registry.config().lane_idle_timeout;
        Self {
            registry,
            lanes: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout,
            closing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    /// Number of live lanes
    pub fn lane_count(&self) -> usize {
        self.lanes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stop accepting interactions and close every loaded store.
    ///
    /// Returns once in-flight flushes have landed, so no save is cut short
    /// by process exit. Jobs still queued on lanes are refused by the closed
    /// stores.
    pub async fn shutdown(&self) {
        self.closing.store(true, Ordering::Release);
        let lanes = std::mem::take(
            &mut *self.lanes.lock().unwrap_or_else(PoisonError::into_inner),
        );
        info!(lanes = lanes.len(), "Dispatcher shutting down");
        drop(lanes);
        self.registry.close_all().await;
    }

    /// Handle one interaction. Never fails: every error becomes a status.
    pub async fn dispatch(&self, request: InteractionRequest) -> InteractionResult {
        let action = request.action.name();
        let server = request.server;
        let actor = request.actor.id;

        let result = self.route(request).await;
        if result.status.is_success() {
            debug!(server = %server, actor, action, status = ?result.status, "Interaction handled");
        } else {
            warn!(
                server = %server,
                actor,
                action,
                status = ?result.status,
                detail = ?result.detail,
                "Interaction rejected"
            );
        }
        result
    }

    async fn route(&self, request: InteractionRequest) -> InteractionResult {
        if self.closing.load(Ordering::Acquire) {
            return InteractionResult::from_error(&AppError::PersistenceFailure(
                "shutting down".to_string(),
            ));
        }

        if request.action.requires_admin() && !request.is_admin {
            return InteractionResult::from_error(&AppError::Unauthorized(format!(
                "{} requires admin",
                request.action.name()
            )));
        }

        let key = match request.action.key().map(|k| QueueKey::parse(k)).transpose() {
            Ok(key) => key,
            Err(err) => return InteractionResult::from_error(&err.into()),
        };

        let engine = match self.registry.get(request.server).await {
            Ok(engine) => engine,
            Err(err) => return InteractionResult::from_error(&err),
        };

        match key {
            Some(key) => self.submit(engine, key, request).await,
            None => run_isolated(engine, request).await,
        }
    }

    /// Queue the request on its lane and wait for the reply
    async fn submit(
        &self,
        engine: Arc<QueueEngine>,
        key: QueueKey,
        request: InteractionRequest,
    ) -> InteractionResult {
        let (reply, response) = oneshot::channel();
        let job = Job {
            engine,
            request,
            reply,
        };
        let lane_id = (job.request.server, key.as_str().to_string());

        {
            // Senders only enqueue under the map lock, and a lane only retires
            // under it after finding its queue empty, so no job is stranded
            let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
            let sender = lanes
                .entry(lane_id.clone())
                .or_insert_with(|| self.spawn_lane(lane_id.clone()));
            if let Err(mpsc::error::SendError(job)) = sender.send(job) {
                // Lane task is gone without retiring; replace it
                let fresh = self.spawn_lane(lane_id.clone());
                let resent = fresh.send(job);
                lanes.insert(lane_id, fresh);
                if resent.is_err() {
                    return lane_lost();
                }
            }
        }

        response.await.unwrap_or_else(|_| lane_lost())
    }

    fn spawn_lane(&self, lane_id: LaneId) -> mpsc::UnboundedSender<Job> {
        let (tx, rx) = mpsc::unbounded_channel();
        debug!(server = %lane_id.0, key = %lane_id.1, "Lane started");
        tokio::spawn(run_lane(
            self.lanes.clone(),
            lane_id,
            rx,
            self.idle_timeout,
        ));
        tx
    }
}

async fn run_lane(
    lanes: Arc<LaneMap>,
    lane_id: LaneId,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    idle_timeout: Duration,
) {
    loop {
        let job = match tokio::time::timeout(idle_timeout, jobs.recv()).await {
            Ok(Some(job)) => job,
            // Every sender dropped: the lane was already unlisted
            Ok(None) => return,
            Err(_) => match retire(&lanes, &lane_id, &mut jobs) {
                Some(job) => job,
                None => {
                    debug!(server = %lane_id.0, key = %lane_id.1, "Lane retired");
                    return;
                }
            },
        };
        job.run().await;
    }
}

/// Remove the lane unless a job slipped in before the map lock was taken
fn retire(
    lanes: &LaneMap,
    lane_id: &LaneId,
    jobs: &mut mpsc::UnboundedReceiver<Job>,
) -> Option<Job> {
    let mut lanes = lanes.lock().unwrap_or_else(PoisonError::into_inner);
    match jobs.try_recv() {
        Ok(job) => Some(job),
        Err(_) => {
            lanes.remove(lane_id);
            None
        }
    }
}

/// Run on its own task: a panic fails this request only, and a caller that
/// stops waiting does not cancel the mutation
async fn run_isolated(engine: Arc<QueueEngine>, request: InteractionRequest) -> InteractionResult {
    let action = request.action.name();
    match tokio::spawn(async move { execute(&engine, request).await }).await {
        Ok(result) => result,
        Err(err) => {
            error!(action, error = %err, "Interaction task failed");
            InteractionResult::from_error(&AppError::Internal(format!(
                "{} did not complete",
                action
            )))
        }
    }
}

fn lane_lost() -> InteractionResult {
    InteractionResult::from_error(&AppError::Internal(
        "request lane stopped before replying".to_string(),
    ))
}

/// Apply one action to the engine
async fn execute(engine: &QueueEngine, request: InteractionRequest) -> InteractionResult {
    match apply(engine, request).await {
        Ok(result) => result,
        Err(err) => InteractionResult::from_error(&err),
    }
}

async fn apply(engine: &QueueEngine, request: InteractionRequest) -> Result<InteractionResult> {
    let InteractionRequest {
        actor,
        is_admin,
        action,
        ..
    } = request;
    let role = Role::from_admin_flag(is_admin);

    let result = match action {
        Action::Join { key } => {
            let names = KnownNames::from_members([&actor]);
            let (status, position) = match engine.join(&key, actor.id).await? {
                JoinOutcome::Joined { position } => (Status::Success, position),
                JoinOutcome::AlreadyJoined { position } => (Status::AlreadyJoined, position),
            };
            InteractionResult::new(status)
                .with_position(position)
                .with_list(front_list(engine, &key, &names)?)
        }
        Action::Leave { key } => {
            let names = KnownNames::from_members([&actor]);
            let status = match engine.leave(&key, actor.id).await? {
                LeaveOutcome::Left => Status::Success,
                LeaveOutcome::NotInQueue => Status::NotInQueue,
            };
            InteractionResult::new(status).with_list(front_list(engine, &key, &names)?)
        }
        Action::Kick { key, target } => {
            let names = KnownNames::from_members([&actor, &target]);
            let result = match engine.kick(&key, target.id, role).await? {
                KickOutcome::Kicked => InteractionResult::success().with_removed(vec![target.id]),
                KickOutcome::NotInQueue => InteractionResult::new(Status::NotInQueue),
            };
            result.with_list(front_list(engine, &key, &names)?)
        }
        Action::KickMany { key, targets } => {
            let names = KnownNames::from_members(targets.iter().chain([&actor]));
            let ids: Vec<_> = targets.iter().map(|m| m.id).collect();
            let outcome = engine.kick_many(&key, &ids, role).await?;
            let status = if outcome.removed.is_empty() {
                Status::NotInQueue
            } else {
                Status::Success
            };
            let mut result = InteractionResult::new(status).with_removed(outcome.removed);
            if !outcome.absent.is_empty() {
                result = result.with_detail(format!("{} not in queue", mentions(&outcome.absent)));
            }
            result.with_list(front_list(engine, &key, &names)?)
        }
        Action::Reset { key } => {
            let cleared = engine.reset(&key, role).await?;
            InteractionResult::success().with_detail(format!("cleared {} members", cleared))
        }
        Action::Create { key } => match engine.create(&key, role).await? {
            CreateOutcome::Created => InteractionResult::success(),
            CreateOutcome::AlreadyExists => {
                InteractionResult::success().with_detail("queue already exists")
            }
        },
        Action::Delete { key } => match engine.delete(&key, role).await? {
            DeleteOutcome::Deleted { members } => InteractionResult::success()
                .with_detail(format!("deleted queue with {} members", members)),
            DeleteOutcome::NotFound => {
                InteractionResult::success().with_detail("queue did not exist")
            }
        },
        Action::List { key, limit } => {
            let names = KnownNames::from_members([&actor]);
            let total = engine.count(&key)?;
            let shown = match limit {
                Some(limit) => engine.list_front(&key, limit)?,
                None => engine.list(&key)?,
            };
            let mut result = InteractionResult::success()
                .with_list(render_members(&shown, 1, &names))
                .with_detail(format!("{} in queue", total));
            if let Some(position) = engine.position(&key, actor.id)? {
                result = result.with_position(position);
            }
            result
        }
        Action::RemoveFront { key, count } => {
            let removed = engine.remove_front(&key, count, role).await?;
            let names = KnownNames::from_members([&actor]);
            InteractionResult::success()
                .with_list(render_members(&removed, 1, &names))
                .with_removed(removed)
        }
        Action::SetLanguage { code } => {
            let changed = engine.set_language(&code, role).await?;
            let result = InteractionResult::success();
            if changed {
                result.with_detail(format!("language set to {}", code))
            } else {
                result.with_detail(format!("language already {}", code))
            }
        }
        Action::SetupStorage => {
            let detail = match engine.reinitialize(role).await? {
                ReinitOutcome::Adopted { queues } => {
                    format!("storage re-read, {} queues loaded", queues)
                }
                ReinitOutcome::Rewritten { queues } => {
                    format!("storage rewritten with {} queues", queues)
                }
            };
            info!(server = %engine.server(), actor = actor.id, "Storage setup requested");
            InteractionResult::success().with_detail(detail)
        }
    };

    Ok(result)
}

/// Current front of the queue, rendered
fn front_list(engine: &QueueEngine, key: &str, names: &KnownNames) -> Result<String> {
    Ok(render_members(
        &engine.list_front(key, DEFAULT_LIST_LIMIT)?,
        1,
        names,
    ))
}

fn mentions(ids: &[u64]) -> String {
    ids.iter()
        .map(|&id| Member::new(id).mention())
        .collect::<Vec<_>>()
        .join(", ")
}
