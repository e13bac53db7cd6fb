// Store Registry - one QueueEngine per server, opened on first access

use crate::application::config::StoreConfig;
use crate::application::engine::{QueueEngine, StoreState};
use crate::domain::ServerId;
use crate::error::Result;
use crate::port::ChannelProvider;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::info;

type Slot = Arc<OnceCell<Arc<QueueEngine>>>;

/// Per-server engines
///
/// Concurrent first accesses to the same server share a single open; a failed
/// open leaves the slot empty so the next access retries.
pub struct StoreRegistry {
    provider: Arc<dyn ChannelProvider>,
    config: StoreConfig,
    engines: Mutex<HashMap<ServerId, Slot>>,
}

impl StoreRegistry {
    pub fn new(provider: Arc<dyn ChannelProvider>, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            config,
            engines: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Engine of `server`, loading its store on first access
    pub async fn get(&self, server: ServerId) -> Result<Arc<QueueEngine>> {
        let slot = {
            let mut engines = self.engines.lock().unwrap_or_else(PoisonError::into_inner);
            engines.entry(server).or_default().clone()
        };

        let engine = slot
            .get_or_try_init(|| async {
                let engine =
                    QueueEngine::connect(server, self.provider.clone(), &self.config).await?;
                info!(server = %server, state = %engine.state(), "Store opened");
                Ok::<_, crate::error::AppError>(Arc::new(engine))
            })
            .await?;

        Ok(engine.clone())
    }

    /// Engine of `server` if it is already loaded
    pub fn loaded(&self, server: ServerId) -> Option<Arc<QueueEngine>> {
        let engines = self.engines.lock().unwrap_or_else(PoisonError::into_inner);
        engines.get(&server).and_then(|slot| slot.get().cloned())
    }

    /// Close every loaded store, waiting for in-flight flushes to land
    pub async fn close_all(&self) {
        let engines: Vec<_> = {
            let engines = self.engines.lock().unwrap_or_else(PoisonError::into_inner);
            engines.values().filter_map(|slot| slot.get().cloned()).collect()
        };
        futures::future::join_all(engines.iter().map(|engine| engine.close())).await;
        info!(stores = engines.len(), "All stores closed");
    }

    /// Loaded servers with their store state, ordered by server id
    pub fn states(&self) -> Vec<(ServerId, StoreState)> {
        let engines = self.engines.lock().unwrap_or_else(PoisonError::into_inner);
        let mut states: Vec<_> = engines
            .iter()
            .filter_map(|(server, slot)| slot.get().map(|engine| (*server, engine.state())))
            .collect();
        states.sort_by_key(|(server, _)| *server);
        states
    }
}
