pub mod registry;
pub mod session;
pub mod state_machine;
pub mod transitions;

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, watch};
use uuid::Uuid;

use crate::{config::AppConfig, dao::quiz_store::QuizStore, error::ServiceError};

use self::registry::ConnectionRegistry;

pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, live connections and per-session gates.
pub struct AppState {
    store: RwLock<Option<Arc<dyn QuizStore>>>,
    registry: ConnectionRegistry,
    config: Arc<AppConfig>,
    degraded: watch::Sender<bool>,
    session_gates: DashMap<Uuid, Arc<Mutex<()>>>,
    participant_gates: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self::build(config, None))
    }

    /// Construct a state with `store` already installed.
    pub fn with_store(config: AppConfig, store: Arc<dyn QuizStore>) -> SharedState {
        Arc::new(Self::build(config, Some(store)))
    }

    fn build(config: AppConfig, store: Option<Arc<dyn QuizStore>>) -> Self {
        let (degraded_tx, _rx) = watch::channel(store.is_none());
        Self {
            registry: ConnectionRegistry::new(config.outbound_queue_capacity()),
            store: RwLock::new(store),
            config: Arc::new(config),
            degraded: degraded_tx,
            session_gates: DashMap::new(),
            participant_gates: DashMap::new(),
        }
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn QuizStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Store handle, or [`ServiceError::Degraded`] while storage is unavailable.
    pub async fn require_store(&self) -> Result<Arc<dyn QuizStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn set_store(&self, store: Arc<dyn QuizStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Live connections keyed by room code.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Bound applied to store work inside a session transition.
    pub fn transition_timeout(&self) -> Option<Duration> {
        self.config.transition_timeout()
    }

    /// Serialize lifecycle changes and joins of one session.
    pub async fn lock_session(&self, session_id: Uuid) -> GateGuard<'_> {
        GateGuard::acquire(&self.session_gates, session_id).await
    }

    /// Serialize score and cursor updates of one participant.
    pub async fn lock_participant(&self, participant_id: Uuid) -> GateGuard<'_> {
        GateGuard::acquire(&self.participant_gates, participant_id).await
    }
}

/// Exclusive hold on a keyed gate. The gate is forgotten once nobody holds or awaits it.
pub struct GateGuard<'a> {
    gates: &'a DashMap<Uuid, Arc<Mutex<()>>>,
    key: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<'a> GateGuard<'a> {
    async fn acquire(gates: &'a DashMap<Uuid, Arc<Mutex<()>>>, key: Uuid) -> Self {
        let gate = gates.entry(key).or_default().clone();
        let guard = gate.lock_owned().await;
        Self {
            gates,
            key,
            guard: Some(guard),
        }
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.gates
            .remove_if(&self.key, |_, gate| Arc::strong_count(gate) == 1);
    }
}
