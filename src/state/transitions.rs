use std::{future::Future, sync::Arc};

use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::{models::SessionEntity, quiz_store::QuizStore, storage::StorageResult},
    error::ServiceError,
    state::SharedState,
};

/// Await a store read under the configured transition timeout.
pub async fn bounded<T>(
    state: &SharedState,
    read: impl Future<Output = StorageResult<T>>,
) -> Result<T, ServiceError> {
    match state.transition_timeout() {
        Some(limit) => match timeout(limit, read).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => {
                warn!(?limit, "store read timed out");
                Err(ServiceError::Timeout)
            }
        },
        None => read.await.map_err(Into::into),
    }
}

/// Run `work` against the freshly loaded session while holding that session's gate.
///
/// Reads inside `work` go through [`bounded`]. The committing write and the broadcasts after
/// it are never cut short, so the room always hears about a state change the store accepted,
/// in the order the transitions were applied.
pub async fn run_transition<F, Fut, T>(
    state: &SharedState,
    session_id: Uuid,
    work: F,
) -> Result<T, ServiceError>
where
    F: FnOnce(Arc<dyn QuizStore>, SessionEntity) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let store = state.require_store().await?;
    let _gate = state.lock_session(session_id).await;

    let session = bounded(state, store.find_session(session_id))
        .await?
        .ok_or_else(|| ServiceError::NotFound("game not found".into()))?;

    work(store, session).await
}
