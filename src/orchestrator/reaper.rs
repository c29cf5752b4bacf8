//! Reaper for age-based session eviction.
//!
//! Runs as a background task independent of request traffic. Every session
//! older than `max_age` is removed from the store and its process killed,
//! whatever its state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

use super::store::SessionStore;
use crate::config::ReaperConfig;

/// Spawn the reaper background task.
///
/// The task sweeps every `config.interval_seconds` until `cancel` fires.
#[must_use]
pub fn spawn_reaper(
    store: Arc<SessionStore>,
    config: ReaperConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("reaper shutting down");
                    break;
                }
                _ = interval.tick() => {
                    sweep(&store, config.max_age()).await;
                }
            }
        }
    })
}

/// Evict every session older than `max_age`; returns how many were evicted.
pub async fn sweep(store: &SessionStore, max_age: Duration) -> usize {
    let span = info_span!("reaper_sweep");

    async {
        let mut expired = Vec::new();
        store
            .for_each(|session| {
                if session.age() > max_age {
                    expired.push(Arc::clone(session));
                }
            })
            .await;

        let mut evicted = 0;
        for candidate in expired {
            // A concurrent terminate may have won the removal.
            if let Some(expired) = store.remove(candidate.id()).await {
                info!(
                    session_id = expired.id(),
                    created_at = %expired.created_at(),
                    state = ?expired.state(),
                    "evicting expired session"
                );
                expired.terminate().await;
                evicted += 1;
            }
        }

        if evicted > 0 {
            info!(evicted, "reaper sweep completed");
        }
        evicted
    }
    .instrument(span)
    .await
}
