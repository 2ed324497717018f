//! Poll jobs for the camera backend
//!
//! - **events** - `GET /events` every `events_interval_ms` (2 s by default)
//! - **fleet** - `GET /cameras` and `GET /entities` together every
//!   `fleet_interval_ms` (5 s by default)
//!
//! A fetch that fails leaves its store's records untouched and sets the
//! store's error flag. Nothing retries early: the next tick is the retry.

use camelot_core::config::PollingConfig;
use camelot_core::{DataGateway, GatewayError, SnapshotStore};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::poller::{PollHandle, PollJob};
use crate::state::Stores;

/// Start the events and fleet loops on a fresh handle.
pub fn start_polling(
    gateway: Arc<dyn DataGateway>,
    stores: Arc<Stores>,
    config: &PollingConfig,
) -> PollHandle {
    let mut handle = PollHandle::new();
    handle.spawn(
        "events",
        config.events_interval(),
        events_job(Arc::clone(&gateway), Arc::clone(&stores)),
    );
    handle.spawn(
        "fleet",
        config.fleet_interval(),
        fleet_job(gateway, stores),
    );

    tracing::info!(
        events_ms = config.events_interval_ms,
        fleet_ms = config.fleet_interval_ms,
        "Polling started"
    );
    handle
}

pub fn events_job(gateway: Arc<dyn DataGateway>, stores: Arc<Stores>) -> PollJob {
    Arc::new(move |token| {
        let gateway = Arc::clone(&gateway);
        let stores = Arc::clone(&stores);
        Box::pin(async move {
            fetch_into(&stores.events, gateway.events(), &token).await;
        })
    })
}

pub fn fleet_job(gateway: Arc<dyn DataGateway>, stores: Arc<Stores>) -> PollJob {
    Arc::new(move |token| {
        let gateway = Arc::clone(&gateway);
        let stores = Arc::clone(&stores);
        Box::pin(async move {
            futures::join!(
                fetch_into(&stores.cameras, gateway.cameras(), &token),
                fetch_into(&stores.entities, gateway.entities(), &token),
            );
        })
    })
}

/// Await one fetch and commit it, unless the poll is cancelled first.
pub async fn fetch_into<T, F>(store: &SnapshotStore<T>, fetch: F, token: &CancellationToken)
where
    F: Future<Output = Result<Vec<T>, GatewayError>>,
{
    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => {
            tracing::debug!(store = store.name(), "Fetch abandoned: poll cancelled");
            return;
        }
        outcome = fetch => outcome,
    };

    store.commit(outcome, token);
}
