//! Prometheus metrics endpoint.

use crate::server::CardSetRelay;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
/// Includes both gauges (current state) and counters (monotonic since startup).
pub async fn metrics_handler(Extension(relay): Extension<Arc<CardSetRelay>>) -> impl IntoResponse {
    let body = render(&relay).await;
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

async fn render(relay: &CardSetRelay) -> String {
    let m = relay.metrics();

    // Gauges
    let collections = relay.active_collections();
    // Storage stats (best effort)
    let stored = relay.store().list().await.map(|sets| sets.len()).unwrap_or(0);

    // Counters, monotonic since startup
    let submits = m.submits_total.load(Ordering::Relaxed);
    let fetches = m.fetches_total.load(Ordering::Relaxed);
    let lists = m.lists_total.load(Ordering::Relaxed);
    let applied = m.updates_applied.load(Ordering::Relaxed);
    let skipped = m.updates_skipped.load(Ordering::Relaxed);
    let rejected = m.updates_rejected.load(Ordering::Relaxed);
    let errors = m.errors_total.load(Ordering::Relaxed);

    format!(
        r#"# HELP cardset_relay_collections_active Card sets with a submit in progress
# TYPE cardset_relay_collections_active gauge
cardset_relay_collections_active {collections}

# HELP cardset_relay_card_sets_stored Card sets in the database
# TYPE cardset_relay_card_sets_stored gauge
cardset_relay_card_sets_stored {stored}

# HELP cardset_relay_info Server information
# TYPE cardset_relay_info gauge
cardset_relay_info{{version="{version}"}} 1

# HELP cardset_relay_submits_total Submit requests handled
# TYPE cardset_relay_submits_total counter
cardset_relay_submits_total {submits}

# HELP cardset_relay_fetches_total Fetch requests handled
# TYPE cardset_relay_fetches_total counter
cardset_relay_fetches_total {fetches}

# HELP cardset_relay_lists_total List requests handled
# TYPE cardset_relay_lists_total counter
cardset_relay_lists_total {lists}

# HELP cardset_relay_updates_applied_total Updates applied
# TYPE cardset_relay_updates_applied_total counter
cardset_relay_updates_applied_total {applied}

# HELP cardset_relay_updates_skipped_total Resubmitted updates skipped
# TYPE cardset_relay_updates_skipped_total counter
cardset_relay_updates_skipped_total {skipped}

# HELP cardset_relay_updates_rejected_total Updates the reducer refused
# TYPE cardset_relay_updates_rejected_total counter
cardset_relay_updates_rejected_total {rejected}

# HELP cardset_relay_errors_total Failed requests
# TYPE cardset_relay_errors_total counter
cardset_relay_errors_total {errors}
"#,
        version = env!("CARGO_PKG_VERSION"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::SqliteStore;
    use sync_types::{CollectionId, OriginalCard, StateUpdate};

    #[tokio::test]
    async fn metrics_reflect_handled_batches() {
        let relay = CardSetRelay::new(Config::default(), SqliteStore::in_memory().await.unwrap());
        let add = StateUpdate::add_card(OriginalCard::new("c1", "Fireball"));
        let set = CollectionId::from("set-1");
        relay.submit(&set, std::slice::from_ref(&add)).await.unwrap();
        relay.submit(&set, &[add]).await.unwrap();

        let body = render(&relay).await;

        assert!(body.contains("cardset_relay_collections_active 0\n"));
        assert!(body.contains("cardset_relay_card_sets_stored 1\n"));
        assert!(body.contains("cardset_relay_updates_applied_total 1\n"));
        assert!(body.contains("cardset_relay_updates_skipped_total 1\n"));
    }
}
