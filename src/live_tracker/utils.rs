use metrics::gauge;

use super::state_store::LiveStateStore;

/// Export row counts; called after maintenance so the gauges move even when nothing is ingested
pub(crate) fn update_live_flight_metrics(store: &LiveStateStore) {
    let tracked = store.len();
    let active = store.list_active().len();

    gauge!("live_flights.tracked").set(tracked as f64);
    gauge!("live_flights.active").set(active as f64);
}
