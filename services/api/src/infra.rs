use chrono::{NaiveDate, NaiveDateTime};
use fleet_rental::operations::{seed_demo_fleet, Clock, InMemoryFleetStore, RepositoryError};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory store, optionally preloaded with the demo branch network and fleet.
pub(crate) fn build_store(seed_demo_data: bool) -> Result<Arc<InMemoryFleetStore>, RepositoryError> {
    let store = Arc::new(InMemoryFleetStore::new());
    if seed_demo_data {
        seed_demo_fleet(&store)?;
    }
    Ok(store)
}

/// Clock the demo moves by hand so every scenario runs against fixed timestamps.
pub(crate) struct ScriptedClock {
    now: Mutex<NaiveDateTime>,
}

impl ScriptedClock {
    pub(crate) fn starting_at(now: NaiveDateTime) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub(crate) fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
