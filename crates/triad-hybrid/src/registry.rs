//! Adapter registry with probe-on-first-use and primary/fallback routing.
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use triad_core::{BackendAdapter, BackendKind, BackendRequest, Error, Result, SearchResult};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Unprobed,
    Primary,
    Fallback,
    /// Neither implementation is reachable; stays excluded until `reset`.
    Excluded,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BackendStatus {
    pub route: Route,
    /// Name of the implementation currently serving the kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,
}

struct Slot {
    primary: Option<Arc<dyn BackendAdapter>>,
    fallback: Option<Arc<dyn BackendAdapter>>,
    route: RwLock<Route>,
}

impl Slot {
    fn route(&self) -> Route {
        *self.route.read()
    }

    fn active(&self, route: Route) -> Option<&Arc<dyn BackendAdapter>> {
        match route {
            Route::Primary => self.primary.as_ref(),
            Route::Fallback => self.fallback.as_ref(),
            Route::Unprobed | Route::Excluded => None,
        }
    }
}

pub struct AdapterRegistry {
    slots: BTreeMap<BackendKind, Slot>,
    probe_timeout: Duration,
    probe_lock: Mutex<()>,
}

impl AdapterRegistry {
    pub fn new(probe_timeout: Duration) -> Self {
        Self { slots: BTreeMap::new(), probe_timeout, probe_lock: Mutex::new(()) }
    }

    /// Registers the implementations for `kind`; either may be absent.
    pub fn with_backend(
        mut self,
        kind: BackendKind,
        primary: Option<Arc<dyn BackendAdapter>>,
        fallback: Option<Arc<dyn BackendAdapter>>,
    ) -> Self {
        self.slots.insert(kind, Slot { primary, fallback, route: RwLock::new(Route::Unprobed) });
        self
    }

    pub fn kinds(&self) -> impl Iterator<Item = BackendKind> + '_ {
        self.slots.keys().copied()
    }

    pub fn route(&self, kind: BackendKind) -> Route {
        self.slots.get(&kind).map_or(Route::Excluded, Slot::route)
    }

    /// Routed to a live implementation. Unregistered kinds are never available.
    pub fn is_available(&self, kind: BackendKind) -> bool {
        matches!(self.route(kind), Route::Primary | Route::Fallback)
    }

    pub fn status(&self) -> BTreeMap<BackendKind, BackendStatus> {
        self.slots
            .iter()
            .map(|(kind, slot)| {
                let route = slot.route();
                let adapter = slot.active(route).map(|a| a.name().to_string());
                (*kind, BackendStatus { route, adapter })
            })
            .collect()
    }

    /// Forgets every probe outcome; the next call probes again.
    pub fn reset(&self) {
        for slot in self.slots.values() {
            *slot.route.write() = Route::Unprobed;
        }
        info!("adapter routes reset");
    }

    /// Probes every unprobed kind once, all kinds concurrently. Concurrent
    /// callers wait for the probe in flight instead of starting their own.
    pub async fn ensure_probed(&self) {
        if !self.slots.values().any(|s| s.route() == Route::Unprobed) {
            return;
        }
        let _guard = self.probe_lock.lock().await;
        let pending: Vec<(BackendKind, &Slot)> =
            self.slots.iter().filter(|(_, slot)| slot.route() == Route::Unprobed).map(|(kind, slot)| (*kind, slot)).collect();
        let routes = join_all(pending.iter().map(|(kind, slot)| self.probe_slot(*kind, *slot))).await;
        for ((_, slot), route) in pending.into_iter().zip(routes) {
            *slot.route.write() = route;
        }
    }

    async fn probe_slot(&self, kind: BackendKind, slot: &Slot) -> Route {
        if let Some(primary) = &slot.primary {
            match self.probe(kind, primary.as_ref()).await {
                Ok(()) => {
                    info!(backend = %kind, adapter = primary.name(), "backend reachable");
                    return Route::Primary;
                }
                Err(e) => warn!(backend = %kind, adapter = primary.name(), error = %e, "primary adapter unreachable"),
            }
        }
        if let Some(fallback) = &slot.fallback {
            match self.probe(kind, fallback.as_ref()).await {
                Ok(()) => {
                    warn!(backend = %kind, adapter = fallback.name(), "routing to fallback adapter");
                    return Route::Fallback;
                }
                Err(e) => warn!(backend = %kind, adapter = fallback.name(), error = %e, "fallback adapter unreachable"),
            }
        }
        warn!(backend = %kind, "no reachable adapter; backend excluded");
        Route::Excluded
    }

    async fn probe(&self, kind: BackendKind, adapter: &dyn BackendAdapter) -> Result<()> {
        let start = Instant::now();
        match tokio::time::timeout(self.probe_timeout, adapter.probe()).await {
            Ok(outcome) => {
                debug!(backend = %kind, adapter = adapter.name(), elapsed_ms = start.elapsed().as_millis() as u64, "probe finished");
                outcome
            }
            Err(_) => Err(Error::AdapterTimeout { backend: kind, elapsed_ms: self.probe_timeout.as_millis() as u64 }),
        }
    }

    /// Runs `request` on the implementation routed for `kind`.
    ///
    /// A primary answering `AdapterUnavailable` hands the kind over to the
    /// fallback, which serves this call and every later one until `reset`.
    /// Errors caused by the request itself (`InvalidQuery`, `NotFound`) are
    /// returned as they are and leave the route alone.
    pub async fn search(&self, kind: BackendKind, request: &BackendRequest) -> Result<Vec<SearchResult>> {
        self.ensure_probed().await;
        let slot = self.slots.get(&kind).ok_or_else(|| Error::unavailable(kind, "no adapter configured"))?;
        let route = slot.route();
        let adapter = slot.active(route).ok_or_else(|| Error::unavailable(kind, "backend excluded"))?;
        let outcome = adapter.search(request).await;
        if route == Route::Primary {
            if let (Err(err @ Error::AdapterUnavailable { .. }), Some(fallback)) = (&outcome, &slot.fallback) {
                warn!(backend = %kind, primary = adapter.name(), fallback = fallback.name(), error = %err, "primary failed; activating fallback");
                {
                    let mut current = slot.route.write();
                    if *current == Route::Primary {
                        *current = Route::Fallback;
                    }
                }
                return fallback.search(request).await;
            }
        }
        outcome
    }
}
