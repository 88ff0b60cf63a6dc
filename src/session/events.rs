// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex},
};

use tracing::{debug, error};

use crate::models::{
    params::ParamMap,
    status::{IlluminanceStatus, LightStatus, MotionStatus, PanelStatus},
};

/// Target id matching every event of a kind.
pub const TARGET_ALL: &str = "*";

/// Closed set of event kinds listeners can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OnlineStatus,
    LightStatus,
    MotionStatus,
    IlluminanceStatus,
    PanelStatus,
    EnergyReport,
    DevParam,
    SensorParam,
}

/// One delivered event. The target is the gateway serial for
/// connectivity events and the stable device id otherwise.
#[derive(Debug, Clone)]
pub enum Event {
    OnlineStatus { target: String, online: bool },
    LightStatus { target: String, status: LightStatus },
    MotionStatus { target: String, status: MotionStatus },
    IlluminanceStatus { target: String, status: IlluminanceStatus },
    PanelStatus { target: String, status: PanelStatus },
    EnergyReport { target: String, watts: f64 },
    DevParam { target: String, params: ParamMap },
    SensorParam { target: String, params: ParamMap },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::OnlineStatus { .. } => EventKind::OnlineStatus,
            Event::LightStatus { .. } => EventKind::LightStatus,
            Event::MotionStatus { .. } => EventKind::MotionStatus,
            Event::IlluminanceStatus { .. } => EventKind::IlluminanceStatus,
            Event::PanelStatus { .. } => EventKind::PanelStatus,
            Event::EnergyReport { .. } => EventKind::EnergyReport,
            Event::DevParam { .. } => EventKind::DevParam,
            Event::SensorParam { .. } => EventKind::SensorParam,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Event::OnlineStatus { target, .. }
            | Event::LightStatus { target, .. }
            | Event::MotionStatus { target, .. }
            | Event::IlluminanceStatus { target, .. }
            | Event::PanelStatus { target, .. }
            | Event::EnergyReport { target, .. }
            | Event::DevParam { target, .. }
            | Event::SensorParam { target, .. } => target,
        }
    }
}

/// Listener callback. Invoked synchronously from the inbound pump.
pub type ListenerFn = Arc<dyn Fn(&Event) + Send + Sync>;

/// Opaque removal handle returned by [`EventRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerHandle {
    kind: EventKind,
    target: String,
    id: u64,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    table: HashMap<(EventKind, String), Vec<(u64, ListenerFn)>>,
}

/// Listener table keyed by `(kind, target)`.
///
/// Multiple registrations per key are allowed; dispatch order is
/// registration order, with [`TARGET_ALL`] listeners merged in by the
/// same ordering.
#[derive(Default)]
pub struct EventRegistry {
    inner: Mutex<RegistryInner>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        kind: EventKind,
        target: &str,
        listener: ListenerFn,
    ) -> ListenerHandle {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .table
            .entry((kind, target.to_string()))
            .or_default()
            .push((id, listener));
        ListenerHandle {
            kind,
            target: target.to_string(),
            id,
        }
    }

    /// Removes one registration. Safe to call more than once.
    pub fn remove(&self, handle: &ListenerHandle) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let key = (handle.kind, handle.target.clone());
        let Some(listeners) = inner.table.get_mut(&key) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != handle.id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            inner.table.remove(&key);
        }
        removed
    }

    /// Drops every registration.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.table.clear();
    }

    /// Number of listeners currently matching `(kind, target)` exactly.
    pub fn listener_count(&self, kind: EventKind, target: &str) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .table
            .get(&(kind, target.to_string()))
            .map_or(0, Vec::len)
    }

    /// Invokes every matching listener, in registration order.
    ///
    /// A panicking listener is logged and skipped; later listeners
    /// still run. Returns the number of listeners invoked.
    pub fn emit(&self, event: &Event) -> usize {
        let mut matched: Vec<(u64, ListenerFn)> = {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let kind = event.kind();
            let mut matched = Vec::new();
            if let Some(listeners) =
                inner.table.get(&(kind, event.target().to_string()))
            {
                matched.extend(listeners.iter().cloned());
            }
            if event.target() != TARGET_ALL
                && let Some(listeners) = inner.table.get(&(kind, TARGET_ALL.to_string()))
            {
                matched.extend(listeners.iter().cloned());
            }
            matched
        };
        matched.sort_by_key(|(id, _)| *id);

        let mut invoked = 0;
        for (_, listener) in matched {
            invoked += 1;
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!(
                    "listener for {:?}/{} panicked; continuing",
                    event.kind(),
                    event.target()
                );
            }
        }
        if invoked == 0 {
            debug!(
                "no listeners for {:?} event targeting {}",
                event.kind(),
                event.target()
            );
        }
        invoked
    }
}
