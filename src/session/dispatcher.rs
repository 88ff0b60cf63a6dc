// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use dashmap::DashMap;
use serde_json::Value;
use tokio::{
    sync::{Notify, mpsc},
    task::JoinHandle,
    time::{Instant, sleep, timeout_at},
};
use tracing::{debug, warn};

use crate::models::wire::envelope;

/// Coalescing window for per-device commands.
pub const BATCH_WINDOW: Duration = Duration::from_millis(100);

/// Outbound payload hand-off between the session logic and whatever is
/// currently connected to the broker.
///
/// While no connection is attached, sends are dropped with a log line:
/// publishes are only meaningful on a connected session.
#[derive(Default)]
pub(crate) struct PublishSink {
    tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl PublishSink {
    pub(crate) fn attach(&self, tx: mpsc::UnboundedSender<Vec<u8>>) {
        *self.tx.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
    }

    pub(crate) fn detach(&self) {
        *self.tx.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub(crate) fn send(&self, payload: Vec<u8>) -> bool {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(tx) if tx.send(payload).is_ok() => true,
            Some(_) => {
                warn!("dropping publish: outbound channel closed");
                false
            },
            None => {
                warn!("dropping publish: session not connected");
                false
            },
        }
    }
}

struct PendingBatch {
    /// Insertion-ordered payloads; a repeat of the same device key
    /// replaces the payload in place.
    entries: Vec<(String, Value)>,
    timer: JoinHandle<()>,
}

/// Coalesces high-rate per-device commands into grouped publications.
pub(crate) struct Dispatcher {
    gw_sn: String,
    sink: Arc<PublishSink>,
    window: Duration,
    pending: DashMap<String, PendingBatch>,
}

impl Dispatcher {
    pub(crate) fn new(gw_sn: &str, sink: Arc<PublishSink>) -> Self {
        Self {
            gw_sn: gw_sn.to_string(),
            sink,
            window: BATCH_WINDOW,
            pending: DashMap::new(),
        }
    }

    /// Adds one per-device request to the batch for `cmd`.
    ///
    /// The first entry for an idle command schedules the flush timer;
    /// within the window the latest payload per device key wins while
    /// the key keeps its original position.
    pub(crate) fn add_request(
        self: &Arc<Self>,
        cmd: &str,
        device_key: String,
        payload: Value,
    ) {
        use dashmap::mapref::entry::Entry;

        match self.pending.entry(cmd.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entries = &mut occupied.get_mut().entries;
                match entries.iter_mut().find(|(key, _)| *key == device_key) {
                    Some((_, existing)) => *existing = payload,
                    None => entries.push((device_key, payload)),
                }
            },
            Entry::Vacant(vacant) => {
                let this = Arc::clone(self);
                let cmd_owned = cmd.to_string();
                let window = self.window;
                let timer = tokio::spawn(async move {
                    sleep(window).await;
                    this.flush(&cmd_owned);
                });
                vacant.insert(PendingBatch {
                    entries: vec![(device_key, payload)],
                    timer,
                });
            },
        }
    }

    /// Publishes and clears the batch for `cmd`.
    ///
    /// Batch and timer are removed in one map operation before the
    /// publish, so a listener re-entering the dispatcher during the
    /// publish starts a fresh batch instead of double-sending.
    fn flush(&self, cmd: &str) {
        let Some((_, batch)) = self.pending.remove(cmd) else {
            return;
        };

        let span =
            tracing::debug_span!("batch_publish", gw_sn = %self.gw_sn, %cmd);
        let _guard = span.enter();

        let mut command = envelope(cmd, &self.gw_sn);
        command.insert(
            "data".to_string(),
            Value::Array(batch.entries.into_iter().map(|(_, v)| v).collect()),
        );
        let payload = Value::Object(command);

        debug!("flushing batched command");
        self.sink.send(payload.to_string().into_bytes());
    }

    /// Drops every pending batch, cancelling their timers.
    pub(crate) fn drain(&self) {
        let commands: Vec<String> =
            self.pending.iter().map(|e| e.key().clone()).collect();
        for cmd in commands {
            if let Some((_, batch)) = self.pending.remove(&cmd) {
                batch.timer.abort();
                debug!(
                    %cmd,
                    dropped = batch.entries.len(),
                    "dropping pending batch on close"
                );
            }
        }
    }

    #[cfg(test)]
    fn pending_len(&self, cmd: &str) -> usize {
        self.pending.get(cmd).map_or(0, |b| b.entries.len())
    }
}

/// Completion signal pairing one request with its terminal response.
///
/// Values accumulate under the lock; `complete` wakes the waiter.
/// Waiting resolves to whatever has accumulated when the budget runs
/// out, and to an error only if the session closed underneath the
/// caller.
pub(crate) struct ResponseSlot<T> {
    inner: Mutex<SlotState<T>>,
    notify: Notify,
}

struct SlotState<T> {
    value: T,
    done: bool,
    closed: bool,
}

/// Outcome of waiting on a [`ResponseSlot`].
pub(crate) enum SlotWait<T> {
    /// Terminal response arrived (or timeout hit with partial state).
    Value(T),
    /// The session closed while waiting.
    Closed,
}

impl<T: Default + Clone> Default for ResponseSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default + Clone> ResponseSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(SlotState {
                value: T::default(),
                done: false,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Clears accumulated state before a new request is published.
    pub(crate) fn reset(&self) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.value = T::default();
        state.done = false;
        state.closed = false;
    }

    /// Mutates the accumulated value (intermediate responses).
    pub(crate) fn update(&self, f: impl FnOnce(&mut T)) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state.value);
    }

    /// Marks the terminal response received and wakes the waiter.
    pub(crate) fn complete(&self) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.done = true;
        drop(state);
        self.notify.notify_waiters();
    }

    /// Marks the session closed and wakes the waiter.
    pub(crate) fn close(&self) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.closed = true;
        drop(state);
        self.notify.notify_waiters();
    }

    pub(crate) async fn wait(&self, budget: Duration) -> SlotWait<T> {
        let deadline = Instant::now() + budget;
        loop {
            let notified = self.notify.notified();
            {
                let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                if state.closed {
                    return SlotWait::Closed;
                }
                if state.done {
                    return SlotWait::Value(state.value.clone());
                }
            }
            if timeout_at(deadline, notified).await.is_err() {
                let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                if state.closed {
                    return SlotWait::Closed;
                }
                debug!("response wait timed out, returning partial state");
                return SlotWait::Value(state.value.clone());
            }
        }
    }
}
