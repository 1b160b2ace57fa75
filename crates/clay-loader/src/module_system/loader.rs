// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module list loader - tracks in-flight loads and drains callbacks
//!
//! Every requested identifier adds one to a counter shared by all
//! `knead`/`register` activity on a loader and removes one when it
//! settles (cache hit, load success or load failure). When the counter
//! returns to zero the queued completion callbacks are handed to the
//! ready gate.

use crate::config::DrainOrder;
use crate::error::{ClayError, Result};
use crate::host::ScriptRequest;
use crate::runtime::Clay;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

/// Completion callback queued by `knead`
pub type Callback = Box<dyn FnOnce(&Clay) + Send + 'static>;

/// Outcome of one module load, shared by everyone waiting on it
pub(crate) type LoadOutcome = std::result::Result<(), Arc<ClayError>>;

/// A single module load that any number of waiters can join
pub(crate) type ModuleLoad = Shared<BoxFuture<'static, LoadOutcome>>;

/// Ordered module identifiers to load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleList(Vec<String>);

impl ModuleList {
    /// Number of identifiers
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over identifiers in request order
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl From<&str> for ModuleList {
    fn from(id: &str) -> Self {
        Self(vec![id.to_string()])
    }
}

impl From<String> for ModuleList {
    fn from(id: String) -> Self {
        Self(vec![id])
    }
}

impl From<Vec<String>> for ModuleList {
    fn from(ids: Vec<String>) -> Self {
        Self(ids)
    }
}

impl From<Vec<&str>> for ModuleList {
    fn from(ids: Vec<&str>) -> Self {
        ids.into_iter().map(String::from).collect()
    }
}

impl From<&[&str]> for ModuleList {
    fn from(ids: &[&str]) -> Self {
        ids.iter().map(|id| id.to_string()).collect()
    }
}

impl<const N: usize> From<[&str; N]> for ModuleList {
    fn from(ids: [&str; N]) -> Self {
        ids.into_iter().map(String::from).collect()
    }
}

impl FromIterator<String> for ModuleList {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ModuleList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Counter and callbacks awaiting the next zero-crossing
#[derive(Default)]
struct PendingLoads {
    remaining: usize,
    callbacks: Vec<Callback>,
}

/// Shared load state of one loader instance
pub struct LoadTracker {
    pending: Mutex<PendingLoads>,
    /// Loads currently in flight, by identifier
    inflight: Mutex<HashMap<String, ModuleLoad>>,
    idle: watch::Sender<bool>,
}

impl LoadTracker {
    /// Create an idle tracker
    pub fn new() -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            pending: Mutex::new(PendingLoads::default()),
            inflight: Mutex::new(HashMap::new()),
            idle,
        }
    }

    /// Identifiers that have not settled yet
    pub fn remaining(&self) -> usize {
        self.pending.lock().remaining
    }

    /// Callbacks waiting for the next zero-crossing
    pub fn queued_callbacks(&self) -> usize {
        self.pending.lock().callbacks.len()
    }

    /// Wait until no identifier is in flight
    pub async fn idle(&self) {
        let mut rx = self.idle.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|idle| *idle).await;
    }

    fn push_callback(&self, callback: Callback) {
        self.pending.lock().callbacks.push(callback);
    }

    fn begin(&self, count: usize) {
        let mut pending = self.pending.lock();
        pending.remaining += count;
        if pending.remaining > 0 {
            self.idle.send_replace(false);
        }
    }

    /// Settle one identifier; returns the drained callbacks on a zero-crossing
    fn settle(&self, order: DrainOrder) -> Option<Vec<Callback>> {
        let mut pending = self.pending.lock();
        let Some(remaining) = pending.remaining.checked_sub(1) else {
            warn!("settle without a matching request; counter left at zero");
            return None;
        };
        pending.remaining = remaining;
        trace!(remaining, "module settled");
        if remaining == 0 {
            Some(drain(&mut pending, order))
        } else {
            None
        }
    }

    /// Drain callbacks only if nothing is in flight
    fn drain_if_idle(&self, order: DrainOrder) -> Option<Vec<Callback>> {
        let mut pending = self.pending.lock();
        if pending.remaining == 0 {
            Some(drain(&mut pending, order))
        } else {
            None
        }
    }

    fn mark_idle(&self) {
        if self.pending.lock().remaining == 0 {
            self.idle.send_replace(true);
        }
    }

    fn join_or_insert(&self, id: &str, start: impl FnOnce() -> ModuleLoad) -> ModuleLoad {
        let mut inflight = self.inflight.lock();
        if let Some(load) = inflight.get(id) {
            trace!(module = %id, "joining outstanding load");
            return load.clone();
        }
        let load = start();
        inflight.insert(id.to_string(), load.clone());
        load
    }

    fn finish(&self, id: &str) {
        self.inflight.lock().remove(id);
    }
}

impl Default for LoadTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn drain(pending: &mut PendingLoads, order: DrainOrder) -> Vec<Callback> {
    let mut callbacks = std::mem::take(&mut pending.callbacks);
    if order == DrainOrder::Lifo {
        callbacks.reverse();
    }
    callbacks
}

impl Clay {
    /// Queue a completion callback for the next zero-crossing
    pub(crate) fn queue_callback(&self, callback: Callback) {
        self.tracker().push_callback(callback);
    }

    /// Make sure every listed module is loaded or loading.
    ///
    /// Must be called from within a Tokio runtime. Returns the loads that
    /// were started or joined; cache hits settle immediately and are not
    /// returned.
    pub(crate) fn ensure_loaded(&self, modules: &ModuleList) -> Vec<(String, ModuleLoad)> {
        let tracker = self.tracker();
        if modules.is_empty() {
            if let Some(callbacks) = tracker.drain_if_idle(self.config().drain_order) {
                self.run_drained(callbacks);
            }
            return Vec::new();
        }

        // Count everything up front so a synchronous settle cannot reach zero early.
        tracker.begin(modules.len());

        let mut loads = Vec::new();
        for id in modules.iter() {
            if self.registry().has(id) {
                trace!(module = %id, "cache hit");
                self.settle_one();
                continue;
            }

            let load = self.module_load(id);
            let waiter = load.clone();
            let clay = self.clone();
            tokio::spawn(async move {
                let _ = waiter.await;
                clay.settle_one();
            });
            loads.push((id.clone(), load));
        }
        loads
    }

    fn module_load(&self, id: &str) -> ModuleLoad {
        self.tracker().join_or_insert(id, || {
            let clay = self.clone();
            let module = id.to_string();
            async move {
                let outcome = clay.load_module(&module).await;
                clay.tracker().finish(&module);
                if let Err(err) = &outcome {
                    warn!(module = %module, error = %err, "module failed to load");
                }
                outcome.map_err(Arc::new)
            }
            .boxed()
            .shared()
        })
    }

    async fn load_module(&self, id: &str) -> Result<()> {
        if let Some(prerequisites) = self.dependencies().get(id) {
            if let Some(cycle) = self.dependencies().find_cycle(id) {
                return Err(ClayError::CircularDependency(cycle.join(" -> ")));
            }

            let loads = self.ensure_loaded(&ModuleList::from(prerequisites));
            let outcomes = join_all(
                loads
                    .into_iter()
                    .map(|(dep, load)| async move { (dep, load.await) }),
            )
            .await;
            for (dep, outcome) in outcomes {
                if let Err(source) = outcome {
                    return Err(ClayError::LoadFailed { module: dep, source });
                }
            }
        }

        let request = ScriptRequest::module(id, self.resolver().resolve(id));
        debug!(module = %id, url = %request.url, "requesting script");

        let host = Arc::clone(self.host());
        let script = host.load(&request, self);
        match self.config().load_timeout() {
            Some(limit) => tokio::time::timeout(limit, script)
                .await
                .map_err(|_| ClayError::LoadTimeout {
                    module: id.to_string(),
                    timeout: limit,
                })??,
            None => script.await?,
        }

        if !self.registry().has(id) {
            warn!(module = %id, url = %request.url, "script completed without registering its module");
        }
        Ok(())
    }

    fn settle_one(&self) {
        if let Some(callbacks) = self.tracker().settle(self.config().drain_order) {
            self.run_drained(callbacks);
        }
    }

    fn run_drained(&self, callbacks: Vec<Callback>) {
        if !callbacks.is_empty() {
            debug!(count = callbacks.len(), "draining completion callbacks");
        }
        for callback in callbacks {
            self.when_ready(callback);
        }
        self.tracker().mark_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(tag: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> Callback {
        Box::new(move |_: &Clay| log.lock().push(tag))
    }

    #[test]
    fn test_module_list_conversions() {
        assert_eq!(ModuleList::from("x").len(), 1);
        assert_eq!(ModuleList::from(["a", "b"]).len(), 2);
        let list: ModuleList = vec!["a".to_string(), "b".to_string()].into();
        assert_eq!(list.iter().cloned().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(ModuleList::default().is_empty());
    }

    #[test]
    fn test_settle_drains_only_at_zero() {
        let tracker = LoadTracker::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        tracker.push_callback(noop("a", log.clone()));
        tracker.begin(2);

        assert!(tracker.settle(DrainOrder::Lifo).is_none());
        let drained = tracker.settle(DrainOrder::Lifo).unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(tracker.remaining(), 0);
        assert_eq!(tracker.queued_callbacks(), 0);
    }

    #[test]
    fn test_settle_never_goes_negative() {
        let tracker = LoadTracker::new();
        assert!(tracker.settle(DrainOrder::Fifo).is_none());
        assert_eq!(tracker.remaining(), 0);
    }

    #[test]
    fn test_drain_order() {
        let tracker = LoadTracker::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        tracker.push_callback(noop("first", log.clone()));
        tracker.push_callback(noop("second", log.clone()));
        tracker.begin(1);

        let clay = Clay::builder().build();
        for callback in tracker.settle(DrainOrder::Lifo).unwrap() {
            callback(&clay);
        }
        assert_eq!(*log.lock(), vec!["second", "first"]);

        log.lock().clear();
        tracker.push_callback(noop("first", log.clone()));
        tracker.push_callback(noop("second", log.clone()));
        for callback in tracker.drain_if_idle(DrainOrder::Fifo).unwrap() {
            callback(&clay);
        }
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_idle_signal() {
        let tracker = Arc::new(LoadTracker::new());
        tracker.idle().await;

        tracker.begin(1);
        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.idle().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        assert!(tracker.settle(DrainOrder::Lifo).is_some());
        tracker.mark_idle();
        waiter.await.unwrap();
    }
}
