// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The `Clay` facade - public entry points of the loader

use crate::config::LoaderConfig;
use crate::error::{ClayError, Result};
use crate::host::{MemoryHost, ScriptHost};
use crate::module_system::{
    Callback, DependencyMap, Exports, LoadTracker, ModuleList, ModuleRegistry, ScriptResolver,
    ScriptRoot,
};
use crate::runtime::ready::ReadyGate;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

struct ClayInner {
    config: LoaderConfig,
    registry: ModuleRegistry,
    dependencies: DependencyMap,
    tracker: LoadTracker,
    gate: ReadyGate<Clay>,
    host: Arc<dyn ScriptHost>,
    resolver: Arc<dyn ScriptResolver>,
}

/// Handle to one loader instance.
///
/// Cloning is cheap and every clone sees the same registry, dependency
/// map, in-flight counter and ready gate. Separate instances share
/// nothing. Operations that start loads must run inside a Tokio runtime.
#[derive(Clone)]
pub struct Clay {
    inner: Arc<ClayInner>,
}

impl Clay {
    /// Create a loader from configuration and a script host
    pub fn new(config: LoaderConfig, host: Arc<dyn ScriptHost>) -> Self {
        Self::builder().config(config).host(host).build()
    }

    /// Start building a loader
    pub fn builder() -> ClayBuilder {
        ClayBuilder::default()
    }

    /// Load `modules` (and their declared prerequisites), then run
    /// `callback` through the ready gate.
    ///
    /// The callback runs at the next moment no module is in flight on
    /// this loader, so loads started by unrelated calls can delay it.
    /// Callbacks released together run most-recent-first unless the
    /// loader is configured for FIFO.
    ///
    /// # Panics
    ///
    /// Panics if a listed module is not yet registered and the call is
    /// made outside a Tokio runtime, since its load is spawned as a task.
    pub fn knead<F>(&self, modules: impl Into<ModuleList>, callback: F)
    where
        F: FnOnce(&Clay) + Send + 'static,
    {
        self.queue_callback(Box::new(callback));
        self.ensure_loaded(&modules.into());
    }

    /// Like [`Clay::knead`], resolving once the callback would have run.
    ///
    /// Fails with the first load error among the requested modules.
    pub async fn knead_async(&self, modules: impl Into<ModuleList>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.queue_callback(Box::new(move |_: &Clay| {
            let _ = tx.send(());
        }));

        for (module, load) in self.ensure_loaded(&modules.into()) {
            if let Err(source) = load.await {
                return Err(ClayError::LoadFailed { module, source });
            }
        }

        let _ = rx.await;
        Ok(())
    }

    /// Declare prerequisites, replacing earlier declarations per module
    pub fn depend<I, K, V>(&self, declarations: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ModuleList>,
    {
        self.dependencies().merge(declarations.into_iter().map(|(id, deps)| {
            let deps: ModuleList = deps.into();
            (id.into(), deps.into_iter().collect())
        }));
    }

    /// Register a module's exports, replacing any previous registration
    pub fn register(&self, id: impl Into<String>, exports: impl Into<Exports>) {
        let id = id.into();
        debug!(module = %id, "registering module");
        self.registry().set(id, exports.into());
    }

    /// Register a module that needs other modules.
    ///
    /// Starts loading `dependencies` without waiting for them, then
    /// registers.
    ///
    /// # Panics
    ///
    /// Panics if a dependency is not yet registered and the call is
    /// made outside a Tokio runtime, since its load is spawned as a task.
    pub fn register_with(
        &self,
        id: impl Into<String>,
        dependencies: impl Into<ModuleList>,
        exports: impl Into<Exports>,
    ) {
        self.ensure_loaded(&dependencies.into());
        self.register(id, exports);
    }

    /// Get a registered module's value, calling factories with `self`
    pub fn fetch(&self, id: &str) -> Result<Value> {
        match self.registry().get(id) {
            Some(Exports::Value(value)) => Ok(value),
            Some(Exports::Factory(factory)) => factory(self),
            None => Err(ClayError::module_not_loaded(id)),
        }
    }

    /// Whether `id` has been registered
    pub fn is_registered(&self, id: &str) -> bool {
        self.registry().has(id)
    }

    /// Registered identifiers, sorted
    pub fn modules(&self) -> Vec<String> {
        self.registry().keys()
    }

    /// Run `handler` once the document is ready (immediately if it is)
    pub fn ready<F>(&self, handler: F)
    where
        F: FnOnce(&Clay) + Send + 'static,
    {
        self.when_ready(Box::new(handler));
    }

    /// Signal that the document is ready, running queued handlers.
    ///
    /// Only the first call has an effect.
    pub fn mark_ready(&self) -> bool {
        let opened = self.inner.gate.open(self);
        if opened {
            debug!("document ready");
        }
        opened
    }

    /// Whether the document-ready signal has fired
    pub fn is_ready(&self) -> bool {
        self.inner.gate.is_ready()
    }

    /// Wait for the document-ready signal
    pub async fn wait_ready(&self) {
        self.inner.gate.opened().await
    }

    /// Identifiers requested but not yet settled
    pub fn in_flight(&self) -> usize {
        self.tracker().remaining()
    }

    /// Completion callbacks waiting for the counter to reach zero
    pub fn pending_callbacks(&self) -> usize {
        self.tracker().queued_callbacks()
    }

    /// Wait until nothing is in flight
    pub async fn settled(&self) {
        self.tracker().idle().await
    }

    /// Configuration this loader was built with
    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    pub(crate) fn when_ready(&self, handler: Callback) {
        self.inner.gate.when_ready(self, handler);
    }

    pub(crate) fn registry(&self) -> &ModuleRegistry {
        &self.inner.registry
    }

    pub(crate) fn dependencies(&self) -> &DependencyMap {
        &self.inner.dependencies
    }

    pub(crate) fn tracker(&self) -> &LoadTracker {
        &self.inner.tracker
    }

    pub(crate) fn host(&self) -> &Arc<dyn ScriptHost> {
        &self.inner.host
    }

    pub(crate) fn resolver(&self) -> &dyn ScriptResolver {
        self.inner.resolver.as_ref()
    }
}

impl fmt::Debug for Clay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clay")
            .field("modules", &self.registry().len())
            .field("in_flight", &self.in_flight())
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Builder for [`Clay`]
#[derive(Default)]
pub struct ClayBuilder {
    config: LoaderConfig,
    host: Option<Arc<dyn ScriptHost>>,
    resolver: Option<Arc<dyn ScriptResolver>>,
}

impl ClayBuilder {
    /// Use this configuration
    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Run scripts with this host (default: an empty [`MemoryHost`])
    pub fn host(mut self, host: Arc<dyn ScriptHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Resolve URLs with this resolver (default: [`ScriptRoot`] from config)
    pub fn resolver(mut self, resolver: Arc<dyn ScriptResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the script root from the sources of already-loaded scripts,
    /// unless one is configured.
    pub fn discover_root<'a, I>(mut self, sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if self.config.script_root.is_none() {
            self.config.script_root = ScriptRoot::discover(sources, &self.config.script_pattern)?;
        }
        Ok(self)
    }

    /// Build the loader
    pub fn build(self) -> Clay {
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(ScriptRoot::from_config(&self.config)));
        let host = self.host.unwrap_or_else(|| Arc::new(MemoryHost::new()));

        let dependencies = DependencyMap::new();
        dependencies.merge(self.config.depend.clone());

        let ready_on_start = self.config.ready_on_start;
        let clay = Clay {
            inner: Arc::new(ClayInner {
                config: self.config,
                registry: ModuleRegistry::new(),
                dependencies,
                tracker: LoadTracker::new(),
                gate: ReadyGate::new(),
                host,
                resolver,
            }),
        };
        if ready_on_start {
            clay.mark_ready();
        }
        clay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_fetch_missing_fails() {
        let clay = Clay::builder().build();
        let err = clay.fetch("never-registered").unwrap_err();
        assert!(matches!(err, ClayError::ModuleNotLoaded(id) if id == "never-registered"));
    }

    #[test]
    fn test_register_overwrites() {
        let clay = Clay::builder().build();
        clay.register("x", json!("a"));
        clay.register("x", json!("b"));
        assert_eq!(clay.fetch("x").unwrap(), json!("b"));
        assert_eq!(clay.modules(), vec!["x"]);
    }

    #[test]
    fn test_factory_receives_facade() {
        let clay = Clay::builder().build();
        clay.register("base", json!(40));
        clay.register(
            "derived",
            Exports::factory(|clay| {
                let base = clay.fetch("base")?;
                Ok(json!(base.as_i64().unwrap_or_default() + 2))
            }),
        );
        assert_eq!(clay.fetch("derived").unwrap(), json!(42));
    }

    #[test]
    fn test_factory_errors_propagate() {
        let clay = Clay::builder().build();
        clay.register("broken", Exports::factory(|_| Err(ClayError::factory("broken", "boom"))));
        let err = clay.fetch("broken").unwrap_err();
        assert!(matches!(err, ClayError::Factory { ref reason, .. } if reason == "boom"));
    }

    #[test]
    fn test_ready_handlers_wait_for_signal() {
        let clay = Clay::builder().build();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = log.clone();
        clay.ready(move |_| l.lock().push("first"));
        let l = log.clone();
        clay.ready(move |_| l.lock().push("second"));
        assert!(log.lock().is_empty());

        assert!(clay.mark_ready());
        assert!(!clay.mark_ready());
        assert_eq!(*log.lock(), vec!["first", "second"]);

        let l = log.clone();
        clay.ready(move |_| l.lock().push("late"));
        assert_eq!(log.lock().last(), Some(&"late"));
    }

    #[test]
    fn test_knead_cached_modules_without_runtime() {
        let clay = Clay::builder().build();
        clay.register("a", json!(1));
        clay.register("b", json!(2));
        let ran = Arc::new(Mutex::new(false));

        let r = ran.clone();
        clay.knead(["a", "b"], move |_| *r.lock() = true);
        assert_eq!(clay.in_flight(), 0);
        assert!(!*ran.lock());

        clay.mark_ready();
        assert!(*ran.lock());
    }

    #[test]
    #[should_panic(expected = "Tokio 1.x runtime")]
    fn test_knead_uncached_module_without_runtime_panics() {
        let clay = Clay::builder().build();
        clay.knead("missing", |_| {});
    }

    #[test]
    fn test_ready_on_start() {
        let config = LoaderConfig {
            ready_on_start: true,
            ..LoaderConfig::default()
        };
        let clay = Clay::builder().config(config).build();
        assert!(clay.is_ready());
    }

    #[test]
    fn test_config_dependencies_are_declared() {
        let mut config = LoaderConfig::default();
        config.depend.insert("x".into(), vec!["y".into()]);
        let clay = Clay::builder().config(config).build();
        assert_eq!(clay.dependencies().get("x"), Some(vec!["y".to_string()]));

        clay.depend([("x", vec!["z", "w"])]);
        assert_eq!(
            clay.dependencies().get("x"),
            Some(vec!["z".to_string(), "w".to_string()])
        );
    }

    #[test]
    fn test_discover_root() {
        let clay = Clay::builder()
            .discover_root(["/assets/clayworks.min.js"])
            .unwrap()
            .build();
        assert_eq!(clay.config().script_root.as_deref(), Some("/assets/"));
        assert_eq!(clay.resolver().resolve("ui.tabs"), "/assets/ui/tabs.js");
    }
}
