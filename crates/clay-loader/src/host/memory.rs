// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! In-memory script host

use super::{ScriptHost, ScriptRequest};
use crate::error::{ClayError, Result};
use crate::module_system::Exports;
use crate::runtime::Clay;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Top-level code of an in-memory script
pub type ScriptBody = Arc<dyn Fn(&Clay) -> Result<()> + Send + Sync>;

#[derive(Clone)]
struct MemoryScript {
    body: Option<ScriptBody>,
    latency: Duration,
}

/// Script host backed by closures, keyed by URL.
///
/// Every request is recorded in the order it was issued.
#[derive(Default)]
pub struct MemoryHost {
    scripts: DashMap<String, MemoryScript>,
    requests: Mutex<Vec<ScriptRequest>>,
}

impl MemoryHost {
    /// Create a host with no scripts
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a script that runs `body` when loaded
    pub fn script<F>(self, url: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Clay) -> Result<()> + Send + Sync + 'static,
    {
        self.delayed(url, Duration::ZERO, body)
    }

    /// Add a script that completes after `latency`
    pub fn delayed<F>(self, url: impl Into<String>, latency: Duration, body: F) -> Self
    where
        F: Fn(&Clay) -> Result<()> + Send + Sync + 'static,
    {
        self.scripts.insert(
            url.into(),
            MemoryScript {
                body: Some(Arc::new(body)),
                latency,
            },
        );
        self
    }

    /// Add a script that registers `module` with `exports`
    pub fn module(
        self,
        url: impl Into<String>,
        module: impl Into<String>,
        exports: impl Into<Exports>,
    ) -> Self {
        self.delayed_module(url, Duration::ZERO, module, exports)
    }

    /// Add a script that registers `module` with `exports` after `latency`
    pub fn delayed_module(
        self,
        url: impl Into<String>,
        latency: Duration,
        module: impl Into<String>,
        exports: impl Into<Exports>,
    ) -> Self {
        let module = module.into();
        let exports = exports.into();
        self.delayed(url, latency, move |clay| {
            clay.register(module.clone(), exports.clone());
            Ok(())
        })
    }

    /// Add a script that never completes
    pub fn hanging(self, url: impl Into<String>) -> Self {
        self.scripts.insert(
            url.into(),
            MemoryScript {
                body: None,
                latency: Duration::ZERO,
            },
        );
        self
    }

    /// Requests issued so far, in order
    pub fn requests(&self) -> Vec<ScriptRequest> {
        self.requests.lock().clone()
    }

    /// URLs requested so far, in order
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.url.clone()).collect()
    }

    /// Number of requests issued for `url`
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.url == url).count()
    }
}

#[async_trait]
impl ScriptHost for MemoryHost {
    async fn load(&self, request: &ScriptRequest, clay: &Clay) -> Result<()> {
        self.requests.lock().push(request.clone());

        let script = self
            .scripts
            .get(&request.url)
            .map(|entry| entry.clone())
            .ok_or_else(|| ClayError::ScriptNotFound(request.url.clone()))?;

        let Some(body) = script.body else {
            return futures::future::pending().await;
        };

        if !script.latency.is_zero() {
            tokio::time::sleep(script.latency).await;
        }
        body(clay)
    }
}
