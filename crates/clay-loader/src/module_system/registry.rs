// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Registry of loaded modules

use crate::error::Result;
use crate::runtime::Clay;
use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A factory invoked with the facade each time its module is fetched
pub type Factory = Arc<dyn Fn(&Clay) -> Result<Value> + Send + Sync>;

/// What a module registered under its identifier
#[derive(Clone)]
pub enum Exports {
    /// A plain value, returned as-is by `fetch`
    Value(Value),
    /// A factory, called with the facade by `fetch`
    Factory(Factory),
}

impl Exports {
    /// Wrap a closure as a factory export
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&Clay) -> Result<Value> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(f))
    }

    /// Whether `fetch` will call this export
    pub fn is_factory(&self) -> bool {
        matches!(self, Self::Factory(_))
    }
}

impl fmt::Debug for Exports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

impl From<Value> for Exports {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Thread-safe module registry.
///
/// Entries live for the lifetime of the registry; registering an
/// identifier again replaces its exports.
pub struct ModuleRegistry {
    /// Identifier -> exports
    modules: DashMap<String, Exports>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            modules: DashMap::new(),
        }
    }

    /// Get a module's exports
    pub fn get(&self, id: &str) -> Option<Exports> {
        self.modules.get(id).map(|entry| entry.clone())
    }

    /// Check if a module is registered
    pub fn has(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// Store a module's exports, replacing any previous entry
    pub fn set(&self, id: String, exports: Exports) -> Option<Exports> {
        self.modules.insert(id, exports)
    }

    /// Get all registered identifiers, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.modules.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Get the number of registered modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
