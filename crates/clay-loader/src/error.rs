// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the module loader

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, ClayError>;

/// Errors that can occur while loading or fetching modules
#[derive(Debug, Error)]
pub enum ClayError {
    /// `fetch` was called before the module registered itself
    #[error("Specified module '{0}' has not been loaded yet")]
    ModuleNotLoaded(String),

    /// A script did not complete before its deadline
    #[error("Loading module '{module}' timed out after {timeout:?}")]
    LoadTimeout {
        /// Module identifier
        module: String,
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// A module, or one of its prerequisites, failed to load
    #[error("Failed to load module '{module}': {source}")]
    LoadFailed {
        /// Module identifier
        module: String,
        /// Underlying failure, shared by every waiter on the same load
        #[source]
        source: Arc<ClayError>,
    },

    /// Circular dependency detected in the declared dependency map
    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    /// The host has no script behind the requested URL
    #[error("Script not found: {0}")]
    ScriptNotFound(String),

    /// A module file could not be interpreted
    #[error("Invalid module file '{url}': {reason}")]
    InvalidModuleFile {
        /// URL of the script
        url: String,
        /// Reason for failure
        reason: String,
    },

    /// A registered factory failed while being fetched
    #[error("Factory for module '{module}' failed: {reason}")]
    Factory {
        /// Module identifier
        module: String,
        /// Reason for failure
        reason: String,
    },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid pattern
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

impl ClayError {
    /// Create a module-not-loaded error
    pub fn module_not_loaded(module: impl Into<String>) -> Self {
        Self::ModuleNotLoaded(module.into())
    }

    /// Create a factory error
    pub fn factory(module: impl Into<String>, reason: impl ToString) -> Self {
        Self::Factory {
            module: module.into(),
            reason: reason.to_string(),
        }
    }

    /// Follow `LoadFailed` chains down to the error that started them
    pub fn root_cause(&self) -> &ClayError {
        match self {
            Self::LoadFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the failure was a missed deadline somewhere down the chain
    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), Self::LoadTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_walks_nested_failures() {
        let timeout = ClayError::LoadTimeout {
            module: "anim".to_string(),
            timeout: Duration::from_millis(50),
        };
        let nested = ClayError::LoadFailed {
            module: "widget".to_string(),
            source: Arc::new(ClayError::LoadFailed {
                module: "anim".to_string(),
                source: Arc::new(timeout),
            }),
        };

        assert!(nested.is_timeout());
        assert!(matches!(
            nested.root_cause(),
            ClayError::LoadTimeout { module, .. } if module == "anim"
        ));
    }

    #[test]
    fn test_display_messages() {
        let err = ClayError::module_not_loaded("modules.control");
        assert_eq!(
            err.to_string(),
            "Specified module 'modules.control' has not been loaded yet"
        );

        let err = ClayError::factory("x", "boom");
        assert_eq!(err.to_string(), "Factory for module 'x' failed: boom");
        assert!(!err.is_timeout());
    }
}
