// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Script hosts
//!
//! A host is the environment that actually runs a module's script. The
//! script's top-level code is expected to call [`Clay::register`] (or
//! [`Clay::register_with`]) for the module it defines.
//!
//! - [`MemoryHost`]: scripts are closures held in memory
//! - [`FsHost`]: scripts are JSON module files on disk

mod fs;
mod memory;

pub use fs::{FsHost, ModuleFile};
pub use memory::{MemoryHost, ScriptBody};

use crate::error::Result;
use crate::runtime::Clay;
use async_trait::async_trait;

/// A request to run one module's script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRequest {
    /// Module the script is expected to register
    pub module: String,
    /// Where the script lives
    pub url: String,
    /// Execute without blocking the document
    pub is_async: bool,
    /// Execute after the document has been parsed
    pub defer: bool,
}

impl ScriptRequest {
    /// Request for a module load (async, not deferred)
    pub fn module(module: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            url: url.into(),
            is_async: true,
            defer: false,
        }
    }
}

/// Environment that runs scripts on behalf of the loader.
///
/// `load` resolves exactly once, after the script has run. Hosts do not
/// retry; the loader applies its own deadline around the call.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Run the script behind `request.url` against `clay`
    async fn load(&self, request: &ScriptRequest, clay: &Clay) -> Result<()>;
}
