// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # clay-loader
//!
//! Asynchronous module loader and dependency resolver for the clay
//! utility library.
//!
//! - `knead` loads modules and runs a callback once nothing is in flight
//!   and the document is ready
//! - `register` / `fetch` store and retrieve module exports
//! - `depend` declares prerequisites that load before a module's script
//! - `bake` dispatches handlers by location path
//!
//! Scripts are run by a [`ScriptHost`]; URLs come from a
//! [`ScriptResolver`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use clay_loader::{Clay, LoaderConfig, MemoryHost};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let host = MemoryHost::new()
//!         .module("modules/anim.js", "modules.anim", json!({ "speed": 200 }));
//!     let clay = Clay::new(LoaderConfig::default(), Arc::new(host));
//!     clay.mark_ready();
//!
//!     clay.knead_async("modules.anim").await?;
//!     println!("{}", clay.fetch("modules.anim")?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod module_system;
pub mod runtime;

// Re-exports
pub use config::{DrainOrder, LoaderConfig};
pub use dispatch::{LocationDispatcher, RouteParams};
pub use error::{ClayError, Result};
pub use host::{FsHost, MemoryHost, ScriptHost, ScriptRequest};
pub use module_system::{Exports, ModuleList, ScriptResolver, ScriptRoot};
pub use runtime::Clay;

/// Version of the loader
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
