// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module system
//!
//! - `registry`: identifier -> exports
//! - `deps`: pre-declared prerequisites
//! - `resolver`: identifier -> script URL
//! - `loader`: in-flight counter, per-module loads, callback draining

mod deps;
mod loader;
mod registry;
mod resolver;

pub use deps::DependencyMap;
pub use loader::{Callback, LoadTracker, ModuleList};
pub use registry::{Exports, Factory, ModuleRegistry};
pub use resolver::{ScriptResolver, ScriptRoot};
