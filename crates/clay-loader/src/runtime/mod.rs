// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader runtime: the facade and the ready gate

mod clay;
mod ready;

pub use clay::{Clay, ClayBuilder};
pub use ready::{ReadyGate, ReadyHandler};
