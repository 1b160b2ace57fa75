// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Ready gate - defers handlers until the host document is ready

use parking_lot::Mutex;
use tokio::sync::watch;

/// Handler run once the gate is open
pub type ReadyHandler<T> = Box<dyn FnOnce(&T) + Send + 'static>;

struct GateState<T> {
    ready: bool,
    queue: Vec<ReadyHandler<T>>,
}

/// One-way barrier: closed until [`ReadyGate::open`], then open forever.
///
/// Handlers are never run while the internal lock is held, so a handler
/// may register further handlers.
pub struct ReadyGate<T> {
    state: Mutex<GateState<T>>,
    signal: watch::Sender<bool>,
}

impl<T> ReadyGate<T> {
    /// Create a closed gate
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            state: Mutex::new(GateState {
                ready: false,
                queue: Vec::new(),
            }),
            signal,
        }
    }

    /// Whether the gate has been opened
    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    /// Number of handlers waiting for the gate
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Run `handler` now if the gate is open, otherwise queue it
    pub fn when_ready(&self, target: &T, handler: ReadyHandler<T>) {
        {
            let mut state = self.state.lock();
            if !state.ready {
                state.queue.push(handler);
                return;
            }
        }
        handler(target);
    }

    /// Open the gate and run queued handlers in the order they were queued.
    ///
    /// Returns `false` if the gate was already open.
    pub fn open(&self, target: &T) -> bool {
        let queued = {
            let mut state = self.state.lock();
            if state.ready {
                return false;
            }
            state.ready = true;
            std::mem::take(&mut state.queue)
        };
        self.signal.send_replace(true);
        for handler in queued {
            handler(target);
        }
        true
    }

    /// Wait until the gate is open
    pub async fn opened(&self) {
        let mut rx = self.signal.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl<T> Default for ReadyGate<T> {
    fn default() -> Self {
        Self::new()
    }
}
