// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crossbeam_channel::{Receiver, Sender};
use std::time::Duration;

/// A counting semaphore backed by a channel of unit tokens.
///
/// The semaphore owns both ends of the channel, so neither side can observe a
/// disconnection while it is alive.
pub(crate) struct Semaphore {
    tokens: Sender<()>,
    available: Receiver<()>,
}

impl Semaphore {
    pub(crate) fn new(initial: usize) -> Self {
        let (tokens, available) = crossbeam_channel::unbounded();
        for _ in 0..initial {
            let _ = tokens.send(());
        }
        Self { tokens, available }
    }

    /// Blocks until a token is available and takes it.
    pub(crate) fn wait(&self) {
        let _ = self.available.recv();
    }

    /// Takes a token if one arrives within `timeout`.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        self.available.recv_timeout(timeout).is_ok()
    }

    /// Releases one token.
    pub(crate) fn signal(&self) {
        let _ = self.tokens.send(());
    }

    /// Drops every available token.
    pub(crate) fn drain(&self) {
        while self.available.try_recv().is_ok() {}
    }
}
