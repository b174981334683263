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

use super::Shared;
use std::sync::{atomic::Ordering, Arc};

/// Body of the resource worker thread.
///
/// Sleeps until signalled, services every published request, reports progress
/// to a stalled producer, and exits once told to stop.
pub(super) fn run(shared: Arc<Shared>) {
    log::info!("Resource worker thread started.");

    loop {
        shared.wake.wait();

        let serviced = shared.ring.service(|request| request.execute());
        if serviced > 0 {
            log::trace!("Resource worker serviced {serviced} request(s).");
            shared.progress.signal();
        }

        if !shared.running.load(Ordering::Acquire) && !shared.ring.has_unprocessed() {
            break;
        }
    }

    log::info!("Resource worker thread stopped.");
}
