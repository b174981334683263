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

//! The asynchronous request pipeline.
//!
//! A single worker thread services requests published in a fixed-capacity
//! [`RequestRing`]. Producers and the completion pump both live on the main
//! context; the worker only ever touches the `process` index.
//!
//! * A one-token gate serializes producers.
//! * The wake semaphore receives one token per published request.
//! * The progress semaphore lets a producer facing a full ring sleep until the
//!   worker has serviced something.

mod request;
mod ring;
mod semaphore;
mod worker;

pub use self::request::{Completion, CompletionCallback};
pub use self::ring::QueueIndices;

pub(crate) use self::request::{Outcome, Request, RequestKind};

use self::{ring::RequestRing, semaphore::Semaphore};
use crate::error::ServiceError;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

/// State shared with the worker thread.
pub(crate) struct Shared {
    ring: RequestRing,
    gate: Semaphore,
    wake: Semaphore,
    progress: Semaphore,
    running: AtomicBool,
}

/// Outcome of offering a request to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Accepted,
    /// A time query was dropped because the ring was too full.
    Shed,
    /// The queue is shutting down.
    Refused,
}

/// Owner of the ring and of the worker thread.
pub(crate) struct RequestQueue {
    shared: Arc<Shared>,
    worker: Option<thread::JoinHandle<()>>,
    accepting: bool,
}

impl RequestQueue {
    /// Spawns the worker thread. `capacity` must be a power of two >= 4.
    pub(crate) fn start(capacity: usize, worker_name: &str) -> Result<Self, ServiceError> {
        if capacity < 4 || !capacity.is_power_of_two() {
            return Err(ServiceError::InvalidCapacity(capacity));
        }

        let shared = Arc::new(Shared {
            ring: RequestRing::new(capacity),
            gate: Semaphore::new(1),
            wake: Semaphore::new(0),
            progress: Semaphore::new(0),
            running: AtomicBool::new(true),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(worker_name.to_owned())
                .spawn(move || worker::run(shared))
                .map_err(ServiceError::WorkerSpawn)?
        };

        Ok(Self {
            shared,
            worker: Some(worker),
            accepting: true,
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.shared.ring.capacity()
    }

    pub(crate) fn indices(&self) -> QueueIndices {
        self.shared.ring.indices()
    }

    /// Requests published and not yet retired.
    pub(crate) fn len(&self) -> usize {
        self.shared.ring.len()
    }

    /// Whether the worker thread is still running.
    pub(crate) fn is_worker_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// Publishes `request`.
    ///
    /// Time queries are shed when fewer than a quarter of the slots are free.
    /// Any other request waits for room, handing retired requests to
    /// `complete` and sleeping on worker progress in between. The wait gives
    /// up with [`Admission::Refused`] once the worker thread is gone.
    pub(crate) fn submit(&self, request: Request, mut complete: impl FnMut(Request)) -> Admission {
        if !self.accepting {
            return Admission::Refused;
        }

        self.shared.gate.wait();

        let admission = if request.is_sheddable() {
            if self.shared.ring.free_slots() < self.capacity() / 4 {
                Admission::Shed
            } else {
                Admission::Accepted
            }
        } else {
            loop {
                if !self.shared.ring.is_full() {
                    break Admission::Accepted;
                }
                while let Some(done) = self.retire() {
                    complete(done);
                }
                if self.shared.ring.is_full() {
                    if !self.is_worker_alive() {
                        log::error!("Resource worker thread is gone; refusing request.");
                        break Admission::Refused;
                    }
                    self.shared.progress.wait_timeout(Duration::from_millis(5));
                }
            }
        };

        if admission == Admission::Accepted {
            self.shared.ring.publish(request);
            self.shared.wake.signal();
        }

        self.shared.gate.signal();
        admission
    }

    /// Takes the oldest request the worker has finished with.
    pub(crate) fn retire(&self) -> Option<Request> {
        self.shared.ring.retire()
    }

    /// Blocks until the worker has serviced every published request.
    pub(crate) fn wait_processed(&self) {
        while self.shared.ring.has_unprocessed() && self.is_worker_alive() {
            self.shared.progress.wait_timeout(Duration::from_millis(1));
        }
    }

    /// Stops accepting requests, lets the worker finish what was published and
    /// joins it. Completed requests stay in the ring until retired.
    pub(crate) fn shutdown(&mut self) {
        self.accepting = false;
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.shared.running.store(false, Ordering::Release);
        self.shared.wake.signal();
        if worker.join().is_err() {
            log::error!("Resource worker thread panicked.");
        }
        self.shared.progress.drain();
    }
}

impl Drop for RequestQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::OpenResource;
    use cairn_core::{Location, ResourceError, ResourceStream, ResourceType, SeekOrigin};
    use std::time::Instant;

    struct Inert;

    impl ResourceType for Inert {
        fn tag(&self) -> &str {
            "inert"
        }

        fn locate(&self, _: &str, _: &str, _: &str, _: bool) -> Option<String> {
            None
        }

        fn open(&self, _: &str, _: bool) -> Result<Box<dyn ResourceStream>, ResourceError> {
            Ok(Box::new(Inert))
        }
    }

    impl ResourceStream for Inert {
        fn size(&mut self) -> Result<u64, ResourceError> {
            Ok(0)
        }

        fn seek(&mut self, _: i64, _: SeekOrigin) -> Result<u64, ResourceError> {
            Ok(0)
        }

        fn tell(&mut self) -> Result<u64, ResourceError> {
            Ok(0)
        }

        fn read(&mut self, _: &mut [u8]) -> Result<usize, ResourceError> {
            Ok(0)
        }
    }

    fn close_request() -> Request {
        Request::close(Arc::new(OpenResource::new(
            Arc::new(Inert),
            Location::new("inert", "x"),
            Box::new(Inert),
        )))
    }

    #[test]
    fn capacity_must_be_a_power_of_two() {
        assert!(matches!(
            RequestQueue::start(6, "Resource"),
            Err(ServiceError::InvalidCapacity(6))
        ));
        assert!(matches!(
            RequestQueue::start(2, "Resource"),
            Err(ServiceError::InvalidCapacity(2))
        ));
    }

    #[test]
    fn shutdown_joins_the_worker() {
        let mut queue = RequestQueue::start(8, "Resource").unwrap();
        assert!(queue.is_worker_alive());
        queue.shutdown();
        assert!(!queue.is_worker_alive());
        assert!(!queue.is_accepting());
        queue.shutdown();
    }

    #[test]
    fn full_ring_without_worker_refuses_instead_of_waiting() {
        let queue = RequestQueue::start(4, "Resource").unwrap();
        queue.shared.running.store(false, Ordering::Release);
        queue.shared.wake.signal();

        let deadline = Instant::now() + Duration::from_secs(5);
        while queue.is_worker_alive() {
            assert!(Instant::now() < deadline, "worker did not stop");
            thread::sleep(Duration::from_millis(1));
        }

        for _ in 0..3 {
            assert_eq!(queue.submit(close_request(), |_| {}), Admission::Accepted);
        }
        assert_eq!(queue.submit(close_request(), |_| {}), Admission::Refused);
        assert!(queue.is_accepting());
    }
}
