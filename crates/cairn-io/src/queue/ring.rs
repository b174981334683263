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

use super::request::Request;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, MutexGuard, PoisonError,
};

/// A snapshot of the three ring indices.
///
/// Requests move `out <= process <= in` (modulo capacity): producers publish
/// at `in`, the worker services at `process`, the notifier retires at `out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueIndices {
    /// Next slot a producer will fill.
    pub input: usize,
    /// Next slot the worker will service.
    pub process: usize,
    /// Next slot the notifier will retire.
    pub output: usize,
}

/// Fixed-capacity ring of request slots.
///
/// Each index has exactly one writer: the main context owns `in` and `out`,
/// the worker owns `process`. A slot is only touched by the owner of the index
/// currently pointing at it, so the per-slot mutexes are never contended.
pub(crate) struct RequestRing {
    slots: Box<[Mutex<Option<Request>>]>,
    mask: usize,
    input: AtomicUsize,
    process: AtomicUsize,
    output: AtomicUsize,
}

fn lock(slot: &Mutex<Option<Request>>) -> MutexGuard<'_, Option<Request>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RequestRing {
    /// `capacity` must be a power of two; one slot always stays empty.
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        Self {
            slots: (0..capacity).map(|_| Mutex::new(None)).collect(),
            mask: capacity - 1,
            input: AtomicUsize::new(0),
            process: AtomicUsize::new(0),
            output: AtomicUsize::new(0),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn next(&self, index: usize) -> usize {
        (index + 1) & self.mask
    }

    pub(crate) fn indices(&self) -> QueueIndices {
        QueueIndices {
            input: self.input.load(Ordering::Acquire),
            process: self.process.load(Ordering::Acquire),
            output: self.output.load(Ordering::Acquire),
        }
    }

    /// Requests published but not yet retired.
    pub(crate) fn len(&self) -> usize {
        let input = self.input.load(Ordering::Acquire);
        let output = self.output.load(Ordering::Acquire);
        input.wrapping_sub(output) & self.mask
    }

    /// Slots a producer can still fill.
    pub(crate) fn free_slots(&self) -> usize {
        self.capacity() - 1 - self.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.free_slots() == 0
    }

    /// Stores `request` at `in` and advances it. Main context only, and only
    /// when the ring is not full.
    pub(crate) fn publish(&self, request: Request) {
        let index = self.input.load(Ordering::Relaxed);
        debug_assert!(self.next(index) != self.output.load(Ordering::Acquire));
        *lock(&self.slots[index]) = Some(request);
        self.input.store(self.next(index), Ordering::Release);
    }

    /// Whether the worker has published requests left to service.
    pub(crate) fn has_unprocessed(&self) -> bool {
        self.process.load(Ordering::Acquire) != self.input.load(Ordering::Acquire)
    }

    /// Services every published request in order, advancing `process` after
    /// each one. Worker only. Returns how many requests were serviced.
    pub(crate) fn service(&self, mut execute: impl FnMut(&mut Request)) -> usize {
        let mut serviced = 0;
        loop {
            let index = self.process.load(Ordering::Relaxed);
            if index == self.input.load(Ordering::Acquire) {
                return serviced;
            }
            if let Some(request) = lock(&self.slots[index]).as_mut() {
                execute(request);
            }
            self.process.store(self.next(index), Ordering::Release);
            serviced += 1;
        }
    }

    /// Takes the oldest serviced request and advances `out`. Main context only.
    pub(crate) fn retire(&self) -> Option<Request> {
        let index = self.output.load(Ordering::Relaxed);
        if index == self.process.load(Ordering::Acquire) {
            return None;
        }
        let request = lock(&self.slots[index]).take();
        self.output.store(self.next(index), Ordering::Release);
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::request::Outcome;

    fn close_request() -> Request {
        use crate::handle::OpenResource;
        use cairn_core::{Location, ResourceError, ResourceStream, ResourceType, SeekOrigin};
        use std::sync::Arc;

        struct Null;
        impl ResourceType for Null {
            fn tag(&self) -> &str {
                "null"
            }
            fn locate(&self, _: &str, _: &str, _: &str, _: bool) -> Option<String> {
                None
            }
            fn open(&self, p: &str, _: bool) -> Result<Box<dyn ResourceStream>, ResourceError> {
                Err(ResourceError::NotFound { path: p.to_owned() })
            }
        }
        struct Empty;
        impl ResourceStream for Empty {
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

        Request::close(Arc::new(OpenResource::new(
            Arc::new(Null),
            Location::new("null", "x"),
            Box::new(Empty),
        )))
    }

    #[test]
    fn one_slot_stays_empty() {
        let ring = RequestRing::new(4);
        assert_eq!(ring.free_slots(), 3);
        for _ in 0..3 {
            ring.publish(close_request());
        }
        assert!(ring.is_full());
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn indices_move_in_order() {
        let ring = RequestRing::new(8);
        ring.publish(close_request());
        ring.publish(close_request());
        assert_eq!(ring.indices(), QueueIndices { input: 2, process: 0, output: 0 });

        assert!(ring.retire().is_none());
        assert_eq!(ring.service(|r| r.execute()), 2);
        assert!(!ring.has_unprocessed());

        let retired = ring.retire().unwrap();
        assert!(matches!(retired.outcome, Outcome::Closed(Ok(()))));
        assert_eq!(ring.indices(), QueueIndices { input: 2, process: 2, output: 1 });
        assert!(ring.retire().is_some());
        assert!(ring.retire().is_none());
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn indices_wrap_around() {
        let ring = RequestRing::new(4);
        for _ in 0..10 {
            ring.publish(close_request());
            ring.service(|r| r.execute());
            assert!(ring.retire().is_some());
        }
        let indices = ring.indices();
        assert_eq!(indices.input, 10 % 4);
        assert_eq!(indices.input, indices.process);
        assert_eq!(indices.process, indices.output);
        assert_eq!(ring.free_slots(), 3);
    }
}
