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

//! Open resource handles.

use cairn_core::{Location, ResourceStream, ResourceType};
use std::{
    fmt,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

/// An opaque reference to an opened resource.
///
/// Handles are generational: once closed, a handle never designates another
/// resource even if its slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    index: u32,
    generation: u32,
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceHandle({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Everything the system keeps about an opened resource.
///
/// Shared with in-flight requests: the record outlives its handle when a
/// close is deferred behind pending operations.
pub(crate) struct OpenResource {
    pub(crate) resource_type: Arc<dyn ResourceType>,
    pub(crate) location: Location,
    stream: Mutex<Option<Box<dyn ResourceStream>>>,
    pending: AtomicU32,
}

impl OpenResource {
    pub(crate) fn new(
        resource_type: Arc<dyn ResourceType>,
        location: Location,
        stream: Box<dyn ResourceStream>,
    ) -> Self {
        Self {
            resource_type,
            location,
            stream: Mutex::new(Some(stream)),
            pending: AtomicU32::new(0),
        }
    }

    /// The stream, `None` once closed.
    pub(crate) fn stream(&self) -> MutexGuard<'_, Option<Box<dyn ResourceStream>>> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn begin_operation(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn end_operation(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// Closes the backend stream. Closing twice is a no-op.
    pub(crate) fn close(&self) -> Result<(), cairn_core::ResourceError> {
        match self.stream().take() {
            Some(stream) => {
                log::trace!("Closing resource <{}>.", self.location);
                stream.close()
            }
            None => Ok(()),
        }
    }
}

/// Slot storage for open resources with a free list of reusable indices.
#[derive(Default)]
pub(crate) struct HandleStore {
    slots: Vec<(ResourceHandle, Option<Arc<OpenResource>>)>,
    freed: Vec<u32>,
}

impl HandleStore {
    pub(crate) fn insert(&mut self, resource: Arc<OpenResource>) -> ResourceHandle {
        if let Some(index) = self.freed.pop() {
            let (handle, slot) = &mut self.slots[index as usize];
            handle.generation = handle.generation.wrapping_add(1);
            *slot = Some(resource);
            *handle
        } else {
            let handle = ResourceHandle {
                index: self.slots.len() as u32,
                generation: 0,
            };
            self.slots.push((handle, Some(resource)));
            handle
        }
    }

    pub(crate) fn get(&self, handle: ResourceHandle) -> Option<&Arc<OpenResource>> {
        self.slots
            .get(handle.index as usize)
            .and_then(|(current, slot)| {
                if current.generation == handle.generation {
                    slot.as_ref()
                } else {
                    None
                }
            })
    }

    pub(crate) fn remove(&mut self, handle: ResourceHandle) -> Option<Arc<OpenResource>> {
        let (current, slot) = self.slots.get_mut(handle.index as usize)?;
        if current.generation != handle.generation {
            return None;
        }
        let resource = slot.take()?;
        self.freed.push(handle.index);
        Some(resource)
    }

    /// Number of live handles.
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.freed.len()
    }

    /// Removes every live resource.
    pub(crate) fn drain(&mut self) -> Vec<Arc<OpenResource>> {
        self.freed.clear();
        let drained = self.slots.iter_mut().filter_map(|(_, slot)| slot.take()).collect();
        self.freed.extend(0..self.slots.len() as u32);
        drained
    }
}
