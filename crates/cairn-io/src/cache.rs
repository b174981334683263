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

//! The per-group location cache.

use ahash::AHashMap;
use cairn_core::{
    Location, ResourceEvent, ResourceEventKind, ResourceType, StringId, TIME_UNINITIALIZED,
};
use std::sync::{
    atomic::{AtomicBool, AtomicI64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

/// Where a cached resource currently resolves to.
#[derive(Clone)]
struct Resolution {
    location: Location,
    resource_type: Arc<dyn ResourceType>,
    storage: Arc<str>,
}

/// A located resource, shared between the cache, the watcher and in-flight
/// time queries.
pub(crate) struct CachedResource {
    group_id: StringId,
    name_id: StringId,
    name: Arc<str>,
    resolution: Mutex<Resolution>,
    time: AtomicI64,
    pending_watch: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CachedResource {
    pub(crate) fn new(
        group_id: StringId,
        name: &str,
        storage: &str,
        resource_type: Arc<dyn ResourceType>,
        path: &str,
    ) -> Self {
        Self {
            group_id,
            name_id: StringId::of(name),
            name: name.into(),
            resolution: Mutex::new(Resolution {
                location: Location::new(resource_type.tag(), path),
                resource_type,
                storage: storage.into(),
            }),
            time: AtomicI64::new(TIME_UNINITIALIZED),
            pending_watch: AtomicBool::new(false),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_id(&self) -> StringId {
        self.name_id
    }

    pub(crate) fn group_id(&self) -> StringId {
        self.group_id
    }

    pub(crate) fn location(&self) -> Location {
        lock(&self.resolution).location.clone()
    }

    pub(crate) fn resource_type(&self) -> Arc<dyn ResourceType> {
        lock(&self.resolution).resource_type.clone()
    }

    /// Points the entry at a new backend, e.g. after a storage with higher
    /// priority started holding the resource.
    pub(crate) fn relocate(&self, storage: &str, resource_type: Arc<dyn ResourceType>, path: &str) {
        *lock(&self.resolution) = Resolution {
            location: Location::new(resource_type.tag(), path),
            resource_type,
            storage: storage.into(),
        };
    }

    /// Asks the backend for the current modification time. Runs on the worker.
    pub(crate) fn query_time(&self) -> i64 {
        let resolution = lock(&self.resolution).clone();
        if resolution.resource_type.supports_time() {
            resolution
                .resource_type
                .modification_time(resolution.location.path())
        } else {
            0
        }
    }

    pub(crate) fn time(&self) -> i64 {
        self.time.load(Ordering::Acquire)
    }

    pub(crate) fn set_time(&self, time: i64) {
        self.time.store(time, Ordering::Release);
    }

    /// Marks a time query as in flight. Returns false if one already is.
    pub(crate) fn begin_watch(&self) -> bool {
        self.pending_watch
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_watch(&self) {
        self.pending_watch.store(false, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn is_watch_pending(&self) -> bool {
        self.pending_watch.load(Ordering::Acquire)
    }

    /// Builds the notification for a change of this resource.
    pub(crate) fn event(&self, kind: ResourceEventKind) -> ResourceEvent {
        let resolution = lock(&self.resolution).clone();
        ResourceEvent {
            kind,
            time: self.time(),
            location: resolution.location,
            resource_type: resolution.resource_type,
            group_id: self.group_id,
            storage_id: StringId::of(&resolution.storage),
            name_id: self.name_id,
        }
    }
}

/// A snapshot of one cache entry, for introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedLocation {
    /// The resource name as requested.
    pub name: String,
    /// The storage the resource was found in.
    pub storage: String,
    /// The resolved location.
    pub location: Location,
    /// Last observed modification time, `-1` until first polled.
    pub time: i64,
}

impl From<&CachedResource> for CachedLocation {
    fn from(entry: &CachedResource) -> Self {
        let resolution = lock(&entry.resolution).clone();
        Self {
            name: entry.name.to_string(),
            storage: resolution.storage.to_string(),
            location: resolution.location,
            time: entry.time(),
        }
    }
}

/// Located resources of one group, keyed by name id.
///
/// Entries keep their insertion order so the watcher can resume a scan by
/// position across updates.
#[derive(Default)]
pub(crate) struct LocationCache {
    entries: Vec<Arc<CachedResource>>,
    index: AHashMap<StringId, usize>,
}

impl LocationCache {
    pub(crate) fn get(&self, name_id: StringId) -> Option<&Arc<CachedResource>> {
        self.index.get(&name_id).map(|&i| &self.entries[i])
    }

    pub(crate) fn get_index(&self, position: usize) -> Option<&Arc<CachedResource>> {
        self.entries.get(position)
    }

    /// Adds `entry`, replacing any entry with the same name.
    pub(crate) fn insert(&mut self, entry: Arc<CachedResource>) {
        match self.index.get(&entry.name_id()) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.index.insert(entry.name_id(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub(crate) fn remove(&mut self, name_id: StringId) -> Option<Arc<CachedResource>> {
        let position = self.index.remove(&name_id)?;
        let removed = self.entries.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<CachedResource>> {
        self.entries.iter()
    }

    /// Empties the cache and returns how many entries were dropped.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.index.clear();
        count
    }
}
