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

//! The `mem` resource type: byte buffers registered at runtime.

use ahash::AHashMap;
use cairn_core::{
    ResourceError, ResourceStream, ResourceType, SeekOrigin, DEFAULT_STORAGE, LOCATION_SEPARATOR,
};
use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, PoisonError, RwLock,
    },
    time::{SystemTime, UNIX_EPOCH},
};

/// Tag of the memory resource type.
pub const MEMORY_TAG: &str = "mem";

struct MemoryEntry {
    data: Arc<[u8]>,
    time: i64,
    opens: Arc<AtomicU32>,
}

/// Counts one open stream of an entry for as long as it lives.
struct OpenGuard(Arc<AtomicU32>);

impl OpenGuard {
    fn new(opens: &Arc<AtomicU32>) -> Self {
        opens.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(opens))
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Read-only resources backed by shared byte buffers.
///
/// A resource is keyed by `group:storage/name`, the default storage being
/// written as an empty segment (`group:/name`). A resource registered without
/// a group is visible from every group.
#[derive(Default)]
pub struct MemoryResourceType {
    entries: RwLock<AHashMap<String, MemoryEntry>>,
}

fn key(group: Option<&str>, storage: &str, name: &str) -> String {
    let storage = if storage == DEFAULT_STORAGE { "" } else { storage };
    format!("{}{LOCATION_SEPARATOR}{storage}/{name}", group.unwrap_or_default())
}

fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(1, |elapsed| elapsed.as_micros().max(1) as i64)
}

impl MemoryResourceType {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers, replaces or removes a memory resource. `None` or an empty
    /// buffer removes it.
    ///
    /// Fails while a stream opened on the resource is still alive.
    pub fn set(
        &self,
        group: Option<&str>,
        storage: &str,
        name: &str,
        data: Option<Arc<[u8]>>,
    ) -> Result<(), ResourceError> {
        let key = key(group, storage, name);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = entries.get(&key) {
            if existing.opens.load(Ordering::Acquire) > 0 {
                return Err(ResourceError::InUse { path: key });
            }
        }

        match data.filter(|data| !data.is_empty()) {
            Some(data) => {
                log::debug!("Memory resource <{key}> set ({} bytes).", data.len());
                entries.insert(
                    key,
                    MemoryEntry {
                        data,
                        time: now_micros(),
                        opens: Arc::default(),
                    },
                );
            }
            None => {
                log::debug!("Memory resource <{key}> removed.");
                entries.remove(&key);
            }
        }
        Ok(())
    }

    fn with_entry<R>(&self, path: &str, f: impl FnOnce(&MemoryEntry) -> R) -> Option<R> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(path).map(f)
    }
}

impl ResourceType for MemoryResourceType {
    fn tag(&self) -> &str {
        MEMORY_TAG
    }

    fn locate(
        &self,
        group: &str,
        storage: &str,
        name: &str,
        _require_existence: bool,
    ) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        [key(Some(group), storage, name), key(None, storage, name)]
            .into_iter()
            .find(|candidate| entries.contains_key(candidate))
    }

    fn open(
        &self,
        path: &str,
        erase_mode: bool,
    ) -> Result<Box<dyn ResourceStream>, ResourceError> {
        if erase_mode {
            return Err(ResourceError::Unsupported { operation: "erase" });
        }
        let (data, guard) = self
            .with_entry(path, |entry| (Arc::clone(&entry.data), OpenGuard::new(&entry.opens)))
            .ok_or_else(|| ResourceError::NotFound {
                path: path.to_owned(),
            })?;
        Ok(Box::new(MemoryStream {
            data,
            cursor: 0,
            _guard: guard,
        }))
    }

    fn supports_time(&self) -> bool {
        true
    }

    fn modification_time(&self, path: &str) -> i64 {
        self.with_entry(path, |entry| entry.time).unwrap_or(0)
    }
}

struct MemoryStream {
    data: Arc<[u8]>,
    cursor: u64,
    _guard: OpenGuard,
}

impl ResourceStream for MemoryStream {
    fn size(&mut self) -> Result<u64, ResourceError> {
        Ok(self.data.len() as u64)
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64, ResourceError> {
        let base = match origin {
            SeekOrigin::Start => 0,
            SeekOrigin::Current => self.cursor as i64,
            SeekOrigin::End => self.data.len() as i64,
        };
        let position = base
            .checked_add(offset)
            .filter(|p| (0..=self.data.len() as i64).contains(p))
            .ok_or(ResourceError::InvalidSeek { offset, origin })?;
        self.cursor = position as u64;
        Ok(self.cursor)
    }

    fn tell(&mut self) -> Result<u64, ResourceError> {
        Ok(self.cursor)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, ResourceError> {
        let start = (self.cursor as usize).min(self.data.len());
        let count = buffer.len().min(self.data.len() - start);
        buffer[..count].copy_from_slice(&self.data[start..start + count]);
        self.cursor += count as u64;
        Ok(count)
    }
}
