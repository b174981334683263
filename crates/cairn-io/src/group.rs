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

//! Resource groups and their ordered storages.

use crate::cache::LocationCache;
use cairn_core::{StringId, DEFAULT_STORAGE};
use std::sync::Arc;

/// A named search path inside a group.
#[derive(Debug, Clone)]
pub(crate) struct Storage {
    id: StringId,
    name: Arc<str>,
}

impl Storage {
    fn new(name: &str) -> Self {
        Self {
            id: StringId::of(name),
            name: name.into(),
        }
    }

    pub(crate) fn id(&self) -> StringId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }
}

/// A logical category of resources with its storages and location cache.
///
/// The default storage is always first and never removed.
pub(crate) struct Group {
    id: StringId,
    name: Arc<str>,
    storages: Vec<Storage>,
    pub(crate) cache: LocationCache,
}

impl Group {
    fn new(name: &str) -> Self {
        Self {
            id: StringId::of(name),
            name: name.into(),
            storages: vec![Storage::new(DEFAULT_STORAGE)],
            cache: LocationCache::default(),
        }
    }

    pub(crate) fn id(&self) -> StringId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Storages in search order.
    pub(crate) fn storages(&self) -> &[Storage] {
        &self.storages
    }

    pub(crate) fn contains_storage(&self, id: StringId) -> bool {
        self.storages.iter().any(|s| s.id == id)
    }

    /// Inserts a storage right after the default one, or at the end.
    pub(crate) fn add_storage(&mut self, name: &str, add_first: bool) {
        let storage = Storage::new(name);
        if add_first {
            self.storages.insert(1, storage);
        } else {
            self.storages.push(storage);
        }
    }

    /// Removes the first storage named `name`, or every non-default storage
    /// when `name` is `None`. Returns how many were removed.
    pub(crate) fn remove_storages(&mut self, name: Option<&str>) -> usize {
        let before = self.storages.len();
        match name {
            Some(name) => {
                let id = StringId::of(name);
                if let Some(position) = self.storages.iter().skip(1).position(|s| s.id == id) {
                    self.storages.remove(position + 1);
                }
            }
            None => self.storages.truncate(1),
        }
        before - self.storages.len()
    }
}

/// Every group created so far, in creation order.
#[derive(Default)]
pub(crate) struct GroupTable {
    groups: Vec<Group>,
}

impl GroupTable {
    pub(crate) fn find(&self, id: StringId) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub(crate) fn find_mut(&mut self, id: StringId) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.id == id)
    }

    /// Returns the group named `name`, creating it with only the default
    /// storage if needed.
    pub(crate) fn get_or_create(&mut self, name: &str) -> &mut Group {
        let id = StringId::of(name);
        match self.groups.iter().position(|g| g.id == id) {
            Some(position) => &mut self.groups[position],
            None => {
                log::debug!("Created resource group <{name}>.");
                self.groups.push(Group::new(name));
                let last = self.groups.len() - 1;
                &mut self.groups[last]
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Group> {
        self.groups.get(index)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Group> {
        self.groups.iter_mut()
    }

    pub(crate) fn clear(&mut self) {
        self.groups.clear();
    }
}
