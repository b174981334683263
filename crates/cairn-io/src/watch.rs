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

//! Round-robin polling of watched groups.

use crate::{cache::CachedResource, group::GroupTable};
use cairn_core::StringId;
use std::sync::Arc;

/// Cursor over the cached resources of the watched groups.
///
/// Each tick polls at most `limit` time-capable entries and resumes where the
/// previous tick stopped, so every entry of every watched group is eventually
/// visited whatever the cache size.
pub(crate) struct Watcher {
    limit: usize,
    group_cursor: usize,
    current_group: Option<StringId>,
    entry_cursor: usize,
}

impl Watcher {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            group_cursor: 0,
            current_group: None,
            entry_cursor: 0,
        }
    }

    /// Advances the cursor and returns the entries that need a time query.
    ///
    /// Entries with a query already in flight count toward the limit but are
    /// not returned again.
    pub(crate) fn tick(
        &mut self,
        watch_list: &[String],
        groups: &GroupTable,
    ) -> Vec<Arc<CachedResource>> {
        let mut polled = 0;
        let mut due = Vec::new();

        while let Some(group_name) = watch_list.get(self.group_cursor) {
            let id = StringId::of(group_name);
            if let Some(group) = groups.find(id) {
                if self.current_group != Some(id) {
                    self.current_group = Some(id);
                    self.entry_cursor = 0;
                }

                while let Some(entry) = group.cache.get_index(self.entry_cursor) {
                    self.entry_cursor += 1;
                    if !entry.resource_type().supports_time() {
                        continue;
                    }
                    if entry.begin_watch() {
                        due.push(Arc::clone(entry));
                    }
                    polled += 1;
                    if polled >= self.limit {
                        return due;
                    }
                }
                self.entry_cursor = 0;
                self.current_group = None;
            }
            self.group_cursor += 1;
        }

        self.group_cursor = 0;
        due
    }

    /// Restarts the scan from the first watched group.
    pub(crate) fn reset(&mut self) {
        self.group_cursor = 0;
        self.current_group = None;
        self.entry_cursor = 0;
    }
}
