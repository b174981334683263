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

//! Configuration of the resource system.
//!
//! Two layers are kept apart:
//!
//! * [`ResourceConfig`] is the user-editable `Resource` section, stored as RON:
//!   a map from group name to its ordered storages, plus the reserved
//!   `WatchList` key naming the groups to hot-reload.
//! * [`SystemConfig`] holds the engine-side tunables fixed at construction.
//!
//! ```ron
//! {
//!     "Texture": ["./assets/textures", "./mods/textures"],
//!     "WatchList": ["Texture"],
//! }
//! ```

use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, time::Duration};

/// Reserved key of the resource section listing the watched groups.
pub const WATCH_LIST_KEY: &str = "WatchList";

/// The `Resource` configuration section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceConfig {
    entries: BTreeMap<String, Vec<String>>,
}

impl ResourceConfig {
    /// An empty section: no extra storages, nothing watched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a section from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ServiceError> {
        Ok(ron::from_str(text)?)
    }

    /// Reads and parses a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ServiceError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    /// Appends storages to `group`, keeping their order.
    pub fn with_storages<I, S>(mut self, group: &str, storages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries
            .entry(group.to_owned())
            .or_default()
            .extend(storages.into_iter().map(Into::into));
        self
    }

    /// Appends groups to the watch list.
    pub fn with_watch_list<I, S>(self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_storages(WATCH_LIST_KEY, groups)
    }

    /// Every configured group with its storages, highest priority first.
    /// The watch list is not a group and is skipped.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .filter(|(key, _)| key.as_str() != WATCH_LIST_KEY)
            .map(|(key, storages)| (key.as_str(), storages.as_slice()))
    }

    /// The watched groups, in polling order.
    pub fn watch_list(&self) -> &[String] {
        self.entries
            .get(WATCH_LIST_KEY)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether at least one group is watched.
    pub fn is_watching(&self) -> bool {
        !self.watch_list().is_empty()
    }
}

/// Engine-side tunables of the resource system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemConfig {
    /// Number of slots of the request ring. Must be a power of two of at
    /// least 4. One slot always stays empty.
    pub request_capacity: usize,
    /// Maximum number of cached resources polled by the watcher per update.
    pub watch_iteration_limit: usize,
    /// Quiet period before a modification is reported as an update.
    pub watch_delay: Duration,
    /// Name given to the worker thread.
    pub worker_name: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            request_capacity: 2048,
            watch_iteration_limit: 2,
            watch_delay: Duration::from_millis(200),
            worker_name: "Resource".to_owned(),
        }
    }
}
