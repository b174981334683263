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

//! Resource locations: `tag:path` strings.

use std::{fmt, ops::Deref, sync::Arc};

/// Separates the type tag from the backend path in a location.
pub const LOCATION_SEPARATOR: char = ':';

/// Name of the storage every group starts with.
pub const DEFAULT_STORAGE: &str = ".";

/// A resolved resource location of the form `tag:path`.
///
/// Locations are immutable and cheap to clone: the cache, open handles and
/// events all share the same string allocation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Location {
    full: Arc<str>,
    tag_len: usize,
}

impl Location {
    /// Builds the location `tag:path`.
    pub fn new(tag: &str, path: &str) -> Self {
        let full = format!("{tag}{LOCATION_SEPARATOR}{path}");
        Self {
            full: full.into(),
            tag_len: tag.len(),
        }
    }

    /// The resource type tag.
    pub fn tag(&self) -> &str {
        &self.full[..self.tag_len]
    }

    /// The backend path, everything after the first separator.
    pub fn path(&self) -> &str {
        &self.full[self.tag_len + LOCATION_SEPARATOR.len_utf8()..]
    }

    /// The whole `tag:path` string.
    pub fn as_str(&self) -> &str {
        &self.full
    }

    /// Whether both locations share the same allocation.
    pub fn ptr_eq(&self, other: &Location) -> bool {
        Arc::ptr_eq(&self.full, &other.full)
    }
}

/// Returns the backend path of `location` if it starts with `tag`
/// (case-insensitively) immediately followed by the separator.
pub fn strip_tag<'a>(location: &'a str, tag: &str) -> Option<&'a str> {
    let prefix = location.get(..tag.len())?;
    if !prefix.eq_ignore_ascii_case(tag) {
        return None;
    }
    location[tag.len()..].strip_prefix(LOCATION_SEPARATOR)
}

impl Deref for Location {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.full
    }
}

impl AsRef<str> for Location {
    fn as_ref(&self) -> &str {
        &self.full
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Location({:?})", &*self.full)
    }
}
