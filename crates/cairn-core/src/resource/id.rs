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

//! Hashed identifiers for group, storage and resource names.

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    hash::BuildHasher,
    sync::OnceLock,
};

/// Seeds are fixed so that an id computed in one run matches the same id in a
/// log or a saved configuration from another run.
fn hasher() -> &'static ahash::RandomState {
    static HASHER: OnceLock<ahash::RandomState> = OnceLock::new();
    HASHER.get_or_init(|| {
        ahash::RandomState::with_seeds(
            0x243f_6a88_85a3_08d3,
            0x1319_8a2e_0370_7344,
            0xa409_3822_299f_31d0,
            0x082e_fa98_ec4e_6c89,
        )
    })
}

/// A 64-bit hash of a name, used as the key of every group, storage and cache
/// lookup.
///
/// Ids are case-sensitive: `"Data"` and `"data"` are different groups.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StringId(u64);

impl StringId {
    /// Computes the id of `name`.
    pub fn of(name: &str) -> Self {
        Self(hasher().hash_one(name))
    }

    /// The raw hash value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringId({:#018x})", self.0)
    }
}

impl From<&str> for StringId {
    fn from(name: &str) -> Self {
        Self::of(name)
    }
}
