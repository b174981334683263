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

//! The resource type contract.
//!
//! A resource type is a pluggable backend identified by a short tag (`file`,
//! `mem`, ...). Given a group, a storage and a name it produces a backend path,
//! and given such a path it opens a [`ResourceStream`]. The pair `tag:path` is a
//! [`Location`], the only thing the rest of the engine needs to remember about
//! where a resource lives.
//!
//! Every method of [`ResourceType`] and [`ResourceStream`] may be called from the
//! resource worker thread, hence the `Send`/`Sync` bounds.

mod error;
mod id;
mod location;

pub use self::error::ResourceError;
pub use self::id::StringId;
pub use self::location::{strip_tag, Location, DEFAULT_STORAGE, LOCATION_SEPARATOR};

/// Modification time of a cached resource that has never been polled.
///
/// A time of `0` means "absent", any other value is a backend timestamp.
pub const TIME_UNINITIALIZED: i64 = -1;

/// The reference point of a [`ResourceStream::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeekOrigin {
    /// Offset from the first byte.
    Start,
    /// Offset from the current cursor.
    Current,
    /// Offset from one past the last byte.
    End,
}

/// An opened resource: a seekable byte stream owned by a backend.
pub trait ResourceStream: Send {
    /// Total size of the resource in bytes.
    fn size(&mut self) -> Result<u64, ResourceError>;

    /// Moves the cursor and returns its new absolute position.
    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64, ResourceError>;

    /// Current cursor position.
    fn tell(&mut self) -> Result<u64, ResourceError>;

    /// Reads up to `buffer.len()` bytes, returning how many were read.
    ///
    /// A short count only happens at the end of the resource.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, ResourceError>;

    /// Writes `buffer`, returning how many bytes were written.
    fn write(&mut self, buffer: &[u8]) -> Result<usize, ResourceError> {
        let _ = buffer;
        Err(ResourceError::Unsupported { operation: "write" })
    }

    /// Releases the backend object. Dropping a stream without closing it is
    /// allowed but swallows any error the backend would report.
    fn close(self: Box<Self>) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// A pluggable resource backend.
///
/// # Contract
///
/// * [`tag`](Self::tag) is non-empty and never contains [`LOCATION_SEPARATOR`].
/// * [`locate`](Self::locate) is pure with respect to the engine: it may touch
///   the backend (probe a file system) but never the caller's state.
/// * [`modification_time`](Self::modification_time) returns `0` when the
///   resource is absent.
pub trait ResourceType: Send + Sync + 'static {
    /// The short, unique tag prefixing every location produced by this type.
    fn tag(&self) -> &str;

    /// Resolves `name` inside `storage` of `group` into a backend path.
    ///
    /// When `require_existence` is false the type may return a path for a
    /// resource that does not exist yet but could be created.
    fn locate(&self, group: &str, storage: &str, name: &str, require_existence: bool)
        -> Option<String>;

    /// Opens the resource at `path`. In erase mode the resource is created or
    /// truncated.
    fn open(&self, path: &str, erase_mode: bool) -> Result<Box<dyn ResourceStream>, ResourceError>;

    /// Whether [`modification_time`](Self::modification_time) is meaningful.
    fn supports_time(&self) -> bool {
        false
    }

    /// Last modification time of `path`, `0` when absent.
    fn modification_time(&self, path: &str) -> i64 {
        let _ = path;
        0
    }

    /// Whether streams of this type accept writes.
    fn supports_write(&self) -> bool {
        false
    }

    /// Whether [`delete`](Self::delete) is implemented.
    fn supports_delete(&self) -> bool {
        false
    }

    /// Removes the resource at `path`.
    fn delete(&self, path: &str) -> Result<(), ResourceError> {
        let _ = path;
        Err(ResourceError::Unsupported { operation: "delete" })
    }
}
