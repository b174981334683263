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

//! Errors returned by the resource system.

use crate::handle::ResourceHandle;
use cairn_core::ResourceError;
use thiserror::Error;

/// An error returned by [`ResourceSystem`](crate::ResourceSystem) operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A resource type tag is empty or contains the location separator.
    #[error("invalid resource type tag <{0}>")]
    InvalidTag(String),

    /// A resource type with the same tag (ignoring case) is already registered.
    #[error("resource type <{0}> is already registered")]
    DuplicateTag(String),

    /// No registered resource type has this tag.
    #[error("no resource type registered with tag <{0}>")]
    UnknownTag(String),

    /// No registered resource type can handle this location.
    #[error("no resource type can handle location <{0}>")]
    UnknownType(String),

    /// Group names cannot be empty.
    #[error("group name cannot be empty")]
    EmptyGroup,

    /// Storage names cannot be empty.
    #[error("storage name cannot be empty")]
    EmptyStorage,

    /// The default storage is implicit and cannot be added or removed.
    #[error("the default storage cannot be added or removed explicitly")]
    DefaultStorage,

    /// The group has never been created.
    #[error("group <{0}> not found")]
    GroupNotFound(String),

    /// No storage of the group holds the resource.
    #[error("resource <{name}> not found in group <{group}>")]
    NotFound {
        /// The searched group.
        group: String,
        /// The searched name.
        name: String,
    },

    /// The handle was closed or never opened.
    #[error("invalid resource handle {0}")]
    InvalidHandle(ResourceHandle),

    /// A synchronous operation was issued while asynchronous ones are in flight.
    #[error("{count} asynchronous operation(s) still pending on {handle}")]
    PendingOperations {
        /// The busy handle.
        handle: ResourceHandle,
        /// How many operations are in flight.
        count: u32,
    },

    /// The resource type of the handle cannot write.
    #[error("resource <{0}> is read-only")]
    ReadOnly(String),

    /// The cache cannot be cleared while groups are being watched.
    #[error("cannot clear the location cache while a watch is active")]
    WatchActive,

    /// The request queue no longer accepts work.
    #[error("the resource system is shutting down")]
    ShuttingDown,

    /// The worker thread exited while requests were still expected.
    #[error("the resource worker thread has stopped")]
    WorkerStopped,

    /// The request queue capacity is not a power of two of at least 4.
    #[error("request queue capacity must be a power of two >= 4, got {0}")]
    InvalidCapacity(usize),

    /// The worker thread could not be spawned.
    #[error("failed to spawn the resource worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The configuration file could not be read.
    #[error("failed to read resource configuration '{path}': {source}")]
    ConfigRead {
        /// The configuration file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration text is not valid RON.
    #[error("invalid resource configuration: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// A backend failed.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}
