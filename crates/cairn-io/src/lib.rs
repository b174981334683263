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

//! # Cairn I/O
//!
//! Resource location, caching and asynchronous I/O services.
//!
//! The [`ResourceSystem`] turns a `(group, name)` pair into a [`Location`]
//! by searching the group's storages through the registered resource types,
//! caches the answer, and opens locations as handles that can be read and
//! written synchronously or through a single background worker thread.
//! Groups listed in the configuration's watch list are polled for
//! modifications and reported as [`ResourceEvent`]s.
//!
//! [`Location`]: cairn_core::Location
//! [`ResourceEvent`]: cairn_core::ResourceEvent

#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod error;

mod cache;
mod group;
mod handle;
mod notify;
mod queue;
mod registry;
mod system;
mod watch;

pub use crate::cache::CachedLocation;
pub use crate::config::{ResourceConfig, SystemConfig, WATCH_LIST_KEY};
pub use crate::error::ServiceError;
pub use crate::handle::ResourceHandle;
pub use crate::queue::{Completion, CompletionCallback, QueueIndices};
pub use crate::system::ResourceSystem;
