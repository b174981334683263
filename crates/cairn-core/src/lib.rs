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

//! # Cairn Core
//!
//! Foundational crate containing the resource type contract, resource locations,
//! hashed identifiers and the event primitives shared by every resource backend.
//!
//! Nothing in here performs I/O on its own: concrete backends and the resource
//! system live in `cairn-io`.

#![warn(missing_docs)]

pub mod event;
pub mod resource;

pub use event::{EventBus, ResourceEvent, ResourceEventKind};
pub use resource::{
    Location, ResourceError, ResourceStream, ResourceType, SeekOrigin, StringId, DEFAULT_STORAGE,
    LOCATION_SEPARATOR, TIME_UNINITIALIZED,
};
