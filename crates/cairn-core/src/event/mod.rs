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

//! Event primitives for resource change notifications.
//!
//! The [`EventBus`] is a generic, thread-safe MPSC channel. The resource system
//! publishes [`ResourceEvent`]s on it whenever a watched resource appears,
//! disappears or changes.

mod bus;
mod resource;

pub use self::bus::EventBus;
pub use self::resource::{ResourceEvent, ResourceEventKind};
