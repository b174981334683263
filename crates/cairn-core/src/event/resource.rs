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

use crate::resource::{Location, ResourceType, StringId};
use std::{fmt, sync::Arc};

/// What happened to a watched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceEventKind {
    /// The resource appeared (its time went from absent to present).
    Add,
    /// The resource disappeared.
    Remove,
    /// The resource was modified. Emitted once a burst of changes settles.
    Update,
}

/// A change notification for a cached resource in a watched group.
#[derive(Clone)]
pub struct ResourceEvent {
    /// The kind of change.
    pub kind: ResourceEventKind,
    /// The modification time observed with the change, `0` on removal.
    pub time: i64,
    /// Where the resource currently lives.
    pub location: Location,
    /// The backend owning the resource.
    pub resource_type: Arc<dyn ResourceType>,
    /// Id of the group the resource was located in.
    pub group_id: StringId,
    /// Id of the storage the resource was found in.
    pub storage_id: StringId,
    /// Id of the resource name.
    pub name_id: StringId,
}

impl fmt::Debug for ResourceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceEvent")
            .field("kind", &self.kind)
            .field("time", &self.time)
            .field("location", &self.location)
            .field("resource_type", &self.resource_type.tag())
            .field("group_id", &self.group_id)
            .field("storage_id", &self.storage_id)
            .field("name_id", &self.name_id)
            .finish()
    }
}
