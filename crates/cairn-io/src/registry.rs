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

//! The registry of resource types.

use crate::error::ServiceError;
use cairn_core::{resource::strip_tag, ResourceType, LOCATION_SEPARATOR};
use std::sync::Arc;

/// The ordered set of registered resource types.
///
/// The most recently registered type comes first and is therefore the first
/// one asked to locate a resource. Tags are unique, ignoring ASCII case.
#[derive(Default)]
pub(crate) struct TypeRegistry {
    types: Vec<Arc<dyn ResourceType>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub(crate) fn new() -> Self {
        Self { types: Vec::new() }
    }

    /// Adds `resource_type` at the front of the search order.
    pub(crate) fn register(
        &mut self,
        resource_type: Arc<dyn ResourceType>,
    ) -> Result<(), ServiceError> {
        let tag = resource_type.tag();
        if tag.is_empty() || tag.contains(LOCATION_SEPARATOR) {
            return Err(ServiceError::InvalidTag(tag.to_owned()));
        }
        if self.find(tag).is_some() {
            return Err(ServiceError::DuplicateTag(tag.to_owned()));
        }

        log::debug!("Registered resource type <{tag}>.");
        self.types.insert(0, resource_type);
        Ok(())
    }

    /// Removes the type registered under `tag`.
    pub(crate) fn unregister(&mut self, tag: &str) -> Result<Arc<dyn ResourceType>, ServiceError> {
        let index = self
            .find(tag)
            .ok_or_else(|| ServiceError::UnknownTag(tag.to_owned()))?;
        log::debug!("Unregistered resource type <{tag}>.");
        Ok(self.types.remove(index))
    }

    fn find(&self, tag: &str) -> Option<usize> {
        self.types
            .iter()
            .position(|t| t.tag().eq_ignore_ascii_case(tag))
    }

    pub(crate) fn len(&self) -> usize {
        self.types.len()
    }

    /// The type at `index` in search order.
    pub(crate) fn get(&self, index: usize) -> Option<&Arc<dyn ResourceType>> {
        self.types.get(index)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<dyn ResourceType>> {
        self.types.iter()
    }

    /// Finds the type owning `location` and returns it with the backend path.
    pub(crate) fn resolve<'a>(
        &self,
        location: &'a str,
    ) -> Option<(&Arc<dyn ResourceType>, &'a str)> {
        self.types
            .iter()
            .find_map(|t| strip_tag(location, t.tag()).map(|path| (t, path)))
    }
}
