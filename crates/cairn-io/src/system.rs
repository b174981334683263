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

//! The resource system: location, caching, asynchronous I/O and hot-reload.

use crate::{
    backend::{FileResourceType, MemoryResourceType},
    cache::{CachedLocation, CachedResource},
    config::{ResourceConfig, SystemConfig},
    error::ServiceError,
    group::GroupTable,
    handle::{HandleStore, OpenResource, ResourceHandle},
    notify::Notifier,
    queue::{Admission, Completion, QueueIndices, Request, RequestQueue},
    registry::TypeRegistry,
    watch::Watcher,
};
use cairn_core::{
    Location, ResourceError, ResourceEvent, ResourceEventKind, ResourceStream, ResourceType,
    SeekOrigin, StringId, DEFAULT_STORAGE, LOCATION_SEPARATOR, TIME_UNINITIALIZED,
};
use std::{
    fmt::Write as _,
    sync::Arc,
    thread::{self, ThreadId},
    time::Instant,
};

/// Finds `name` in the storages of a group, highest priority first.
fn search(
    registry: &TypeRegistry,
    group: &str,
    storages: &[Arc<str>],
    name: &str,
) -> Option<(Arc<str>, Arc<dyn ResourceType>, String)> {
    storages.iter().find_map(|storage| {
        registry.iter().find_map(|resource_type| {
            resource_type
                .locate(group, storage, name, true)
                .map(|path| (Arc::clone(storage), Arc::clone(resource_type), path))
        })
    })
}

/// Locates, caches, opens and watches resources.
///
/// The system belongs to the thread that created it, its *main context*:
/// asynchronous requests must be issued from there, and completion callbacks
/// and change events are delivered there by [`update`](Self::update) and
/// [`pump_notifications`](Self::pump_notifications). Blocking I/O runs on a
/// single worker thread.
///
/// Two resource types are registered at construction, `file` and `mem`;
/// `file` is searched first.
pub struct ResourceSystem {
    config: SystemConfig,
    resources: ResourceConfig,
    registry: TypeRegistry,
    groups: GroupTable,
    handles: HandleStore,
    memory: Arc<MemoryResourceType>,
    queue: RequestQueue,
    notifier: Notifier,
    watcher: Watcher,
    uncached: String,
    main_context: ThreadId,
}

impl ResourceSystem {
    /// Starts the worker thread and registers the built-in resource types.
    pub fn new(config: SystemConfig) -> Result<Self, ServiceError> {
        let queue = RequestQueue::start(config.request_capacity, &config.worker_name)?;
        let memory = Arc::new(MemoryResourceType::new());

        let mut registry = TypeRegistry::new();
        registry.register(memory.clone())?;
        registry.register(Arc::new(FileResourceType))?;

        log::info!(
            "Resource system initialized ({} request slots, worker <{}>).",
            config.request_capacity,
            config.worker_name
        );

        Ok(Self {
            notifier: Notifier::new(config.watch_delay),
            watcher: Watcher::new(config.watch_iteration_limit),
            config,
            resources: ResourceConfig::new(),
            registry,
            groups: GroupTable::default(),
            handles: HandleStore::default(),
            memory,
            queue,
            uncached: String::new(),
            main_context: thread::current().id(),
        })
    }

    /// Starts the system and applies `resources`.
    pub fn with_resources(
        config: SystemConfig,
        resources: ResourceConfig,
    ) -> Result<Self, ServiceError> {
        let mut system = Self::new(config)?;
        system.set_config(resources)?;
        Ok(system)
    }

    /// The engine-side tunables.
    pub fn system_config(&self) -> &SystemConfig {
        &self.config
    }

    fn is_main_context(&self) -> bool {
        thread::current().id() == self.main_context
    }

    fn assert_main_context(&self) {
        assert!(
            self.is_main_context(),
            "resource requests must be issued from the thread that created the resource system"
        );
    }

    // --- Types ---

    /// Registers a resource type. It is searched before every type registered
    /// earlier.
    pub fn register_type(
        &mut self,
        resource_type: Arc<dyn ResourceType>,
    ) -> Result<(), ServiceError> {
        self.registry.register(resource_type)
    }

    /// Unregisters the type tagged `tag` and forgets the cached locations it
    /// produced.
    pub fn unregister_type(&mut self, tag: &str) -> Result<Arc<dyn ResourceType>, ServiceError> {
        let removed = self.registry.unregister(tag)?;
        self.queue.wait_processed();
        self.pump_notifications();
        for group in self.groups.iter_mut() {
            let stale: Vec<StringId> = group
                .cache
                .iter()
                .filter(|entry| Arc::ptr_eq(&entry.resource_type(), &removed))
                .map(|entry| entry.name_id())
                .collect();
            for name_id in stale {
                group.cache.remove(name_id);
            }
        }
        self.notifier.cancel(None);
        self.watcher.reset();
        Ok(removed)
    }

    /// Number of registered types.
    pub fn type_count(&self) -> usize {
        self.registry.len()
    }

    /// Tag of the type at `index` in search order.
    pub fn type_tag(&self, index: usize) -> Option<&str> {
        self.registry.get(index).map(|t| t.tag())
    }

    /// The type owning `location`.
    pub fn get_type(&self, location: &str) -> Option<Arc<dyn ResourceType>> {
        self.registry.resolve(location).map(|(t, _)| Arc::clone(t))
    }

    // --- Groups and storages ---

    /// Adds a storage to `group`, creating the group if needed. With
    /// `add_first` the storage is searched right after the default one,
    /// otherwise last.
    pub fn add_storage(
        &mut self,
        group: &str,
        storage: &str,
        add_first: bool,
    ) -> Result<(), ServiceError> {
        if group.is_empty() {
            return Err(ServiceError::EmptyGroup);
        }
        if storage.is_empty() {
            return Err(ServiceError::EmptyStorage);
        }
        if storage == DEFAULT_STORAGE {
            return Err(ServiceError::DefaultStorage);
        }

        self.groups.get_or_create(group).add_storage(storage, add_first);
        log::debug!("Added storage <{storage}> to group <{group}>.");
        Ok(())
    }

    /// Removes a storage. `None` as group means every group, `None` as storage
    /// means every storage but the default one. Returns how many storages were
    /// removed.
    pub fn remove_storage(
        &mut self,
        group: Option<&str>,
        storage: Option<&str>,
    ) -> Result<usize, ServiceError> {
        if storage == Some(DEFAULT_STORAGE) {
            return Err(ServiceError::DefaultStorage);
        }

        let removed = match group {
            Some(name) => self
                .groups
                .find_mut(StringId::of(name))
                .ok_or_else(|| ServiceError::GroupNotFound(name.to_owned()))?
                .remove_storages(storage),
            None => self.groups.iter_mut().map(|g| g.remove_storages(storage)).sum(),
        };

        log::debug!("Removed {removed} storage(s).");
        Ok(removed)
    }

    /// Number of groups created so far.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Name of the group at `index`.
    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index).map(|g| g.name())
    }

    /// Number of storages of `group`, the default one included.
    pub fn storage_count(&self, group: &str) -> usize {
        self.groups
            .find(StringId::of(group))
            .map_or(0, |g| g.storages().len())
    }

    /// Name of the storage at `index` in the search order of `group`.
    pub fn storage(&self, group: &str, index: usize) -> Option<&str> {
        self.groups
            .find(StringId::of(group))?
            .storages()
            .get(index)
            .map(|s| s.name())
    }

    /// Replaces the resource configuration section and loads its storages.
    pub fn set_config(&mut self, resources: ResourceConfig) -> Result<(), ServiceError> {
        self.resources = resources;
        self.watcher.reset();
        self.reload_storage()
    }

    /// The current resource configuration section.
    pub fn config(&self) -> &ResourceConfig {
        &self.resources
    }

    /// Whether at least one group is watched for changes.
    pub fn is_watching(&self) -> bool {
        self.resources.is_watching()
    }

    /// Appends every configured storage not already present in its group.
    ///
    /// Invalid entries are skipped; the first error is returned once every
    /// other entry has been applied.
    pub fn reload_storage(&mut self) -> Result<(), ServiceError> {
        let configured: Vec<(String, Vec<String>)> = self
            .resources
            .groups()
            .map(|(group, storages)| (group.to_owned(), storages.to_vec()))
            .collect();

        let mut first_error = None;
        for (group, storages) in configured {
            for storage in storages {
                let present = self
                    .groups
                    .find(StringId::of(&group))
                    .is_some_and(|g| g.contains_storage(StringId::of(&storage)));
                if present {
                    continue;
                }
                if let Err(e) = self.add_storage(&group, &storage, false) {
                    log::warn!("Skipping configured storage <{storage}> of group <{group}>: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    // --- Location ---

    /// Resolves `name` in `group`, caching the result.
    ///
    /// Storages are searched in order; within a storage, types are asked in
    /// registration order, newest first. A later call with the same group and
    /// name returns the cached location until the cache is cleared.
    pub fn locate(&mut self, group: &str, name: &str) -> Result<Location, ServiceError> {
        if group.is_empty() {
            return Err(ServiceError::EmptyGroup);
        }

        let entry = self.groups.get_or_create(group);
        let name_id = StringId::of(name);
        if let Some(cached) = entry.cache.get(name_id) {
            return Ok(cached.location());
        }

        let storages: Vec<Arc<str>> = entry
            .storages()
            .iter()
            .map(|s| Arc::from(s.name()))
            .collect();
        let group_id = entry.id();

        let (storage, resource_type, path) = search(&self.registry, group, &storages, name)
            .ok_or_else(|| ServiceError::NotFound {
                group: group.to_owned(),
                name: name.to_owned(),
            })?;

        let cached = Arc::new(CachedResource::new(group_id, name, &storage, resource_type, &path));
        let location = cached.location();
        log::debug!("Located <{name}> of group <{group}> at <{location}>.");
        entry.cache.insert(cached);
        Ok(location)
    }

    /// Resolves `name` in one storage without caching, also accepting
    /// locations where the resource could be created. `None` as storage
    /// searches the highest-priority storage.
    ///
    /// The returned string is reused by the next call.
    pub fn locate_in_storage(
        &mut self,
        group: &str,
        storage: Option<&str>,
        name: &str,
    ) -> Option<&str> {
        if group.is_empty() {
            return None;
        }

        let entry = self.groups.get_or_create(group);
        let storage: Arc<str> = match storage {
            Some(storage) => {
                let id = StringId::of(storage);
                Arc::from(entry.storages().iter().find(|s| s.id() == id)?.name())
            }
            None => Arc::from(entry.storages().first()?.name()),
        };

        let (tag, path) = self.registry.iter().find_map(|resource_type| {
            resource_type
                .locate(group, &storage, name, false)
                .map(|path| (resource_type.tag().to_owned(), path))
        })?;

        self.uncached.clear();
        let _ = write!(self.uncached, "{tag}{LOCATION_SEPARATOR}{path}");
        Some(&self.uncached)
    }

    /// The backend path of `location`, without its tag.
    pub fn get_path<'a>(&self, location: &'a str) -> Option<&'a str> {
        self.registry.resolve(location).map(|(_, path)| path)
    }

    /// Modification time of `location`, `0` when unknown or unsupported.
    pub fn get_time(&self, location: &str) -> i64 {
        match self.registry.resolve(location) {
            Some((resource_type, path)) if resource_type.supports_time() => {
                resource_type.modification_time(path)
            }
            _ => 0,
        }
    }

    /// Number of cached locations of `group`.
    pub fn cache_count(&self, group: &str) -> usize {
        self.groups
            .find(StringId::of(group))
            .map_or(0, |g| g.cache.len())
    }

    /// Snapshot of the cached locations of `group`, in insertion order.
    pub fn cached_locations(&self, group: &str) -> Vec<CachedLocation> {
        self.groups
            .find(StringId::of(group))
            .map(|g| g.cache.iter().map(|e| CachedLocation::from(&**e)).collect())
            .unwrap_or_default()
    }

    /// Forgets the cached locations of `group`, or of every group.
    ///
    /// Refused while a watch is active. Waits for the worker to go idle first.
    pub fn clear_cache(&mut self, group: Option<&str>) -> Result<usize, ServiceError> {
        if self.is_watching() {
            log::warn!("Cannot clear the resource cache while groups are watched.");
            return Err(ServiceError::WatchActive);
        }

        self.queue.wait_processed();
        self.pump_notifications();

        let cleared = match group {
            Some(name) => {
                let id = StringId::of(name);
                let found = self
                    .groups
                    .find_mut(id)
                    .ok_or_else(|| ServiceError::GroupNotFound(name.to_owned()))?;
                self.notifier.cancel(Some(id));
                found.cache.clear()
            }
            None => {
                self.notifier.cancel(None);
                self.groups.iter_mut().map(|g| g.cache.clear()).sum()
            }
        };

        self.watcher.reset();
        log::debug!("Cleared {cleared} cached location(s).");
        Ok(cleared)
    }

    /// Re-resolves every cached location of `group`, or of every group, and
    /// reports what moved, appeared or disappeared. Returns how many events
    /// were published.
    pub fn sync(&mut self, group: Option<&str>) -> Result<usize, ServiceError> {
        let filter = group.map(StringId::of);
        if let (Some(id), Some(name)) = (filter, group) {
            if self.groups.find(id).is_none() {
                return Err(ServiceError::GroupNotFound(name.to_owned()));
            }
        }

        let mut published = 0;
        for entry in self.groups.iter() {
            if filter.is_some_and(|id| id != entry.id()) {
                continue;
            }

            let storages: Vec<Arc<str>> = entry
                .storages()
                .iter()
                .map(|s| Arc::from(s.name()))
                .collect();

            for cached in entry.cache.iter() {
                match search(&self.registry, entry.name(), &storages, cached.name()) {
                    Some((storage, resource_type, path)) => {
                        let previous = cached.time();
                        let moved = !Arc::ptr_eq(&cached.resource_type(), &resource_type)
                            || !cached.location().path().eq_ignore_ascii_case(&path);
                        if moved || previous == 0 {
                            cached.relocate(&storage, resource_type, &path);
                            cached.set_time(TIME_UNINITIALIZED);
                            let kind = if previous == 0 {
                                ResourceEventKind::Add
                            } else {
                                ResourceEventKind::Update
                            };
                            self.notifier.events().publish(cached.event(kind));
                            published += 1;
                        }
                    }
                    None if cached.time() != 0 => {
                        cached.set_time(0);
                        self.notifier.events().publish(cached.event(ResourceEventKind::Remove));
                        published += 1;
                    }
                    None => {}
                }
            }
        }

        Ok(published)
    }

    // --- Handles ---

    /// Opens the resource at `location`. In erase mode the resource is created
    /// or truncated.
    pub fn open(
        &mut self,
        location: &str,
        erase_mode: bool,
    ) -> Result<ResourceHandle, ServiceError> {
        let (resource_type, path) = self
            .registry
            .resolve(location)
            .ok_or_else(|| ServiceError::UnknownType(location.to_owned()))?;

        let stream = resource_type.open(path, erase_mode).map_err(|e| {
            log::warn!("Failed to open resource <{location}>: {e}");
            e
        })?;

        let resource = Arc::new(OpenResource::new(
            Arc::clone(resource_type),
            Location::new(resource_type.tag(), path),
            stream,
        ));
        let handle = self.handles.insert(resource);
        log::trace!("Opened <{location}> as {handle}.");
        Ok(handle)
    }

    /// Closes `handle`. With asynchronous operations still in flight the close
    /// is queued behind them; otherwise it happens now.
    pub fn close(&mut self, handle: ResourceHandle) -> Result<(), ServiceError> {
        let resource = self
            .handles
            .remove(handle)
            .ok_or(ServiceError::InvalidHandle(handle))?;

        if resource.pending() > 0 && self.queue.is_worker_alive() {
            log::debug!(
                "Deferring close of <{}> behind {} pending operation(s).",
                resource.location,
                resource.pending()
            );
            if self.submit(Request::close(Arc::clone(&resource))) == Admission::Accepted {
                return Ok(());
            }
        }

        Ok(resource.close()?)
    }

    fn resource(&self, handle: ResourceHandle) -> Result<&Arc<OpenResource>, ServiceError> {
        self.handles
            .get(handle)
            .ok_or(ServiceError::InvalidHandle(handle))
    }

    fn idle_resource(&self, handle: ResourceHandle) -> Result<&Arc<OpenResource>, ServiceError> {
        let resource = self.resource(handle)?;
        match resource.pending() {
            0 => Ok(resource),
            count => Err(ServiceError::PendingOperations { handle, count }),
        }
    }

    fn with_stream<R>(
        resource: &OpenResource,
        operation: impl FnOnce(&mut Box<dyn ResourceStream>) -> Result<R, ResourceError>,
    ) -> Result<R, ServiceError> {
        let mut stream = resource.stream();
        let stream = stream.as_mut().ok_or(ResourceError::Closed)?;
        Ok(operation(stream)?)
    }

    /// The location `handle` was opened from.
    pub fn location_of(&self, handle: ResourceHandle) -> Option<Location> {
        self.handles.get(handle).map(|r| r.location.clone())
    }

    /// Number of open handles.
    pub fn open_count(&self) -> usize {
        self.handles.len()
    }

    /// Size of the resource in bytes. Fails while asynchronous operations are
    /// in flight.
    pub fn size(&self, handle: ResourceHandle) -> Result<u64, ServiceError> {
        Self::with_stream(self.idle_resource(handle)?, |s| s.size())
    }

    /// Moves the cursor. Fails while asynchronous operations are in flight.
    pub fn seek(
        &self,
        handle: ResourceHandle,
        offset: i64,
        origin: SeekOrigin,
    ) -> Result<u64, ServiceError> {
        Self::with_stream(self.idle_resource(handle)?, |s| s.seek(offset, origin))
    }

    /// Cursor position. Fails while asynchronous operations are in flight.
    pub fn tell(&self, handle: ResourceHandle) -> Result<u64, ServiceError> {
        Self::with_stream(self.idle_resource(handle)?, |s| s.tell())
    }

    /// Reads into `buffer` on the calling thread.
    pub fn read(&self, handle: ResourceHandle, buffer: &mut [u8]) -> Result<usize, ServiceError> {
        Self::with_stream(self.resource(handle)?, |s| s.read(buffer))
    }

    /// Writes `data` on the calling thread.
    pub fn write(&self, handle: ResourceHandle, data: &[u8]) -> Result<usize, ServiceError> {
        let resource = self.resource(handle)?;
        if !resource.resource_type.supports_write() {
            return Err(ServiceError::ReadOnly(resource.location.to_string()));
        }
        Self::with_stream(resource, |s| s.write(data))
    }

    /// Queues a read of `size` bytes. `callback` receives the buffer on the
    /// main context once the worker is done.
    pub fn read_async<F>(
        &mut self,
        handle: ResourceHandle,
        size: usize,
        callback: F,
    ) -> Result<(), ServiceError>
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let resource = Arc::clone(self.resource(handle)?);
        let request = Request::read(handle, Arc::clone(&resource), size, Some(Box::new(callback)));
        self.enqueue(request, &resource)
    }

    /// Queues a write of `data`. `callback` gets `data` back on the main
    /// context once the worker is done.
    pub fn write_async<F>(
        &mut self,
        handle: ResourceHandle,
        data: Vec<u8>,
        callback: F,
    ) -> Result<(), ServiceError>
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let resource = Arc::clone(self.resource(handle)?);
        if !resource.resource_type.supports_write() {
            return Err(ServiceError::ReadOnly(resource.location.to_string()));
        }
        let request = Request::write(handle, Arc::clone(&resource), data, Some(Box::new(callback)));
        self.enqueue(request, &resource)
    }

    fn enqueue(&mut self, request: Request, resource: &OpenResource) -> Result<(), ServiceError> {
        resource.begin_operation();
        match self.submit(request) {
            Admission::Accepted => Ok(()),
            _ => {
                resource.end_operation();
                Err(if self.queue.is_accepting() {
                    ServiceError::WorkerStopped
                } else {
                    ServiceError::ShuttingDown
                })
            }
        }
    }

    fn submit(&mut self, request: Request) -> Admission {
        self.assert_main_context();
        let notifier = &mut self.notifier;
        self.queue.submit(request, |done| notifier.complete(done))
    }

    /// Deletes the resource at `location`.
    pub fn delete(&mut self, location: &str) -> Result<(), ServiceError> {
        let (resource_type, path) = self
            .registry
            .resolve(location)
            .ok_or_else(|| ServiceError::UnknownType(location.to_owned()))?;
        if !resource_type.supports_delete() {
            return Err(ResourceError::Unsupported { operation: "delete" }.into());
        }
        resource_type.delete(path)?;
        log::debug!("Deleted resource <{location}>.");
        Ok(())
    }

    /// Asynchronous operations in flight on `handle`.
    pub fn pending_op_count(&self, handle: ResourceHandle) -> u32 {
        self.handles.get(handle).map_or(0, |r| r.pending())
    }

    /// Requests queued and not yet retired, across every handle. Called from
    /// the main context, it also pumps notifications.
    pub fn total_pending_op_count(&mut self) -> usize {
        let count = self.queue.len();
        if count > 0 && self.is_main_context() {
            self.pump_notifications();
        }
        count
    }

    /// Snapshot of the request ring indices.
    pub fn queue_indices(&self) -> QueueIndices {
        self.queue.indices()
    }

    // --- Notifications ---

    /// Delivers completed requests: runs callbacks and feeds time queries to
    /// the change detector. Returns how many requests were retired.
    pub fn pump_notifications(&mut self) -> usize {
        let mut retired = 0;
        while let Some(request) = self.queue.retire() {
            self.notifier.complete(request);
            retired += 1;
        }
        retired
    }

    /// Per-frame tick: pumps notifications, polls a slice of the watched
    /// resources and publishes the updates whose quiet period elapsed.
    pub fn update(&mut self) {
        self.pump_notifications();

        if self.is_watching() && self.queue.is_accepting() {
            let due = self.watcher.tick(self.resources.watch_list(), &self.groups);
            for entry in due {
                if self.submit(Request::query_time(Arc::clone(&entry))) != Admission::Accepted {
                    log::trace!("Dropped time query of <{}>.", entry.location());
                    entry.end_watch();
                }
            }
        }

        self.notifier.fire_due(Instant::now());
    }

    /// The channel resource events are published on.
    pub fn events(&self) -> &flume::Receiver<ResourceEvent> {
        self.notifier.events().receiver()
    }

    /// Registers, replaces or (with `None`) removes an in-memory resource. A
    /// `None` group makes it visible from every group; a `None` storage means
    /// the default storage.
    pub fn set_memory_resource(
        &self,
        group: Option<&str>,
        storage: Option<&str>,
        name: &str,
        data: Option<Arc<[u8]>>,
    ) -> Result<(), ServiceError> {
        Ok(self
            .memory
            .set(group, storage.unwrap_or(DEFAULT_STORAGE), name, data)?)
    }

    /// Drains the queue, joins the worker and closes every open handle.
    /// Callbacks of requests still in flight are delivered before returning.
    pub fn shutdown(&mut self) {
        if !self.queue.is_accepting() {
            return;
        }

        log::info!("Shutting down resource system.");
        self.queue.wait_processed();
        self.queue.shutdown();
        self.pump_notifications();

        for resource in self.handles.drain() {
            if let Err(e) = resource.close() {
                log::warn!("Failed to close <{}> on shutdown: {e}", resource.location);
            }
        }
        self.notifier.cancel(None);
        self.groups.clear();
    }
}

impl Drop for ResourceSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}
