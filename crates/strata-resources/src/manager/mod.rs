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

//! The resource manager.
//!
//! Loads resources from saved files, synchronously or on a pool of loader
//! threads, and hands out handles that complete once the resource and,
//! optionally, all of its dependencies are decoded. Dependencies may finish in
//! any order: a resource is committed to its handle only when its own decode
//! and every dependency it waits on are done.
//!
//! Loads can keep an internal reference, which keeps the resource alive with
//! no outside handle until it is [released](ResourceManager::release).

mod state;
mod worker;

use self::state::{Finished, InProgress, LoadedEntry, ManagerState};
use self::worker::{LoadJob, LoaderPool};
use crate::config::ResourceManagerConfig;
use crate::error::{ManagerError, Result};
use crate::flags::ResourceLoadFlags;
use crate::loader::{LoadContext, LoaderRegistry, ResourceLoader};
use crate::manifest::ResourceManifest;
use crate::saved;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_core::core_object::{CoreObjectId, CoreThreadHandle};
use strata_core::event::{EventBus, ResourceEvent};
use strata_core::handle::HandleTarget;
use strata_core::resource::{collect_dependencies, AsAny, CompressionMethod, ResourceMetadata};
use strata_core::{
    HResource, HandleReadinessBroker, Resource, ResourceHandle, ResourceUUID, WeakResourceHandle,
};

#[derive(Debug, Clone, Copy)]
struct LoadRequest {
    flags: ResourceLoadFlags,
    synchronous: bool,
    /// Loads started for a dependency never wait on other loads.
    nested: bool,
}

enum Stage {
    Loaded,
    InProgress,
    Started,
}

/// Loads, tracks and releases resources.
///
/// Dropping the manager stops the loader threads (after the queued loads
/// finished) and releases every internal reference.
pub struct ResourceManager {
    inner: Arc<ManagerInner>,
}

pub(crate) struct ManagerInner {
    config: ResourceManagerConfig,
    broker: Arc<HandleReadinessBroker>,
    state: Mutex<ManagerState>,
    /// Signalled whenever loads leave the in-progress set.
    settled: Condvar,
    /// Serializes completing loads with committing them, so a dependency is
    /// always committed before its dependants.
    commit_lock: Mutex<()>,
    loaders: RwLock<LoaderRegistry>,
    /// Index 0 is the default manifest.
    manifests: RwLock<Vec<ResourceManifest>>,
    events: EventBus<ResourceEvent>,
    core: RwLock<Option<CoreThreadHandle>>,
    pool: Mutex<Option<LoaderPool>>,
}

impl ResourceManager {
    /// Creates a manager using the process-wide readiness broker.
    pub fn new(config: ResourceManagerConfig) -> Result<Self> {
        Self::with_broker(config, HandleReadinessBroker::current())
    }

    /// Creates a manager whose handles are arbitrated by `broker`.
    pub fn with_broker(
        config: ResourceManagerConfig,
        broker: Arc<HandleReadinessBroker>,
    ) -> Result<Self> {
        let default_manifest = ResourceManifest::new(config.default_manifest.clone());
        let inner = Arc::new(ManagerInner {
            config,
            broker,
            state: Mutex::new(ManagerState::default()),
            settled: Condvar::new(),
            commit_lock: Mutex::new(()),
            loaders: RwLock::new(LoaderRegistry::default()),
            manifests: RwLock::new(vec![default_manifest]),
            events: EventBus::new(),
            core: RwLock::new(None),
            pool: Mutex::new(None),
        });

        let pool = LoaderPool::spawn(&inner.config, Arc::downgrade(&inner))?;
        log::info!(
            "Resource manager started with {} loader threads.",
            pool.worker_count()
        );
        *inner.pool.lock() = Some(pool);
        Ok(Self { inner })
    }

    /// Attaches the core thread that hosts resource counterparts.
    pub fn with_core_thread(self, core: CoreThreadHandle) -> Self {
        self.set_core_thread(Some(core));
        self
    }

    /// Replaces the core thread used for counterparts created from now on.
    pub fn set_core_thread(&self, core: Option<CoreThreadHandle>) {
        *self.inner.core.write() = core;
    }

    /// The configuration the manager was created with.
    pub fn config(&self) -> &ResourceManagerConfig {
        &self.inner.config
    }

    /// The broker arbitrating the handles of this manager.
    pub fn broker(&self) -> &Arc<HandleReadinessBroker> {
        &self.inner.broker
    }

    /// Registers the loader decoding files saved with `format_id`.
    pub fn register_loader<R: Resource>(
        &self,
        format_id: &str,
        loader: impl ResourceLoader<R> + 'static,
    ) {
        self.inner.loaders.write().register(format_id, loader);
        log::debug!("Registered loader for '{format_id}'");
    }

    /// `true` if a loader is registered for `format_id`.
    pub fn has_loader(&self, format_id: &str) -> bool {
        self.inner.loaders.read().contains(format_id)
    }

    /// Wraps an in-memory resource into a loaded handle with a fresh UUID.
    pub fn create_handle<R: Resource>(&self, resource: R) -> ResourceHandle<R> {
        self.create_handle_with_uuid(resource, ResourceUUID::new())
    }

    /// Wraps an in-memory resource into a loaded handle.
    ///
    /// A pending handle already registered for `uuid`, for example one
    /// returned by [`get_handle`](Self::get_handle), is completed in place.
    pub fn create_handle_with_uuid<R: Resource>(
        &self,
        resource: R,
        uuid: ResourceUUID,
    ) -> ResourceHandle<R> {
        self.inner.register_created(Arc::new(resource), uuid).cast()
    }

    /// The handle registered for `uuid`.
    ///
    /// When no handle is alive, a pending one is registered and returned. It
    /// completes if the resource is loaded or created later.
    pub fn get_handle(&self, uuid: ResourceUUID) -> HResource {
        self.inner.get_handle(uuid)
    }

    /// Loads the resource saved at `path` and blocks until it is loaded.
    ///
    /// With [`ResourceLoadFlags::LOAD_DEPENDENCIES`], its dependencies are
    /// loaded first. Errors are reported here; the returned handle is loaded.
    pub fn load(&self, path: impl AsRef<Path>, flags: ResourceLoadFlags) -> Result<HResource> {
        self.inner.load_path(path.as_ref(), Self::request(flags, true))
    }

    /// Starts loading the resource saved at `path` on the loader threads.
    ///
    /// The header is read right away, so a missing or foreign file is
    /// reported here. Decode failures are logged and published as
    /// [`ResourceEvent::LoadFailed`]; the handle of a failed load never
    /// completes.
    pub fn load_async(&self, path: impl AsRef<Path>, flags: ResourceLoadFlags) -> Result<HResource> {
        self.inner.load_path(path.as_ref(), Self::request(flags, false))
    }

    /// Loads the resource `uuid`, resolving its file through the manifests.
    pub fn load_from_uuid(
        &self,
        uuid: ResourceUUID,
        asynchronous: bool,
        flags: ResourceLoadFlags,
    ) -> Result<HResource> {
        self.inner.load_uuid(uuid, Self::request(flags, !asynchronous))
    }

    /// Starts loading the resource a weak handle refers to.
    pub fn load_weak<T: ?Sized + 'static>(
        &self,
        handle: &WeakResourceHandle<T>,
        flags: ResourceLoadFlags,
    ) -> Result<HResource> {
        self.load_from_uuid(handle.uuid(), true, flags)
    }

    fn request(flags: ResourceLoadFlags, synchronous: bool) -> LoadRequest {
        LoadRequest {
            flags,
            synchronous,
            nested: false,
        }
    }

    /// Drops one internal reference of `handle`.
    ///
    /// Blocks while the resource is still loading. Once no internal reference
    /// is left the resource lives only as long as outside handles do.
    pub fn release<T: ?Sized + 'static>(&self, handle: &ResourceHandle<T>) {
        self.inner.release(handle.uuid());
    }

    /// Releases every resource only kept alive by its internal references.
    ///
    /// Repeats until nothing more can be released, so dependencies freed by
    /// their dependants go too. Returns the number of resources released.
    pub fn unload_all_unused(&self) -> usize {
        self.inner.unload_all_unused()
    }

    /// Drops every internal reference.
    ///
    /// Handles held outside the manager stay valid and loaded.
    pub fn unload_all(&self) {
        self.inner.unload_all();
    }

    /// Replaces the payload of a loaded resource.
    ///
    /// The handle keeps its identity. Its core counterpart is rebuilt,
    /// [`ResourceEvent::Modified`] is published and listeners are notified on
    /// the next [`update_listeners`](Self::update_listeners).
    pub fn update<T: ?Sized + HandleTarget>(
        &self,
        handle: &ResourceHandle<T>,
        resource: Arc<T>,
    ) -> Result<()> {
        self.inner
            .update(&handle.untyped(), T::into_resource(resource))
    }

    /// Saves a loaded resource to `path` and maps it in the default manifest.
    ///
    /// With `compress`, the payload is LZ4-compressed unless the resource
    /// reports it is not compressible.
    pub fn save<T: ?Sized + 'static>(
        &self,
        handle: &ResourceHandle<T>,
        path: impl AsRef<Path>,
        overwrite: bool,
        compress: bool,
    ) -> Result<()> {
        self.inner
            .save(&handle.untyped(), path.as_ref(), overwrite, compress)
    }

    /// Saves a loaded resource back to the file it is mapped to.
    pub fn save_in_place<T: ?Sized + 'static>(
        &self,
        handle: &ResourceHandle<T>,
        compress: bool,
    ) -> Result<()> {
        let uuid = handle.uuid();
        let path = self
            .file_path_from_uuid(&uuid)
            .ok_or(ManagerError::UnknownResource(uuid))?;
        self.inner.save(&handle.untyped(), &path, true, compress)
    }

    /// The dependencies recorded in the header of the file at `path`.
    pub fn dependencies_of(&self, path: impl AsRef<Path>) -> Result<Vec<ResourceUUID>> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ManagerError::FileNotFound(path.to_path_buf()));
        }
        let metadata = saved::read_header(path)?;
        Ok(metadata.external_dependencies().collect())
    }

    /// `true` if `uuid` is loaded, or, with `check_in_progress`, loading.
    pub fn is_loaded(&self, uuid: &ResourceUUID, check_in_progress: bool) -> bool {
        let state = self.inner.state.lock();
        if check_in_progress && state.in_progress.contains_key(uuid) {
            return true;
        }
        state
            .loaded
            .get(uuid)
            .is_some_and(|entry| entry.handle.is_alive())
    }

    /// Load progress of `handle` in `[0, 1]`.
    ///
    /// With `include_dependencies`, the dependencies it waits on count as
    /// much as the resource itself.
    pub fn load_progress<T: ?Sized + 'static>(
        &self,
        handle: &ResourceHandle<T>,
        include_dependencies: bool,
    ) -> f32 {
        let uuid = handle.uuid();
        {
            let state = self.inner.state.lock();
            if let Some(entry) = state.in_progress.get(&uuid) {
                return if include_dependencies {
                    (entry.total - entry.remaining) as f32 / entry.total as f32
                } else if entry.own_done {
                    1.0
                } else {
                    0.0
                };
            }
        }
        if handle.is_loaded(false) {
            1.0
        } else {
            0.0
        }
    }

    /// Number of resources currently loading.
    pub fn pending_loads(&self) -> usize {
        self.inner.state.lock().in_progress.len()
    }

    /// Number of loaded resources tracked by the manager.
    pub fn loaded_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .loaded
            .values()
            .filter(|entry| entry.handle.is_alive())
            .count()
    }

    /// Adds a manifest. It takes priority over the ones registered before it.
    ///
    /// A manifest with the same name is replaced in place.
    pub fn register_manifest(&self, manifest: ResourceManifest) {
        let mut manifests = self.inner.manifests.write();
        match manifests
            .iter_mut()
            .find(|registered| registered.name() == manifest.name())
        {
            Some(registered) => *registered = manifest,
            None => manifests.push(manifest),
        }
    }

    /// Removes the manifest called `name`. The default manifest stays.
    pub fn unregister_manifest(&self, name: &str) -> Option<ResourceManifest> {
        if name == self.inner.config.default_manifest {
            log::warn!("The default manifest '{name}' cannot be unregistered");
            return None;
        }
        let mut manifests = self.inner.manifests.write();
        let index = manifests
            .iter()
            .position(|manifest| manifest.name() == name)?;
        Some(manifests.remove(index))
    }

    /// A copy of the manifest called `name`.
    pub fn manifest(&self, name: &str) -> Option<ResourceManifest> {
        self.inner
            .manifests
            .read()
            .iter()
            .find(|manifest| manifest.name() == name)
            .cloned()
    }

    /// A copy of the default manifest.
    pub fn default_manifest(&self) -> ResourceManifest {
        self.inner
            .manifests
            .read()
            .first()
            .cloned()
            .unwrap_or_default()
    }

    /// The file `uuid` is stored in, according to the manifests.
    pub fn file_path_from_uuid(&self, uuid: &ResourceUUID) -> Option<PathBuf> {
        self.inner.file_path_from_uuid(uuid)
    }

    /// The resource stored in `path`, according to the manifests.
    pub fn uuid_from_file_path(&self, path: impl AsRef<Path>) -> Option<ResourceUUID> {
        let path = path.as_ref();
        self.inner
            .manifests
            .read()
            .iter()
            .rev()
            .find_map(|manifest| manifest.file_path_to_uuid(path))
    }

    /// Subscribes to lifecycle events.
    pub fn subscribe(&self) -> flume::Receiver<ResourceEvent> {
        self.inner.events.subscribe()
    }

    /// Delivers queued listener notifications. Call once per frame.
    pub fn update_listeners(&self) -> usize {
        self.inner.broker.dispatch_pending()
    }

    /// Searches the dependency graph of `handle` for a cycle.
    pub fn find_dependency_cycle<T: ?Sized + 'static>(&self, handle: &ResourceHandle<T>) -> Result<()> {
        strata_core::resource::find_dependency_cycle(&handle.untyped())?;
        Ok(())
    }

    /// Stops the loader threads after the queued loads finished.
    ///
    /// Asynchronous loads are rejected afterwards.
    pub fn shutdown(&self) {
        let pool = self.inner.pool.lock().take();
        if let Some(mut pool) = pool {
            pool.shutdown();
            log::info!("Resource manager stopped.");
        }
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.shutdown();
        self.unload_all();
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("loaded", &self.loaded_count())
            .field("pending", &self.pending_loads())
            .finish_non_exhaustive()
    }
}

impl ManagerInner {
    fn install_destroy_hook(self: &Arc<Self>, handle: &HResource, core_id: Option<CoreObjectId>) {
        let Some(data) = handle.data() else {
            return;
        };
        let manager = Arc::downgrade(self);
        data.set_destroy_hook(Box::new(move |uuid, resource| match manager.upgrade() {
            Some(manager) => manager.on_destroyed(uuid, resource, core_id),
            None => drop(resource),
        }));
    }

    /// The live handle of `uuid`, or a new pending one. Called with the state locked.
    fn handle_for(self: &Arc<Self>, state: &mut ManagerState, uuid: ResourceUUID) -> HResource {
        if let Some(handle) = state.live_handle(&uuid) {
            return handle;
        }
        let handle = HResource::pending_with_broker(uuid, Arc::clone(&self.broker));
        self.install_destroy_hook(&handle, None);
        state.handles.insert(uuid, handle.downgrade());
        handle
    }

    fn get_handle(self: &Arc<Self>, uuid: ResourceUUID) -> HResource {
        let mut state = self.state.lock();
        self.handle_for(&mut state, uuid)
    }

    fn register_created(self: &Arc<Self>, resource: Arc<dyn Resource>, uuid: ResourceUUID) -> HResource {
        let (handle, stale) = {
            let mut state = self.state.lock();
            let stale = state.remove_stale(&uuid);
            let handle = self.handle_for(&mut state, uuid);
            state
                .loaded
                .entry(uuid)
                .or_insert_with(|| LoadedEntry::new(&handle));
            (handle, stale)
        };
        drop(stale);

        if handle.is_loaded(false) {
            if let Err(err) = self.update(&handle, resource) {
                log::warn!("Failed to replace resource {uuid}: {err}");
            }
            return handle;
        }

        let core_id = self.attach(&handle, resource, uuid);
        self.record_core_id(uuid, core_id);
        self.events.publish(ResourceEvent::Loaded { uuid });
        log::debug!("Created resource {uuid}");
        handle
    }

    /// Builds the counterpart of `resource`, then commits it to `handle`.
    fn attach(
        self: &Arc<Self>,
        handle: &HResource,
        resource: Arc<dyn Resource>,
        uuid: ResourceUUID,
    ) -> Option<CoreObjectId> {
        if let Some(data) = handle.data() {
            data.begin_initializing();
        }
        let core_id = self.create_counterpart(resource.as_ref());
        if core_id.is_some() {
            self.install_destroy_hook(handle, core_id);
        }
        handle.set_handle_data(Some(resource), uuid);
        core_id
    }

    fn create_counterpart(&self, resource: &dyn Resource) -> Option<CoreObjectId> {
        let core = self.core.read().clone()?;
        let counterpart = resource.create_core()?;
        let id = CoreObjectId::next();
        match core.create(id, counterpart) {
            Ok(()) => Some(id),
            Err(err) => {
                log::warn!("Failed to create the core counterpart of '{}': {err}", resource.name());
                None
            }
        }
    }

    fn record_core_id(&self, uuid: ResourceUUID, core_id: Option<CoreObjectId>) -> Option<CoreObjectId> {
        let mut state = self.state.lock();
        let entry = state.loaded.get_mut(&uuid)?;
        std::mem::replace(&mut entry.core_id, core_id)
    }

    fn destroy_counterpart(&self, id: CoreObjectId, resource: Option<Arc<dyn Resource>>) {
        let core = self.core.read().clone();
        match core {
            Some(core) => {
                let retain = resource.map(AsAny::into_any_arc);
                if let Err(err) = core.destroy(id, retain) {
                    log::warn!("Failed to destroy core object {id}: {err}");
                }
            }
            None => drop(resource),
        }
    }

    fn on_destroyed(
        &self,
        uuid: ResourceUUID,
        resource: Option<Arc<dyn Resource>>,
        core_id: Option<CoreObjectId>,
    ) {
        let stale = {
            let mut state = self.state.lock();
            let dead = state
                .handles
                .get(&uuid)
                .is_some_and(|handle| !handle.is_alive());
            if dead {
                state.handles.remove(&uuid);
            }
            state.remove_stale(&uuid)
        };
        drop(stale);

        let was_loaded = resource.is_some();
        match core_id {
            Some(id) => self.destroy_counterpart(id, resource),
            None => drop(resource),
        }
        if was_loaded {
            self.events.publish(ResourceEvent::Destroyed { uuid });
            log::debug!("Resource {uuid} unloaded");
        }
    }

    fn file_path_from_uuid(&self, uuid: &ResourceUUID) -> Option<PathBuf> {
        self.manifests
            .read()
            .iter()
            .rev()
            .find_map(|manifest| manifest.uuid_to_file_path(uuid))
            .map(Path::to_path_buf)
    }

    fn remember_path(&self, uuid: ResourceUUID, path: &Path) {
        let mut manifests = self.manifests.write();
        if manifests.iter().any(|manifest| manifest.contains_uuid(&uuid)) {
            return;
        }
        if let Some(default) = manifests.first_mut() {
            default.register_resource(uuid, path);
        }
    }

    fn load_path(self: &Arc<Self>, path: &Path, request: LoadRequest) -> Result<HResource> {
        if !path.is_file() {
            log::warn!(
                "Cannot load resource: file '{}' doesn't exist.",
                path.display()
            );
            return Err(ManagerError::FileNotFound(path.to_path_buf()));
        }
        let metadata = saved::read_header(path)?;
        self.load_resolved(path.to_path_buf(), metadata, request)
    }

    fn load_uuid(self: &Arc<Self>, uuid: ResourceUUID, request: LoadRequest) -> Result<HResource> {
        if let Some(path) = self.file_path_from_uuid(&uuid) {
            return self.load_path(&path, request);
        }

        // Not saved anywhere: only an in-memory resource can satisfy it.
        let (handle, known) = {
            let mut state = self.state.lock();
            let handle = state.live_handle(&uuid);
            let known = match (&handle, state.loaded.get_mut(&uuid)) {
                (Some(handle), Some(entry)) => {
                    if request.flags.contains(ResourceLoadFlags::KEEP_INTERNAL_REF) {
                        entry.add_internal_ref(handle);
                    }
                    true
                }
                _ => false,
            };
            (handle, known)
        };
        match handle {
            Some(handle) if known => Ok(handle),
            _ => Err(ManagerError::UnknownResource(uuid)),
        }
    }

    fn load_resolved(
        self: &Arc<Self>,
        path: PathBuf,
        metadata: ResourceMetadata,
        request: LoadRequest,
    ) -> Result<HResource> {
        let uuid = metadata.uuid;
        self.remember_path(uuid, &path);
        let keep_internal_ref = request.flags.contains(ResourceLoadFlags::KEEP_INTERNAL_REF);

        let (handle, stage, stale) = {
            let mut state = self.state.lock();
            let stale = state.remove_stale(&uuid);
            let handle = self.handle_for(&mut state, uuid);
            let stage = if let Some(entry) = state.loaded.get_mut(&uuid) {
                if keep_internal_ref {
                    entry.add_internal_ref(&handle);
                }
                Stage::Loaded
            } else if let Some(entry) = state.in_progress.get_mut(&uuid) {
                if keep_internal_ref {
                    entry.internal_refs += 1;
                }
                if request.synchronous {
                    entry.notify_immediately = true;
                }
                Stage::InProgress
            } else {
                state.in_progress.insert(
                    uuid,
                    InProgress::new(handle.clone(), keep_internal_ref, request.synchronous),
                );
                Stage::Started
            };
            (handle, stage, stale)
        };
        drop(stale);

        let wait = request.synchronous && !request.nested;
        match stage {
            Stage::Loaded => {
                if wait {
                    handle.block_until_loaded(false);
                }
                Ok(handle)
            }
            Stage::InProgress if wait => self.wait_settled(uuid, handle),
            Stage::InProgress => Ok(handle),
            Stage::Started => {
                log::debug!("Loading '{}' ({uuid})", path.display());
                let dependencies = self.resolve_dependencies(uuid, &metadata, request);
                let keep_source_data = metadata.keep_source_data
                    || request.flags.contains(ResourceLoadFlags::KEEP_SOURCE_DATA);

                if request.synchronous {
                    let outcome = self.decode(&path, &dependencies, keep_source_data);
                    self.finish_decode(uuid, outcome)?;
                    return if wait {
                        self.wait_settled(uuid, handle)
                    } else {
                        Ok(handle)
                    };
                }

                let job = LoadJob {
                    uuid,
                    path,
                    dependencies,
                    keep_source_data,
                };
                let submitted = match self.pool.lock().as_ref() {
                    Some(pool) => pool.submit(job),
                    None => Err(ManagerError::ShutDown),
                };
                if let Err(err) = submitted {
                    self.finish_decode(uuid, Err(err))?;
                }
                Ok(handle)
            }
        }
    }

    /// Handles to the dependencies declared by `metadata`, loading them if requested.
    fn resolve_dependencies(
        self: &Arc<Self>,
        uuid: ResourceUUID,
        metadata: &ResourceMetadata,
        request: LoadRequest,
    ) -> HashMap<ResourceUUID, HResource> {
        let load = request.flags.contains(ResourceLoadFlags::LOAD_DEPENDENCIES);
        let nested = LoadRequest {
            flags: request.flags.for_dependencies(),
            synchronous: request.synchronous,
            nested: true,
        };

        let mut dependencies = HashMap::new();
        for dependency in metadata.external_dependencies() {
            let handle = if load {
                match self.load_uuid(dependency, nested) {
                    Ok(handle) => {
                        if self.state.lock().add_dependant(dependency, uuid) {
                            log::trace!("{uuid} waits on dependency {dependency}");
                        }
                        handle
                    }
                    Err(err) => {
                        log::warn!("Failed to load dependency {dependency} of {uuid}: {err}");
                        self.get_handle(dependency)
                    }
                }
            } else {
                self.get_handle(dependency)
            };
            dependencies.insert(dependency, handle);
        }
        dependencies
    }

    fn decode(
        &self,
        path: &Path,
        dependencies: &HashMap<ResourceUUID, HResource>,
        keep_source_data: bool,
    ) -> Result<Arc<dyn Resource>> {
        let saved = saved::read_saved(path)?;
        let type_id = &saved.metadata.type_id;
        let loader = self
            .loaders
            .read()
            .get(type_id)
            .ok_or_else(|| ManagerError::LoaderMissing(type_id.clone()))?;

        let context = LoadContext::new(&saved.metadata, dependencies, keep_source_data);
        loader
            .load_any(&saved.payload, &context)
            .map_err(|source| ManagerError::Decode {
                name: saved.metadata.name.clone(),
                source,
            })
    }

    /// Records the outcome of the own decode of `uuid` and commits whatever finished.
    fn finish_decode(self: &Arc<Self>, uuid: ResourceUUID, outcome: Result<Arc<dyn Resource>>) -> Result<()> {
        let mut orphan = None;
        let (result, notify) = {
            let _commit = self.commit_lock.lock();
            let mut finished = Vec::new();
            let result = {
                let mut state = self.state.lock();
                let entry = state.in_progress.get_mut(&uuid);
                let result = match (entry, outcome) {
                    (Some(entry), Ok(resource)) => {
                        entry.decoded = Some(resource);
                        entry.own_done = true;
                        Ok(())
                    }
                    (Some(entry), Err(err)) => {
                        entry.failed = true;
                        entry.own_done = true;
                        Err(err)
                    }
                    (None, Ok(resource)) => {
                        orphan = Some(resource);
                        Ok(())
                    }
                    (None, Err(err)) => Err(err),
                };
                state.complete_step(uuid, &mut finished);
                result
            };
            (result, self.commit(finished))
        };
        drop(orphan);

        self.settled.notify_all();
        for uuid in notify {
            self.broker.notify_listeners(&uuid);
        }
        result
    }

    /// Commits finished loads to their handles, dependencies first.
    ///
    /// Returns the resources whose listeners must be notified right away.
    fn commit(self: &Arc<Self>, finished: Vec<Finished>) -> Vec<ResourceUUID> {
        let mut notify = Vec::new();
        for done in finished {
            let Finished {
                uuid,
                handle,
                resource,
                notify_immediately,
                displaced,
                displaced_core,
            } = done;
            drop(displaced);

            match resource {
                Some(resource) => {
                    let previous = displaced_core.and_then(|_| handle.resource());
                    let core_id = self.attach(&handle, resource, uuid);
                    self.record_core_id(uuid, core_id);
                    if let Some(id) = displaced_core {
                        if core_id.is_none() {
                            self.install_destroy_hook(&handle, None);
                        }
                        self.destroy_counterpart(id, previous);
                    }
                    self.events.publish(ResourceEvent::Loaded { uuid });
                    if notify_immediately {
                        notify.push(uuid);
                    }
                    log::debug!("Resource {uuid} loaded");
                }
                None => log::debug!("Load of {uuid} finished without a resource"),
            }
        }
        notify
    }

    /// Blocks until `uuid` left the in-progress set, then returns its handle if it loaded.
    fn wait_settled(&self, uuid: ResourceUUID, handle: HResource) -> Result<HResource> {
        let committed = {
            let mut state = self.state.lock();
            while state.in_progress.contains_key(&uuid) {
                self.settled.wait(&mut state);
            }
            state.loaded.contains_key(&uuid)
        };
        if !committed {
            return Err(ManagerError::NotLoaded(uuid));
        }
        handle.block_until_loaded(false);
        Ok(handle)
    }

    pub(crate) fn run_job(self: &Arc<Self>, job: LoadJob) {
        let LoadJob {
            uuid,
            path,
            dependencies,
            keep_source_data,
        } = job;

        let outcome = self.decode(&path, &dependencies, keep_source_data);
        if let Err(err) = self.finish_decode(uuid, outcome) {
            log::error!(
                "Failed to load resource {uuid} from '{}': {err}",
                path.display()
            );
            self.events.publish(ResourceEvent::LoadFailed {
                uuid,
                path: path.display().to_string(),
                reason: err.to_string(),
            });
        }
    }

    fn release(&self, uuid: ResourceUUID) {
        {
            let mut state = self.state.lock();
            while state.in_progress.contains_key(&uuid) {
                self.settled.wait(&mut state);
            }
        }
        // Loads leave the in-progress set before they are committed.
        drop(self.commit_lock.lock());

        let pin = self
            .state
            .lock()
            .loaded
            .get_mut(&uuid)
            .and_then(LoadedEntry::remove_internal_ref);
        drop(pin);
    }

    fn unload_all_unused(&self) -> usize {
        let mut released = 0;
        loop {
            let pins: Vec<HResource> = {
                let mut state = self.state.lock();
                state
                    .loaded
                    .values_mut()
                    .filter(|entry| ManagerState::is_unused(entry))
                    .filter_map(|entry| {
                        entry.internal_refs = 0;
                        entry.pin.take()
                    })
                    .collect()
            };
            if pins.is_empty() {
                break;
            }
            released += pins.len();
            drop(pins);
        }
        if released > 0 {
            log::debug!("Unloaded {released} unused resources");
        }
        released
    }

    fn unload_all(&self) {
        let pins: Vec<HResource> = {
            let mut state = self.state.lock();
            state
                .loaded
                .values_mut()
                .filter_map(|entry| {
                    entry.internal_refs = 0;
                    entry.pin.take()
                })
                .collect()
        };
        drop(pins);
    }

    fn update(self: &Arc<Self>, handle: &HResource, resource: Arc<dyn Resource>) -> Result<()> {
        let uuid = handle.uuid();
        if !handle.is_loaded(false) {
            return Err(ManagerError::NotLoaded(uuid));
        }

        let previous = handle.resource();
        let core_id = self.create_counterpart(resource.as_ref());
        let old_core_id = self.record_core_id(uuid, core_id);
        if core_id.is_some() || old_core_id.is_some() {
            self.install_destroy_hook(handle, core_id);
        }
        handle.set_handle_data(Some(resource), uuid);

        match old_core_id {
            Some(id) => self.destroy_counterpart(id, previous),
            None => drop(previous),
        }

        self.broker.queue_modified(uuid);
        self.events.publish(ResourceEvent::Modified { uuid });
        log::debug!("Resource {uuid} modified");
        Ok(())
    }

    fn save(&self, handle: &HResource, path: &Path, overwrite: bool, compress: bool) -> Result<()> {
        let uuid = handle.uuid();
        let resource = handle
            .resource()
            .filter(|_| handle.is_loaded(false))
            .ok_or(ManagerError::NotLoaded(uuid))?;
        let serializable = resource
            .serializable()
            .ok_or(ManagerError::NotSerializable(uuid))?;

        if path.exists() && !overwrite {
            log::error!(
                "Cannot save resource: another file exists at '{}'.",
                path.display()
            );
            return Err(ManagerError::AlreadyExists(path.to_path_buf()));
        }

        let mut metadata = ResourceMetadata::new(uuid, resource.name(), serializable.format_id());
        metadata.dependencies = collect_dependencies(resource.as_ref())
            .iter()
            .map(HResource::uuid)
            .filter(|dependency| !dependency.is_nil() && *dependency != uuid)
            .collect();
        metadata.keep_source_data = resource.keep_source_data();
        if compress && serializable.is_compressible() {
            metadata.compression = CompressionMethod::Lz4;
        }

        let mut payload = Vec::new();
        serializable.encode(&mut payload)?;
        saved::write_saved(path, &metadata, &payload)?;

        if let Some(default) = self.manifests.write().first_mut() {
            default.register_resource(uuid, path);
        }
        log::debug!("Saved resource {uuid} to '{}'", path.display());
        Ok(())
    }
}
