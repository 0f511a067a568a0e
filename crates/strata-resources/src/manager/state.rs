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

//! Bookkeeping shared by every load.

use std::collections::HashMap;
use std::sync::Arc;
use strata_core::core_object::CoreObjectId;
use strata_core::{HResource, Resource, ResourceUUID, WeakResourceHandle};

/// A resource whose handle was committed.
#[derive(Debug, Default)]
pub(crate) struct LoadedEntry {
    pub handle: WeakResourceHandle<dyn Resource>,
    /// Outstanding internal references.
    pub internal_refs: u32,
    /// Strong handle kept while `internal_refs > 0`.
    pub pin: Option<HResource>,
    /// Counterpart living on the core thread.
    pub core_id: Option<CoreObjectId>,
}

impl LoadedEntry {
    pub(crate) fn new(handle: &HResource) -> Self {
        Self {
            handle: handle.downgrade(),
            ..Self::default()
        }
    }

    pub(crate) fn add_internal_ref(&mut self, handle: &HResource) {
        self.internal_refs += 1;
        if self.pin.is_none() {
            self.pin = Some(handle.clone());
        }
    }

    /// Drops one internal reference. Returns the pin once the last one is gone.
    #[must_use]
    pub(crate) fn remove_internal_ref(&mut self) -> Option<HResource> {
        self.internal_refs = self.internal_refs.saturating_sub(1);
        if self.internal_refs == 0 {
            self.pin.take()
        } else {
            None
        }
    }
}

/// A resource that is decoding or waiting on its dependencies.
pub(crate) struct InProgress {
    pub handle: HResource,
    pub decoded: Option<Arc<dyn Resource>>,
    /// Own decode plus dependencies still loading.
    pub remaining: u32,
    /// Own decode plus every dependency that was loading when registered.
    pub total: u32,
    pub internal_refs: u32,
    pub own_done: bool,
    pub failed: bool,
    pub notify_immediately: bool,
}

impl InProgress {
    pub(crate) fn new(handle: HResource, keep_internal_ref: bool, synchronous: bool) -> Self {
        Self {
            handle,
            decoded: None,
            remaining: 1,
            total: 1,
            internal_refs: u32::from(keep_internal_ref),
            own_done: false,
            failed: false,
            notify_immediately: synchronous,
        }
    }
}

/// A load that reached zero remaining steps.
pub(crate) struct Finished {
    pub uuid: ResourceUUID,
    pub handle: HResource,
    pub resource: Option<Arc<dyn Resource>>,
    pub notify_immediately: bool,
    /// Pin of a stale entry replaced by this load, dropped outside the lock.
    pub displaced: Option<HResource>,
    /// Counterpart of a resource created on the same handle while this load
    /// was in flight. Replaced by the counterpart of the loaded resource.
    pub displaced_core: Option<CoreObjectId>,
}

#[derive(Default)]
pub(crate) struct ManagerState {
    pub handles: HashMap<ResourceUUID, WeakResourceHandle<dyn Resource>>,
    pub loaded: HashMap<ResourceUUID, LoadedEntry>,
    pub in_progress: HashMap<ResourceUUID, InProgress>,
    /// For each loading resource, the resources waiting on it.
    pub dependants: HashMap<ResourceUUID, Vec<ResourceUUID>>,
}

impl ManagerState {
    /// The live handle registered for `uuid`.
    pub(crate) fn live_handle(&self, uuid: &ResourceUUID) -> Option<HResource> {
        self.handles.get(uuid).and_then(WeakResourceHandle::upgrade)
    }

    /// Records `dependant` as waiting on `dependency`, if the latter is still loading.
    pub(crate) fn add_dependant(&mut self, dependency: ResourceUUID, dependant: ResourceUUID) -> bool {
        if !self.in_progress.contains_key(&dependency) {
            return false;
        }
        let Some(entry) = self.in_progress.get_mut(&dependant) else {
            return false;
        };
        entry.remaining += 1;
        entry.total += 1;
        self.dependants.entry(dependency).or_default().push(dependant);
        true
    }

    /// Completes one step of the load of `uuid`.
    ///
    /// When nothing remains the entry leaves the in-progress set, successful
    /// loads enter the loaded set, and every dependant completes a step in
    /// turn. Finished loads are appended to `finished` dependencies first.
    pub(crate) fn complete_step(&mut self, uuid: ResourceUUID, finished: &mut Vec<Finished>) {
        let Some(entry) = self.in_progress.get_mut(&uuid) else {
            return;
        };
        entry.remaining = entry.remaining.saturating_sub(1);
        if entry.remaining > 0 {
            return;
        }

        let Some(entry) = self.in_progress.remove(&uuid) else {
            return;
        };
        let resource = if entry.failed { None } else { entry.decoded };
        let mut displaced = None;
        let mut displaced_core = None;
        if resource.is_some() {
            let mut loaded = LoadedEntry::new(&entry.handle);
            for _ in 0..entry.internal_refs {
                loaded.add_internal_ref(&entry.handle);
            }
            if let Some(previous) = self.loaded.insert(uuid, loaded) {
                // A dead handle tears its own counterpart down.
                if previous.handle.is_alive() {
                    displaced_core = previous.core_id;
                }
                displaced = previous.pin;
            }
        }
        finished.push(Finished {
            uuid,
            handle: entry.handle,
            resource,
            notify_immediately: entry.notify_immediately,
            displaced,
            displaced_core,
        });

        for dependant in self.dependants.remove(&uuid).unwrap_or_default() {
            self.complete_step(dependant, finished);
        }
    }

    /// Removes the loaded entry of `uuid` if its handle is gone.
    pub(crate) fn remove_stale(&mut self, uuid: &ResourceUUID) -> Option<LoadedEntry> {
        let stale = self
            .loaded
            .get(uuid)
            .is_some_and(|entry| !entry.handle.is_alive());
        if stale {
            self.loaded.remove(uuid)
        } else {
            None
        }
    }

    /// Whether a loaded resource has no users besides the manager.
    pub(crate) fn is_unused(entry: &LoadedEntry) -> bool {
        entry
            .pin
            .as_ref()
            .is_some_and(|pin| pin.strong_count() == 1)
    }
}
