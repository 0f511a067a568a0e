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

//! Per-resource observers notified when a resource becomes available or changes.

use crate::resource::ResourceUUID;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

/// Receives notifications about a specific resource.
///
/// Listeners are held weakly: dropping the last `Arc` to a listener
/// unsubscribes it implicitly.
pub trait ResourceListener: Send + Sync {
    /// Called once the resource identified by `uuid` is loaded.
    fn on_resource_loaded(&self, uuid: &ResourceUUID);

    /// Called after the payload of an already loaded resource was replaced.
    fn on_resource_modified(&self, uuid: &ResourceUUID) {
        let _ = uuid;
    }
}

/// Kind of a queued listener notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerEvent {
    /// The resource became loaded.
    Loaded,
    /// The resource payload was replaced.
    Modified,
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: HashMap<ResourceUUID, Vec<Weak<dyn ResourceListener>>>,
    pending: Vec<(ResourceUUID, ListenerEvent)>,
    queued: HashSet<(ResourceUUID, ListenerEvent)>,
}

impl ListenerRegistry {
    pub(crate) fn subscribe(&mut self, uuid: ResourceUUID, listener: &Arc<dyn ResourceListener>) {
        let entry = self.listeners.entry(uuid).or_default();
        entry.retain(|existing| existing.strong_count() > 0);
        entry.push(Arc::downgrade(listener));
    }

    pub(crate) fn unsubscribe(&mut self, uuid: &ResourceUUID, listener: &Arc<dyn ResourceListener>) {
        let target = Arc::as_ptr(listener) as *const ();
        if let Some(entry) = self.listeners.get_mut(uuid) {
            entry.retain(|existing| {
                existing.strong_count() > 0 && existing.as_ptr() as *const () != target
            });
            if entry.is_empty() {
                self.listeners.remove(uuid);
            }
        }
    }

    /// Queues a notification for the next dispatch.
    ///
    /// Duplicates are collapsed. Nothing is queued for a resource without a
    /// live listener.
    pub(crate) fn queue(&mut self, uuid: ResourceUUID, event: ListenerEvent) {
        if !self.has_listeners(&uuid) {
            return;
        }
        if self.queued.insert((uuid, event)) {
            self.pending.push((uuid, event));
        }
    }

    /// Removes the queued `Loaded` entry for `uuid` and returns the live listeners.
    pub(crate) fn take_loaded(&mut self, uuid: &ResourceUUID) -> Vec<Arc<dyn ResourceListener>> {
        let key = (*uuid, ListenerEvent::Loaded);
        if self.queued.remove(&key) {
            self.pending.retain(|queued| *queued != key);
        }
        self.live_listeners(uuid)
    }

    pub(crate) fn drain_pending(&mut self) -> Vec<(ResourceUUID, ListenerEvent)> {
        self.queued.clear();
        std::mem::take(&mut self.pending)
    }

    fn has_listeners(&mut self, uuid: &ResourceUUID) -> bool {
        let Some(entry) = self.listeners.get_mut(uuid) else {
            return false;
        };
        entry.retain(|existing| existing.strong_count() > 0);
        if entry.is_empty() {
            self.listeners.remove(uuid);
            return false;
        }
        true
    }

    pub(crate) fn live_listeners(&mut self, uuid: &ResourceUUID) -> Vec<Arc<dyn ResourceListener>> {
        let Some(entry) = self.listeners.get_mut(uuid) else {
            return Vec::new();
        };
        let live: Vec<_> = entry.iter().filter_map(Weak::upgrade).collect();
        if live.len() != entry.len() {
            entry.retain(|existing| existing.strong_count() > 0);
        }
        live
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
