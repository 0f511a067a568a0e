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

//! The single arbitration point for handle readiness transitions.

use super::listener::{ListenerEvent, ListenerRegistry, ResourceListener};
use crate::resource::ResourceUUID;
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

static CURRENT: RwLock<Option<Arc<HandleReadinessBroker>>> = parking_lot::const_rwlock(None);

/// Owns the mutex/condition variable pair shared by every handle.
///
/// All "pending to ready" transitions of the handles created against a broker
/// go through [`mark_created`](Self::mark_created), and every blocked waiter
/// sleeps on the same condition variable, re-checking its own flag on wake-up.
/// A broadcast for one handle therefore wakes waiters of unrelated handles,
/// which simply go back to sleep.
///
/// The process-wide instance has an explicit lifecycle:
/// [`init`](Self::init) before the first handle is created and
/// [`teardown`](Self::teardown) after the last one was released. Handles keep
/// their own `Arc` of the broker they were created with, so a teardown never
/// invalidates live handles.
///
/// The broker also hosts the resource listener registry, so that a waiter
/// woken by a readiness transition can notify observers of that resource
/// synchronously instead of waiting for the next dispatch tick.
pub struct HandleReadinessBroker {
    lock: Mutex<()>,
    ready: Condvar,
    broadcasts: AtomicU64,
    listeners: Mutex<ListenerRegistry>,
}

impl HandleReadinessBroker {
    /// Creates an isolated broker, not installed as the process-wide instance.
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            ready: Condvar::new(),
            broadcasts: AtomicU64::new(0),
            listeners: Mutex::new(ListenerRegistry::default()),
        }
    }

    /// Installs the process-wide broker and returns it.
    ///
    /// Calling `init` while a broker is already installed returns the existing one.
    pub fn init() -> Arc<Self> {
        let mut current = CURRENT.write();
        if let Some(existing) = current.as_ref() {
            log::debug!("Handle readiness broker already initialized");
            return Arc::clone(existing);
        }
        let broker = Arc::new(Self::new());
        *current = Some(Arc::clone(&broker));
        log::info!("Handle readiness broker initialized");
        broker
    }

    /// Returns the process-wide broker, installing one if none exists.
    pub fn current() -> Arc<Self> {
        if let Some(existing) = CURRENT.read().as_ref() {
            return Arc::clone(existing);
        }
        log::debug!("No handle readiness broker installed, initializing one on first use");
        Self::init()
    }

    /// Removes the process-wide broker and returns it, if one was installed.
    pub fn teardown() -> Option<Arc<Self>> {
        let removed = CURRENT.write().take();
        if removed.is_some() {
            log::info!("Handle readiness broker torn down");
        }
        removed
    }

    /// Flips `created` to `true` under the broker lock and wakes every waiter.
    ///
    /// Returns `true` only for the call that performed the transition. Later
    /// calls leave the flag untouched and do not broadcast again.
    pub(crate) fn mark_created(&self, created: &AtomicBool, uuid: ResourceUUID) -> bool {
        {
            let _guard = self.lock.lock();
            if created.swap(true, Ordering::AcqRel) {
                return false;
            }
            // Queued before any waiter can observe the flag.
            self.listeners.lock().queue(uuid, ListenerEvent::Loaded);
        }

        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.ready.notify_all();
        log::trace!("Resource {uuid} is ready");
        true
    }

    /// Blocks until `created` is `true`.
    ///
    /// Returns `true` if the calling thread actually had to wait. There is no
    /// timeout: a flag that never flips blocks forever.
    pub(crate) fn wait_created(&self, created: &AtomicBool) -> bool {
        if created.load(Ordering::Acquire) {
            return false;
        }

        let mut guard = self.lock.lock();
        while !created.load(Ordering::Acquire) {
            self.ready.wait(&mut guard);
        }
        true
    }

    /// Wakes every waiter without changing any flag.
    ///
    /// Waiters re-check their own predicate and keep waiting.
    pub fn wake_all(&self) {
        let _guard = self.lock.lock();
        self.ready.notify_all();
    }

    /// Number of readiness broadcasts issued so far.
    pub fn broadcast_count(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }

    /// Subscribes `listener` to notifications about `uuid`.
    pub fn subscribe(&self, uuid: ResourceUUID, listener: &Arc<dyn ResourceListener>) {
        self.listeners.lock().subscribe(uuid, listener);
    }

    /// Removes `listener` from the subscribers of `uuid`.
    pub fn unsubscribe(&self, uuid: &ResourceUUID, listener: &Arc<dyn ResourceListener>) {
        self.listeners.lock().unsubscribe(uuid, listener);
    }

    /// Queues a modification notification for the next dispatch.
    pub fn queue_modified(&self, uuid: ResourceUUID) {
        self.listeners.lock().queue(uuid, ListenerEvent::Modified);
    }

    /// Notifies the listeners of `uuid` that it is loaded, right now.
    ///
    /// The queued notification for that resource, if any, is consumed so the
    /// listeners are not called a second time on the next dispatch.
    pub fn notify_listeners(&self, uuid: &ResourceUUID) {
        let listeners = self.listeners.lock().take_loaded(uuid);
        for listener in listeners {
            listener.on_resource_loaded(uuid);
        }
    }

    /// Delivers every queued notification. Returns how many were delivered.
    pub fn dispatch_pending(&self) -> usize {
        let pending = self.listeners.lock().drain_pending();
        let count = pending.len();
        for (uuid, event) in pending {
            let listeners = self.listeners.lock().live_listeners(&uuid);
            for listener in listeners {
                match event {
                    ListenerEvent::Loaded => listener.on_resource_loaded(&uuid),
                    ListenerEvent::Modified => listener.on_resource_modified(&uuid),
                }
            }
        }
        count
    }

    /// Number of notifications waiting for the next dispatch.
    pub fn pending_notifications(&self) -> usize {
        self.listeners.lock().pending_len()
    }
}

impl Default for HandleReadinessBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandleReadinessBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleReadinessBroker")
            .field("broadcasts", &self.broadcast_count())
            .finish_non_exhaustive()
    }
}
