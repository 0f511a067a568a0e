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

use super::broker::HandleReadinessBroker;
use crate::resource::{Resource, ResourceState, ResourceUUID, StateCell};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Callback run when the last strong handle to a resource is dropped.
///
/// It receives the identity of the resource and the resource itself (if it
/// was ever attached), so that its core-thread counterpart can be torn down
/// before the resource is released.
pub type DestroyHook = Box<dyn FnOnce(ResourceUUID, Option<Arc<dyn Resource>>) + Send>;

/// The control block shared by every handle to the same resource.
///
/// Exactly one control block exists per resource instance. The `is_created`
/// flag only ever goes from `false` to `true`, and only through
/// [`set_handle_data`](Self::set_handle_data).
pub struct ResourceHandleData {
    uuid: RwLock<ResourceUUID>,
    resource: RwLock<Option<Arc<dyn Resource>>>,
    is_created: AtomicBool,
    state: StateCell,
    broker: Arc<HandleReadinessBroker>,
    destroy_hook: Mutex<Option<DestroyHook>>,
}

impl ResourceHandleData {
    /// Creates an empty control block arbitrated by `broker`.
    pub fn new(uuid: ResourceUUID, broker: Arc<HandleReadinessBroker>) -> Self {
        Self {
            uuid: RwLock::new(uuid),
            resource: RwLock::new(None),
            is_created: AtomicBool::new(false),
            state: StateCell::new(),
            broker,
            destroy_hook: Mutex::new(None),
        }
    }

    /// The current identity of the resource.
    pub fn uuid(&self) -> ResourceUUID {
        *self.uuid.read()
    }

    /// The attached resource, if any.
    pub fn resource(&self) -> Option<Arc<dyn Resource>> {
        self.resource.read().clone()
    }

    /// Whether [`set_handle_data`](Self::set_handle_data) committed a resource.
    pub fn is_created(&self) -> bool {
        self.is_created.load(Ordering::Acquire)
    }

    /// The lifecycle state of the resource.
    pub fn state(&self) -> ResourceState {
        self.state.get()
    }

    /// The broker arbitrating this control block.
    pub fn broker(&self) -> &Arc<HandleReadinessBroker> {
        &self.broker
    }

    /// Marks the resource as being initialized (its core counterpart is being built).
    pub fn begin_initializing(&self) {
        self.state.advance(ResourceState::Initializing);
    }

    /// Attaches `resource` and `uuid` and flips the created flag.
    ///
    /// This is the only code path that makes a handle ready. The flag is set
    /// under the broker lock and every waiter is woken afterwards. Calling it
    /// again on a created block replaces the resource but does not broadcast
    /// again. Passing `None` leaves the block untouched. Returns `true` for the
    /// call that performed the transition.
    pub fn set_handle_data(&self, resource: Option<Arc<dyn Resource>>, uuid: ResourceUUID) -> bool {
        let Some(resource) = resource else {
            log::trace!("Ignoring empty handle data for {uuid}");
            return false;
        };

        *self.resource.write() = Some(resource);
        *self.uuid.write() = uuid;

        if self.is_created() {
            return false;
        }
        let first = self.broker.mark_created(&self.is_created, uuid);
        if first {
            self.state.advance(ResourceState::Loaded);
        }
        first
    }

    /// Replaces the hook run when the last strong handle is dropped.
    pub fn set_destroy_hook(&self, hook: DestroyHook) {
        *self.destroy_hook.lock() = Some(hook);
    }

    /// Removes the destroy hook without running it.
    pub fn clear_destroy_hook(&self) -> Option<DestroyHook> {
        self.destroy_hook.lock().take()
    }

    pub(crate) fn wait_created(&self) -> bool {
        self.broker.wait_created(&self.is_created)
    }
}

impl Drop for ResourceHandleData {
    fn drop(&mut self) {
        self.state.advance(ResourceState::Destroying);

        let uuid = *self.uuid.get_mut();
        let resource = self.resource.get_mut().take();
        if let Some(hook) = self.destroy_hook.get_mut().take() {
            hook(uuid, resource);
        } else {
            drop(resource);
        }

        self.state.advance(ResourceState::Destroyed);
        log::trace!("Resource {uuid} destroyed");
    }
}

impl std::fmt::Debug for ResourceHandleData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandleData")
            .field("uuid", &self.uuid())
            .field("is_created", &self.is_created())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
