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
use super::data::ResourceHandleData;
use super::weak::WeakResourceHandle;
use crate::error::{ResourceError, Result};
use crate::resource::{
    block_on_dependencies, dependencies_loaded, AsAny, Resource, ResourceState, ResourceUUID,
};
use std::marker::PhantomData;
use std::sync::Arc;

/// A type a [`ResourceHandle`] can resolve to.
///
/// Implemented for every concrete [`Resource`] and for `dyn Resource`.
pub trait HandleTarget: 'static {
    /// Converts a type-erased resource into `Self`, or `None` on a type mismatch.
    fn from_resource(resource: Arc<dyn Resource>) -> Option<Arc<Self>>;

    /// Erases the concrete type of a shared resource.
    fn into_resource(this: Arc<Self>) -> Arc<dyn Resource>;
}

impl<T: Resource> HandleTarget for T {
    fn from_resource(resource: Arc<dyn Resource>) -> Option<Arc<Self>> {
        AsAny::into_any_arc(resource).downcast::<T>().ok()
    }

    fn into_resource(this: Arc<Self>) -> Arc<dyn Resource> {
        this
    }
}

impl HandleTarget for dyn Resource {
    fn from_resource(resource: Arc<dyn Resource>) -> Option<Arc<Self>> {
        Some(resource)
    }

    fn into_resource(this: Arc<Self>) -> Arc<dyn Resource> {
        this
    }
}

/// A type-erased strong handle.
pub type HResource = ResourceHandle<dyn Resource>;

/// A strong, reference-counted handle to a resource.
///
/// A handle may exist long before its resource does: it is created pending,
/// handed out to consumers, and becomes loaded once a loader calls
/// [`set_handle_data`](Self::set_handle_data). Every clone shares the same
/// control block. Dropping the last strong handle destroys the resource.
///
/// A handle without a control block is a null handle: it never reports
/// loaded and never blocks.
pub struct ResourceHandle<T: ?Sized + 'static> {
    data: Option<Arc<ResourceHandleData>>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + 'static> ResourceHandle<T> {
    /// A handle without a control block.
    pub const fn null() -> Self {
        Self {
            data: None,
            _marker: PhantomData,
        }
    }

    /// Wraps an existing control block.
    pub fn from_data(data: Arc<ResourceHandleData>) -> Self {
        Self {
            data: Some(data),
            _marker: PhantomData,
        }
    }

    /// Creates a handle that is not loaded yet, arbitrated by the process-wide broker.
    pub fn pending(uuid: ResourceUUID) -> Self {
        Self::pending_with_broker(uuid, HandleReadinessBroker::current())
    }

    /// Creates a handle that is not loaded yet, arbitrated by `broker`.
    pub fn pending_with_broker(uuid: ResourceUUID, broker: Arc<HandleReadinessBroker>) -> Self {
        Self::from_data(Arc::new(ResourceHandleData::new(uuid, broker)))
    }

    /// The control block, unless this is a null handle.
    pub fn data(&self) -> Option<&Arc<ResourceHandleData>> {
        self.data.as_ref()
    }

    /// `true` when the handle has no control block.
    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    /// The identity of the resource, or the nil UUID for a null handle.
    pub fn uuid(&self) -> ResourceUUID {
        self.data
            .as_ref()
            .map_or_else(ResourceUUID::nil, |data| data.uuid())
    }

    /// The lifecycle state of the resource.
    ///
    /// A null handle reports [`ResourceState::Constructed`].
    pub fn state(&self) -> ResourceState {
        self.data
            .as_ref()
            .map_or(ResourceState::Constructed, |data| data.state())
    }

    /// `true` iff the handle has a control block, it was created and a
    /// resource is attached.
    ///
    /// With `check_dependencies`, every transitive dependency must be loaded
    /// as well. Never blocks.
    pub fn is_loaded(&self, check_dependencies: bool) -> bool {
        let Some(data) = &self.data else {
            return false;
        };
        if !data.is_created() {
            return false;
        }
        let Some(resource) = data.resource() else {
            return false;
        };

        !check_dependencies || dependencies_loaded(resource.as_ref())
    }

    /// Blocks the calling thread until the resource is loaded.
    ///
    /// Returns immediately for a null handle. When the thread had to wait, the
    /// listeners of this resource are notified right after waking. With
    /// `wait_for_dependencies`, the call then waits on every transitive
    /// dependency as well.
    ///
    /// There is no timeout: waiting on a handle that is never completed blocks
    /// forever, and so does waiting on the thread responsible for completing
    /// it. Callers that need a deadline should poll [`is_loaded`](Self::is_loaded).
    pub fn block_until_loaded(&self, wait_for_dependencies: bool) {
        let Some(data) = &self.data else {
            return;
        };

        if data.wait_created() {
            data.broker().notify_listeners(&data.uuid());
        }

        if wait_for_dependencies {
            if let Some(resource) = data.resource() {
                block_on_dependencies(resource.as_ref());
            }
        }
    }

    /// Checks that the resource is loaded before it is accessed.
    ///
    /// Only enforced when `debug_assertions` are enabled; release builds
    /// trust the caller and always return `Ok`.
    pub fn throw_if_not_loaded(&self) -> Result<()> {
        if cfg!(debug_assertions) && !self.is_loaded(false) {
            return Err(ResourceError::InvalidAccess { uuid: self.uuid() });
        }
        Ok(())
    }

    /// The attached resource, type-erased.
    pub fn resource(&self) -> Option<Arc<dyn Resource>> {
        self.data.as_ref().and_then(|data| data.resource())
    }

    /// Creates a weak handle to the same control block.
    pub fn downgrade(&self) -> WeakResourceHandle<T> {
        WeakResourceHandle::new(self.uuid(), self.data.as_ref().map(Arc::downgrade))
    }

    /// Reinterprets the handle as a handle to `U`.
    ///
    /// The cast itself is unchecked; a mismatch is reported by [`get`](Self::get).
    pub fn cast<U: ?Sized + HandleTarget>(&self) -> ResourceHandle<U> {
        ResourceHandle {
            data: self.data.clone(),
            _marker: PhantomData,
        }
    }

    /// Erases the resource type of the handle.
    pub fn untyped(&self) -> HResource {
        self.cast()
    }

    /// Number of strong handles sharing the control block.
    pub fn strong_count(&self) -> usize {
        self.data.as_ref().map_or(0, Arc::strong_count)
    }

    /// `true` when both handles share the same control block.
    pub fn ptr_eq<U: ?Sized + 'static>(&self, other: &ResourceHandle<U>) -> bool {
        match (&self.data, &other.data) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ?Sized + HandleTarget> ResourceHandle<T> {
    /// Creates a handle that is already loaded with `resource`.
    pub fn with_resource(resource: Arc<T>, uuid: ResourceUUID) -> Self {
        let handle = Self::pending(uuid);
        handle.set_handle_data(Some(resource), uuid);
        handle
    }

    /// Attaches the resource and its identity, making the handle loaded.
    ///
    /// See [`ResourceHandleData::set_handle_data`].
    pub fn set_handle_data(&self, resource: Option<Arc<T>>, uuid: ResourceUUID) -> bool {
        let Some(data) = &self.data else {
            return false;
        };
        data.set_handle_data(resource.map(T::into_resource), uuid)
    }

    /// Returns the resource.
    ///
    /// Fails with [`ResourceError::InvalidAccess`] if it is not loaded and with
    /// [`ResourceError::TypeMismatch`] if it is not a `T`.
    pub fn get(&self) -> Result<Arc<T>> {
        self.throw_if_not_loaded()?;
        let uuid = self.uuid();
        let resource = self
            .resource()
            .ok_or(ResourceError::InvalidAccess { uuid })?;
        T::from_resource(resource).ok_or(ResourceError::TypeMismatch {
            uuid,
            expected: std::any::type_name::<T>(),
        })
    }

    /// Returns the resource if it is loaded and of type `T`.
    pub fn try_get(&self) -> Option<Arc<T>> {
        if !self.is_loaded(false) {
            return None;
        }
        self.resource().and_then(T::from_resource)
    }
}

impl<T: ?Sized + 'static> Clone for ResourceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + 'static> Default for ResourceHandle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized + 'static, U: ?Sized + 'static> PartialEq<ResourceHandle<U>> for ResourceHandle<T> {
    fn eq(&self, other: &ResourceHandle<U>) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: ?Sized + 'static> Eq for ResourceHandle<T> {}

impl<T: ?Sized + 'static> std::fmt::Debug for ResourceHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("uuid", &self.uuid())
            .field("state", &self.state())
            .field("loaded", &self.is_loaded(false))
            .finish()
    }
}
