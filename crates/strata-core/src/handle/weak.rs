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

use super::data::ResourceHandleData;
use super::strong::ResourceHandle;
use crate::resource::{ResourceState, ResourceUUID};
use std::marker::PhantomData;
use std::sync::Weak;

/// A non-owning handle to a resource.
///
/// Holds the UUID of the resource and a weak reference to its control block.
/// It does not keep the resource alive; once the last strong handle is gone,
/// [`upgrade`](Self::upgrade) returns `None`.
pub struct WeakResourceHandle<T: ?Sized + 'static> {
    uuid: ResourceUUID,
    data: Option<Weak<ResourceHandleData>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ?Sized + 'static> WeakResourceHandle<T> {
    pub(crate) fn new(uuid: ResourceUUID, data: Option<Weak<ResourceHandleData>>) -> Self {
        Self {
            uuid,
            data,
            _marker: PhantomData,
        }
    }

    /// The identity of the resource at the time the handle was downgraded.
    pub fn uuid(&self) -> ResourceUUID {
        self.uuid
    }

    /// Resolves to a strong handle if the resource is still alive.
    pub fn upgrade(&self) -> Option<ResourceHandle<T>> {
        self.data
            .as_ref()
            .and_then(Weak::upgrade)
            .map(ResourceHandle::from_data)
    }

    /// `true` while at least one strong handle exists.
    pub fn is_alive(&self) -> bool {
        self.data
            .as_ref()
            .is_some_and(|data| data.strong_count() > 0)
    }

    /// The lifecycle state of the resource; `Destroyed` once it is gone.
    pub fn state(&self) -> ResourceState {
        match self.data.as_ref().and_then(Weak::upgrade) {
            Some(data) => data.state(),
            None if self.data.is_some() => ResourceState::Destroyed,
            None => ResourceState::Constructed,
        }
    }
}

impl<T: ?Sized + 'static> Clone for WeakResourceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            uuid: self.uuid,
            data: self.data.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + 'static> Default for WeakResourceHandle<T> {
    fn default() -> Self {
        Self::new(ResourceUUID::nil(), None)
    }
}

impl<T: ?Sized + 'static> std::fmt::Debug for WeakResourceHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakResourceHandle")
            .field("uuid", &self.uuid)
            .field("alive", &self.is_alive())
            .finish()
    }
}
