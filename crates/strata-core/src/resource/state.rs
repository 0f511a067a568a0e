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

use std::sync::atomic::{AtomicU8, Ordering};

/// The one-way lifecycle of a resource as seen through its handle.
///
/// States only ever advance. There is no path back from `Loaded` to
/// `Initializing`, and a destroyed resource is never revived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ResourceState {
    /// The handle exists but nothing has been registered with it yet.
    Constructed = 0,
    /// The resource is being initialized (its core counterpart is being built).
    Initializing = 1,
    /// The resource is registered and reachable through handles.
    Loaded = 2,
    /// The last strong handle was released; the core counterpart is torn down first.
    Destroying = 3,
    /// The resource is gone. Weak handles resolve to nothing.
    Destroyed = 4,
}

impl ResourceState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Constructed,
            1 => Self::Initializing,
            2 => Self::Loaded,
            3 => Self::Destroying,
            _ => Self::Destroyed,
        }
    }
}

/// Atomic storage for a [`ResourceState`] that refuses to move backwards.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ResourceState::Constructed as u8))
    }

    pub(crate) fn get(&self) -> ResourceState {
        ResourceState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `state` if it lies ahead of the current one. Returns the previous state.
    pub(crate) fn advance(&self, state: ResourceState) -> ResourceState {
        ResourceState::from_u8(self.0.fetch_max(state as u8, Ordering::AcqRel))
    }
}
