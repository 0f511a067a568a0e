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

//! Lifecycle events published by resource managers.

mod bus;

pub use bus::EventBus;

use crate::resource::ResourceUUID;

/// A change in the lifecycle of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEvent {
    /// The resource and, if requested, its dependencies finished loading.
    Loaded {
        /// Identity of the resource.
        uuid: ResourceUUID,
    },
    /// The payload of a loaded resource was replaced.
    Modified {
        /// Identity of the resource.
        uuid: ResourceUUID,
    },
    /// The last strong handle was released and the resource was destroyed.
    Destroyed {
        /// Identity of the resource.
        uuid: ResourceUUID,
    },
    /// An asynchronous load failed. Handles to it never complete.
    LoadFailed {
        /// Identity of the resource.
        uuid: ResourceUUID,
        /// Path the resource was loaded from.
        path: String,
        /// Human-readable cause.
        reason: String,
    },
}

impl ResourceEvent {
    /// The resource the event is about.
    pub fn uuid(&self) -> ResourceUUID {
        match self {
            Self::Loaded { uuid }
            | Self::Modified { uuid }
            | Self::Destroyed { uuid }
            | Self::LoadFailed { uuid, .. } => *uuid,
        }
    }
}
