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

//! Error types of the handle and core-object layers.

use crate::core_object::CoreObjectId;
use crate::resource::ResourceUUID;
use thiserror::Error;

/// Errors reported by `strata-core`.
///
/// Most handle operations cannot fail. The variants below cover the debug-only
/// access guard, the opt-in dependency cycle diagnostic and the core-thread
/// synchronization channel.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A handle was dereferenced while its resource was not loaded.
    #[error("Invalid access: resource {uuid} is not loaded")]
    InvalidAccess {
        /// Identity of the handle that was accessed.
        uuid: ResourceUUID,
    },

    /// The loaded resource is not of the type the handle was cast to.
    #[error("Resource {uuid} is not a `{expected}`")]
    TypeMismatch {
        /// Identity of the mismatching resource.
        uuid: ResourceUUID,
        /// Name of the requested type.
        expected: &'static str,
    },

    /// A dependency cycle is reachable from the inspected resource.
    #[error("Dependency cycle detected: {}", format_path(.path))]
    DependencyCycle {
        /// The resources forming the cycle, starting and ending with the same UUID.
        path: Vec<ResourceUUID>,
    },

    /// A core object was addressed that the core thread does not know.
    #[error("Core object {0} is not registered")]
    UnknownCoreObject(CoreObjectId),

    /// The core thread has stopped and no longer accepts commands.
    #[error("The core thread is not running")]
    CoreThreadDisconnected,

    /// The core thread could not be spawned.
    #[error("Failed to spawn the core thread: {0}")]
    CoreThreadSpawn(#[from] std::io::Error),

    /// Writing a field into a sync buffer failed.
    #[error("Failed to encode core sync data: {0}")]
    SyncEncode(#[from] bincode::error::EncodeError),

    /// Reading a field back from a sync buffer failed.
    #[error("Failed to decode core sync data: {0}")]
    SyncDecode(#[from] bincode::error::DecodeError),
}

fn format_path(path: &[ResourceUUID]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Alias for `Result<T, ResourceError>`.
pub type Result<T> = std::result::Result<T, ResourceError>;
