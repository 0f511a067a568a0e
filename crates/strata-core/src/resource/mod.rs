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

//! Foundational traits and types for loadable resources.
//!
//! A resource is any piece of loadable content (a texture, a mesh, a font).
//! The handle layer never looks inside a resource: it only needs its name,
//! the list of other resources it depends on, and optional hooks for
//! serialization and for building a core-thread counterpart.

mod dependencies;
mod metadata;
mod state;
mod uuid;

pub use dependencies::{collect_dependencies, find_dependency_cycle};
pub use metadata::{CompressionMethod, ResourceMetadata};
pub use state::ResourceState;
pub use self::uuid::ResourceUUID;

pub(crate) use dependencies::{block_on_dependencies, dependencies_loaded};
pub(crate) use state::StateCell;

use crate::core_object::CoreCounterpart;
use crate::handle::HResource;
use std::any::Any;
use std::sync::Arc;

/// Type-erasure helper used to downcast resources back to their concrete type.
///
/// It is implemented for every `Send + Sync + 'static` type, so resource
/// authors never implement it by hand.
pub trait AsAny: Any + Send + Sync {
    /// Borrows `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;

    /// Converts a shared pointer to `self` into a type-erased shared pointer.
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Loadable content referenced through resource handles.
///
/// Resources are immutable once they are registered with a handle. Concurrent
/// reads are safe; a resource that needs interior mutation is responsible for
/// its own locking.
pub trait Resource: AsAny {
    /// Display name of the resource.
    fn name(&self) -> &str;

    /// Human-readable name of the concrete resource type.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Whether the resource keeps its source data around after it was loaded.
    fn keep_source_data(&self) -> bool {
        false
    }

    /// Visits the resources this one depends on.
    ///
    /// The handles passed to `visit` are only borrowed for the duration of the
    /// call. Use [`collect_dependencies`] to keep an owned copy.
    ///
    /// Dependency graphs must be acyclic. Cascading loaded checks and waits do
    /// not guard against cycles; see [`find_dependency_cycle`] for an explicit
    /// diagnostic.
    fn visit_dependencies(&self, visit: &mut dyn FnMut(&HResource)) {
        let _ = visit;
    }

    /// The serialization facet of this resource, if it can be saved.
    fn serializable(&self) -> Option<&dyn Serializable> {
        None
    }

    /// Builds the core-thread counterpart of this resource, if it has one.
    fn create_core(&self) -> Option<Box<dyn CoreCounterpart>> {
        None
    }
}

/// Serialization facet of a resource.
///
/// Encoding lives on the resource; decoding is done by the loader registered
/// for the same [`format_id`](Serializable::format_id).
pub trait Serializable {
    /// Identifier of the encoded format (the type id stored in saved headers).
    fn format_id(&self) -> &'static str;

    /// Appends the encoded payload to `out`.
    fn encode(&self, out: &mut Vec<u8>) -> crate::Result<()>;

    /// Whether the payload may be compressed when saved.
    fn is_compressible(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for dyn Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name())
            .field("type", &self.type_name())
            .finish()
    }
}
