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

//! Decoders turning saved payloads back into resources.
//!
//! Loaders are registered per format id, the identifier a resource reports
//! through its [`Serializable`](strata_core::resource::Serializable) facet and
//! that ends up in the header of every saved file.

use crate::error::BoxError;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use strata_core::resource::ResourceMetadata;
use strata_core::{HResource, Resource, ResourceUUID};

/// Decodes the payload of a saved resource of type `R`.
pub trait ResourceLoader<R: Resource>: Send + Sync {
    /// Builds the resource from the payload that follows the saved header.
    ///
    /// Handles to the dependencies listed in the header are available from
    /// `context`.
    fn load(&self, bytes: &[u8], context: &LoadContext<'_>) -> Result<R, BoxError>;
}

/// What a loader knows about the resource it is decoding.
#[derive(Debug)]
pub struct LoadContext<'a> {
    metadata: &'a ResourceMetadata,
    dependencies: &'a HashMap<ResourceUUID, HResource>,
    keep_source_data: bool,
}

impl<'a> LoadContext<'a> {
    /// Describes the decode of the resource `metadata` belongs to.
    ///
    /// Handles missing from `dependencies` resolve to null handles.
    pub fn new(
        metadata: &'a ResourceMetadata,
        dependencies: &'a HashMap<ResourceUUID, HResource>,
        keep_source_data: bool,
    ) -> Self {
        Self {
            metadata,
            dependencies,
            keep_source_data,
        }
    }

    /// The header of the file being decoded.
    pub fn metadata(&self) -> &ResourceMetadata {
        self.metadata
    }

    /// Identity of the resource being decoded.
    pub fn uuid(&self) -> ResourceUUID {
        self.metadata.uuid
    }

    /// Display name stored in the header.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Whether the decoded resource should keep its source data.
    pub fn keep_source_data(&self) -> bool {
        self.keep_source_data
    }

    /// The handle of a dependency declared in the header.
    ///
    /// The handle may still be loading. Undeclared identities give a null handle.
    pub fn dependency(&self, uuid: &ResourceUUID) -> HResource {
        self.dependencies.get(uuid).cloned().unwrap_or_default()
    }
}

/// Internal trait for decoding any resource type.
pub(crate) trait AnyResourceLoader: Send + Sync {
    fn load_any(&self, bytes: &[u8], context: &LoadContext<'_>) -> Result<Arc<dyn Resource>, BoxError>;
}

struct ResourceLoaderWrapper<R, L>(L, PhantomData<fn() -> R>);

impl<R: Resource, L: ResourceLoader<R>> AnyResourceLoader for ResourceLoaderWrapper<R, L> {
    fn load_any(&self, bytes: &[u8], context: &LoadContext<'_>) -> Result<Arc<dyn Resource>, BoxError> {
        let resource: R = self.0.load(bytes, context)?;
        Ok(Arc::new(resource))
    }
}

/// Maps format ids to type-erased loaders.
#[derive(Default)]
pub(crate) struct LoaderRegistry {
    loaders: HashMap<String, Arc<dyn AnyResourceLoader>>,
}

impl LoaderRegistry {
    /// Registers `loader` for `format_id`, replacing any previous one.
    pub(crate) fn register<R: Resource>(
        &mut self,
        format_id: &str,
        loader: impl ResourceLoader<R> + 'static,
    ) {
        let wrapped = ResourceLoaderWrapper(loader, PhantomData);
        if self
            .loaders
            .insert(format_id.to_string(), Arc::new(wrapped))
            .is_some()
        {
            log::warn!("Replacing the loader registered for '{format_id}'");
        }
    }

    pub(crate) fn get(&self, format_id: &str) -> Option<Arc<dyn AnyResourceLoader>> {
        self.loaders.get(format_id).cloned()
    }

    pub(crate) fn contains(&self, format_id: &str) -> bool {
        self.loaders.contains_key(format_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blob {
        name: String,
        bytes: Vec<u8>,
    }

    impl Resource for Blob {
        fn name(&self) -> &str {
            &self.name
        }
    }

    struct BlobLoader;

    impl ResourceLoader<Blob> for BlobLoader {
        fn load(&self, bytes: &[u8], context: &LoadContext<'_>) -> Result<Blob, BoxError> {
            if bytes.is_empty() {
                return Err("empty blob".into());
            }
            Ok(Blob {
                name: context.name().to_string(),
                bytes: bytes.to_vec(),
            })
        }
    }

    #[test]
    fn test_registry_erases_loader_type() {
        let mut registry = LoaderRegistry::default();
        registry.register("blob", BlobLoader);
        assert!(registry.contains("blob"));
        assert!(registry.get("mesh").is_none());

        let metadata = ResourceMetadata::new(ResourceUUID::new_v5("blob"), "my blob", "blob");
        let dependencies = HashMap::new();
        let context = LoadContext::new(&metadata, &dependencies, false);
        let loader = registry.get("blob").expect("registered");

        let resource = loader.load_any(&[1, 2, 3], &context).expect("decoded");
        assert_eq!(resource.name(), "my blob");
        let blob = (*resource).as_any().downcast_ref::<Blob>().expect("a blob");
        assert_eq!(blob.bytes, vec![1, 2, 3]);

        let error = loader.load_any(&[], &context).err().expect("empty payload rejected");
        assert_eq!(error.to_string(), "empty blob");
    }

    #[test]
    fn test_undeclared_dependency_is_null() {
        let metadata = ResourceMetadata::new(ResourceUUID::new(), "lonely", "blob");
        let dependencies = HashMap::new();
        let context = LoadContext::new(&metadata, &dependencies, true);
        assert!(context.dependency(&ResourceUUID::new()).is_null());
        assert!(context.keep_source_data());
        assert_eq!(context.uuid(), metadata.uuid);
    }
}
