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

use super::uuid::ResourceUUID;
use serde::{Deserialize, Serialize};

/// How the payload following a saved header is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionMethod {
    /// The payload is stored as produced by the resource.
    #[default]
    None,
    /// The payload is an LZ4 block.
    Lz4,
}

/// Serializable description of a saved resource.
///
/// This is the "identity card" written in front of every saved resource
/// payload. It can be read without decoding the payload, which lets a manager
/// discover the dependencies of a file before deciding what to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    /// The unique, stable identifier of the resource.
    pub uuid: ResourceUUID,

    /// Display name of the resource.
    pub name: String,

    /// Identifier of the serialization format, used to select a loader.
    pub type_id: String,

    /// Resources that must be loaded for this one to be fully usable.
    pub dependencies: Vec<ResourceUUID>,

    /// Whether the resource asked to keep its source data around after load.
    pub keep_source_data: bool,

    /// Encoding of the payload.
    pub compression: CompressionMethod,
}

impl ResourceMetadata {
    /// Creates metadata with no dependencies.
    pub fn new(uuid: ResourceUUID, name: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            type_id: type_id.into(),
            dependencies: Vec::new(),
            keep_source_data: false,
            compression: CompressionMethod::None,
        }
    }

    /// Returns the dependencies excluding self-references.
    pub fn external_dependencies(&self) -> impl Iterator<Item = ResourceUUID> + '_ {
        self.dependencies
            .iter()
            .copied()
            .filter(move |dependency| *dependency != self.uuid)
    }
}
