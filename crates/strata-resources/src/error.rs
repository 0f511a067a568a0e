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

//! Errors reported by the resource manager.

use std::error::Error as StdError;
use std::path::PathBuf;
use strata_core::{ResourceError, ResourceUUID};
use thiserror::Error;

/// A boxed error returned by loaders.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors reported by the resource manager.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// No file exists at the requested path.
    #[error("Cannot load resource: file '{}' doesn't exist", .0.display())]
    FileNotFound(PathBuf),

    /// No manifest maps the UUID to a file and no handle is loaded for it.
    #[error("Cannot load resource: no file is known for {0}")]
    UnknownResource(ResourceUUID),

    /// No loader is registered for the type id found in a saved resource.
    #[error("No loader registered for resource type '{0}'")]
    LoaderMissing(String),

    /// The loader failed to decode the payload.
    #[error("Failed to decode '{name}': {source}")]
    Decode {
        /// Name of the resource being decoded.
        name: String,
        /// Cause reported by the loader.
        source: BoxError,
    },

    /// The file does not start with a saved resource header.
    #[error("'{}' is not a saved resource file", .0.display())]
    InvalidFile(PathBuf),

    /// The resource has no serialization facet.
    #[error("Resource {0} cannot be saved")]
    NotSerializable(ResourceUUID),

    /// The operation needs a loaded resource.
    #[error("Resource {0} is not loaded")]
    NotLoaded(ResourceUUID),

    /// Saving would overwrite a file while overwriting was not allowed.
    #[error("Another file exists at '{}'", .0.display())]
    AlreadyExists(PathBuf),

    /// The manager was shut down.
    #[error("The resource manager is shut down")]
    ShutDown,

    /// An I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding a saved resource header failed.
    #[error("Failed to encode resource header: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// Decoding a saved resource header failed.
    #[error("Failed to decode resource header: {0}")]
    HeaderDecode(#[from] bincode::error::DecodeError),

    /// A RON document could not be parsed.
    #[error("Invalid RON document: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// A RON document could not be written.
    #[error("Failed to write RON document: {0}")]
    Ron(#[from] ron::Error),

    /// An error from the handle or core-object layer.
    #[error(transparent)]
    Core(#[from] ResourceError),
}

/// Alias for `Result<T, ManagerError>`.
pub type Result<T> = std::result::Result<T, ManagerError>;
