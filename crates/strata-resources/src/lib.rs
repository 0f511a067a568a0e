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

//! # Strata Resources
//!
//! The resource manager built on the handle system of `strata-core`.
//!
//! A [`ResourceManager`] decodes saved resource files through loaders
//! registered per format id, resolves references between resources through
//! [`ResourceManifest`]s, and hands out handles that complete once a resource
//! and its dependencies are loaded.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod flags;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod saved;

pub use config::ResourceManagerConfig;
pub use error::{BoxError, ManagerError, Result};
pub use flags::ResourceLoadFlags;
pub use loader::{LoadContext, ResourceLoader};
pub use manager::ResourceManager;
pub use manifest::ResourceManifest;
