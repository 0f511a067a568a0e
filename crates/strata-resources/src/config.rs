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

//! Configuration of the resource manager.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration of a [`ResourceManager`](crate::ResourceManager).
///
/// Every field has a default, so a RON document only needs to list the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceManagerConfig {
    /// Number of threads decoding asynchronous loads. At least one is spawned.
    pub worker_threads: usize,
    /// Name prefix of the loader threads.
    pub worker_name: String,
    /// Name of the manifest every manager starts with.
    pub default_manifest: String,
}

impl Default for ResourceManagerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            worker_name: "strata-loader".to_string(),
            default_manifest: "Default".to_string(),
        }
    }
}

impl ResourceManagerConfig {
    /// Parses a configuration from RON text.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        Ok(ron::from_str(source)?)
    }

    /// Reads a configuration from a RON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_ron_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = ResourceManagerConfig::from_ron_str("(worker_threads: 4)").expect("valid ron");
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.default_manifest, "Default");
        assert_eq!(config.worker_name, "strata-loader");
    }

    #[test]
    fn test_invalid_document_is_reported() {
        let result = ResourceManagerConfig::from_ron_str("(worker_threads: \"many\")");
        assert!(matches!(result, Err(crate::ManagerError::RonParse(_))));
    }
}
