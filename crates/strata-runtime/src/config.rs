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

//! Runtime configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strata_core::core_object::CoreThreadConfig;
use strata_resources::ResourceManagerConfig;

/// Configuration of the demo runtime, read from a RON file.
///
/// Every field is optional in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory the demo content is written to and loaded from.
    pub content_dir: PathBuf,
    /// Number of simulated frames.
    pub frames: u32,
    /// Target duration of one frame, in milliseconds.
    pub frame_time_ms: u64,
    /// Rewrite the demo content even if it already exists.
    pub regenerate_content: bool,
    pub resources: ResourceManagerConfig,
    pub core: CoreThreadConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            content_dir: std::env::temp_dir().join("strata-demo"),
            frames: 120,
            frame_time_ms: 16,
            regenerate_content: false,
            resources: ResourceManagerConfig::default(),
            core: CoreThreadConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).context("Invalid runtime configuration")
    }

    /// Reads the configuration at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            log::info!("No configuration file given, using defaults.");
            return Ok(Self::default());
        };
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?;
        Self::from_ron_str(&source)
    }
}
