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

//! UUID to file path mappings.
//!
//! Resources reference each other by UUID. A manifest is what turns such a
//! reference back into a file on disk, so it has to be saved alongside the
//! resources and restored on startup for references to survive a restart.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use strata_core::ResourceUUID;

/// A named, bidirectional UUID to file path map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceManifest {
    name: String,
    uuid_to_path: HashMap<ResourceUUID, PathBuf>,
    path_to_uuid: HashMap<PathBuf, ResourceUUID>,
}

#[derive(Serialize, Deserialize)]
struct ManifestEntry {
    uuid: ResourceUUID,
    path: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct ManifestDocument {
    name: String,
    entries: Vec<ManifestEntry>,
}

impl ResourceManifest {
    /// Creates an empty manifest.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Name of the manifest.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maps `uuid` to `path`, dropping any previous mapping of either side.
    pub fn register_resource(&mut self, uuid: ResourceUUID, path: impl Into<PathBuf>) {
        let path = path.into();
        if let Some(previous) = self.uuid_to_path.insert(uuid, path.clone()) {
            if previous != path {
                self.path_to_uuid.remove(&previous);
            }
        }
        if let Some(previous) = self.path_to_uuid.insert(path, uuid) {
            if previous != uuid {
                self.uuid_to_path.remove(&previous);
            }
        }
    }

    /// Removes the mapping of `uuid`. Returns the path it was mapped to.
    pub fn unregister_resource(&mut self, uuid: &ResourceUUID) -> Option<PathBuf> {
        let path = self.uuid_to_path.remove(uuid)?;
        self.path_to_uuid.remove(&path);
        Some(path)
    }

    /// The file `uuid` is stored in.
    pub fn uuid_to_file_path(&self, uuid: &ResourceUUID) -> Option<&Path> {
        self.uuid_to_path.get(uuid).map(PathBuf::as_path)
    }

    /// The resource stored in `path`.
    pub fn file_path_to_uuid(&self, path: &Path) -> Option<ResourceUUID> {
        self.path_to_uuid.get(path).copied()
    }

    /// `true` if `uuid` is mapped.
    pub fn contains_uuid(&self, uuid: &ResourceUUID) -> bool {
        self.uuid_to_path.contains_key(uuid)
    }

    /// `true` if `path` is mapped.
    pub fn contains_path(&self, path: &Path) -> bool {
        self.path_to_uuid.contains_key(path)
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.uuid_to_path.len()
    }

    /// `true` if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.uuid_to_path.is_empty()
    }

    /// Iterates over every mapping.
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceUUID, &Path)> {
        self.uuid_to_path
            .iter()
            .map(|(uuid, path)| (uuid, path.as_path()))
    }

    /// Serializes the manifest to RON.
    ///
    /// With `relative_to`, paths under that directory are stored relative to it.
    pub fn to_ron_string(&self, relative_to: Option<&Path>) -> Result<String> {
        let mut entries: Vec<ManifestEntry> = self
            .uuid_to_path
            .iter()
            .map(|(uuid, path)| {
                let path = match relative_to {
                    Some(base) => path.strip_prefix(base).unwrap_or(path.as_path()).to_path_buf(),
                    None => path.clone(),
                };
                ManifestEntry { uuid: *uuid, path }
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let document = ManifestDocument {
            name: self.name.clone(),
            entries,
        };
        Ok(ron::ser::to_string_pretty(
            &document,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Parses a manifest from RON.
    ///
    /// With `relative_to`, relative paths are resolved against that directory.
    pub fn from_ron_str(source: &str, relative_to: Option<&Path>) -> Result<Self> {
        let document: ManifestDocument = ron::from_str(source)?;
        let mut manifest = Self::new(document.name);
        for entry in document.entries {
            let path = match relative_to {
                Some(base) if entry.path.is_relative() => base.join(entry.path),
                _ => entry.path,
            };
            manifest.register_resource(entry.uuid, path);
        }
        Ok(manifest)
    }

    /// Writes the manifest to `path`.
    pub fn save(&self, path: impl AsRef<Path>, relative_to: Option<&Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_ron_string(relative_to)?)?;
        log::debug!("Saved manifest '{}' to {}", self.name, path.display());
        Ok(())
    }

    /// Reads a manifest written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>, relative_to: Option<&Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_ron_str(&source, relative_to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remapping_drops_stale_entries() {
        let mut manifest = ResourceManifest::new("Default");
        let texture = ResourceUUID::new_v5("texture");
        let font = ResourceUUID::new_v5("font");

        manifest.register_resource(texture, "a.res");
        manifest.register_resource(texture, "b.res");
        assert_eq!(manifest.uuid_to_file_path(&texture), Some(Path::new("b.res")));
        assert!(!manifest.contains_path(Path::new("a.res")));

        manifest.register_resource(font, "b.res");
        assert_eq!(manifest.file_path_to_uuid(Path::new("b.res")), Some(font));
        assert!(!manifest.contains_uuid(&texture));
        assert_eq!(manifest.len(), 1);

        assert_eq!(manifest.unregister_resource(&font), Some(PathBuf::from("b.res")));
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_relative_paths_round_trip() {
        let base = Path::new("/project/assets");
        let mut manifest = ResourceManifest::new("Project");
        let uuid = ResourceUUID::new();
        manifest.register_resource(uuid, base.join("fonts/ui.res"));
        let outside = ResourceUUID::new();
        manifest.register_resource(outside, "/elsewhere/other.res");

        let text = manifest.to_ron_string(Some(base)).expect("serialized");
        assert!(text.contains("fonts/ui.res"));
        assert!(!text.contains("/project/assets"));

        let restored = ResourceManifest::from_ron_str(&text, Some(Path::new("/moved"))).expect("parsed");
        assert_eq!(restored.name(), "Project");
        assert_eq!(
            restored.uuid_to_file_path(&uuid),
            Some(Path::new("/moved/fonts/ui.res"))
        );
        assert_eq!(
            restored.uuid_to_file_path(&outside),
            Some(Path::new("/elsewhere/other.res"))
        );
    }
}
