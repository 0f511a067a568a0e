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

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_core::event::ResourceEvent;
use strata_core::handle::ResourceListener;
use strata_core::resource::{ResourceMetadata, Serializable};
use strata_core::{HResource, HandleReadinessBroker, Resource, ResourceUUID};
use strata_resources::saved;
use strata_resources::{
    BoxError, LoadContext, ResourceLoader, ResourceManager, ResourceManagerConfig, ResourceManifest,
};

// --- Test resources ---

#[derive(Debug)]
pub struct Texture {
    pub name: String,
    pub pixels: Vec<u8>,
}

impl Texture {
    pub fn new(name: &str, pixels: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            pixels: pixels.to_vec(),
        }
    }
}

impl Resource for Texture {
    fn name(&self) -> &str {
        &self.name
    }

    fn serializable(&self) -> Option<&dyn Serializable> {
        Some(self)
    }
}

impl Serializable for Texture {
    fn format_id(&self) -> &'static str {
        "texture"
    }

    fn encode(&self, out: &mut Vec<u8>) -> strata_core::Result<()> {
        out.extend_from_slice(&self.pixels);
        Ok(())
    }
}

#[derive(Default)]
pub struct TextureLoader {
    pub delay: Duration,
}

impl ResourceLoader<Texture> for TextureLoader {
    fn load(&self, bytes: &[u8], context: &LoadContext<'_>) -> Result<Texture, BoxError> {
        std::thread::sleep(self.delay);
        if bytes.is_empty() {
            return Err("texture has no pixels".into());
        }
        Ok(Texture::new(context.name(), bytes))
    }
}

pub struct Font {
    pub name: String,
    pub size: u32,
    pub pages: Vec<HResource>,
}

impl Resource for Font {
    fn name(&self) -> &str {
        &self.name
    }

    fn visit_dependencies(&self, visit: &mut dyn FnMut(&HResource)) {
        for page in &self.pages {
            visit(page);
        }
    }

    fn serializable(&self) -> Option<&dyn Serializable> {
        Some(self)
    }
}

impl Serializable for Font {
    fn format_id(&self) -> &'static str {
        "font"
    }

    fn encode(&self, out: &mut Vec<u8>) -> strata_core::Result<()> {
        out.extend_from_slice(&self.size.to_le_bytes());
        Ok(())
    }
}

pub struct FontLoader;

impl ResourceLoader<Font> for FontLoader {
    fn load(&self, bytes: &[u8], context: &LoadContext<'_>) -> Result<Font, BoxError> {
        let size = u32::from_le_bytes(bytes.try_into()?);
        let pages = context
            .metadata()
            .dependencies
            .iter()
            .map(|page| context.dependency(page))
            .collect();
        Ok(Font {
            name: context.name().to_string(),
            size,
            pages,
        })
    }
}

/// A resource without a serialization facet.
pub struct Scratch;

impl Resource for Scratch {
    fn name(&self) -> &str {
        "scratch"
    }
}

#[derive(Default)]
pub struct CountingListener {
    pub loaded: AtomicUsize,
    pub modified: AtomicUsize,
}

impl CountingListener {
    pub fn loaded(&self) -> usize {
        self.loaded.load(Ordering::SeqCst)
    }

    pub fn modified(&self) -> usize {
        self.modified.load(Ordering::SeqCst)
    }
}

impl ResourceListener for CountingListener {
    fn on_resource_loaded(&self, _uuid: &ResourceUUID) {
        self.loaded.fetch_add(1, Ordering::SeqCst);
    }

    fn on_resource_modified(&self, _uuid: &ResourceUUID) {
        self.modified.fetch_add(1, Ordering::SeqCst);
    }
}

// --- Helpers ---

pub fn uuid_of(name: &str) -> ResourceUUID {
    ResourceUUID::new_v5(name)
}

pub fn path_of(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.res"))
}

/// A manager with an isolated broker and the test loaders registered.
pub fn manager_with_delay(delay: Duration) -> ResourceManager {
    let broker = Arc::new(HandleReadinessBroker::new());
    let manager = ResourceManager::with_broker(ResourceManagerConfig::default(), broker)
        .expect("resource manager");
    manager.register_loader("texture", TextureLoader { delay });
    manager.register_loader("font", FontLoader);
    manager
}

pub fn manager() -> ResourceManager {
    manager_with_delay(Duration::ZERO)
}

pub fn write_texture(dir: &Path, name: &str, pixels: &[u8]) -> PathBuf {
    let path = path_of(dir, name);
    let metadata = ResourceMetadata::new(uuid_of(name), name, "texture");
    saved::write_saved(&path, &metadata, pixels).expect("texture written");
    path
}

pub fn write_font(dir: &Path, name: &str, size: u32, pages: &[&str]) -> PathBuf {
    let path = path_of(dir, name);
    let mut metadata = ResourceMetadata::new(uuid_of(name), name, "font");
    metadata.dependencies = pages.iter().map(|page| uuid_of(page)).collect();
    saved::write_saved(&path, &metadata, &size.to_le_bytes()).expect("font written");
    path
}

/// A manifest mapping each name to its file in `dir`.
pub fn manifest_for(dir: &Path, names: &[&str]) -> ResourceManifest {
    let mut manifest = ResourceManifest::new("Project");
    for name in names {
        manifest.register_resource(uuid_of(name), path_of(dir, name));
    }
    manifest
}

/// Receives events until `done` returns `true` or two seconds elapsed.
pub fn collect_events(
    receiver: &flume::Receiver<ResourceEvent>,
    mut done: impl FnMut(&[ResourceEvent]) -> bool,
) -> Vec<ResourceEvent> {
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut events = Vec::new();
    while !done(&events) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match receiver.recv_timeout(remaining) {
            Ok(event) => events.push(event),
            Err(_) => break,
        }
    }
    events
}

pub fn loaded_order(events: &[ResourceEvent]) -> Vec<ResourceUUID> {
    events
        .iter()
        .filter_map(|event| match event {
            ResourceEvent::Loaded { uuid } => Some(*uuid),
            _ => None,
        })
        .collect()
}
