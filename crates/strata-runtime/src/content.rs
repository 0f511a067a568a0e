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

//! Demo content: textures, a font whose pages are textures, and their loaders.

use anyhow::Result;
use std::any::Any;
use std::path::{Path, PathBuf};
use strata_core::core_object::{CoreCounterpart, CoreSyncData};
use strata_core::resource::Serializable;
use strata_core::{HResource, Resource, ResourceUUID};
use strata_resources::{
    BoxError, LoadContext, ResourceLoadFlags, ResourceLoader, ResourceManager, ResourceManifest,
};

pub const MANIFEST_NAME: &str = "Demo";
pub const MANIFEST_FILE: &str = "manifest.ron";
pub const FONT_NAME: &str = "ui_font";

const PAGE_SIZE: u16 = 16;
const PAGE_COUNT: u8 = 3;

/// A square grayscale image.
pub struct Texture {
    name: String,
    size: u16,
    pixels: Vec<u8>,
}

impl Texture {
    fn checker(name: String, size: u16, seed: u8) -> Self {
        let pixels = (0..size)
            .flat_map(|y| (0..size).map(move |x| if (x + y) % 2 == 0 { seed } else { !seed }))
            .collect();
        Self { name, size, pixels }
    }

    pub fn size(&self) -> u16 {
        self.size
    }
}

impl Resource for Texture {
    fn name(&self) -> &str {
        &self.name
    }

    fn serializable(&self) -> Option<&dyn Serializable> {
        Some(self)
    }

    fn create_core(&self) -> Option<Box<dyn CoreCounterpart>> {
        Some(Box::new(GpuTexture {
            name: self.name.clone(),
            bytes: self.pixels.len(),
        }))
    }
}

impl Serializable for Texture {
    fn format_id(&self) -> &'static str {
        "texture"
    }

    fn encode(&self, out: &mut Vec<u8>) -> strata_core::Result<()> {
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.pixels);
        Ok(())
    }
}

/// Core-thread mirror of a texture.
struct GpuTexture {
    name: String,
    bytes: usize,
}

impl CoreCounterpart for GpuTexture {
    fn initialize(&mut self) {
        log::debug!("Uploaded texture '{}' ({} bytes)", self.name, self.bytes);
    }

    fn sync_from_owner(&mut self, _data: &CoreSyncData<'_>) -> strata_core::Result<()> {
        Ok(())
    }

    fn destroy(&mut self) {
        log::debug!("Released texture '{}'", self.name);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub struct TextureLoader;

impl ResourceLoader<Texture> for TextureLoader {
    fn load(&self, bytes: &[u8], context: &LoadContext<'_>) -> Result<Texture, BoxError> {
        let (size, pixels) = bytes
            .split_first_chunk::<2>()
            .ok_or("texture header is truncated")?;
        let size = u16::from_le_bytes(*size);
        if pixels.len() != usize::from(size) * usize::from(size) {
            return Err(format!(
                "expected {size}x{size} pixels, found {} bytes",
                pixels.len()
            )
            .into());
        }
        Ok(Texture {
            name: context.name().to_string(),
            size,
            pixels: pixels.to_vec(),
        })
    }
}

/// A bitmap font. Each glyph page is a texture.
pub struct Font {
    name: String,
    line_height: u32,
    pages: Vec<HResource>,
}

impl Font {
    pub fn line_height(&self) -> u32 {
        self.line_height
    }

    pub fn page(&self, index: usize) -> Option<&HResource> {
        self.pages.get(index)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl Resource for Font {
    fn name(&self) -> &str {
        &self.name
    }

    fn visit_dependencies(&self, visit: &mut dyn FnMut(&HResource)) {
        self.pages.iter().for_each(visit);
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
        out.extend_from_slice(&self.line_height.to_le_bytes());
        Ok(())
    }
}

pub struct FontLoader;

impl ResourceLoader<Font> for FontLoader {
    fn load(&self, bytes: &[u8], context: &LoadContext<'_>) -> Result<Font, BoxError> {
        let line_height = u32::from_le_bytes(bytes.try_into()?);
        let pages = context
            .metadata()
            .external_dependencies()
            .map(|page| context.dependency(&page))
            .collect();
        Ok(Font {
            name: context.name().to_string(),
            line_height,
            pages,
        })
    }
}

pub fn register_loaders(manager: &ResourceManager) {
    manager.register_loader("texture", TextureLoader);
    manager.register_loader("font", FontLoader);
}

pub fn font_uuid() -> ResourceUUID {
    ResourceUUID::new_v5(FONT_NAME)
}

fn resource_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.res"))
}

/// Writes the demo font and its pages to `dir`, with a manifest mapping them.
///
/// Returns the path of the manifest. Existing content is kept unless
/// `regenerate` is set.
pub fn ensure_content(manager: &ResourceManager, dir: &Path, regenerate: bool) -> Result<PathBuf> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if manifest_path.is_file() && !regenerate {
        log::info!("Using existing demo content in '{}'.", dir.display());
        return Ok(manifest_path);
    }
    std::fs::create_dir_all(dir)?;

    let mut manifest = ResourceManifest::new(MANIFEST_NAME);
    let mut pages = Vec::new();
    for index in 0..PAGE_COUNT {
        let name = format!("{FONT_NAME}_page{index}");
        let uuid = ResourceUUID::new_v5(&name);
        let page = manager.create_handle_with_uuid(
            Texture::checker(name.clone(), PAGE_SIZE, index.wrapping_mul(85)),
            uuid,
        );
        let path = resource_path(dir, &name);
        manager.save(&page, &path, true, true)?;
        manifest.register_resource(uuid, path);
        pages.push(page.untyped());
    }

    let font = manager.create_handle_with_uuid(
        Font {
            name: FONT_NAME.to_string(),
            line_height: u32::from(PAGE_SIZE) + 2,
            pages,
        },
        font_uuid(),
    );
    let font_path = resource_path(dir, FONT_NAME);
    manager.save(&font, &font_path, true, true)?;
    manifest.register_resource(font.uuid(), font_path);

    manifest.save(&manifest_path, Some(dir))?;
    log::info!(
        "Wrote {} demo resources to '{}'.",
        manifest.len(),
        dir.display()
    );
    Ok(manifest_path)
}

/// Registers the manifest at `path` and starts loading the demo font.
pub fn start_loading(manager: &ResourceManager, manifest_path: &Path) -> Result<HResource> {
    let dir = manifest_path.parent();
    let manifest = ResourceManifest::load(manifest_path, dir)?;
    manager.register_manifest(manifest);
    let font = manager.load_from_uuid(font_uuid(), true, ResourceLoadFlags::DEFAULT)?;
    Ok(font)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use strata_core::resource::ResourceMetadata;

    #[test]
    fn test_texture_round_trips_through_loader() {
        let texture = Texture::checker("page".to_string(), 4, 0x10);
        let mut payload = Vec::new();
        texture.encode(&mut payload).expect("encode");

        let metadata = ResourceMetadata::new(ResourceUUID::new_v5("page"), "page", "texture");
        let dependencies = HashMap::new();
        let context = LoadContext::new(&metadata, &dependencies, false);
        let loaded = TextureLoader.load(&payload, &context).expect("decode");

        assert_eq!(loaded.size(), 4);
        assert_eq!(loaded.pixels, texture.pixels);
        assert_eq!(loaded.name(), "page");
    }

    #[test]
    fn test_truncated_texture_is_rejected() {
        let metadata = ResourceMetadata::new(ResourceUUID::new_v5("bad"), "bad", "texture");
        let dependencies = HashMap::new();
        let context = LoadContext::new(&metadata, &dependencies, false);

        assert!(TextureLoader.load(&[4], &context).is_err());
        assert!(TextureLoader.load(&[2, 0, 1, 2, 3], &context).is_err());
    }
}
