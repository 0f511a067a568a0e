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

mod common;

use anyhow::Result;
use common::*;
use strata_core::resource::CompressionMethod;
use strata_resources::{saved, ManagerError, ResourceLoadFlags, ResourceManifest};
use tempfile::tempdir;

#[test]
fn test_saved_resource_loads_in_fresh_manager() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("saved").join("brick.res");
    let source = manager();
    let handle = source.create_handle(Texture::new("brick", &[8, 6, 4, 2]));

    source.save(&handle, &path, false, false)?;
    assert!(path.is_file());
    assert_eq!(source.file_path_from_uuid(&handle.uuid()), Some(path.clone()));
    assert_eq!(
        source.default_manifest().uuid_to_file_path(&handle.uuid()),
        Some(path.as_path())
    );

    let target = manager();
    let loaded = target.load(&path, ResourceLoadFlags::DEFAULT)?;
    assert_eq!(loaded.uuid(), handle.uuid());
    let texture = loaded.cast::<Texture>().get()?;
    assert_eq!(texture.name, "brick");
    assert_eq!(texture.pixels, vec![8, 6, 4, 2]);
    Ok(())
}

#[test]
fn test_compressed_save_round_trips() -> Result<()> {
    let dir = tempdir()?;
    let plain_path = dir.path().join("plain.res");
    let packed_path = dir.path().join("packed.res");
    let source = manager();
    let pixels = vec![7u8; 4096];
    let handle = source.create_handle(Texture::new("gravel", &pixels));

    source.save(&handle, &plain_path, false, false)?;
    source.save(&handle, &packed_path, false, true)?;
    assert_eq!(saved::read_header(&plain_path)?.compression, CompressionMethod::None);
    assert_eq!(saved::read_header(&packed_path)?.compression, CompressionMethod::Lz4);
    assert!(std::fs::metadata(&packed_path)?.len() < std::fs::metadata(&plain_path)?.len());

    let target = manager();
    let loaded = target.load(&packed_path, ResourceLoadFlags::DEFAULT)?;
    assert_eq!(loaded.uuid(), handle.uuid());
    assert_eq!(loaded.cast::<Texture>().get()?.pixels, pixels);

    source.save_in_place(&handle, false)?;
    assert_eq!(saved::read_header(&packed_path)?.compression, CompressionMethod::None);
    Ok(())
}

#[test]
fn test_save_refuses_to_overwrite() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("wall.res");
    let manager = manager();
    let handle = manager.create_handle(Texture::new("wall", &[1]));
    manager.save(&handle, &path, false, false)?;

    let result = manager.save(&handle, &path, false, false);
    assert!(matches!(result, Err(ManagerError::AlreadyExists(ref existing)) if *existing == path));

    manager.save(&handle, &path, true, false)?;
    Ok(())
}

#[test]
fn test_saved_dependencies_are_restored() -> Result<()> {
    let dir = tempdir()?;
    write_texture(dir.path(), "serif_0", &[1; 4]);
    write_texture(dir.path(), "serif_1", &[2; 4]);
    let pages = ["serif_0", "serif_1"];
    let source = manager();
    source.register_manifest(manifest_for(dir.path(), &pages));

    let handles = pages
        .iter()
        .map(|page| source.load_from_uuid(uuid_of(page), false, ResourceLoadFlags::DEFAULT))
        .collect::<Result<Vec<_>, _>>()?;
    let font = source.create_handle(Font {
        name: "serif".to_string(),
        size: 16,
        pages: handles,
    });
    let font_path = dir.path().join("serif.res");
    source.save(&font, &font_path, false, false)?;

    assert_eq!(
        source.dependencies_of(&font_path)?,
        vec![uuid_of("serif_0"), uuid_of("serif_1")]
    );

    let target = manager();
    target.register_manifest(manifest_for(dir.path(), &pages));
    let loaded = target.load(&font_path, ResourceLoadFlags::DEFAULT)?;
    assert!(loaded.is_loaded(true));
    let font = loaded.cast::<Font>().get()?;
    assert_eq!(font.size, 16);
    assert_eq!(font.pages[1].uuid(), uuid_of("serif_1"));
    assert_eq!(font.pages[1].cast::<Texture>().get()?.pixels, vec![2; 4]);
    Ok(())
}

#[test]
fn test_unsaveable_and_pending_resources_are_refused() -> Result<()> {
    let dir = tempdir()?;
    let manager = manager();

    let scratch = manager.create_handle(Scratch);
    let result = manager.save(&scratch, dir.path().join("scratch.res"), false, false);
    assert!(matches!(result, Err(ManagerError::NotSerializable(uuid)) if uuid == scratch.uuid()));

    let pending = manager.get_handle(uuid_of("later"));
    let result = manager.save(&pending, dir.path().join("later.res"), false, false);
    assert!(matches!(result, Err(ManagerError::NotLoaded(_))));
    assert!(!dir.path().join("later.res").exists());
    Ok(())
}

#[test]
fn test_save_in_place_rewrites_mapped_file() -> Result<()> {
    let dir = tempdir()?;
    let path = write_texture(dir.path(), "moss", &[1; 4]);
    let manager = manager();
    let handle = manager.load(&path, ResourceLoadFlags::DEFAULT)?.cast::<Texture>();

    manager.update(&handle, std::sync::Arc::new(Texture::new("moss", &[5; 2])))?;
    manager.save_in_place(&handle, false)?;

    let fresh = common::manager();
    let reloaded = fresh.load(&path, ResourceLoadFlags::DEFAULT)?;
    assert_eq!(reloaded.cast::<Texture>().get()?.pixels, vec![5; 2]);

    let unmapped = manager.create_handle(Texture::new("unmapped", &[1]));
    let result = manager.save_in_place(&unmapped, false);
    assert!(matches!(result, Err(ManagerError::UnknownResource(_))));
    Ok(())
}

#[test]
fn test_later_manifests_take_priority() -> Result<()> {
    let dir = tempdir()?;
    let manager = manager();
    let uuid = uuid_of("shared");
    let base_path = dir.path().join("base").join("shared.res");
    let patch_path = dir.path().join("patch").join("shared.res");

    let mut base = ResourceManifest::new("Base");
    base.register_resource(uuid, &base_path);
    let mut patch = ResourceManifest::new("Patch");
    patch.register_resource(uuid, &patch_path);
    manager.register_manifest(base);
    manager.register_manifest(patch);

    assert_eq!(manager.file_path_from_uuid(&uuid), Some(patch_path.clone()));
    assert_eq!(manager.uuid_from_file_path(&base_path), Some(uuid));

    let removed = manager.unregister_manifest("Patch");
    assert_eq!(removed.map(|manifest| manifest.len()), Some(1));
    assert_eq!(manager.file_path_from_uuid(&uuid), Some(base_path.clone()));

    // Re-registering a name replaces the manifest in place.
    manager.register_manifest(ResourceManifest::new("Base"));
    assert_eq!(manager.file_path_from_uuid(&uuid), None);
    assert!(manager.manifest("Base").is_some_and(|manifest| manifest.is_empty()));

    assert!(manager.unregister_manifest("Default").is_none());
    assert_eq!(manager.default_manifest().name(), "Default");
    assert!(manager.unregister_manifest("Missing").is_none());
    Ok(())
}

#[test]
fn test_manifest_file_restores_references() -> Result<()> {
    let dir = tempdir()?;
    write_texture(dir.path(), "dirt", &[3; 4]);
    write_texture(dir.path(), "clay", &[4; 4]);
    let manifest = manifest_for(dir.path(), &["dirt", "clay"]);
    let manifest_path = dir.path().join("project.ron");
    manifest.save(&manifest_path, Some(dir.path()))?;

    let contents = std::fs::read_to_string(&manifest_path)?;
    assert!(contents.contains("dirt.res"));
    assert!(!contents.contains(&dir.path().display().to_string()));

    let restored = ResourceManifest::load(&manifest_path, Some(dir.path()))?;
    assert_eq!(restored, manifest);

    let manager = manager();
    manager.register_manifest(restored);
    let clay = manager.load_from_uuid(uuid_of("clay"), false, ResourceLoadFlags::DEFAULT)?;
    assert_eq!(clay.cast::<Texture>().get()?.pixels, vec![4; 4]);
    Ok(())
}

#[test]
fn test_unknown_uuid_and_missing_file() -> Result<()> {
    let dir = tempdir()?;
    let manager = manager();

    let result = manager.load_from_uuid(uuid_of("ghost"), true, ResourceLoadFlags::DEFAULT);
    assert!(matches!(result, Err(ManagerError::UnknownResource(uuid)) if uuid == uuid_of("ghost")));

    let result = manager.dependencies_of(dir.path().join("ghost.res"));
    assert!(matches!(result, Err(ManagerError::FileNotFound(_))));
    Ok(())
}

#[test]
fn test_foreign_file_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"just some text")?;
    let manager = manager();

    let result = manager.load(&path, ResourceLoadFlags::DEFAULT);
    assert!(matches!(result, Err(ManagerError::InvalidFile(_))));
    assert_eq!(manager.pending_loads(), 0);
    Ok(())
}
