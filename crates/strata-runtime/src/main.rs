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

// Strata demo runtime.
// Loads a font and its glyph pages on the loader threads while a simulation
// loop keeps ticking, then mirrors a label onto the core thread.

mod config;
mod content;
mod scene;

use anyhow::Result;
use config::RuntimeConfig;
use content::Font;
use scene::Label;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_core::core_object::{CoreObject, CoreObjectManager, CoreThread};
use strata_core::event::ResourceEvent;
use strata_core::handle::ResourceListener;
use strata_core::{HandleReadinessBroker, Resource, ResourceUUID};
use strata_resources::ResourceManager;

struct LogListener;

impl ResourceListener for LogListener {
    fn on_resource_loaded(&self, uuid: &ResourceUUID) {
        log::info!("Listener: resource {uuid} is ready.");
    }
}

fn log_event(event: &ResourceEvent) {
    match event {
        ResourceEvent::Loaded { uuid } => log::debug!("Loaded {uuid}"),
        ResourceEvent::Modified { uuid } => log::debug!("Modified {uuid}"),
        ResourceEvent::Destroyed { uuid } => log::debug!("Destroyed {uuid}"),
        ResourceEvent::LoadFailed { uuid, path, reason } => {
            log::error!("Loading {uuid} from '{path}' failed: {reason}")
        }
    }
}

fn run(config: RuntimeConfig) -> Result<()> {
    let mut core_thread = CoreThread::spawn(config.core.clone())?;
    let manager = ResourceManager::new(config.resources.clone())?
        .with_core_thread(core_thread.handle());
    content::register_loaders(&manager);

    let manifest_path =
        content::ensure_content(&manager, &config.content_dir, config.regenerate_content)?;

    let events = manager.subscribe();
    let listener: Arc<dyn ResourceListener> = Arc::new(LogListener);
    manager.broker().subscribe(content::font_uuid(), &listener);

    let font = content::start_loading(&manager, &manifest_path)?;
    let mut objects = CoreObjectManager::new(core_thread.handle());
    let mut label = None;
    let frame_time = Duration::from_millis(config.frame_time_ms);

    for frame in 0..config.frames {
        let started = Instant::now();
        manager.update_listeners();
        for event in events.try_iter() {
            log_event(&event);
        }

        if label.is_none() && font.is_loaded(true) {
            let typed = font.cast::<Font>().get()?;
            log::info!(
                "Font '{}' ready at frame {frame}: {} pages, line height {}.",
                typed.name(),
                typed.page_count(),
                typed.line_height()
            );
            if let Some(page) = typed.page(0) {
                let size = page.cast::<content::Texture>().get()?.size();
                log::info!("First glyph page is {size}x{size}.");
            }
            let created = Label::new("Hello, Strata", font.clone());
            objects.register(&created)?;
            label = Some(created);
        } else if label.is_none() {
            log::trace!(
                "Frame {frame}: font {:.0}% loaded",
                manager.load_progress(&font, true) * 100.0
            );
        }

        if let Some(label) = &label {
            label.lock().step(frame);
        }
        objects.sync_to_core()?;

        if let Some(rest) = frame_time.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    if let Some(label) = label.take() {
        let id = label.lock().core_id();
        objects.destroy(id)?.wait()?;
        log::info!(
            "Label destroyed, font still referenced by {} handles.",
            label.lock().font().strong_count()
        );
    }
    drop(font);
    let released = manager.unload_all_unused();
    core_thread.handle().flush()?;
    log::info!(
        "Released {released} resources; {} still loaded, {} core syncs applied, {} counterparts alive.",
        manager.loaded_count(),
        core_thread.handle().applied_syncs(),
        core_thread.handle().live_counterparts()
    );

    manager.shutdown();
    drop(manager);
    core_thread.shutdown();
    Ok(())
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = RuntimeConfig::load(config_path.as_deref())?;

    HandleReadinessBroker::init();
    let result = run(config);
    HandleReadinessBroker::teardown();
    result
}
