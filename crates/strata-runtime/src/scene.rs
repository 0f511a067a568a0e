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

//! A label drawn with the demo font, moved around by the simulation loop.

use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use strata_core::core_object::{
    CoreCounterpart, CoreDirtyState, CoreObject, CoreSyncData, DirtyFlags, SyncWriter,
};
use strata_core::HResource;

/// Simulation-side label.
pub struct Label {
    state: CoreDirtyState,
    text: String,
    position: [f32; 2],
    visible: bool,
    /// Keeps the font loaded while the label exists.
    font: HResource,
}

impl Label {
    pub fn new(text: &str, font: HResource) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            state: CoreDirtyState::new(),
            text: text.to_string(),
            position: [0.0; 2],
            visible: true,
            font,
        }))
    }

    pub fn step(&mut self, frame: u32) {
        let t = frame as f32 * 0.1;
        self.position = [t.cos() * 64.0, t.sin() * 32.0];
        self.mark_core_dirty(DirtyFlags::TRANSFORM);

        if frame % 30 == 29 {
            self.visible = !self.visible;
            self.mark_core_dirty(DirtyFlags::ACTIVE);
        }
    }

    pub fn font(&self) -> &HResource {
        &self.font
    }
}

impl CoreObject for Label {
    fn core_state(&self) -> &CoreDirtyState {
        &self.state
    }

    fn core_state_mut(&mut self) -> &mut CoreDirtyState {
        &mut self.state
    }

    fn create_core(&self) -> Box<dyn CoreCounterpart> {
        Box::new(LabelCore {
            text: self.text.clone(),
            ..LabelCore::default()
        })
    }

    fn sync_to_core(&self, flags: DirtyFlags, writer: &mut SyncWriter<'_>) -> strata_core::Result<()> {
        if flags.requires(DirtyFlags::TRANSFORM) {
            writer.write(&self.position)?;
        }
        if flags.requires(DirtyFlags::ACTIVE) {
            writer.write(&self.visible)?;
        }
        Ok(())
    }
}

/// Core-thread mirror of a label.
#[derive(Debug, Default)]
pub struct LabelCore {
    pub text: String,
    pub position: [f32; 2],
    pub visible: bool,
    pub syncs: u32,
}

impl CoreCounterpart for LabelCore {
    fn initialize(&mut self) {
        log::debug!("Label '{}' created on the core thread", self.text);
    }

    fn sync_from_owner(&mut self, data: &CoreSyncData<'_>) -> strata_core::Result<()> {
        let flags = data.flags();
        if flags.requires(DirtyFlags::TRANSFORM) {
            self.position = data.read()?;
        }
        if flags.requires(DirtyFlags::ACTIVE) {
            self.visible = data.read()?;
        }
        self.syncs += 1;
        Ok(())
    }

    fn destroy(&mut self) {
        log::debug!("Label '{}' destroyed after {} syncs", self.text, self.syncs);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
