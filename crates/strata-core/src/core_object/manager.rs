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

use super::dirty::{CoreObjectId, DirtyFlags};
use super::frame_alloc::FrameAlloc;
use super::sync_data::CoreSyncBatch;
use super::thread::{CoreCompletion, CoreThreadHandle};
use super::CoreObject;
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Owner-side registry of core objects.
///
/// Lives on the simulation thread. Each frame, [`sync_to_core`](Self::sync_to_core)
/// collects the dirty subset of every registered owner into one
/// [`CoreSyncBatch`] and hands it to the core thread.
pub struct CoreObjectManager {
    core: CoreThreadHandle,
    owners: Vec<(CoreObjectId, Weak<Mutex<dyn CoreObject>>)>,
    frames: FrameAlloc,
}

impl CoreObjectManager {
    /// Creates a registry feeding the core thread behind `core`.
    pub fn new(core: CoreThreadHandle) -> Self {
        Self {
            core,
            owners: Vec::new(),
            frames: FrameAlloc::default(),
        }
    }

    /// Creates the counterpart of `owner` on the core thread.
    ///
    /// The owner must be fully constructed; its first sync sends everything.
    pub fn register<T: CoreObject>(&mut self, owner: &Arc<Mutex<T>>) -> Result<CoreObjectId> {
        let id = {
            let mut guard = owner.lock();
            let id = guard.core_id();
            self.core.create(id, guard.create_core())?;
            guard.mark_core_dirty(DirtyFlags::EVERYTHING);
            id
        };

        let erased: Arc<Mutex<dyn CoreObject>> = owner.clone();
        self.owners.push((id, Arc::downgrade(&erased)));
        log::debug!("Registered core object {id}");
        Ok(id)
    }

    /// Sends the dirty state of every registered owner to the core thread.
    ///
    /// Flags are cleared once the batch is handed to the core thread. If any
    /// owner fails to write its state, or the batch cannot be submitted, the
    /// flags of every owner in the batch are restored and nothing is sent.
    /// Owners dropped without [`destroy`](Self::destroy) are unregistered and
    /// their counterparts torn down. Returns the number of owners synced.
    pub fn sync_to_core(&mut self) -> Result<usize> {
        let mut batch = CoreSyncBatch::new(self.frames.begin_frame(), Some(self.frames.return_sender()));
        let mut taken: Vec<(Arc<Mutex<dyn CoreObject>>, DirtyFlags)> = Vec::new();
        let mut reaped = Vec::new();

        for (id, owner) in &self.owners {
            let Some(owner) = owner.upgrade() else {
                reaped.push(*id);
                continue;
            };
            let recorded = {
                let mut guard = owner.lock();
                let flags = guard.core_state_mut().take();
                if flags.is_empty() {
                    continue;
                }
                let recorded = batch.record(*id, flags, |writer| guard.sync_to_core(flags, writer));
                drop(guard);
                taken.push((owner, flags));
                recorded
            };
            if let Err(err) = recorded {
                restore_flags(&taken);
                return Err(err);
            }
        }

        if !reaped.is_empty() {
            self.owners.retain(|(id, _)| !reaped.contains(id));
            for id in reaped {
                log::debug!("Core object {id} owner dropped without destroy, reaping");
                if let Err(err) = self.core.destroy(id, None) {
                    restore_flags(&taken);
                    return Err(err);
                }
            }
        }

        let synced = batch.len();
        if synced > 0 {
            if let Err(err) = self.core.submit(batch) {
                restore_flags(&taken);
                return Err(err);
            }
        }
        Ok(synced)
    }

    /// Unregisters `id` and tears its counterpart down.
    ///
    /// Wait on the returned completion before considering the owner destroyed.
    pub fn destroy(&mut self, id: CoreObjectId) -> Result<CoreCompletion> {
        self.owners.retain(|(registered, _)| *registered != id);
        self.core.destroy(id, None)
    }

    /// Number of registered owners.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// `true` if no owner is registered.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// The core thread this registry feeds.
    pub fn core(&self) -> &CoreThreadHandle {
        &self.core
    }
}

fn restore_flags(taken: &[(Arc<Mutex<dyn CoreObject>>, DirtyFlags)]) {
    for (owner, flags) in taken {
        owner.lock().mark_core_dirty(*flags);
    }
}
