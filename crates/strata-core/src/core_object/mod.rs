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

//! Owner/counterpart pairs synchronized across the simulation and core threads.
//!
//! An owner lives on the simulation thread and accumulates [`DirtyFlags`] as
//! it changes. At a sync boundary, it writes exactly the dirty subset of its
//! state into a byte blob taken from a frame-scoped arena, and that blob is
//! the only thing its counterpart on the core thread ever sees. Neither side
//! reads the fields of the other.
//!
//! Counterparts are created by the owner after it is constructed, and the
//! owner tears them down before it considers itself destroyed.

mod dirty;
mod frame_alloc;
mod manager;
mod sync_data;
mod thread;

pub use dirty::{CoreDirtyState, CoreObjectId, DirtyFlags};
pub use frame_alloc::FrameAlloc;
pub use manager::CoreObjectManager;
pub use sync_data::{CoreSyncBatch, CoreSyncData, SyncWriter};
pub use thread::{CoreCompletion, CoreThread, CoreThreadConfig, CoreThreadHandle};

use crate::error::Result;
use std::any::Any;

/// The simulation-thread side of an owner/counterpart pair.
pub trait CoreObject: Send + 'static {
    /// The embedded identity and dirty flags.
    fn core_state(&self) -> &CoreDirtyState;

    /// Mutable access to the embedded identity and dirty flags.
    fn core_state_mut(&mut self) -> &mut CoreDirtyState;

    /// Builds the counterpart that will live on the core thread.
    fn create_core(&self) -> Box<dyn CoreCounterpart>;

    /// Writes the fields selected by `flags`.
    fn sync_to_core(&self, flags: DirtyFlags, writer: &mut SyncWriter<'_>) -> Result<()>;

    /// Identity shared with the counterpart.
    fn core_id(&self) -> CoreObjectId {
        self.core_state().id()
    }

    /// Pending changes.
    fn dirty_flags(&self) -> DirtyFlags {
        self.core_state().flags()
    }

    /// Records that the fields selected by `flags` changed.
    fn mark_core_dirty(&mut self, flags: DirtyFlags) {
        self.core_state_mut().mark(flags);
    }

    /// `true` if anything is waiting to be synced.
    fn is_core_dirty(&self) -> bool {
        self.core_state().is_dirty()
    }
}

/// The core-thread side of an owner/counterpart pair.
///
/// Owned exclusively by the [`CoreThread`].
pub trait CoreCounterpart: Send + 'static {
    /// Called on the core thread right after the counterpart was handed over.
    fn initialize(&mut self) {}

    /// Applies a sync blob written by the owner.
    fn sync_from_owner(&mut self, data: &CoreSyncData<'_>) -> Result<()> {
        let _ = data;
        Ok(())
    }

    /// Called on the core thread right before the counterpart is dropped.
    fn destroy(&mut self) {}

    /// Borrows `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;

    /// Borrows `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Mirror {
        position: [f32; 3],
        active: bool,
        syncs: Vec<DirtyFlags>,
    }

    struct RenderableCore {
        mirror: Mirror,
        destroyed: Arc<AtomicUsize>,
    }

    impl CoreCounterpart for RenderableCore {
        fn sync_from_owner(&mut self, data: &CoreSyncData<'_>) -> Result<()> {
            let flags = data.flags();
            if flags.requires(DirtyFlags::TRANSFORM) {
                self.mirror.position = data.read()?;
            }
            if flags.requires(DirtyFlags::ACTIVE) {
                self.mirror.active = data.read()?;
            }
            self.mirror.syncs.push(flags);
            Ok(())
        }

        fn destroy(&mut self) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct Renderable {
        state: CoreDirtyState,
        position: [f32; 3],
        active: bool,
        destroyed: Arc<AtomicUsize>,
    }

    impl Renderable {
        fn new(destroyed: &Arc<AtomicUsize>) -> Arc<Mutex<Self>> {
            Arc::new(Mutex::new(Self {
                state: CoreDirtyState::new(),
                position: [0.0; 3],
                active: true,
                destroyed: Arc::clone(destroyed),
            }))
        }

        fn move_to(&mut self, position: [f32; 3]) {
            self.position = position;
            self.mark_core_dirty(DirtyFlags::TRANSFORM);
        }
    }

    impl CoreObject for Renderable {
        fn core_state(&self) -> &CoreDirtyState {
            &self.state
        }

        fn core_state_mut(&mut self) -> &mut CoreDirtyState {
            &mut self.state
        }

        fn create_core(&self) -> Box<dyn CoreCounterpart> {
            Box::new(RenderableCore {
                mirror: Mirror::default(),
                destroyed: Arc::clone(&self.destroyed),
            })
        }

        fn sync_to_core(&self, flags: DirtyFlags, writer: &mut SyncWriter<'_>) -> Result<()> {
            if flags.requires(DirtyFlags::TRANSFORM) {
                writer.write(&self.position)?;
            }
            if flags.requires(DirtyFlags::ACTIVE) {
                writer.write(&self.active)?;
            }
            Ok(())
        }
    }

    fn mirror_of(core: &CoreThreadHandle, id: CoreObjectId) -> Mirror {
        core.query::<RenderableCore, _>(id, |counterpart| counterpart.mirror.clone())
            .expect("counterpart registered")
    }

    #[test]
    fn test_first_sync_sends_everything() {
        let thread = CoreThread::spawn(CoreThreadConfig::default()).expect("spawn");
        let mut manager = CoreObjectManager::new(thread.handle());
        let destroyed = Arc::new(AtomicUsize::new(0));
        let owner = Renderable::new(&destroyed);
        owner.lock().position = [1.0, 2.0, 3.0];

        let id = manager.register(&owner).expect("register");
        assert!(owner.lock().is_core_dirty());
        assert_eq!(manager.sync_to_core().expect("sync"), 1);
        assert!(!owner.lock().is_core_dirty());

        let mirror = mirror_of(manager.core(), id);
        assert_eq!(mirror.position, [1.0, 2.0, 3.0]);
        assert!(mirror.active);
        assert_eq!(mirror.syncs, vec![DirtyFlags::EVERYTHING]);
    }

    #[test]
    fn test_only_dirty_fields_are_sent() {
        let thread = CoreThread::spawn(CoreThreadConfig::default()).expect("spawn");
        let mut manager = CoreObjectManager::new(thread.handle());
        let destroyed = Arc::new(AtomicUsize::new(0));
        let owner = Renderable::new(&destroyed);
        let id = manager.register(&owner).expect("register");
        manager.sync_to_core().expect("initial sync");

        assert_eq!(manager.sync_to_core().expect("clean sync"), 0);

        {
            let mut owner = owner.lock();
            owner.move_to([4.0, 5.0, 6.0]);
            // Changed but not marked: must not reach the counterpart.
            owner.active = false;
        }
        assert_eq!(manager.sync_to_core().expect("sync"), 1);

        let mirror = mirror_of(manager.core(), id);
        assert_eq!(mirror.position, [4.0, 5.0, 6.0]);
        assert!(mirror.active);
        assert_eq!(
            mirror.syncs,
            vec![DirtyFlags::EVERYTHING, DirtyFlags::TRANSFORM]
        );
        assert_eq!(manager.core().applied_syncs(), 2);
    }

    struct Unwritable {
        state: CoreDirtyState,
    }

    impl CoreObject for Unwritable {
        fn core_state(&self) -> &CoreDirtyState {
            &self.state
        }

        fn core_state_mut(&mut self) -> &mut CoreDirtyState {
            &mut self.state
        }

        fn create_core(&self) -> Box<dyn CoreCounterpart> {
            Box::new(RenderableCore {
                mirror: Mirror::default(),
                destroyed: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn sync_to_core(&self, _flags: DirtyFlags, _writer: &mut SyncWriter<'_>) -> Result<()> {
            Err(bincode::error::EncodeError::Other("field cannot be written").into())
        }
    }

    #[test]
    fn test_failed_sync_keeps_every_owner_dirty() {
        let thread = CoreThread::spawn(CoreThreadConfig::default()).expect("spawn");
        let mut manager = CoreObjectManager::new(thread.handle());
        let destroyed = Arc::new(AtomicUsize::new(0));
        let good = Renderable::new(&destroyed);
        let good_id = manager.register(&good).expect("register");
        manager.sync_to_core().expect("initial sync");

        let broken = Arc::new(Mutex::new(Unwritable {
            state: CoreDirtyState::new(),
        }));
        manager.register(&broken).expect("register");
        good.lock().move_to([9.0, 9.0, 9.0]);

        assert!(manager.sync_to_core().is_err());
        assert_eq!(good.lock().dirty_flags(), DirtyFlags::TRANSFORM);
        assert!(broken.lock().is_core_dirty());
        manager.core().flush().expect("flush");
        let mirror = mirror_of(manager.core(), good_id);
        assert_eq!(mirror.position, [0.0; 3]);
        assert_eq!(mirror.syncs, vec![DirtyFlags::EVERYTHING]);

        manager.destroy(broken.lock().core_id()).expect("destroy");
        drop(broken);
        assert_eq!(manager.sync_to_core().expect("sync"), 1);
        let mirror = mirror_of(manager.core(), good_id);
        assert_eq!(mirror.position, [9.0, 9.0, 9.0]);
        assert_eq!(
            mirror.syncs,
            vec![DirtyFlags::EVERYTHING, DirtyFlags::TRANSFORM]
        );
    }

    #[test]
    fn test_destroy_completes_before_owner_teardown() {
        let thread = CoreThread::spawn(CoreThreadConfig::default()).expect("spawn");
        let mut manager = CoreObjectManager::new(thread.handle());
        let destroyed = Arc::new(AtomicUsize::new(0));
        let owner = Renderable::new(&destroyed);
        let id = manager.register(&owner).expect("register");

        manager
            .destroy(id)
            .expect("destroy queued")
            .wait()
            .expect("destroyed");
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(manager.core().live_counterparts(), 0);
        assert!(manager.is_empty());
        drop(owner);

        assert!(matches!(
            manager.core().query::<RenderableCore, _>(id, |_| ()),
            Err(crate::ResourceError::UnknownCoreObject(_))
        ));
    }

    #[test]
    fn test_dropped_owner_is_reaped_on_sync() {
        let thread = CoreThread::spawn(CoreThreadConfig::default()).expect("spawn");
        let mut manager = CoreObjectManager::new(thread.handle());
        let destroyed = Arc::new(AtomicUsize::new(0));
        let owner = Renderable::new(&destroyed);
        manager.register(&owner).expect("register");
        drop(owner);

        assert_eq!(manager.sync_to_core().expect("sync"), 0);
        manager.core().flush().expect("flush");
        assert!(manager.is_empty());
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_destroys_remaining_counterparts() {
        let mut thread = CoreThread::spawn(CoreThreadConfig::default()).expect("spawn");
        let core = thread.handle();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let owner = Renderable::new(&destroyed);
        let id = owner.lock().core_id();
        core.create(id, owner.lock().create_core()).expect("create");
        core.flush().expect("flush");
        assert_eq!(core.live_counterparts(), 1);

        thread.shutdown();
        assert!(!thread.is_running());
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(matches!(
            core.flush(),
            Err(crate::ResourceError::CoreThreadDisconnected)
        ));
    }

    #[test]
    fn test_retained_value_outlives_counterpart() {
        let thread = CoreThread::spawn(CoreThreadConfig::default()).expect("spawn");
        let core = thread.handle();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let owner = Renderable::new(&destroyed);
        let id = owner.lock().core_id();
        core.create(id, owner.lock().create_core()).expect("create");

        let retained = Arc::new(42u32);
        let watcher = Arc::downgrade(&retained);
        let completion = core.destroy(id, Some(retained)).expect("destroy");
        assert!(completion.wait_timeout(Duration::from_secs(5)));
        assert!(watcher.upgrade().is_none());
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_config_from_ron() {
        let config: CoreThreadConfig = ron::from_str("(name: \"render\")").expect("valid ron");
        assert_eq!(config.name, "render");
        assert_eq!(config.queue_capacity, 0);
    }
}
