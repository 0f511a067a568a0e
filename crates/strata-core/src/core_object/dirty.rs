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

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

crate::strata_bitflags! {
    /// What changed on an owner since its last sync to the core thread.
    ///
    /// The low bits are shared by every owner. `EVERYTHING` requests a full
    /// resync and is set when the counterpart is first created.
    pub struct DirtyFlags: u32 {
        /// Position, rotation or scale changed.
        const TRANSFORM = 1 << 0;
        /// The object switched between static and movable.
        const MOBILITY = 1 << 1;
        /// The object was enabled or disabled.
        const ACTIVE = 1 << 2;
        /// Every field must be sent.
        const EVERYTHING = 1 << 3;
        /// A resource the object depends on changed.
        const DEPENDENCY = 1 << 31;
    }
}

impl DirtyFlags {
    /// `true` if the fields guarded by `flag` must be written for this sync.
    pub const fn requires(&self, flag: DirtyFlags) -> bool {
        self.contains(Self::EVERYTHING) || self.intersects(flag)
    }
}

/// Process-unique identity of an owner/counterpart pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoreObjectId(u64);

impl CoreObjectId {
    /// Allocates a fresh identifier.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value of the identifier.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CoreObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owner-side bookkeeping of a core object: its identity and pending dirty flags.
///
/// Owners embed one of these and expose it through
/// [`CoreObject::core_state`](super::CoreObject::core_state).
#[derive(Debug)]
pub struct CoreDirtyState {
    id: CoreObjectId,
    flags: DirtyFlags,
}

impl CoreDirtyState {
    /// Allocates a new identity with no pending changes.
    pub fn new() -> Self {
        Self {
            id: CoreObjectId::next(),
            flags: DirtyFlags::EMPTY,
        }
    }

    /// Identity of the owner/counterpart pair.
    pub fn id(&self) -> CoreObjectId {
        self.id
    }

    /// Pending changes.
    pub fn flags(&self) -> DirtyFlags {
        self.flags
    }

    /// Adds `flags` to the pending changes.
    pub fn mark(&mut self, flags: DirtyFlags) {
        self.flags |= flags;
    }

    /// Returns the pending changes and clears them.
    pub fn take(&mut self) -> DirtyFlags {
        std::mem::take(&mut self.flags)
    }

    /// `true` if anything is waiting to be synced.
    pub fn is_dirty(&self) -> bool {
        !self.flags.is_empty()
    }
}

impl Default for CoreDirtyState {
    fn default() -> Self {
        Self::new()
    }
}
