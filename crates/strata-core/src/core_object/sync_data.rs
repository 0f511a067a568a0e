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

//! The byte-level hand-off between owners and their core counterparts.
//!
//! A sync blob starts with the dirty flags that produced it, followed by the
//! fields the owner chose to write for those flags, each encoded with bincode.
//! The counterpart reads the fields back in the same order.

use super::dirty::{CoreObjectId, DirtyFlags};
use crate::error::Result;
use bincode::config::{self, Configuration};
use crossbeam_channel::Sender;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::Cell;
use std::ops::Range;

const CONFIG: Configuration = config::standard();

/// Writes the dirty subset of an owner into a sync blob.
pub struct SyncWriter<'a> {
    buffer: &'a mut Vec<u8>,
    flags: DirtyFlags,
}

impl<'a> SyncWriter<'a> {
    /// Starts a blob for `flags` at the end of `buffer`.
    pub fn begin(buffer: &'a mut Vec<u8>, flags: DirtyFlags) -> Result<Self> {
        bincode::serde::encode_into_std_write(flags.bits(), buffer, CONFIG)?;
        Ok(Self { buffer, flags })
    }

    /// The dirty flags this blob is written for.
    pub fn flags(&self) -> DirtyFlags {
        self.flags
    }

    /// Appends one field.
    pub fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        bincode::serde::encode_into_std_write(value, &mut *self.buffer, CONFIG)?;
        Ok(())
    }
}

/// Read side of a sync blob, handed to
/// [`CoreCounterpart::sync_from_owner`](super::CoreCounterpart::sync_from_owner).
#[derive(Debug)]
pub struct CoreSyncData<'a> {
    flags: DirtyFlags,
    bytes: &'a [u8],
    cursor: Cell<usize>,
}

impl<'a> CoreSyncData<'a> {
    /// Parses the flags head of a blob.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let (bits, read): (u32, usize) = bincode::serde::decode_from_slice(bytes, CONFIG)?;
        Ok(Self {
            flags: DirtyFlags::from_bits_truncate(bits),
            bytes,
            cursor: Cell::new(read),
        })
    }

    /// The dirty flags the owner wrote this blob for.
    pub fn flags(&self) -> DirtyFlags {
        self.flags
    }

    /// Reads the next field.
    pub fn read<T: DeserializeOwned>(&self) -> Result<T> {
        let start = self.cursor.get();
        let (value, read) = bincode::serde::decode_from_slice(&self.bytes[start..], CONFIG)?;
        self.cursor.set(start + read);
        Ok(value)
    }

    /// Bytes left after the fields read so far.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor.get()
    }
}

/// One frame worth of sync blobs, handed to the core thread in a single message.
///
/// The backing buffer comes from a [`FrameAlloc`](super::FrameAlloc) and is
/// sent back to it when the batch is dropped.
pub struct CoreSyncBatch {
    buffer: Vec<u8>,
    entries: Vec<(CoreObjectId, Range<usize>)>,
    recycle: Option<Sender<Vec<u8>>>,
}

impl CoreSyncBatch {
    /// Creates an empty batch writing into `buffer`.
    pub fn new(mut buffer: Vec<u8>, recycle: Option<Sender<Vec<u8>>>) -> Self {
        buffer.clear();
        Self {
            buffer,
            entries: Vec::new(),
            recycle,
        }
    }

    /// Appends the blob of object `id`, written by `write`.
    ///
    /// On error the partially written blob is discarded.
    pub fn record(
        &mut self,
        id: CoreObjectId,
        flags: DirtyFlags,
        write: impl FnOnce(&mut SyncWriter<'_>) -> Result<()>,
    ) -> Result<()> {
        let start = self.buffer.len();
        let result = SyncWriter::begin(&mut self.buffer, flags).and_then(|mut writer| write(&mut writer));
        match result {
            Ok(()) => {
                self.entries.push((id, start..self.buffer.len()));
                Ok(())
            }
            Err(err) => {
                self.buffer.truncate(start);
                Err(err)
            }
        }
    }

    /// Iterates over the recorded blobs in recording order.
    pub fn iter(&self) -> impl Iterator<Item = (CoreObjectId, &[u8])> + '_ {
        self.entries
            .iter()
            .map(|(id, range)| (*id, &self.buffer[range.clone()]))
    }

    /// Number of recorded blobs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no blob was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of the recorded blobs.
    pub fn byte_len(&self) -> usize {
        self.buffer.len()
    }
}

impl Drop for CoreSyncBatch {
    fn drop(&mut self) {
        if let Some(recycle) = self.recycle.take() {
            let mut buffer = std::mem::take(&mut self.buffer);
            buffer.clear();
            let _ = recycle.send(buffer);
        }
    }
}

impl std::fmt::Debug for CoreSyncBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreSyncBatch")
            .field("objects", &self.entries.len())
            .field("bytes", &self.buffer.len())
            .finish()
    }
}
