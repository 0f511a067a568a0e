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

use crossbeam_channel::{Receiver, Sender};

/// Frame-scoped byte arena for sync payloads.
///
/// Each frame takes one linear buffer that every dirty owner appends to. Once
/// the core thread has consumed a buffer it sends it back through the return
/// channel, and the next [`begin_frame`](Self::begin_frame) reuses it instead
/// of allocating.
#[derive(Debug)]
pub struct FrameAlloc {
    pool: Vec<Vec<u8>>,
    returns_tx: Sender<Vec<u8>>,
    returns_rx: Receiver<Vec<u8>>,
    capacity_hint: usize,
    max_pooled: usize,
    frame: u64,
}

impl FrameAlloc {
    /// Creates an arena whose fresh buffers start with `capacity_hint` bytes.
    pub fn new(capacity_hint: usize) -> Self {
        let (returns_tx, returns_rx) = crossbeam_channel::unbounded();
        Self {
            pool: Vec::new(),
            returns_tx,
            returns_rx,
            capacity_hint,
            max_pooled: 4,
            frame: 0,
        }
    }

    /// Starts a new frame and returns an empty buffer for it.
    pub fn begin_frame(&mut self) -> Vec<u8> {
        self.reclaim();
        self.frame += 1;
        match self.pool.pop() {
            Some(mut buffer) => {
                buffer.clear();
                buffer
            }
            None => Vec::with_capacity(self.capacity_hint),
        }
    }

    /// Moves every returned buffer back into the pool. Returns how many came back.
    pub fn reclaim(&mut self) -> usize {
        let mut reclaimed = 0;
        for buffer in self.returns_rx.try_iter() {
            reclaimed += 1;
            if self.pool.len() < self.max_pooled {
                self.pool.push(buffer);
            }
        }
        reclaimed
    }

    /// The channel consumers use to hand buffers back.
    pub fn return_sender(&self) -> Sender<Vec<u8>> {
        self.returns_tx.clone()
    }

    /// Number of buffers ready for reuse.
    pub fn pooled(&self) -> usize {
        self.pool.len()
    }

    /// Number of frames started so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

impl Default for FrameAlloc {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returned_buffers_are_reused() {
        let mut frames = FrameAlloc::new(64);
        let mut buffer = frames.begin_frame();
        buffer.extend_from_slice(&[1, 2, 3]);
        let address = buffer.as_ptr();

        frames.return_sender().send(buffer).expect("return channel");
        let reused = frames.begin_frame();

        assert!(reused.is_empty());
        assert_eq!(reused.as_ptr(), address);
        assert_eq!(frames.frame(), 2);
    }

    #[test]
    fn pool_is_bounded() {
        let mut frames = FrameAlloc::new(8);
        let sender = frames.return_sender();
        for _ in 0..10 {
            sender.send(Vec::with_capacity(8)).expect("return channel");
        }
        assert_eq!(frames.reclaim(), 10);
        assert_eq!(frames.pooled(), 4);
    }
}
