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

//! The core thread: sole owner of every core counterpart.

use super::dirty::CoreObjectId;
use super::sync_data::{CoreSyncBatch, CoreSyncData};
use super::CoreCounterpart;
use crate::error::{ResourceError, Result};
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Configuration of the core thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreThreadConfig {
    /// Name given to the OS thread.
    pub name: String,
    /// Maximum number of queued commands. `0` means unbounded.
    ///
    /// A bounded queue can deadlock when the last handle to a core-paired
    /// resource is dropped on the core thread itself.
    pub queue_capacity: usize,
}

impl Default for CoreThreadConfig {
    fn default() -> Self {
        Self {
            name: "strata-core".to_string(),
            queue_capacity: 0,
        }
    }
}

type QueryFn = Box<dyn FnOnce(Option<&dyn CoreCounterpart>) + Send>;

enum CoreCommand {
    Create {
        id: CoreObjectId,
        counterpart: Box<dyn CoreCounterpart>,
    },
    Sync(CoreSyncBatch),
    Destroy {
        id: CoreObjectId,
        done: Sender<()>,
        retain: Option<Arc<dyn Any + Send + Sync>>,
    },
    Query {
        id: CoreObjectId,
        query: QueryFn,
    },
    Flush(Sender<()>),
    Shutdown,
}

#[derive(Debug, Default)]
struct CoreThreadStats {
    live: AtomicUsize,
    applied_syncs: AtomicU64,
}

/// Signals that a counterpart was torn down on the core thread.
#[derive(Debug)]
pub struct CoreCompletion {
    done: Receiver<()>,
}

impl CoreCompletion {
    /// Blocks until the counterpart is destroyed.
    pub fn wait(self) -> Result<()> {
        self.done
            .recv()
            .map_err(|_| ResourceError::CoreThreadDisconnected)
    }

    /// Blocks for at most `timeout`. Returns `true` if the counterpart was destroyed.
    pub fn wait_timeout(self, timeout: Duration) -> bool {
        self.done.recv_timeout(timeout).is_ok()
    }
}

/// Cloneable sender side of the core thread.
#[derive(Clone)]
pub struct CoreThreadHandle {
    sender: Sender<CoreCommand>,
    stats: Arc<CoreThreadStats>,
}

impl CoreThreadHandle {
    fn send(&self, command: CoreCommand) -> Result<()> {
        self.sender
            .send(command)
            .map_err(|_| ResourceError::CoreThreadDisconnected)
    }

    /// Hands a new counterpart to the core thread, which initializes it.
    pub fn create(&self, id: CoreObjectId, counterpart: Box<dyn CoreCounterpart>) -> Result<()> {
        self.send(CoreCommand::Create { id, counterpart })
    }

    /// Hands a frame worth of sync blobs to the core thread.
    pub fn submit(&self, batch: CoreSyncBatch) -> Result<()> {
        self.send(CoreCommand::Sync(batch))
    }

    /// Tears down the counterpart of `id`.
    ///
    /// `retain` is dropped on the core thread after the counterpart, which
    /// keeps an owner alive until its counterpart is gone.
    pub fn destroy(
        &self,
        id: CoreObjectId,
        retain: Option<Arc<dyn Any + Send + Sync>>,
    ) -> Result<CoreCompletion> {
        let (done, receiver) = crossbeam_channel::bounded(1);
        self.send(CoreCommand::Destroy { id, done, retain })?;
        Ok(CoreCompletion { done: receiver })
    }

    /// Runs `f` against the counterpart of `id` on the core thread and
    /// returns its result.
    ///
    /// Fails with [`ResourceError::UnknownCoreObject`] if no counterpart of
    /// type `C` is registered under `id`.
    pub fn query<C, R>(&self, id: CoreObjectId, f: impl FnOnce(&C) -> R + Send + 'static) -> Result<R>
    where
        C: CoreCounterpart,
        R: Send + 'static,
    {
        let (reply, receiver) = crossbeam_channel::bounded(1);
        let query: QueryFn = Box::new(move |target: Option<&dyn CoreCounterpart>| {
            let result = target
                .and_then(|counterpart| counterpart.as_any().downcast_ref::<C>())
                .map(f);
            let _ = reply.send(result);
        });
        self.send(CoreCommand::Query { id, query })?;

        match receiver.recv() {
            Ok(Some(result)) => Ok(result),
            Ok(None) => Err(ResourceError::UnknownCoreObject(id)),
            Err(_) => Err(ResourceError::CoreThreadDisconnected),
        }
    }

    /// Blocks until every command queued before this call was processed.
    pub fn flush(&self) -> Result<()> {
        let (done, receiver) = crossbeam_channel::bounded(1);
        self.send(CoreCommand::Flush(done))?;
        receiver
            .recv()
            .map_err(|_| ResourceError::CoreThreadDisconnected)
    }

    /// Number of counterparts currently alive on the core thread.
    pub fn live_counterparts(&self) -> usize {
        self.stats.live.load(Ordering::Acquire)
    }

    /// Number of sync blobs applied so far.
    pub fn applied_syncs(&self) -> u64 {
        self.stats.applied_syncs.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for CoreThreadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreThreadHandle")
            .field("live", &self.live_counterparts())
            .finish_non_exhaustive()
    }
}

/// The render/core thread service.
///
/// Processes commands strictly in submission order. Stopping the service
/// destroys every counterpart that is still alive.
pub struct CoreThread {
    handle: CoreThreadHandle,
    running: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl CoreThread {
    /// Spawns the core thread.
    pub fn spawn(config: CoreThreadConfig) -> Result<Self> {
        let (sender, receiver) = if config.queue_capacity == 0 {
            crossbeam_channel::unbounded()
        } else {
            crossbeam_channel::bounded(config.queue_capacity)
        };
        let stats = Arc::new(CoreThreadStats::default());
        let running = Arc::new(AtomicBool::new(true));

        let join = {
            let stats = Arc::clone(&stats);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name(config.name.clone())
                .spawn(move || run(receiver, &stats, &running))?
        };

        Ok(Self {
            handle: CoreThreadHandle { sender, stats },
            running,
            join: Some(join),
        })
    }

    /// A sender side that can be cloned and moved to other threads.
    pub fn handle(&self) -> CoreThreadHandle {
        self.handle.clone()
    }

    /// `true` until the thread has processed a shutdown.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stops the thread after the commands already queued and waits for it.
    pub fn shutdown(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = self.handle.sender.send(CoreCommand::Shutdown);
            if join.join().is_err() {
                log::error!("Core thread panicked.");
            }
        }
    }
}

impl Drop for CoreThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(receiver: Receiver<CoreCommand>, stats: &CoreThreadStats, running: &AtomicBool) {
    let mut counterparts: HashMap<CoreObjectId, Box<dyn CoreCounterpart>> = HashMap::new();
    log::info!("Core thread started.");

    for command in receiver.iter() {
        match command {
            CoreCommand::Create { id, mut counterpart } => {
                counterpart.initialize();
                if let Some(mut previous) = counterparts.insert(id, counterpart) {
                    log::warn!("Core object {id} created twice, destroying the previous counterpart");
                    previous.destroy();
                } else {
                    stats.live.fetch_add(1, Ordering::AcqRel);
                }
                log::trace!("Core object {id} created");
            }
            CoreCommand::Sync(batch) => {
                for (id, bytes) in batch.iter() {
                    let Some(counterpart) = counterparts.get_mut(&id) else {
                        log::warn!("Sync data for unknown core object {id} dropped");
                        continue;
                    };
                    let applied = CoreSyncData::parse(bytes)
                        .and_then(|data| counterpart.sync_from_owner(&data));
                    match applied {
                        Ok(()) => {
                            stats.applied_syncs.fetch_add(1, Ordering::AcqRel);
                        }
                        Err(err) => log::error!("Failed to sync core object {id}: {err}"),
                    }
                }
            }
            CoreCommand::Destroy { id, done, retain } => {
                match counterparts.remove(&id) {
                    Some(mut counterpart) => {
                        counterpart.destroy();
                        stats.live.fetch_sub(1, Ordering::AcqRel);
                        log::trace!("Core object {id} destroyed");
                    }
                    None => log::debug!("Destroy requested for unknown core object {id}"),
                }
                drop(retain);
                let _ = done.send(());
            }
            CoreCommand::Query { id, query } => {
                query(counterparts.get(&id).map(|counterpart| &**counterpart));
            }
            CoreCommand::Flush(done) => {
                let _ = done.send(());
            }
            CoreCommand::Shutdown => break,
        }
    }

    if !counterparts.is_empty() {
        log::debug!(
            "Core thread stopping with {} live counterparts, destroying them",
            counterparts.len()
        );
    }
    for (_, mut counterpart) in counterparts.drain() {
        counterpart.destroy();
        stats.live.fetch_sub(1, Ordering::AcqRel);
    }

    running.store(false, Ordering::SeqCst);
    log::info!("Core thread stopped.");
}
