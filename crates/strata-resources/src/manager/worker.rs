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

//! Threads decoding asynchronous loads.

use super::ManagerInner;
use crate::config::ResourceManagerConfig;
use crate::error::{ManagerError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use strata_core::{HResource, ResourceUUID};

/// A decode queued for a loader thread.
pub(crate) struct LoadJob {
    pub uuid: ResourceUUID,
    pub path: PathBuf,
    pub dependencies: HashMap<ResourceUUID, HResource>,
    pub keep_source_data: bool,
}

/// A fixed set of loader threads fed by one queue.
pub(crate) struct LoaderPool {
    sender: Option<Sender<LoadJob>>,
    workers: Vec<JoinHandle<()>>,
}

impl LoaderPool {
    pub(crate) fn spawn(config: &ResourceManagerConfig, manager: Weak<ManagerInner>) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let count = config.worker_threads.max(1);
        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let receiver = receiver.clone();
            let manager = manager.clone();
            let worker = thread::Builder::new()
                .name(format!("{}-{index}", config.worker_name))
                .spawn(move || run(index, receiver, manager))?;
            workers.push(worker);
        }

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub(crate) fn submit(&self, job: LoadJob) -> Result<()> {
        self.sender
            .as_ref()
            .ok_or(ManagerError::ShutDown)?
            .send(job)
            .map_err(|_| ManagerError::ShutDown)
    }

    /// Closes the queue, lets the threads drain it, and joins them.
    pub(crate) fn shutdown(&mut self) {
        self.sender = None;
        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                log::error!("Loader thread panicked.");
            }
        }
    }
}

impl Drop for LoaderPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(index: usize, receiver: Receiver<LoadJob>, manager: Weak<ManagerInner>) {
    log::debug!("Loader thread {index} started.");

    for job in receiver.iter() {
        let Some(manager) = manager.upgrade() else {
            log::warn!("Resource manager dropped, discarding the load of {}", job.uuid);
            continue;
        };
        manager.run_job(job);
    }

    log::debug!("Loader thread {index} stopped.");
}
