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

use parking_lot::Mutex;

/// A thread-safe, multi-subscriber event channel.
///
/// Every subscriber gets its own unbounded `flume` receiver and sees every
/// event published after it subscribed. Subscribers whose receiver was dropped
/// are pruned on the next publish.
#[derive(Debug)]
pub struct EventBus<T: Clone + Send + 'static> {
    subscribers: Mutex<Vec<flume::Sender<T>>>,
}

impl<T: Clone + Send + 'static> EventBus<T> {
    /// Creates a bus without subscribers.
    pub fn new() -> Self {
        log::debug!("Event bus initialized.");
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a new subscriber and returns its receiving end.
    pub fn subscribe(&self) -> flume::Receiver<T> {
        let (sender, receiver) = flume::unbounded();
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Sends `event` to every live subscriber. Returns how many received it.
    pub fn publish(&self, event: T) -> usize {
        log::trace!("Publishing an event.");

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sender| !sender.is_disconnected());
        let mut delivered = 0;
        for sender in subscribers.iter() {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of subscribers that have not dropped their receiver.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|sender| !sender.is_disconnected())
            .count()
    }
}

impl<T: Clone + Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
