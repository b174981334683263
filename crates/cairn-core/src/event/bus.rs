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

/// A generic, thread-safe event channel.
///
/// The bus keeps both ends of an unbounded channel so that publishing never
/// fails while the bus is alive, even when nobody is listening yet.
#[derive(Debug)]
pub struct EventBus<T: Clone + Send + 'static> {
    sender: flume::Sender<T>,
    receiver: flume::Receiver<T>,
}

impl<T: Clone + Send + 'static> EventBus<T> {
    /// Creates a bus over an unbounded channel.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        log::debug!("Event bus initialized.");
        Self { sender, receiver }
    }

    /// Sends `event` to every current and future receiver clone.
    pub fn publish(&self, event: T) {
        log::trace!("Publishing an event.");

        if let Err(e) = self.sender.send(event) {
            log::error!("Failed to send event: {e}. Receiver likely disconnected.");
        }
    }

    /// A clone of the sender end, for producers living outside the owner.
    pub fn sender(&self) -> flume::Sender<T> {
        self.sender.clone()
    }

    /// The receiver end. Clone it to consume events from another thread.
    pub fn receiver(&self) -> &flume::Receiver<T> {
        &self.receiver
    }

    /// Removes and returns every event published so far.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }
}

impl<T: Clone + Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flume::TryRecvError;
    use std::{thread, time::Duration};

    #[derive(Debug, Clone, PartialEq)]
    enum Change {
        Added(&'static str),
        Removed(&'static str),
    }

    #[test]
    fn starts_empty() {
        let bus = EventBus::<Change>::new();
        assert!(bus.receiver().is_empty());
        assert_eq!(bus.receiver().try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn publish_keeps_order() {
        let bus = EventBus::new();
        bus.publish(Change::Added("a"));
        bus.publish(Change::Removed("a"));
        bus.publish(Change::Added("b"));

        assert_eq!(
            bus.drain(),
            vec![Change::Added("a"), Change::Removed("a"), Change::Added("b")]
        );
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn publish_from_another_thread() {
        let bus = EventBus::new();
        let sender = bus.sender();

        let producer = thread::spawn(move || {
            sender.send(Change::Added("remote")).unwrap();
        });
        producer.join().unwrap();

        let received = bus
            .receiver()
            .recv_timeout(Duration::from_millis(100))
            .unwrap();
        assert_eq!(received, Change::Added("remote"));
    }

    #[test]
    fn cloned_receiver_sees_events() {
        let bus = EventBus::new();
        let listener = bus.receiver().clone();
        bus.publish(Change::Removed("x"));
        assert_eq!(listener.try_recv(), Ok(Change::Removed("x")));
    }
}
