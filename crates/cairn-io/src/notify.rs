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

//! The notification pump: completion callbacks and change notifications.
//!
//! Everything here runs on the main context. Asynchronous reads and writes
//! hand their [`Completion`] to the caller's callback; time queries feed the
//! change detector, which reports additions and removals at once and coalesces
//! modifications behind a quiet period.

use crate::{
    cache::CachedResource,
    queue::{Completion, Outcome, Request, RequestKind},
};
use cairn_core::{EventBus, ResourceEvent, ResourceEventKind, StringId, TIME_UNINITIALIZED};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

struct Scheduled {
    entry: Arc<CachedResource>,
    deadline: Instant,
}

/// Dispatches retired requests and publishes resource events.
pub(crate) struct Notifier {
    events: EventBus<ResourceEvent>,
    delay: Duration,
    scheduled: Vec<Scheduled>,
}

impl Notifier {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            events: EventBus::new(),
            delay,
            scheduled: Vec::new(),
        }
    }

    pub(crate) fn events(&self) -> &EventBus<ResourceEvent> {
        &self.events
    }

    /// Handles one request the worker has finished with.
    pub(crate) fn complete(&mut self, request: Request) {
        let Request {
            kind,
            handle,
            target,
            buffer,
            callback,
            outcome,
        } = request;

        match (kind, outcome) {
            (RequestKind::Read | RequestKind::Write, Outcome::Transferred(result)) => {
                if let Some(target) = &target {
                    target.end_operation();
                    if let Err(e) = &result {
                        log::warn!("Asynchronous operation on <{}> failed: {e}", target.location);
                    }
                }
                if let (Some(callback), Some(handle)) = (callback, handle) {
                    callback(Completion {
                        handle,
                        result,
                        buffer,
                    });
                }
            }
            (RequestKind::Close, Outcome::Closed(result)) => {
                if let (Err(e), Some(target)) = (result, &target) {
                    log::warn!("Deferred close of <{}> failed: {e}", target.location);
                }
            }
            (RequestKind::QueryTime(entry), Outcome::Time(time)) => self.observe(&entry, time),
            (_, _) => log::error!("Retired a request the worker never serviced."),
        }
    }

    /// Compares a freshly polled time with the cached one.
    pub(crate) fn observe(&mut self, entry: &Arc<CachedResource>, time: i64) {
        let previous = entry.time();
        if time == previous {
            return;
        }
        entry.set_time(time);

        if previous == TIME_UNINITIALIZED {
            return;
        }

        if previous == 0 {
            log::debug!("Resource <{}> appeared.", entry.location());
            self.events.publish(entry.event(ResourceEventKind::Add));
        } else if time == 0 {
            log::debug!("Resource <{}> disappeared.", entry.location());
            self.events.publish(entry.event(ResourceEventKind::Remove));
        } else {
            self.schedule(entry, Instant::now());
        }
    }

    /// (Re)arms the update timer of `entry`.
    fn schedule(&mut self, entry: &Arc<CachedResource>, now: Instant) {
        let deadline = now + self.delay;
        match self
            .scheduled
            .iter_mut()
            .find(|s| Arc::ptr_eq(&s.entry, entry))
        {
            Some(scheduled) => scheduled.deadline = deadline,
            None => self.scheduled.push(Scheduled {
                entry: Arc::clone(entry),
                deadline,
            }),
        }
    }

    /// Publishes an update for every entry whose quiet period elapsed.
    pub(crate) fn fire_due(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        let events = &self.events;
        self.scheduled.retain(|scheduled| {
            if scheduled.deadline > now {
                return true;
            }
            log::debug!("Resource <{}> updated.", scheduled.entry.location());
            events.publish(scheduled.entry.event(ResourceEventKind::Update));
            fired += 1;
            false
        });
        fired
    }

    /// Drops pending updates of `group`, or of every group.
    pub(crate) fn cancel(&mut self, group: Option<StringId>) {
        match group {
            Some(id) => self.scheduled.retain(|s| s.entry.group_id() != id),
            None => self.scheduled.clear(),
        }
    }

    #[cfg(test)]
    pub(crate) fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::{ResourceError, ResourceStream, ResourceType};

    struct Timed;

    impl ResourceType for Timed {
        fn tag(&self) -> &str {
            "timed"
        }

        fn locate(&self, _: &str, _: &str, name: &str, _: bool) -> Option<String> {
            Some(name.to_owned())
        }

        fn open(&self, path: &str, _: bool) -> Result<Box<dyn ResourceStream>, ResourceError> {
            Err(ResourceError::NotFound { path: path.to_owned() })
        }

        fn supports_time(&self) -> bool {
            true
        }
    }

    fn entry(group: &str) -> Arc<CachedResource> {
        Arc::new(CachedResource::new(
            StringId::of(group),
            "a.txt",
            ".",
            Arc::new(Timed),
            "a.txt",
        ))
    }

    fn kinds(notifier: &Notifier) -> Vec<ResourceEventKind> {
        notifier.events().drain().into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn first_observation_is_silent() {
        let mut notifier = Notifier::new(Duration::from_millis(10));
        let e = entry("Data");
        notifier.observe(&e, 100);
        assert_eq!(e.time(), 100);
        assert!(kinds(&notifier).is_empty());
        assert_eq!(notifier.scheduled_count(), 0);
    }

    #[test]
    fn add_and_remove_are_immediate() {
        let mut notifier = Notifier::new(Duration::from_secs(60));
        let e = entry("Data");
        notifier.observe(&e, 100);
        notifier.observe(&e, 0);
        notifier.observe(&e, 0);
        notifier.observe(&e, 150);
        assert_eq!(
            kinds(&notifier),
            [ResourceEventKind::Remove, ResourceEventKind::Add]
        );
    }

    #[test]
    fn bursts_are_coalesced() {
        let mut notifier = Notifier::new(Duration::from_millis(50));
        let e = entry("Data");
        notifier.observe(&e, 100);
        notifier.observe(&e, 101);
        notifier.observe(&e, 102);
        notifier.observe(&e, 103);
        assert_eq!(notifier.scheduled_count(), 1);

        assert_eq!(notifier.fire_due(Instant::now()), 0);
        assert_eq!(notifier.fire_due(Instant::now() + Duration::from_millis(60)), 1);

        let events = notifier.events().drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ResourceEventKind::Update);
        assert_eq!(events[0].time, 103);
        assert_eq!(notifier.scheduled_count(), 0);
    }

    #[test]
    fn cancel_is_scoped_to_group() {
        let mut notifier = Notifier::new(Duration::from_millis(50));
        let data = entry("Data");
        let sound = entry("Sound");
        for e in [&data, &sound] {
            notifier.observe(e, 1);
            notifier.observe(e, 2);
        }
        notifier.cancel(Some(StringId::of("Data")));
        assert_eq!(notifier.scheduled_count(), 1);
        notifier.cancel(None);
        assert_eq!(notifier.scheduled_count(), 0);
    }
}
