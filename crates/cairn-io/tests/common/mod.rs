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

#![allow(dead_code)]

use cairn_core::{ResourceError, ResourceStream, ResourceType, SeekOrigin};
use cairn_io::ResourceSystem;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Shared state of a [`GatedType`], observed by the tests.
pub struct Probe {
    released: AtomicBool,
    time: AtomicI64,
    time_queries: AtomicUsize,
    journal: Mutex<Vec<String>>,
}

impl Probe {
    pub fn new(released: bool, time: i64) -> Arc<Self> {
        Arc::new(Self {
            released: AtomicBool::new(released),
            time: AtomicI64::new(time),
            time_queries: AtomicUsize::new(0),
            journal: Mutex::new(Vec::new()),
        })
    }

    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    pub fn set_time(&self, time: i64) {
        self.time.store(time, Ordering::SeqCst);
    }

    pub fn time_queries(&self) -> usize {
        self.time_queries.load(Ordering::SeqCst)
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }
}

/// A resource type whose streams block on read until the probe is released
/// and whose modification time is driven by the test.
pub struct GatedType {
    pub probe: Arc<Probe>,
}

impl GatedType {
    pub fn new(probe: &Arc<Probe>) -> Arc<Self> {
        Arc::new(Self {
            probe: Arc::clone(probe),
        })
    }
}

impl ResourceType for GatedType {
    fn tag(&self) -> &str {
        "gated"
    }

    fn locate(
        &self,
        _group: &str,
        storage: &str,
        name: &str,
        _require_existence: bool,
    ) -> Option<String> {
        Some(format!("{storage}/{name}"))
    }

    fn open(
        &self,
        path: &str,
        _erase_mode: bool,
    ) -> Result<Box<dyn ResourceStream>, ResourceError> {
        Ok(Box::new(GatedStream {
            probe: Arc::clone(&self.probe),
            path: path.to_owned(),
        }))
    }

    fn supports_time(&self) -> bool {
        true
    }

    fn modification_time(&self, _path: &str) -> i64 {
        self.probe.time_queries.fetch_add(1, Ordering::SeqCst);
        self.probe.time.load(Ordering::SeqCst)
    }

    fn supports_write(&self) -> bool {
        true
    }
}

struct GatedStream {
    probe: Arc<Probe>,
    path: String,
}

impl ResourceStream for GatedStream {
    fn size(&mut self) -> Result<u64, ResourceError> {
        Ok(0)
    }

    fn seek(&mut self, _offset: i64, _origin: SeekOrigin) -> Result<u64, ResourceError> {
        Ok(0)
    }

    fn tell(&mut self) -> Result<u64, ResourceError> {
        Ok(0)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, ResourceError> {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !self.probe.released.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        buffer.fill(b'x');
        self.probe.record(format!("read {}", self.path));
        Ok(buffer.len())
    }

    fn write(&mut self, buffer: &[u8]) -> Result<usize, ResourceError> {
        self.probe.record(format!("write {}", self.path));
        Ok(buffer.len())
    }

    fn close(self: Box<Self>) -> Result<(), ResourceError> {
        self.probe.record(format!("close {}", self.path));
        Ok(())
    }
}

/// A resource type whose streams panic on every read.
pub struct PanickingType;

impl ResourceType for PanickingType {
    fn tag(&self) -> &str {
        "panicking"
    }

    fn locate(
        &self,
        _group: &str,
        _storage: &str,
        _name: &str,
        _require_existence: bool,
    ) -> Option<String> {
        None
    }

    fn open(
        &self,
        _path: &str,
        _erase_mode: bool,
    ) -> Result<Box<dyn ResourceStream>, ResourceError> {
        Ok(Box::new(PanickingStream))
    }
}

struct PanickingStream;

impl ResourceStream for PanickingStream {
    fn size(&mut self) -> Result<u64, ResourceError> {
        Ok(0)
    }

    fn seek(&mut self, _offset: i64, _origin: SeekOrigin) -> Result<u64, ResourceError> {
        Ok(0)
    }

    fn tell(&mut self) -> Result<u64, ResourceError> {
        Ok(0)
    }

    fn read(&mut self, _buffer: &mut [u8]) -> Result<usize, ResourceError> {
        panic!("backend read failure");
    }
}

/// Calls `update` every couple of milliseconds for `duration`.
pub fn tick_for(system: &mut ResourceSystem, duration: Duration) {
    let end = Instant::now() + duration;
    while Instant::now() < end {
        system.update();
        thread::sleep(Duration::from_millis(2));
    }
}

/// Pumps until every queued request has been retired.
pub fn drain(system: &mut ResourceSystem) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while system.total_pending_op_count() > 0 {
        assert!(Instant::now() < deadline, "request queue did not drain");
        thread::sleep(Duration::from_millis(1));
    }
    system.pump_notifications();
}
