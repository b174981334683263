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

mod common;

use anyhow::Result;
use cairn_core::{ResourceError, SeekOrigin};
use cairn_io::{Completion, ResourceConfig, ResourceSystem, ServiceError, SystemConfig};
use common::{drain, init_logger, GatedType, PanickingType, Probe};
use std::{
    fs,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};
use tempfile::tempdir;

fn small_system(capacity: usize) -> Result<ResourceSystem> {
    init_logger();
    Ok(ResourceSystem::new(SystemConfig {
        request_capacity: capacity,
        ..SystemConfig::default()
    })?)
}

type Completed = Arc<Mutex<Vec<(usize, Vec<u8>)>>>;

fn recorder(completed: &Completed) -> impl FnOnce(Completion) + Send + 'static {
    let completed = Arc::clone(completed);
    move |completion: Completion| {
        let count = *completion.result.as_ref().unwrap();
        completed
            .lock()
            .unwrap()
            .push((count, completion.data().to_vec()));
    }
}

#[test]
fn write_seek_read_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let location = format!("file:{}", dir.path().join("save.bin").to_string_lossy());
    let mut system = small_system(16)?;

    let handle = system.open(&location, true)?;
    assert_eq!(system.write(handle, b"cairn")?, 5);
    assert_eq!(system.seek(handle, 0, SeekOrigin::Start)?, 0);

    let mut out = [0u8; 5];
    assert_eq!(system.read(handle, &mut out)?, 5);
    assert_eq!(&out, b"cairn");
    assert_eq!(system.tell(handle)?, 5);
    assert_eq!(system.size(handle)?, 5);
    assert_eq!(system.location_of(handle).unwrap().as_str(), location);

    system.close(handle)?;
    assert!(matches!(
        system.close(handle),
        Err(ServiceError::InvalidHandle(_))
    ));
    Ok(())
}

#[test]
fn open_without_erase_requires_existing_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("new.bin");
    let location = format!("file:{}", path.to_string_lossy());
    let mut system = small_system(16)?;

    assert!(system.open(&location, false).is_err());
    assert!(!path.exists());

    let handle = system.open(&location, true)?;
    assert!(path.exists());
    assert_eq!(system.size(handle)?, 0);
    system.close(handle)?;

    assert!(matches!(
        system.open("nowhere:thing", false),
        Err(ServiceError::UnknownType(_))
    ));
    Ok(())
}

#[test]
fn async_read_and_write_complete_on_pump() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("data.bin");
    fs::write(&path, b"0123456789")?;
    let location = format!("file:{}", path.to_string_lossy());
    let mut system = small_system(16)?;

    let completed: Completed = Arc::default();
    let handle = system.open(&location, false)?;
    system.read_async(handle, 4, recorder(&completed))?;
    system.read_async(handle, 4, recorder(&completed))?;
    system.write_async(handle, b"AB".to_vec(), recorder(&completed))?;
    assert!(system.pending_op_count(handle) > 0 || !completed.lock().unwrap().is_empty());

    assert!(matches!(
        system.size(handle),
        Err(ServiceError::PendingOperations { .. }) | Ok(10)
    ));

    drain(&mut system);
    assert_eq!(system.pending_op_count(handle), 0);
    assert_eq!(
        *completed.lock().unwrap(),
        vec![
            (4, b"0123".to_vec()),
            (4, b"4567".to_vec()),
            (2, b"AB".to_vec()),
        ]
    );

    system.close(handle)?;
    assert_eq!(fs::read(&path)?, b"01234567AB");
    Ok(())
}

#[test]
fn close_waits_for_pending_operations() -> Result<()> {
    let mut system = small_system(16)?;
    let probe = Probe::new(false, 1);
    system.register_type(GatedType::new(&probe))?;

    let completed: Completed = Arc::default();
    let handle = system.open("gated:./a", false)?;
    system.read_async(handle, 3, recorder(&completed))?;
    system.close(handle)?;

    assert!(probe.journal().is_empty());
    assert!(matches!(
        system.read_async(handle, 1, |_| {}),
        Err(ServiceError::InvalidHandle(_))
    ));

    probe.release();
    drain(&mut system);

    assert_eq!(probe.journal(), ["read ./a", "close ./a"]);
    assert_eq!(*completed.lock().unwrap(), vec![(3, b"xxx".to_vec())]);
    Ok(())
}

#[test]
fn time_queries_are_shed_under_load() -> Result<()> {
    let mut system = small_system(16)?;
    let probe = Probe::new(false, 1);
    system.register_type(GatedType::new(&probe))?;
    system.set_config(ResourceConfig::new().with_watch_list(["Watched"]))?;
    system.locate("Watched", "a")?;

    let completed: Completed = Arc::default();
    let handle = system.open("gated:./payload", false)?;
    for _ in 0..13 {
        system.read_async(handle, 1, recorder(&completed))?;
    }

    for _ in 0..20 {
        system.update();
    }
    assert_eq!(probe.time_queries(), 0);

    probe.release();
    drain(&mut system);
    assert_eq!(completed.lock().unwrap().len(), 13);

    for _ in 0..20 {
        system.update();
        thread::sleep(Duration::from_millis(1));
    }
    drain(&mut system);
    assert!(probe.time_queries() > 0);
    Ok(())
}

#[test]
fn full_queue_stalls_producer_until_worker_progresses() -> Result<()> {
    let mut system = small_system(4)?;
    let probe = Probe::new(false, 1);
    system.register_type(GatedType::new(&probe))?;

    let completed: Completed = Arc::default();
    let handle = system.open("gated:./a", false)?;
    for _ in 0..3 {
        system.read_async(handle, 1, recorder(&completed))?;
    }

    let releaser = {
        let probe = Arc::clone(&probe);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            probe.release();
        })
    };

    system.read_async(handle, 1, recorder(&completed))?;
    releaser.join().unwrap();

    drain(&mut system);
    assert_eq!(completed.lock().unwrap().len(), 4);
    let indices = system.queue_indices();
    assert_eq!(indices.input, indices.process);
    assert_eq!(indices.process, indices.output);
    Ok(())
}

#[test]
fn shutdown_delivers_in_flight_callbacks() -> Result<()> {
    let mut system = small_system(16)?;
    let probe = Probe::new(false, 1);
    system.register_type(GatedType::new(&probe))?;

    let completed: Completed = Arc::default();
    let handle = system.open("gated:./a", false)?;
    for _ in 0..3 {
        system.read_async(handle, 2, recorder(&completed))?;
    }

    let releaser = {
        let probe = Arc::clone(&probe);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            probe.release();
        })
    };
    system.shutdown();
    releaser.join().unwrap();

    assert_eq!(completed.lock().unwrap().len(), 3);
    assert_eq!(system.open_count(), 0);
    assert_eq!(probe.journal().last().map(String::as_str), Some("close ./a"));

    let indices = system.queue_indices();
    assert_eq!(indices.input, indices.output);
    assert!(system.read_async(handle, 1, |_| {}).is_err());
    Ok(())
}

#[test]
fn panicking_backend_fails_requests_without_stalling_the_queue() -> Result<()> {
    let mut system = small_system(4)?;
    system.register_type(Arc::new(PanickingType))?;
    let probe = Probe::new(true, 1);
    system.register_type(GatedType::new(&probe))?;

    let failures = Arc::new(Mutex::new(Vec::new()));
    let handle = system.open("panicking:x", false)?;
    for _ in 0..6 {
        let failures = Arc::clone(&failures);
        system.read_async(handle, 1, move |completion| {
            failures.lock().unwrap().push(completion.result.err());
        })?;
    }
    drain(&mut system);

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 6);
    assert!(failures
        .iter()
        .all(|e| matches!(e, Some(ResourceError::Panicked { operation: "read" }))));
    system.close(handle)?;

    let completed: Completed = Arc::default();
    let gated = system.open("gated:./b", false)?;
    system.read_async(gated, 2, recorder(&completed))?;
    drain(&mut system);
    assert_eq!(*completed.lock().unwrap(), vec![(2, b"xx".to_vec())]);
    Ok(())
}
