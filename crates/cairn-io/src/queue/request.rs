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

use crate::{
    cache::CachedResource,
    handle::{OpenResource, ResourceHandle},
};
use cairn_core::{ResourceError, ResourceStream};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

/// The result of an asynchronous read or write, handed to its callback on the
/// main context.
#[derive(Debug)]
pub struct Completion {
    /// The handle the operation was issued on.
    pub handle: ResourceHandle,
    /// Bytes transferred, or the backend error.
    pub result: Result<usize, ResourceError>,
    /// The read destination, or the written source.
    pub buffer: Vec<u8>,
}

impl Completion {
    /// The bytes actually transferred.
    pub fn data(&self) -> &[u8] {
        match &self.result {
            Ok(count) => &self.buffer[..(*count).min(self.buffer.len())],
            Err(_) => &[],
        }
    }
}

/// Called once with the [`Completion`] of an asynchronous operation.
pub type CompletionCallback = Box<dyn FnOnce(Completion) + Send + 'static>;

pub(crate) enum RequestKind {
    Read,
    Write,
    Close,
    QueryTime(Arc<CachedResource>),
}

/// What the worker produced for a request.
pub(crate) enum Outcome {
    Pending,
    Transferred(Result<usize, ResourceError>),
    Closed(Result<(), ResourceError>),
    Time(i64),
}

/// A unit of work travelling through the ring.
pub(crate) struct Request {
    pub(crate) kind: RequestKind,
    pub(crate) handle: Option<ResourceHandle>,
    pub(crate) target: Option<Arc<OpenResource>>,
    pub(crate) buffer: Vec<u8>,
    pub(crate) callback: Option<CompletionCallback>,
    pub(crate) outcome: Outcome,
}

impl Request {
    pub(crate) fn read(
        handle: ResourceHandle,
        target: Arc<OpenResource>,
        size: usize,
        callback: Option<CompletionCallback>,
    ) -> Self {
        Self {
            kind: RequestKind::Read,
            handle: Some(handle),
            target: Some(target),
            buffer: vec![0; size],
            callback,
            outcome: Outcome::Pending,
        }
    }

    pub(crate) fn write(
        handle: ResourceHandle,
        target: Arc<OpenResource>,
        data: Vec<u8>,
        callback: Option<CompletionCallback>,
    ) -> Self {
        Self {
            kind: RequestKind::Write,
            handle: Some(handle),
            target: Some(target),
            buffer: data,
            callback,
            outcome: Outcome::Pending,
        }
    }

    pub(crate) fn close(target: Arc<OpenResource>) -> Self {
        Self {
            kind: RequestKind::Close,
            handle: None,
            target: Some(target),
            buffer: Vec::new(),
            callback: None,
            outcome: Outcome::Pending,
        }
    }

    pub(crate) fn query_time(entry: Arc<CachedResource>) -> Self {
        Self {
            kind: RequestKind::QueryTime(entry),
            handle: None,
            target: None,
            buffer: Vec::new(),
            callback: None,
            outcome: Outcome::Pending,
        }
    }

    /// Time queries are the only requests that may be dropped under load.
    pub(crate) fn is_sheddable(&self) -> bool {
        matches!(self.kind, RequestKind::QueryTime(_))
    }

    /// Performs the request. Runs on the worker thread.
    ///
    /// A panicking backend fails the request instead of the worker.
    pub(crate) fn execute(&mut self) {
        self.outcome = match &self.kind {
            RequestKind::Read => {
                Outcome::Transferred(guarded("read", || {
                    transfer(&self.target, &mut self.buffer, |stream, buffer| stream.read(buffer))
                }))
            }
            RequestKind::Write => {
                Outcome::Transferred(guarded("write", || {
                    transfer(&self.target, &mut self.buffer, |stream, buffer| stream.write(buffer))
                }))
            }
            RequestKind::Close => Outcome::Closed(match &self.target {
                Some(target) => guarded("close", || target.close()),
                None => Ok(()),
            }),
            RequestKind::QueryTime(entry) => {
                let time = panic::catch_unwind(AssertUnwindSafe(|| entry.query_time()))
                    .unwrap_or_else(|_| {
                        log::error!("Time query of <{}> panicked.", entry.location());
                        entry.time()
                    });
                entry.end_watch();
                Outcome::Time(time)
            }
        };
    }
}

fn guarded<T>(
    operation: &'static str,
    run: impl FnOnce() -> Result<T, ResourceError>,
) -> Result<T, ResourceError> {
    panic::catch_unwind(AssertUnwindSafe(run)).unwrap_or_else(|_| {
        log::error!("Resource backend panicked during {operation}.");
        Err(ResourceError::Panicked { operation })
    })
}

fn transfer<F>(
    target: &Option<Arc<OpenResource>>,
    buffer: &mut [u8],
    operation: F,
) -> Result<usize, ResourceError>
where
    F: FnOnce(&mut Box<dyn ResourceStream>, &mut [u8]) -> Result<usize, ResourceError>,
{
    let target = target.as_ref().ok_or(ResourceError::Closed)?;
    let mut stream = target.stream();
    let stream = stream.as_mut().ok_or(ResourceError::Closed)?;
    operation(stream, buffer)
}
