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

//! Errors reported by resource backends.

use super::SeekOrigin;
use std::fmt;

/// An error raised by a [`ResourceType`](super::ResourceType) or one of its
/// streams.
#[derive(Debug)]
pub enum ResourceError {
    /// The backend has nothing at the given path.
    NotFound {
        /// The backend path that was looked up.
        path: String,
    },
    /// The backend does not implement the requested operation.
    Unsupported {
        /// Name of the operation, e.g. `"write"`.
        operation: &'static str,
    },
    /// A seek would move the cursor outside the resource.
    InvalidSeek {
        /// The requested offset.
        offset: i64,
        /// The requested origin.
        origin: SeekOrigin,
    },
    /// The backend object is in use and cannot be modified.
    InUse {
        /// The backend path of the busy resource.
        path: String,
    },
    /// The stream was already closed.
    Closed,
    /// The backend panicked while performing the operation.
    Panicked {
        /// Name of the operation, e.g. `"read"`.
        operation: &'static str,
    },
    /// An error from the underlying operating system.
    Io(std::io::Error),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound { path } => write!(f, "No resource found at '{path}'"),
            ResourceError::Unsupported { operation } => {
                write!(f, "Operation '{operation}' is not supported by this resource type")
            }
            ResourceError::InvalidSeek { offset, origin } => {
                write!(f, "Invalid seek of {offset} bytes from {origin:?}")
            }
            ResourceError::InUse { path } => write!(f, "Resource '{path}' is currently in use"),
            ResourceError::Closed => write!(f, "Resource stream is closed"),
            ResourceError::Panicked { operation } => {
                write!(f, "Resource backend panicked during '{operation}'")
            }
            ResourceError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ResourceError {
    fn from(e: std::io::Error) -> Self {
        ResourceError::Io(e)
    }
}
