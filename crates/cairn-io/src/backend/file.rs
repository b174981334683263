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

//! The `file` resource type: resources on the host file system.

use cairn_core::{ResourceError, ResourceStream, ResourceType, SeekOrigin, DEFAULT_STORAGE};
use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
    path::Path,
    time::UNIX_EPOCH,
};

/// Tag of the file resource type.
pub const FILE_TAG: &str = "file";

/// Resolves storages as directories and names as relative file paths.
///
/// The default storage is the working directory. Modification times are
/// microseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileResourceType;

impl FileResourceType {
    fn join(storage: &str, name: &str) -> String {
        if storage == DEFAULT_STORAGE || storage.is_empty() {
            name.to_owned()
        } else {
            format!("{}/{name}", storage.trim_end_matches(['/', '\\']))
        }
    }
}

impl ResourceType for FileResourceType {
    fn tag(&self) -> &str {
        FILE_TAG
    }

    fn locate(
        &self,
        _group: &str,
        storage: &str,
        name: &str,
        require_existence: bool,
    ) -> Option<String> {
        let path = Self::join(storage, name);
        if Path::new(&path).is_file() {
            return Some(path);
        }
        if require_existence {
            return None;
        }

        // Probe creatability without leaving anything behind.
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(probe) => {
                drop(probe);
                if let Err(e) = fs::remove_file(&path) {
                    log::warn!("Failed to remove creation probe '{path}': {e}");
                }
                Some(path)
            }
            Err(_) => None,
        }
    }

    fn open(&self, path: &str, erase_mode: bool) -> Result<Box<dyn ResourceStream>, ResourceError> {
        let file = if erase_mode {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?
        } else {
            match OpenOptions::new().read(true).write(true).open(path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(ResourceError::NotFound { path: path.to_owned() })
                }
                Err(_) => File::open(path)?,
            }
        };
        Ok(Box::new(FileStream { file }))
    }

    fn supports_time(&self) -> bool {
        true
    }

    fn modification_time(&self, path: &str) -> i64 {
        fs::metadata(path)
            .ok()
            .filter(|meta| meta.is_file())
            .and_then(|meta| meta.modified().ok())
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |elapsed| elapsed.as_micros().max(1) as i64)
    }

    fn supports_write(&self) -> bool {
        true
    }

    fn supports_delete(&self) -> bool {
        true
    }

    fn delete(&self, path: &str) -> Result<(), ResourceError> {
        fs::remove_file(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ResourceError::NotFound { path: path.to_owned() },
            _ => e.into(),
        })
    }
}

/// An opened file.
struct FileStream {
    file: File,
}

impl ResourceStream for FileStream {
    fn size(&mut self) -> Result<u64, ResourceError> {
        Ok(self.file.metadata()?.len())
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64, ResourceError> {
        let target = match origin {
            SeekOrigin::Start => {
                let start = u64::try_from(offset)
                    .map_err(|_| ResourceError::InvalidSeek { offset, origin })?;
                SeekFrom::Start(start)
            }
            SeekOrigin::Current => SeekFrom::Current(offset),
            SeekOrigin::End => SeekFrom::End(offset),
        };
        self.file.seek(target).map_err(|e| match e.kind() {
            ErrorKind::InvalidInput => ResourceError::InvalidSeek { offset, origin },
            _ => e.into(),
        })
    }

    fn tell(&mut self) -> Result<u64, ResourceError> {
        Ok(self.file.stream_position()?)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, ResourceError> {
        let mut filled = 0;
        while filled < buffer.len() {
            match self.file.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(count) => filled += count,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    fn write(&mut self, buffer: &[u8]) -> Result<usize, ResourceError> {
        self.file.write_all(buffer)?;
        Ok(buffer.len())
    }

    fn close(self: Box<Self>) -> Result<(), ResourceError> {
        let mut file = self.file;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(dir: &tempfile::TempDir) -> String {
        dir.path().to_string_lossy().into_owned()
    }

    #[test]
    fn locate_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("foo.txt"), b"foo").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let storage = storage(&dir);

        let path = FileResourceType.locate("Data", &storage, "foo.txt", true).unwrap();
        assert!(path.ends_with("foo.txt"));
        assert!(FileResourceType.locate("Data", &storage, "bar.txt", true).is_none());
        assert!(FileResourceType.locate("Data", &storage, "sub", true).is_none());
    }

    #[test]
    fn locate_for_creation_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);

        let path = FileResourceType.locate("Data", &storage, "new.txt", false).unwrap();
        assert!(!Path::new(&path).exists());
        assert!(FileResourceType
            .locate("Data", &storage, "missing_dir/new.txt", false)
            .is_none());
    }

    #[test]
    fn erase_mode_creates_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin").to_string_lossy().into_owned();

        assert!(matches!(
            FileResourceType.open(&path, false),
            Err(ResourceError::NotFound { .. })
        ));

        let mut stream = FileResourceType.open(&path, true).unwrap();
        assert_eq!(stream.write(b"hello").unwrap(), 5);
        stream.close().unwrap();

        let mut stream = FileResourceType.open(&path, true).unwrap();
        assert_eq!(stream.size().unwrap(), 0);
    }

    #[test]
    fn seek_tell_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"0123456789").unwrap();

        let mut stream = FileResourceType.open(&path.to_string_lossy(), false).unwrap();
        assert_eq!(stream.size().unwrap(), 10);
        assert_eq!(stream.seek(-3, SeekOrigin::End).unwrap(), 7);
        let mut buffer = [0u8; 8];
        assert_eq!(stream.read(&mut buffer).unwrap(), 3);
        assert_eq!(&buffer[..3], b"789");
        assert_eq!(stream.tell().unwrap(), 10);
        assert!(matches!(
            stream.seek(-1, SeekOrigin::Start),
            Err(ResourceError::InvalidSeek { .. })
        ));
    }

    #[test]
    fn time_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        let path_str = path.to_string_lossy().into_owned();
        fs::write(&path, b"t").unwrap();

        assert!(FileResourceType.modification_time(&path_str) > 0);
        FileResourceType.delete(&path_str).unwrap();
        assert_eq!(FileResourceType.modification_time(&path_str), 0);
        assert!(matches!(
            FileResourceType.delete(&path_str),
            Err(ResourceError::NotFound { .. })
        ));
    }
}
