// SPDX-License-Identifier: Apache-2.0

//! Platform-independent file identity based on inode (Unix) or file index (Windows).
//!
//! The identity survives renames, which is how a rotated-away log file is told
//! apart from a new file that reuses its name.

use serde::{Deserialize, Serialize};
use std::fs::{File, Metadata};
use std::io;
use std::path::Path;

/// Device and inode of a file (volume serial and file index on Windows).
///
/// Only equality is meaningful. Two ids are equal exactly when they refer to
/// the same physical file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    /// Create a FileId from raw device and inode values, e.g. when loading
    /// persisted state.
    pub fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    /// Identity of an already open file.
    #[cfg(unix)]
    pub fn from_file(file: &File) -> io::Result<Self> {
        Ok(Self::from_metadata(&file.metadata()?))
    }

    /// Identity from metadata obtained through `fs::metadata` or `File::metadata`.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }

    /// Identity of an already open file.
    #[cfg(windows)]
    pub fn from_file(file: &File) -> io::Result<Self> {
        use std::os::windows::io::AsRawHandle;
        use windows_sys::Win32::Foundation::HANDLE;
        use windows_sys::Win32::Storage::FileSystem::{
            BY_HANDLE_FILE_INFORMATION, GetFileInformationByHandle,
        };

        let handle = file.as_raw_handle() as HANDLE;
        let mut info: BY_HANDLE_FILE_INFORMATION = unsafe { std::mem::zeroed() };

        let result = unsafe { GetFileInformationByHandle(handle, &mut info) };
        if result == 0 {
            return Err(io::Error::last_os_error());
        }

        let file_index = ((info.nFileIndexHigh as u64) << 32) | (info.nFileIndexLow as u64);

        Ok(Self {
            dev: info.dwVolumeSerialNumber as u64,
            ino: file_index,
        })
    }

    /// Identity of the file at `path`.
    ///
    /// Directory scans use this for every entry, so on Unix it only stats the
    /// path. On Windows the file has to be opened to query its index.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        #[cfg(unix)]
        {
            Ok(Self::from_metadata(&std::fs::metadata(path)?))
        }
        #[cfg(windows)]
        {
            let file = File::open(path)?;
            Self::from_file(&file)
        }
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.dev, self.ino)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_file_id_same_for_path_and_handle() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"test content").unwrap();
        file.flush().unwrap();

        let from_path = FileId::from_path(file.path()).unwrap();
        let from_file = FileId::from_file(&file.reopen().unwrap()).unwrap();

        assert_eq!(from_path, from_file);
    }

    #[test]
    fn test_file_id_different_files() {
        let file1 = NamedTempFile::new().unwrap();
        let file2 = NamedTempFile::new().unwrap();

        let id1 = FileId::from_path(file1.path()).unwrap();
        let id2 = FileId::from_path(file2.path()).unwrap();

        assert_ne!(id1, id2);
    }

    #[test]
    fn test_file_id_survives_rename() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("app.log");
        let rotated = dir.path().join("app.log.1");
        std::fs::write(&original, "line\n").unwrap();

        let before = FileId::from_path(&original).unwrap();
        std::fs::rename(&original, &rotated).unwrap();
        std::fs::write(&original, "new\n").unwrap();

        assert_eq!(before, FileId::from_path(&rotated).unwrap());
        assert_ne!(before, FileId::from_path(&original).unwrap());
    }

    #[test]
    fn test_file_id_serde() {
        let id = FileId::new(64769, 1234);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"{"dev":64769,"ino":1234}"#);
        let restored: FileId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn test_file_id_display() {
        let id = FileId::new(123, 456);
        assert_eq!(format!("{}", id), "123:456");
    }
}
