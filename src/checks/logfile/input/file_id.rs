// SPDX-License-Identifier: Apache-2.0

//! Platform file identity.
//!
//! On Unix this is the inode number. On Windows it is the file index of an
//! open handle. Platforms without a stable identity report 0, which the
//! rotation detector treats as "unknown" and never compares.

use std::fs::{File, Metadata};

/// Sentinel for an unavailable file identity.
pub const UNKNOWN_INODE: u64 = 0;

/// Inode number from already fetched metadata.
#[cfg(unix)]
pub fn inode_of(metadata: &Metadata, _file: Option<&File>) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

/// File index of an open handle. Metadata alone does not carry it on Windows.
#[cfg(windows)]
pub fn inode_of(_metadata: &Metadata, file: Option<&File>) -> u64 {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::Storage::FileSystem::{
        BY_HANDLE_FILE_INFORMATION, GetFileInformationByHandle,
    };

    let Some(file) = file else {
        return UNKNOWN_INODE;
    };

    let handle = file.as_raw_handle() as HANDLE;
    let mut info: BY_HANDLE_FILE_INFORMATION = unsafe { std::mem::zeroed() };

    let result = unsafe { GetFileInformationByHandle(handle, &mut info) };
    if result == 0 {
        return UNKNOWN_INODE;
    }

    ((info.nFileIndexHigh as u64) << 32) | (info.nFileIndexLow as u64)
}

#[cfg(not(any(unix, windows)))]
pub fn inode_of(_metadata: &Metadata, _file: Option<&File>) -> u64 {
    UNKNOWN_INODE
}

/// Inodes differ only if both are known and unequal.
pub fn inode_changed(stored: u64, current: u64) -> bool {
    stored != UNKNOWN_INODE && current != UNKNOWN_INODE && stored != current
}
