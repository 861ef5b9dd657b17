//! Filesystem usage collector.
//!
//! Reports usage for the root mount via libc statvfs.

use serde::Serialize;
use std::ffi::CString;
use std::mem;
use tracing::warn;

pub const ROOT_MOUNT: &str = "/";

/// Usage record for one mount point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilesystemUsage {
    pub mount: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
}

/// Gets (total, used) bytes for `path` using libc statvfs.
///
/// total = f_frsize * f_blocks, used = total - f_frsize * f_bfree
pub fn statvfs_usage(path: &str) -> Result<(u64, u64), String> {
    let c_path = CString::new(path).map_err(|e| format!("Invalid path: {}", e))?;

    // SAFETY: statvfs only writes into the zeroed struct we own, and c_path is a
    // valid NUL-terminated string for the duration of the call.
    let stat = unsafe {
        let mut stat: libc::statvfs = mem::zeroed();
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            return Err(format!(
                "statvfs failed for {}: {}",
                path,
                std::io::Error::last_os_error()
            ));
        }
        stat
    };

    let block_size = stat.f_frsize as u64;
    let total = block_size.saturating_mul(stat.f_blocks as u64);
    let free = block_size.saturating_mul(stat.f_bfree as u64);

    Ok((total, total.saturating_sub(free)))
}

/// Usage of `mount`. Never fails: an unreadable mount reports zeros so the
/// record is always present in the snapshot.
pub fn read_mount_usage(mount: &str) -> FilesystemUsage {
    let (total_bytes, used_bytes) = statvfs_usage(mount).unwrap_or_else(|e| {
        warn!("{}", e);
        (0, 0)
    });

    FilesystemUsage {
        mount: mount.to_string(),
        total_bytes,
        used_bytes,
    }
}

/// Usage of the root filesystem.
pub fn read_root_filesystem() -> FilesystemUsage {
    read_mount_usage(ROOT_MOUNT)
}
