//! Filesystem usage via `statvfs(3)`

use std::ffi::CString;
use std::mem::MaybeUninit;
use std::path::Path;

/// Space accounting for one filesystem, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    /// Free space available to unprivileged processes
    pub available_bytes: u64,
    pub used_bytes: u64,
}

impl DiskUsage {
    /// Used share of the space visible to unprivileged processes, 0-100.
    ///
    /// Matches what `df` reports: reserved blocks count neither as used
    /// nor as available.
    pub fn used_percent(&self) -> f64 {
        let visible = self.used_bytes + self.available_bytes;
        if visible == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / visible as f64 * 100.0
    }
}

/// Query space accounting for the filesystem containing `path`.
#[allow(clippy::unnecessary_cast, clippy::useless_conversion)]
pub fn disk_usage(path: &Path) -> Result<DiskUsage, String> {
    let c_path = CString::new(path.as_os_str().to_string_lossy().as_bytes())
        .map_err(|e| e.to_string())?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    let result = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };

    if result != 0 {
        return Err(format!(
            "statvfs failed for {}: {}",
            path.display(),
            std::io::Error::last_os_error()
        ));
    }

    let stat = unsafe { stat.assume_init() };
    let frsize = stat.f_frsize as u64;
    let total = (stat.f_blocks as u64).saturating_mul(frsize);
    let free = (stat.f_bfree as u64).saturating_mul(frsize);
    let available = (stat.f_bavail as u64).saturating_mul(frsize);

    Ok(DiskUsage {
        total_bytes: total,
        available_bytes: available,
        used_bytes: total.saturating_sub(free),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_used_percent() {
        let usage = DiskUsage {
            total_bytes: 1_000,
            available_bytes: 250,
            used_bytes: 700,
        };
        // 700 / (700 + 250)
        assert!((usage.used_percent() - 73.684).abs() < 0.01);
    }

    #[test]
    fn test_empty_filesystem_reports_zero() {
        let usage = DiskUsage {
            total_bytes: 0,
            available_bytes: 0,
            used_bytes: 0,
        };
        assert_eq!(usage.used_percent(), 0.0);
    }

    #[test]
    fn test_root_is_readable() {
        let usage = disk_usage(Path::new("/")).unwrap();
        assert!(usage.total_bytes > 0);
        assert!((0.0..=100.0).contains(&usage.used_percent()));
    }

    #[test]
    fn test_missing_path_is_an_error() {
        assert!(disk_usage(Path::new("/definitely/not/a/real/mount")).is_err());
    }
}
