//! Platform volume detection and unmount

use super::{error::VolumeError, types::DetectedVolume, VolumeBackend, VolumeResult};

use async_trait::async_trait;
use std::path::Path;
use sysinfo::Disks;
use tokio::{process::Command, task};
use tracing::{debug, warn};

/// Filesystems that never hold user data
const VIRTUAL_FILESYSTEMS: &[&str] = &[
	"devfs", "sysfs", "proc", "procfs", "tmpfs", "ramfs", "devtmpfs", "overlay", "squashfs",
	"autofs", "cgroup", "cgroup2",
];

fn is_virtual_filesystem(fs: &str) -> bool {
	VIRTUAL_FILESYSTEMS
		.iter()
		.any(|virtual_fs| fs.eq_ignore_ascii_case(virtual_fs))
}

/// Backend talking to the real OS
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemVolumeBackend;

#[async_trait]
impl VolumeBackend for SystemVolumeBackend {
	async fn list_volumes(&self) -> VolumeResult<Vec<DetectedVolume>> {
		task::spawn_blocking(|| {
			let disks = Disks::new_with_refreshed_list();

			disks
				.list()
				.iter()
				.filter(|disk| !is_virtual_filesystem(&disk.file_system().to_string_lossy()))
				.map(|disk| DetectedVolume {
					name: disk.name().to_string_lossy().to_string(),
					mount_point: disk.mount_point().to_path_buf(),
					file_system: disk.file_system().to_string_lossy().to_string(),
					total_bytes_capacity: disk.total_space(),
					total_bytes_available: disk.available_space(),
					is_removable: disk.is_removable(),
				})
				.collect()
		})
		.await
		.map_err(|e| VolumeError::Platform(format!("Task join error: {e}")))
	}

	async fn unmount(&self, mount_point: &Path) -> VolumeResult<()> {
		unmount_volume(mount_point).await
	}
}

#[cfg(target_os = "linux")]
async fn unmount_volume(path: &Path) -> VolumeResult<()> {
	run_unmount(Command::new("umount").arg(path), path).await
}

#[cfg(target_os = "macos")]
async fn unmount_volume(path: &Path) -> VolumeResult<()> {
	run_unmount(Command::new("diskutil").arg("unmount").arg(path), path).await
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
async fn unmount_volume(_path: &Path) -> VolumeResult<()> {
	Err(VolumeError::Unsupported)
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
async fn run_unmount(command: &mut Command, path: &Path) -> VolumeResult<()> {
	let output = command
		.output()
		.await
		.map_err(|e| VolumeError::Platform(format!("Failed to execute unmount command: {e}")))?;

	if output.status.success() {
		debug!(?path, "Unmounted volume");
		return Ok(());
	}

	let stderr = String::from_utf8_lossy(&output.stderr);
	warn!(?path, %stderr, "Unmount failed");
	Err(classify_unmount_failure(&stderr, path))
}

/// Maps the tool's error output to a typed failure.
/// Busy devices are never force-unmounted, callers must close open handles first.
fn classify_unmount_failure(stderr: &str, path: &Path) -> VolumeError {
	let lowered = stderr.to_lowercase();

	if lowered.contains("busy") || lowered.contains("in use") {
		VolumeError::DeviceBusy(path.to_path_buf())
	} else if lowered.contains("permission denied")
		|| lowered.contains("not permitted")
		|| lowered.contains("must be superuser")
	{
		VolumeError::PermissionDenied(path.to_path_buf())
	} else {
		VolumeError::Platform(format!("Failed to unmount volume: {}", stderr.trim()))
	}
}
