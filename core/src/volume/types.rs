//! Volume type definitions

use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};
use uuid::Uuid;

/// Stable identity of a volume across polls and restarts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeFingerprint(pub String);

impl VolumeFingerprint {
	pub fn new(node_id: &Uuid, volume: &DetectedVolume) -> Self {
		let mut hasher = blake3::Hasher::new();
		hasher.update(node_id.as_bytes());
		hasher.update(volume.mount_point.to_string_lossy().as_bytes());
		hasher.update(volume.name.as_bytes());
		Self(hasher.finalize().to_hex().to_string())
	}
}

impl fmt::Display for VolumeFingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A volume as reported by the OS on a single poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedVolume {
	pub name: String,
	pub mount_point: PathBuf,
	pub file_system: String,
	pub total_bytes_capacity: u64,
	pub total_bytes_available: u64,
	pub is_removable: bool,
}

/// A volume known to this node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
	/// Stable for the lifetime of the process, keyed by fingerprint
	pub id: u32,
	pub fingerprint: VolumeFingerprint,
	pub name: String,
	pub mount_point: PathBuf,
	pub file_system: String,
	pub total_bytes_capacity: u64,
	pub total_bytes_available: u64,
	pub is_mounted: bool,
	pub is_removable: bool,
}

impl Volume {
	pub fn new(id: u32, fingerprint: VolumeFingerprint, detected: DetectedVolume) -> Self {
		Self {
			id,
			fingerprint,
			name: detected.name,
			mount_point: detected.mount_point,
			file_system: detected.file_system,
			total_bytes_capacity: detected.total_bytes_capacity,
			total_bytes_available: detected.total_bytes_available,
			is_mounted: true,
			is_removable: detected.is_removable,
		}
	}

	pub fn total_bytes_used(&self) -> u64 {
		self.total_bytes_capacity
			.saturating_sub(self.total_bytes_available)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn detected(mount_point: &str) -> DetectedVolume {
		DetectedVolume {
			name: "disk".into(),
			mount_point: mount_point.into(),
			file_system: "ext4".into(),
			total_bytes_capacity: 100,
			total_bytes_available: 40,
			is_removable: false,
		}
	}

	#[test]
	fn fingerprint_depends_on_node_and_mount_point() {
		let node = Uuid::new_v4();

		assert_eq!(
			VolumeFingerprint::new(&node, &detected("/mnt/a")),
			VolumeFingerprint::new(&node, &detected("/mnt/a"))
		);
		assert_ne!(
			VolumeFingerprint::new(&node, &detected("/mnt/a")),
			VolumeFingerprint::new(&node, &detected("/mnt/b"))
		);
		assert_ne!(
			VolumeFingerprint::new(&node, &detected("/mnt/a")),
			VolumeFingerprint::new(&Uuid::new_v4(), &detected("/mnt/a"))
		);
	}

	#[test]
	fn used_bytes_never_underflow() {
		let node = Uuid::new_v4();
		let mut volume = Volume::new(1, VolumeFingerprint::new(&node, &detected("/")), detected("/"));
		assert_eq!(volume.total_bytes_used(), 60);

		volume.total_bytes_available = 500;
		assert_eq!(volume.total_bytes_used(), 0);
	}
}
