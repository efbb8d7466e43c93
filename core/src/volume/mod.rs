//! Volume management
//!
//! Volumes are discovered from the OS and never persisted. Locations only keep a
//! weak reference to the volume they live on (its fingerprint) and are mapped
//! back to a volume by mount point when liveness changes.

pub mod error;
pub mod manager;
pub mod os;
pub mod types;

use async_trait::async_trait;
use std::path::Path;

pub use error::{VolumeError, VolumeResult};
pub use manager::VolumeManager;
pub use os::SystemVolumeBackend;
pub use types::{DetectedVolume, Volume, VolumeFingerprint};

/// Access to the platform's mounted storage devices
#[async_trait]
pub trait VolumeBackend: Send + Sync + 'static {
	/// Currently mounted volumes
	async fn list_volumes(&self) -> VolumeResult<Vec<DetectedVolume>>;

	/// Ask the OS to unmount the volume mounted at `mount_point`
	async fn unmount(&self, mount_point: &Path) -> VolumeResult<()>;
}

/// Extension trait for Volume operations
pub trait VolumeExt {
	/// Check if path is on this volume
	fn contains_path(&self, path: &Path) -> bool;
}

impl VolumeExt for Volume {
	fn contains_path(&self, path: &Path) -> bool {
		path.starts_with(&self.mount_point)
	}
}
