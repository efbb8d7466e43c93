//! Volume manager - tracks mounted volumes and their liveness

use super::{
	error::VolumeError,
	types::{Volume, VolumeFingerprint},
	VolumeBackend, VolumeExt, VolumeResult,
};
use crate::infra::event::{Event, EventBus};

use std::{
	collections::HashMap,
	path::Path,
	sync::{
		atomic::{AtomicU32, Ordering},
		Arc,
	},
};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Keeps the set of known volumes in sync with the OS.
///
/// Volumes are keyed by fingerprint so a volume that disappears and comes back
/// keeps the id it was first given during this session.
pub struct VolumeManager {
	node_id: Uuid,
	backend: Arc<dyn VolumeBackend>,
	volumes: RwLock<HashMap<VolumeFingerprint, Volume>>,
	next_id: AtomicU32,
	events: EventBus,
}

impl VolumeManager {
	pub fn new(node_id: Uuid, backend: Arc<dyn VolumeBackend>, events: EventBus) -> Self {
		Self {
			node_id,
			backend,
			volumes: RwLock::new(HashMap::new()),
			next_id: AtomicU32::new(1),
			events,
		}
	}

	/// Re-detect volumes and reconcile them with the tracked set
	#[instrument(skip(self))]
	pub async fn refresh(&self) -> VolumeResult<()> {
		let detected = self.backend.list_volumes().await?;
		debug!("Found {} volumes during refresh", detected.len());

		let mut volumes = self.volumes.write().await;
		let mut seen = Vec::with_capacity(detected.len());

		for detected in detected {
			let fingerprint = VolumeFingerprint::new(&self.node_id, &detected);
			seen.push(fingerprint.clone());

			match volumes.get_mut(&fingerprint) {
				Some(existing) => {
					existing.total_bytes_capacity = detected.total_bytes_capacity;
					existing.total_bytes_available = detected.total_bytes_available;
					existing.file_system = detected.file_system;

					if !existing.is_mounted {
						existing.is_mounted = true;
						self.events.emit(Event::VolumeMountChanged {
							volume_id: existing.id,
							is_mounted: true,
						});
					}
				}
				None => {
					let id = self.next_id.fetch_add(1, Ordering::Relaxed);
					let volume = Volume::new(id, fingerprint.clone(), detected);
					info!(id, mount_point = ?volume.mount_point, "Volume added");

					self.events.emit(Event::VolumeAdded {
						volume_id: id,
						mount_point: volume.mount_point.clone(),
					});
					volumes.insert(fingerprint, volume);
				}
			}
		}

		for (fingerprint, volume) in volumes.iter_mut() {
			if volume.is_mounted && !seen.contains(fingerprint) {
				info!(id = volume.id, mount_point = ?volume.mount_point, "Volume went away");
				volume.is_mounted = false;
				self.events.emit(Event::VolumeMountChanged {
					volume_id: volume.id,
					is_mounted: false,
				});
			}
		}

		Ok(())
	}

	/// All known volumes ordered by id
	pub async fn list(&self) -> Vec<Volume> {
		let mut volumes = self
			.volumes
			.read()
			.await
			.values()
			.cloned()
			.collect::<Vec<_>>();
		volumes.sort_by_key(|volume| volume.id);
		volumes
	}

	pub async fn get(&self, id: u32) -> Option<Volume> {
		self.volumes
			.read()
			.await
			.values()
			.find(|volume| volume.id == id)
			.cloned()
	}

	pub async fn get_by_fingerprint(&self, fingerprint: &str) -> Option<Volume> {
		self.volumes
			.read()
			.await
			.values()
			.find(|volume| volume.fingerprint.0 == fingerprint)
			.cloned()
	}

	/// Volume whose mount point is the longest prefix of `path`
	pub async fn volume_for_path(&self, path: &Path) -> Option<Volume> {
		self.volumes
			.read()
			.await
			.values()
			.filter(|volume| volume.contains_path(path))
			.max_by_key(|volume| volume.mount_point.components().count())
			.cloned()
	}

	/// Sum of capacity and free bytes over mounted volumes
	pub async fn mounted_totals(&self) -> (u64, u64) {
		self.volumes
			.read()
			.await
			.values()
			.filter(|volume| volume.is_mounted)
			.fold((0, 0), |(capacity, free), volume| {
				(
					capacity + volume.total_bytes_capacity,
					free + volume.total_bytes_available,
				)
			})
	}

	/// Unmount a volume through the backend and mark it unmounted.
	///
	/// Unmounting a volume that is already unmounted succeeds without touching the OS.
	#[instrument(skip(self))]
	pub async fn unmount(&self, id: u32) -> VolumeResult<Volume> {
		let volume = self.get(id).await.ok_or(VolumeError::NotFound(id))?;

		if !volume.is_mounted {
			debug!(id, "Volume already unmounted");
			return Ok(volume);
		}

		self.backend.unmount(&volume.mount_point).await?;

		let mut volumes = self.volumes.write().await;
		let volume = volumes
			.get_mut(&volume.fingerprint)
			.ok_or(VolumeError::NotFound(id))?;
		volume.is_mounted = false;

		info!(id, mount_point = ?volume.mount_point, "Volume unmounted");
		self.events.emit(Event::VolumeMountChanged {
			volume_id: id,
			is_mounted: false,
		});

		Ok(volume.clone())
	}
}

impl std::fmt::Debug for VolumeManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("VolumeManager")
			.field("node_id", &self.node_id)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::volume::DetectedVolume;

	use async_trait::async_trait;
	use parking_lot::Mutex;
	use pretty_assertions::assert_eq;
	use std::path::PathBuf;

	#[derive(Default)]
	struct FakeBackend {
		volumes: Mutex<Vec<DetectedVolume>>,
		busy: Mutex<bool>,
	}

	#[async_trait]
	impl VolumeBackend for FakeBackend {
		async fn list_volumes(&self) -> VolumeResult<Vec<DetectedVolume>> {
			Ok(self.volumes.lock().clone())
		}

		async fn unmount(&self, mount_point: &Path) -> VolumeResult<()> {
			if *self.busy.lock() {
				return Err(VolumeError::DeviceBusy(mount_point.to_path_buf()));
			}
			self.volumes
				.lock()
				.retain(|volume| volume.mount_point != mount_point);
			Ok(())
		}
	}

	fn detected(mount_point: &str, capacity: u64, free: u64) -> DetectedVolume {
		DetectedVolume {
			name: mount_point.to_string(),
			mount_point: PathBuf::from(mount_point),
			file_system: "ext4".into(),
			total_bytes_capacity: capacity,
			total_bytes_available: free,
			is_removable: false,
		}
	}

	fn manager(backend: Arc<FakeBackend>) -> VolumeManager {
		VolumeManager::new(Uuid::new_v4(), backend, EventBus::default())
	}

	#[tokio::test]
	async fn ids_stay_stable_across_refreshes() {
		let backend = Arc::new(FakeBackend::default());
		*backend.volumes.lock() = vec![detected("/", 100, 10), detected("/mnt/usb", 50, 5)];
		let manager = manager(backend.clone());

		manager.refresh().await.unwrap();
		let usb = manager.volume_for_path(Path::new("/mnt/usb/photos")).await.unwrap();
		assert_eq!(usb.mount_point, PathBuf::from("/mnt/usb"));

		backend.volumes.lock().pop();
		manager.refresh().await.unwrap();
		assert!(!manager.get(usb.id).await.unwrap().is_mounted);

		backend.volumes.lock().push(detected("/mnt/usb", 50, 5));
		manager.refresh().await.unwrap();
		let again = manager.get(usb.id).await.unwrap();
		assert!(again.is_mounted);
		assert_eq!(again.fingerprint, usb.fingerprint);
		assert_eq!(manager.list().await.len(), 2);
	}

	#[tokio::test]
	async fn totals_only_count_mounted_volumes() {
		let backend = Arc::new(FakeBackend::default());
		*backend.volumes.lock() = vec![detected("/", 100, 10), detected("/mnt/usb", 50, 5)];
		let manager = manager(backend);
		manager.refresh().await.unwrap();

		assert_eq!(manager.mounted_totals().await, (150, 15));

		let usb = manager.volume_for_path(Path::new("/mnt/usb")).await.unwrap();
		manager.unmount(usb.id).await.unwrap();
		assert_eq!(manager.mounted_totals().await, (100, 10));
	}

	#[tokio::test]
	async fn unmount_reports_busy_devices_and_unknown_ids() {
		let backend = Arc::new(FakeBackend::default());
		*backend.volumes.lock() = vec![detected("/mnt/usb", 50, 5)];
		*backend.busy.lock() = true;
		let manager = manager(backend.clone());
		manager.refresh().await.unwrap();

		let usb = manager.list().await.remove(0);
		assert!(matches!(
			manager.unmount(usb.id).await,
			Err(VolumeError::DeviceBusy(_))
		));
		assert!(manager.get(usb.id).await.unwrap().is_mounted);

		assert!(matches!(
			manager.unmount(999).await,
			Err(VolumeError::NotFound(999))
		));

		*backend.busy.lock() = false;
		assert!(!manager.unmount(usb.id).await.unwrap().is_mounted);
		// Already unmounted
		assert!(!manager.unmount(usb.id).await.unwrap().is_mounted);
	}
}
