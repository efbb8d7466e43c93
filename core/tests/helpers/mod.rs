//! Shared setup for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sd_index::{
	config::AppConfig,
	infra::{
		api::{ClientCommand, CommandOutput, CommandRequest, CoreError},
		db::entities::location,
		event::Event,
	},
	volume::{DetectedVolume, VolumeBackend, VolumeError, VolumeResult},
	Core,
};
use std::{
	path::{Path, PathBuf},
	sync::Arc,
	time::Duration,
};
use tempfile::TempDir;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Volumes are whatever the test says is mounted
#[derive(Default)]
pub struct FakeVolumes {
	pub volumes: Mutex<Vec<DetectedVolume>>,
	pub busy: Mutex<bool>,
}

impl FakeVolumes {
	pub fn mount(&self, mount_point: &Path) {
		self.volumes.lock().push(DetectedVolume {
			name: mount_point
				.file_name()
				.map(|name| name.to_string_lossy().to_string())
				.unwrap_or_default(),
			mount_point: mount_point.to_path_buf(),
			file_system: "ext4".to_string(),
			total_bytes_capacity: 1_000_000,
			total_bytes_available: 400_000,
			is_removable: true,
		});
	}
}

#[async_trait]
impl VolumeBackend for FakeVolumes {
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

pub struct TestCore {
	pub core: Core,
	pub backend: Arc<FakeVolumes>,
	/// Root for files the test indexes, lives next to the data directory
	pub files_root: PathBuf,
	_dir: TempDir,
}

/// A core with no background volume polling and a fake volume mounted over `files_root`
pub async fn setup() -> TestCore {
	setup_with(|_| {}).await
}

/// Like [`setup`], with a last say over the config
pub async fn setup_with(configure: impl FnOnce(&mut AppConfig)) -> TestCore {
	let dir = tempfile::tempdir().unwrap();
	let files_root = dir.path().join("files");
	std::fs::create_dir_all(&files_root).unwrap();
	// Locations are registered by canonical path
	let files_root = files_root.canonicalize().unwrap();

	let backend = Arc::new(FakeVolumes::default());
	backend.mount(&files_root);

	let mut config = AppConfig::default_with_dir(dir.path().join("data"));
	config.volumes.refresh_interval_secs = 0;
	config.scanner.workers = 2;
	config.scanner.batch_size = 3;
	config.scanner.lock_timeout_ms = 200;
	configure(&mut config);

	let core = Core::with_config(config, backend.clone()).await.unwrap();

	TestCore {
		core,
		backend,
		files_root,
		_dir: dir,
	}
}

impl TestCore {
	pub async fn run(&self, command: ClientCommand) -> Result<CommandOutput, CoreError> {
		self.core.dispatch(CommandRequest::from(command)).await
	}

	/// Create a directory under the files root and fill it with `(relative path, size)` files
	pub fn populate(&self, dir: &str, files: &[(&str, usize)]) -> PathBuf {
		let root = self.files_root.join(dir);
		for (relative, size) in files {
			write_file(&root.join(relative), *size);
		}
		std::fs::create_dir_all(&root).unwrap();
		root
	}

	/// Like [`TestCore::populate`] with `count` one byte files spread over a few directories
	pub fn populate_many(&self, dir: &str, count: usize) -> PathBuf {
		let files = (0..count)
			.map(|i| (format!("dir{}/file{i}.txt", i % 10), 1))
			.collect::<Vec<_>>();
		let borrowed = files
			.iter()
			.map(|(path, size)| (path.as_str(), *size))
			.collect::<Vec<_>>();
		self.populate(dir, &borrowed)
	}

	/// Register a location without waiting for its initial scan
	pub async fn add_location(&self, path: &Path) -> location::Model {
		self.add_location_to(None, path).await
	}

	pub async fn add_location_to(&self, library_id: Option<Uuid>, path: &Path) -> location::Model {
		let output = self
			.core
			.dispatch(CommandRequest::new(
				library_id,
				ClientCommand::LocCreate {
					path: path.to_path_buf(),
					name: None,
				},
			))
			.await
			.unwrap();

		match output {
			CommandOutput::Location(location) => location,
			other => panic!("unexpected output: {other:?}"),
		}
	}

	/// Register a location and wait for its initial scan to finish
	pub async fn add_scanned_location(&self, path: &Path) -> location::Model {
		let mut rx = self.core.events.subscribe();
		let output = self
			.run(ClientCommand::LocCreate {
				path: path.to_path_buf(),
				name: None,
			})
			.await
			.unwrap();

		let CommandOutput::Location(location) = output else {
			panic!("unexpected output: {output:?}");
		};

		wait_for_scan_end(&mut rx, location.id).await;
		location
	}

	/// Queue a full scan and wait for it to end
	pub async fn full_scan(&self, location_id: i32) -> Event {
		let mut rx = self.core.events.subscribe();
		self.run(ClientCommand::LocScanFull { location_id })
			.await
			.unwrap();
		wait_for_scan_end(&mut rx, location_id).await
	}
}

pub fn write_file(path: &Path, size: usize) {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap();
	}
	std::fs::write(path, vec![b'x'; size]).unwrap();
}

/// Next completed, cancelled or failed scan event for `location_id`
pub async fn wait_for_scan_end(rx: &mut broadcast::Receiver<Event>, location_id: i32) -> Event {
	tokio::time::timeout(Duration::from_secs(10), async {
		loop {
			let event = rx.recv().await.unwrap();
			let ended = match &event {
				Event::ScanCompleted { location_id: id, .. }
				| Event::ScanCancelled { location_id: id, .. }
				| Event::ScanFailed { location_id: id, .. } => *id == location_id,
				_ => false,
			};
			if ended {
				return event;
			}
		}
	})
	.await
	.expect("scan did not finish in time")
}
