//! File indexing and location management core
//!
//! [`Core`] wires the node together: configuration, the event bus, volume
//! tracking, the libraries and their content indexes, the scan worker pool
//! and the dispatcher clients talk to.

pub mod config;
pub mod index;
pub mod infra;
pub mod library;
pub mod location;
pub mod ops;
pub mod util;
pub mod volume;

use config::AppConfig;
use infra::{
	api::{ClientQuery, CommandOutput, CommandRequest, CoreError, Dispatcher, QueryOutput},
	event::{Event, EventBus},
};
use library::LibraryManager;
use location::LocationManager;
use ops::indexing::{LocationLocks, ScanPool, Scanner};
use volume::{SystemVolumeBackend, VolumeBackend, VolumeManager};

use anyhow::Context;
use parking_lot::Mutex;
use std::{path::Path, sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEFAULT_LIBRARY_NAME: &str = "My Library";

/// A running node
pub struct Core {
	pub config: AppConfig,
	pub events: EventBus,
	pub volumes: Arc<VolumeManager>,
	pub libraries: Arc<LibraryManager>,
	pub locations: Arc<LocationManager>,
	pub scanner: Arc<Scanner>,
	pub locks: Arc<LocationLocks>,
	pool: Arc<ScanPool>,
	dispatcher: Dispatcher,
	monitor: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl Core {
	/// Start a node storing its state in `data_dir`, talking to the real OS for volumes
	pub async fn new(data_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
		let config = AppConfig::load_or_create(data_dir.as_ref())?;
		Self::with_config(config, Arc::new(SystemVolumeBackend)).await
	}

	pub async fn with_config(
		config: AppConfig,
		volume_backend: Arc<dyn VolumeBackend>,
	) -> anyhow::Result<Self> {
		config.ensure_directories()?;
		info!(data_dir = %config.data_dir.display(), node_id = %config.node_id, "Starting core");

		let events = EventBus::default();

		let volumes = Arc::new(VolumeManager::new(
			config.node_id,
			volume_backend,
			events.clone(),
		));
		if let Err(e) = volumes.refresh().await {
			warn!(?e, "Initial volume detection failed");
		}

		let libraries = Arc::new(LibraryManager::new(
			config.libraries_dir(),
			events.clone(),
		));
		libraries
			.init()
			.await
			.context("Failed to load libraries")?;
		if libraries.list().await.is_empty() {
			libraries
				.create(DEFAULT_LIBRARY_NAME, None)
				.await
				.context("Failed to create default library")?;
		}

		let locks = Arc::new(LocationLocks::default());
		let locations = Arc::new(LocationManager::new(
			config.node_id,
			Arc::clone(&volumes),
			Arc::clone(&locks),
			config.scanner.lock_timeout(),
			events.clone(),
		));

		for library in libraries.list().await {
			if let Err(e) = locations.refresh_online_status(&library).await {
				warn!(library_id = %library.id(), ?e, "Failed to refresh location liveness");
			}
		}

		let scanner = Arc::new(Scanner::new(config.scanner.clone(), events.clone()));
		let pool = Arc::new(ScanPool::start(
			Arc::clone(&scanner),
			config.scanner.workers,
			config.scanner.queue_capacity,
			events.clone(),
		));

		let dispatcher = Dispatcher::new(
			Arc::clone(&libraries),
			Arc::clone(&locations),
			Arc::clone(&volumes),
			Arc::clone(&scanner),
			Arc::clone(&pool),
			Arc::clone(&locks),
			events.clone(),
			config.data_dir.clone(),
			config.scanner.lock_timeout(),
		);

		let core = Self {
			config,
			events,
			volumes,
			libraries,
			locations,
			scanner,
			locks,
			pool,
			dispatcher,
			monitor: Mutex::new(None),
		};

		if core.config.volumes.refresh_interval_secs > 0 {
			core.start_volume_monitor(Duration::from_secs(
				core.config.volumes.refresh_interval_secs,
			));
		}

		core.events.emit(Event::CoreStarted);
		info!("Core started");

		Ok(core)
	}

	/// Periodically re-detect volumes and re-evaluate location liveness in every library
	pub fn start_volume_monitor(&self, interval: Duration) {
		let token = CancellationToken::new();
		let volumes = Arc::clone(&self.volumes);
		let libraries = Arc::clone(&self.libraries);
		let locations = Arc::clone(&self.locations);

		let handle = tokio::spawn({
			let token = token.clone();
			async move {
				let mut ticker = tokio::time::interval(interval);
				// The first tick completes immediately and startup already refreshed
				ticker.tick().await;

				loop {
					tokio::select! {
						_ = token.cancelled() => break,
						_ = ticker.tick() => {}
					}

					if let Err(e) = volumes.refresh().await {
						warn!(?e, "Volume refresh failed");
						continue;
					}

					for library in libraries.list().await {
						if let Err(e) = locations.refresh_online_status(&library).await {
							warn!(library_id = %library.id(), ?e, "Failed to refresh location liveness");
						}
					}
				}

				debug!("Volume monitor stopped");
			}
		});

		if let Some((previous, _)) = self.monitor.lock().replace((token, handle)) {
			previous.cancel();
		}
	}

	pub async fn dispatch(&self, request: CommandRequest) -> Result<CommandOutput, CoreError> {
		self.dispatcher.dispatch(request).await
	}

	pub async fn query(
		&self,
		library_id: Option<Uuid>,
		query: ClientQuery,
	) -> Result<QueryOutput, CoreError> {
		self.dispatcher.query(library_id, query).await
	}

	pub async fn handle_json(&self, line: &str) -> String {
		self.dispatcher.handle_json(line).await
	}

	pub fn dispatcher(&self) -> &Dispatcher {
		&self.dispatcher
	}

	/// Stop background work, cancel running scans and close every library
	pub async fn shutdown(&self) {
		info!("Core shutting down...");
		self.events.emit(Event::CoreShutdown);

		let monitor = self.monitor.lock().take();
		if let Some((token, handle)) = monitor {
			token.cancel();
			let _ = handle.await;
		}

		self.locks.cancel_all();
		self.pool.shutdown().await;
		self.libraries.close_all().await;

		info!("Shutdown complete.");
	}
}
