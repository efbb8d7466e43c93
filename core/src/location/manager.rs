use super::{error::LocationError, update_online_status};
use crate::{
	index::files::delete_files,
	infra::{
		db::entities::{
			file,
			location::{self, ScanState},
		},
		event::{Event, EventBus},
	},
	library::Library,
	ops::indexing::{LocationGuard, LocationLocks},
	util::{FileIOError, NonUtf8PathError},
	volume::{Volume, VolumeExt, VolumeManager},
};

use chrono::Utc;
use sea_orm::{
	ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
	QuerySelect, Set,
};
use std::{
	io,
	path::{Path, PathBuf},
	sync::Arc,
	time::Duration,
};
use tokio::fs;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Registers, removes and tracks the liveness of locations in any library
#[derive(Debug)]
pub struct LocationManager {
	node_id: Uuid,
	volumes: Arc<VolumeManager>,
	locks: Arc<LocationLocks>,
	lock_timeout: Duration,
	events: EventBus,
}

impl LocationManager {
	pub fn new(
		node_id: Uuid,
		volumes: Arc<VolumeManager>,
		locks: Arc<LocationLocks>,
		lock_timeout: Duration,
		events: EventBus,
	) -> Self {
		Self {
			node_id,
			volumes,
			locks,
			lock_timeout,
			events,
		}
	}

	/// Register `path` as a new location. The initial scan is left to the caller.
	#[instrument(skip(self, library), fields(library_id = %library.id()), err)]
	pub async fn add_location(
		&self,
		library: &Library,
		path: &Path,
		name: Option<String>,
	) -> Result<location::Model, LocationError> {
		let path = match fs::canonicalize(path).await {
			Ok(path) => path,
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				return Err(LocationError::PathNotFound(path.to_path_buf()))
			}
			Err(e) => return Err(FileIOError::from((path, e)).into()),
		};

		let metadata = fs::metadata(&path)
			.await
			.map_err(|e| FileIOError::from((&path, e)))?;
		if !metadata.is_dir() {
			return Err(LocationError::NotDirectory(path));
		}

		if let Err(e) = fs::read_dir(&path).await {
			return Err(if e.kind() == io::ErrorKind::PermissionDenied {
				LocationError::PermissionDenied(path)
			} else {
				FileIOError::from((&path, e)).into()
			});
		}

		let path_str = path
			.to_str()
			.ok_or_else(|| NonUtf8PathError(path.clone().into_boxed_path()))?
			.to_string();

		let db = library.db().conn();
		let _writing = library.db().writer().hold().await;
		if location::Entity::find()
			.filter(location::Column::Path.eq(path_str.as_str()))
			.one(db)
			.await?
			.is_some()
		{
			return Err(LocationError::AlreadyIndexed(path));
		}

		let volume_fingerprint = self
			.volumes
			.volume_for_path(&path)
			.await
			.map(|volume| volume.fingerprint.0);

		let name = name
			.map(|name| name.trim().to_string())
			.filter(|name| !name.is_empty())
			.or_else(|| {
				path.file_name()
					.map(|name| name.to_string_lossy().to_string())
			})
			.unwrap_or_else(|| path_str.clone());

		let now = Utc::now();
		let location = location::ActiveModel {
			id: NotSet,
			uuid: Set(Uuid::new_v4()),
			name: Set(name),
			path: Set(path_str),
			node_id: Set(self.node_id),
			volume_fingerprint: Set(volume_fingerprint),
			is_online: Set(true),
			scan_state: Set(ScanState::Pending.to_string()),
			last_scan_at: Set(None),
			error_message: Set(None),
			total_file_count: Set(0),
			total_byte_size: Set(0),
			date_created: Set(now),
			date_modified: Set(now),
		}
		.insert(db)
		.await?;

		info!(location_id = location.id, path = %location.path, "Added location");
		self.events.emit(Event::LocationAdded {
			library_id: library.id(),
			location_id: location.id,
			path,
		});
		self.events.invalidate_query("locations.list");

		Ok(location)
	}

	/// Remove a location and everything indexed under it. Files on disk are left alone.
	///
	/// A running scan is asked to stop first, if it doesn't let go of the
	/// location in time the deletion fails with [`LocationError::Busy`].
	#[instrument(skip(self, library), fields(library_id = %library.id()), err)]
	pub async fn delete_location(
		&self,
		library: &Library,
		location_id: i32,
	) -> Result<(), LocationError> {
		let library_id = library.id();
		let db = library.db().conn();

		location::Entity::find_by_id(location_id)
			.one(db)
			.await?
			.ok_or(LocationError::IdNotFound(location_id))?;

		self.locks.cancel(library_id, location_id);
		let guard = self
			.locks
			.acquire_timeout(library_id, location_id, self.lock_timeout)
			.await
			.map_err(|_| LocationError::Busy(location_id))?;

		let txn = library.db().begin_write().await?;

		let file_ids = file::Entity::find()
			.select_only()
			.column(file::Column::Id)
			.filter(file::Column::LocationId.eq(location_id))
			.into_tuple::<i32>()
			.all(&*txn)
			.await?;
		let removed = file_ids.len();

		delete_files(&*txn, file_ids).await?;
		location::Entity::delete_by_id(location_id)
			.exec(&*txn)
			.await?;
		txn.commit().await?;

		drop(guard);
		self.locks.forget(library_id, location_id);

		info!(location_id, removed, "Deleted location");
		self.events.emit(Event::LocationRemoved {
			library_id,
			location_id,
		});
		self.events.invalidate_query("locations.list");

		Ok(())
	}

	pub async fn get(
		&self,
		library: &Library,
		location_id: i32,
	) -> Result<location::Model, LocationError> {
		location::Entity::find_by_id(location_id)
			.one(library.db().conn())
			.await?
			.ok_or(LocationError::IdNotFound(location_id))
	}

	pub async fn list(&self, library: &Library) -> Result<Vec<location::Model>, LocationError> {
		Ok(location::Entity::find()
			.order_by_asc(location::Column::Id)
			.all(library.db().conn())
			.await?)
	}

	/// Returns whether the status changed
	pub async fn set_online_status(
		&self,
		library: &Library,
		location_id: i32,
		is_online: bool,
	) -> Result<bool, LocationError> {
		self.get(library, location_id).await?;

		Ok(update_online_status(
			library.db().conn(),
			&self.events,
			library.id(),
			location_id,
			is_online,
		)
		.await?)
	}

	/// Re-evaluate every location of `library`: online when its directory exists
	/// and the volume it was registered on, if known, is mounted.
	pub async fn refresh_online_status(&self, library: &Library) -> Result<usize, LocationError> {
		let mut changed = 0;

		for location in self.list(library).await? {
			let path_exists = fs::metadata(&location.path)
				.await
				.map(|metadata| metadata.is_dir())
				.unwrap_or(false);

			let volume_mounted = match &location.volume_fingerprint {
				Some(fingerprint) => self
					.volumes
					.get_by_fingerprint(fingerprint)
					.await
					.map(|volume| volume.is_mounted)
					.unwrap_or(true),
				None => true,
			};

			let is_online = path_exists && volume_mounted;
			if update_online_status(
				library.db().conn(),
				&self.events,
				library.id(),
				location.id,
				is_online,
			)
			.await?
			{
				changed += 1;
			}
		}

		if changed > 0 {
			debug!(library_id = %library.id(), changed, "Refreshed location liveness");
		}

		Ok(changed)
	}

	/// Take offline every location of `library` living on `volume`, returns how many went offline
	pub async fn mark_volume_offline(
		&self,
		library: &Library,
		volume: &Volume,
	) -> Result<usize, LocationError> {
		let mut changed = 0;

		for location in self.list(library).await? {
			let on_volume = match &location.volume_fingerprint {
				Some(fingerprint) => *fingerprint == volume.fingerprint.0,
				None => volume.contains_path(&PathBuf::from(&location.path)),
			};

			if on_volume {
				// A scan on an unmounted volume would only see a missing root
				self.locks.cancel(library.id(), location.id);

				if update_online_status(
					library.db().conn(),
					&self.events,
					library.id(),
					location.id,
					false,
				)
				.await?
				{
					changed += 1;
				}
			}
		}

		Ok(changed)
	}

	/// Hold the location for a mutation other than a full scan
	pub async fn lock(
		&self,
		library: &Library,
		location_id: i32,
	) -> Result<LocationGuard, LocationError> {
		self.locks
			.acquire_timeout(library.id(), location_id, self.lock_timeout)
			.await
			.map_err(|_| LocationError::Busy(location_id))
	}
}
