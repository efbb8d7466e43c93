//! Full and single-file scans
//!
//! A full scan reconciles the index with what is on disk for one location. New
//! and changed files are written in batched transactions while walking, records
//! for files no longer on disk are removed only once the walk has finished, so
//! a cancelled or partially unreadable walk never drops records it didn't get
//! to see. Files whose size and modification time are unchanged are left
//! untouched, which makes repeated scans idempotent.

use super::{
	cas::generate_cas_id,
	error::{ScanError, ScanWarning},
	locks::LocationGuard,
	walker::{walked_file, WalkStep, Walker},
};
use crate::{
	config::ScannerConfig,
	index::{
		files::{delete_files, write_file},
		FileRecord,
	},
	infra::{
		db::{
			entities::{
				file,
				location::{self, ScanState},
			},
			Database,
		},
		event::{Event, EventBus},
	},
	library::Library,
	location::update_online_status,
	util::{fs::from_relative_path, FileIOError},
};

use chrono::Utc;
use sea_orm::{
	ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect,
	Set,
};
use serde::Serialize;
use std::{
	collections::{HashMap, HashSet},
	io,
	path::Path,
	time::Instant,
};
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
	Completed,
	/// Stopped early, everything written before the stop is kept
	Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
	pub library_id: Uuid,
	pub location_id: i32,
	pub outcome: ScanOutcome,
	pub files_found: u64,
	pub files_created: u64,
	pub files_updated: u64,
	pub files_unchanged: u64,
	pub files_removed: u64,
	pub warnings: Vec<ScanWarning>,
	pub duration_ms: u64,
}

impl ScanReport {
	fn new(library_id: Uuid, location_id: i32) -> Self {
		Self {
			library_id,
			location_id,
			outcome: ScanOutcome::Completed,
			files_found: 0,
			files_created: 0,
			files_updated: 0,
			files_unchanged: 0,
			files_removed: 0,
			warnings: Vec::new(),
			duration_ms: 0,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickScanOutcome {
	Unchanged,
	Updated,
	/// The file is gone from disk and its record was deleted
	Removed,
}

#[derive(Debug)]
pub struct Scanner {
	config: ScannerConfig,
	events: EventBus,
}

impl Scanner {
	pub fn new(config: ScannerConfig, events: EventBus) -> Self {
		Self { config, events }
	}

	/// Reconcile a whole location with the filesystem.
	///
	/// `guard` must hold the location, it also carries the cancellation signal.
	/// The location is released before completion is announced, so listeners can
	/// queue the next scan right away.
	#[instrument(skip(self, library, guard), fields(library_id = %library.id()))]
	pub async fn scan_full(
		&self,
		library: &Library,
		location_id: i32,
		guard: LocationGuard,
	) -> Result<ScanReport, ScanError> {
		let res = self.run_full_scan(library, location_id, &guard).await;

		if let Err(e) = &res {
			error!(?e, "Full scan failed");

			if !matches!(
				e,
				ScanError::LocationNotFound(_) | ScanError::LocationOffline(_)
			) {
				if let Err(db_err) = finish_location(
					library.db().conn(),
					location_id,
					ScanState::Failed,
					Some(e.to_string()),
				)
				.await
				{
					warn!(?db_err, "Failed to record scan failure on location");
				}
			}
		}

		drop(guard);

		match &res {
			Ok(report) => self.announce(report),
			Err(e) => self.events.emit(Event::ScanFailed {
				library_id: library.id(),
				location_id,
				error: e.to_string(),
			}),
		}

		res
	}

	fn announce(&self, report: &ScanReport) {
		let (library_id, location_id) = (report.library_id, report.location_id);

		match report.outcome {
			ScanOutcome::Completed => {
				info!(
					location_id,
					found = report.files_found,
					created = report.files_created,
					updated = report.files_updated,
					removed = report.files_removed,
					warnings = report.warnings.len(),
					"Full scan completed in {}ms",
					report.duration_ms,
				);
				self.events.emit(Event::ScanCompleted {
					library_id,
					location_id,
					files_found: report.files_found,
					files_updated: report.files_created + report.files_updated,
					files_removed: report.files_removed,
					warnings: report.warnings.len() as u64,
				});
			}
			ScanOutcome::Cancelled => {
				info!(location_id, found = report.files_found, "Full scan cancelled");
				self.events.emit(Event::ScanCancelled {
					library_id,
					location_id,
				});
			}
		}
		self.events.invalidate_query("files.byLocation");
		self.events.invalidate_query("files.byKind");
	}

	async fn run_full_scan(
		&self,
		library: &Library,
		location_id: i32,
		guard: &LocationGuard,
	) -> Result<ScanReport, ScanError> {
		let start = Instant::now();
		let library_id = library.id();
		let db = library.db().conn();

		let location = location::Entity::find_by_id(location_id)
			.one(db)
			.await?
			.ok_or(ScanError::LocationNotFound(location_id))?;

		if !location.is_online {
			return Err(ScanError::LocationOffline(location_id));
		}

		let root = location.path_buf();
		if !is_dir(&root).await {
			update_online_status(db, &self.events, library_id, location_id, false).await?;
			return Err(ScanError::LocationOffline(location_id));
		}

		set_scan_state(db, location_id, ScanState::Scanning).await?;
		self.events.emit(Event::ScanStarted {
			library_id,
			location_id,
		});
		info!(location_id, root = %root.display(), "Starting full scan");

		let existing = file::Entity::find()
			.filter(file::Column::LocationId.eq(location_id))
			.all(db)
			.await?
			.into_iter()
			.map(|model| (model.relative_path.clone(), model))
			.collect::<HashMap<_, _>>();

		let mut report = ScanReport::new(library_id, location_id);
		let mut walker = Walker::new(&root);
		let mut seen = HashSet::with_capacity(existing.len());
		let mut hash_warnings = Vec::new();
		let mut batch = Vec::with_capacity(self.config.batch_size);

		report.outcome = loop {
			let walked = match walker.next_file(guard.cancellation_token()).await? {
				WalkStep::File(walked) => walked,
				WalkStep::Cancelled => break ScanOutcome::Cancelled,
				WalkStep::Done => break ScanOutcome::Completed,
			};
			report.files_found += 1;

			let record = FileRecord::new(
				location_id,
				walked.relative_path,
				walked.size,
				walked.modified,
			)
			.with_inode(walked.inode);
			seen.insert(record.relative_path.clone());

			let current = existing.get(&record.relative_path);
			if current.is_some_and(|model| !record.differs_from(model)) {
				report.files_unchanged += 1;
				continue;
			}

			let record = if self.config.hash_content {
				match generate_cas_id(&walked.full_path, walked.size).await {
					Ok(cas_id) => record.with_cas_id(Some(cas_id)),
					Err(e) => {
						hash_warnings.push(ScanWarning {
							path: record.relative_path.clone(),
							message: format!("failed to hash content: {e}"),
						});
						record
					}
				}
			} else {
				record
			};

			if current.is_some() {
				report.files_updated += 1;
			} else {
				report.files_created += 1;
			}

			batch.push(record);
			if batch.len() >= self.config.batch_size {
				flush(library.db(), &existing, &mut batch).await?;
			}
		};

		flush(library.db(), &existing, &mut batch).await?;

		if report.outcome == ScanOutcome::Completed {
			let removed = existing
				.values()
				.filter(|model| {
					!seen.contains(&model.relative_path) && !walker.was_skipped(&model.relative_path)
				})
				.map(|model| model.id)
				.collect::<Vec<_>>();

			for chunk in removed.chunks(self.config.batch_size.max(1)) {
				let txn = library.db().begin_write().await?;
				report.files_removed += delete_files(&*txn, chunk.to_vec()).await?;
				txn.commit().await?;
			}
		}

		report.warnings = walker.into_warnings();
		report.warnings.extend(hash_warnings);
		report.duration_ms = start.elapsed().as_millis() as u64;

		let state = match report.outcome {
			ScanOutcome::Completed => ScanState::Completed,
			ScanOutcome::Cancelled => ScanState::Cancelled,
		};
		finish_location(db, location_id, state, None).await?;

		Ok(report)
	}

	/// Re-stat one file and update or drop its record
	pub async fn scan_quick(
		&self,
		library: &Library,
		file_id: i32,
	) -> Result<QuickScanOutcome, ScanError> {
		self.rescan_file(library, file_id, false).await
	}

	/// Like [`Scanner::scan_quick`] but the content hash is always recomputed
	pub async fn scan_file_full(
		&self,
		library: &Library,
		file_id: i32,
	) -> Result<QuickScanOutcome, ScanError> {
		self.rescan_file(library, file_id, true).await
	}

	#[instrument(skip(self, library), fields(library_id = %library.id()), err)]
	async fn rescan_file(
		&self,
		library: &Library,
		file_id: i32,
		force_hash: bool,
	) -> Result<QuickScanOutcome, ScanError> {
		let library_id = library.id();
		let db = library.db().conn();

		let model = file::Entity::find_by_id(file_id)
			.one(db)
			.await?
			.ok_or(ScanError::FileNotFound(file_id))?;

		let location = location::Entity::find_by_id(model.location_id)
			.one(db)
			.await?
			.ok_or(ScanError::LocationNotFound(model.location_id))?;

		if !location.is_online {
			return Err(ScanError::LocationOffline(location.id));
		}

		let root = location.path_buf();
		let full_path = from_relative_path(&root, &model.relative_path);

		let metadata = match fs::symlink_metadata(&full_path).await {
			Ok(metadata) if metadata.is_file() => Some(metadata),
			Ok(_) => None,
			Err(e) if e.kind() == io::ErrorKind::NotFound => None,
			Err(e) => return Err(FileIOError::from((full_path, e)).into()),
		};

		let Some(metadata) = metadata else {
			// A vanished root means the location went away, not the file
			if !is_dir(&root).await {
				update_online_status(db, &self.events, library_id, location.id, false).await?;
				return Err(ScanError::LocationOffline(location.id));
			}

			let txn = library.db().begin_write().await?;
			delete_files(&*txn, vec![file_id]).await?;
			txn.commit().await?;
			refresh_location_totals(db, location.id).await?;

			debug!(file_id, path = %model.relative_path, "File gone from disk, removed record");
			self.events.emit(Event::FileRemoved {
				library_id,
				file_id,
			});
			self.events.invalidate_query("files.byLocation");

			return Ok(QuickScanOutcome::Removed);
		};

		let walked = walked_file(model.relative_path.clone(), &metadata);
		let record = FileRecord::new(location.id, walked.relative_path, walked.size, walked.modified)
			.with_inode(walked.inode);
		let stat_changed = record.differs_from(&model);

		if !stat_changed && !force_hash {
			return Ok(QuickScanOutcome::Unchanged);
		}

		let cas_id = if self.config.hash_content || force_hash {
			Some(
				generate_cas_id(&full_path, walked.size)
					.await
					.map_err(|e| FileIOError::from((&full_path, e)))?,
			)
		} else {
			None
		};

		if !stat_changed && cas_id == model.cas_id {
			return Ok(QuickScanOutcome::Unchanged);
		}

		let record = record.with_cas_id(cas_id);
		write_file(db, Some(&model), &record, Utc::now()).await?;
		refresh_location_totals(db, location.id).await?;

		debug!(file_id, path = %model.relative_path, "Updated file record");
		self.events.invalidate_query("files.byLocation");

		Ok(QuickScanOutcome::Updated)
	}
}

async fn is_dir(path: &Path) -> bool {
	fs::metadata(path)
		.await
		.map(|metadata| metadata.is_dir())
		.unwrap_or(false)
}

async fn flush(
	db: &Database,
	existing: &HashMap<String, file::Model>,
	batch: &mut Vec<FileRecord>,
) -> Result<(), DbErr> {
	if batch.is_empty() {
		return Ok(());
	}

	let txn = db.begin_write().await?;
	let now = Utc::now();
	let count = batch.len();

	for record in batch.drain(..) {
		write_file(&*txn, existing.get(&record.relative_path), &record, now).await?;
	}

	txn.commit().await?;
	debug!(count, "Wrote batch of file records");

	Ok(())
}

async fn set_scan_state<C: ConnectionTrait>(
	db: &C,
	location_id: i32,
	state: ScanState,
) -> Result<(), DbErr> {
	location::ActiveModel {
		id: Set(location_id),
		scan_state: Set(state.to_string()),
		date_modified: Set(Utc::now()),
		..Default::default()
	}
	.update(db)
	.await
	.map(|_| ())
}

/// Recompute the file count and byte size cached on the location
async fn refresh_location_totals<C: ConnectionTrait>(
	db: &C,
	location_id: i32,
) -> Result<(i64, i64), DbErr> {
	let (count, bytes) = file::Entity::find()
		.select_only()
		.column_as(file::Column::Id.count(), "file_count")
		.column_as(file::Column::SizeBytes.sum(), "bytes")
		.filter(file::Column::LocationId.eq(location_id))
		.into_tuple::<(i64, Option<i64>)>()
		.one(db)
		.await?
		.unwrap_or_default();
	let bytes = bytes.unwrap_or(0);

	location::ActiveModel {
		id: Set(location_id),
		total_file_count: Set(count),
		total_byte_size: Set(bytes),
		..Default::default()
	}
	.update(db)
	.await?;

	Ok((count, bytes))
}

async fn finish_location<C: ConnectionTrait>(
	db: &C,
	location_id: i32,
	state: ScanState,
	error_message: Option<String>,
) -> Result<(), DbErr> {
	refresh_location_totals(db, location_id).await?;

	let now = Utc::now();
	location::ActiveModel {
		id: Set(location_id),
		scan_state: Set(state.to_string()),
		last_scan_at: Set(Some(now)),
		error_message: Set(error_message),
		date_modified: Set(now),
		..Default::default()
	}
	.update(db)
	.await
	.map(|_| ())
}
