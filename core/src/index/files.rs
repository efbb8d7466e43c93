use super::{ContentIndex, IndexError, IndexResult, ObjectKind};
use crate::infra::{
	db::entities::{file, location, tag, tag_on_file},
	event::Event,
};

use chrono::{DateTime, Utc};
use sea_orm::{
	sea_query::Query, ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DbErr,
	EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Metadata observed for a single file on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
	pub location_id: i32,
	pub relative_path: String,
	pub name: String,
	pub extension: Option<String>,
	pub kind: ObjectKind,
	pub size_bytes: u64,
	pub cas_id: Option<String>,
	pub inode: Option<u64>,
	pub date_modified: DateTime<Utc>,
}

impl FileRecord {
	/// Builds a record from a `/` separated relative path, splitting name and
	/// extension and deriving the kind from the latter
	pub fn new(
		location_id: i32,
		relative_path: String,
		size_bytes: u64,
		date_modified: DateTime<Utc>,
	) -> Self {
		let file_name = relative_path
			.rsplit('/')
			.next()
			.unwrap_or(relative_path.as_str())
			.to_string();

		let (name, extension) = match file_name.rsplit_once('.') {
			// Dotfiles like `.bashrc` have no extension
			Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
				(stem.to_string(), Some(ext.to_lowercase()))
			}
			_ => (file_name, None),
		};

		Self {
			location_id,
			relative_path,
			name,
			kind: ObjectKind::from_extension(extension.as_deref()),
			extension,
			size_bytes,
			cas_id: None,
			inode: None,
			date_modified: truncate_to_millis(date_modified),
		}
	}

	pub fn with_inode(mut self, inode: Option<u64>) -> Self {
		self.inode = inode;
		self
	}

	pub fn with_cas_id(mut self, cas_id: Option<String>) -> Self {
		self.cas_id = cas_id;
		self
	}

	/// Whether the on-disk stat differs from what the index holds
	pub fn differs_from(&self, model: &file::Model) -> bool {
		model.size() != self.size_bytes
			|| model.date_modified != self.date_modified
			|| model.inode.map(|inode| inode as u64) != self.inode
	}
}

/// Stored timestamps only keep millisecond precision, so observed ones are cut the same way
/// to keep comparisons stable across round trips.
pub(crate) fn truncate_to_millis(date: DateTime<Utc>) -> DateTime<Utc> {
	DateTime::from_timestamp_millis(date.timestamp_millis()).unwrap_or(date)
}

/// Inserts a new record or overwrites `existing` with the observed metadata
pub(crate) async fn write_file<C: ConnectionTrait>(
	db: &C,
	existing: Option<&file::Model>,
	record: &FileRecord,
	now: DateTime<Utc>,
) -> Result<file::Model, DbErr> {
	let size_bytes = i64::try_from(record.size_bytes).unwrap_or(i64::MAX);
	let inode = record.inode.map(|inode| inode as i64);

	match existing {
		Some(existing) => {
			let mut active: file::ActiveModel = existing.clone().into();
			active.name = Set(record.name.clone());
			active.extension = Set(record.extension.clone());
			active.kind = Set(record.kind.to_string());
			active.size_bytes = Set(size_bytes);
			active.cas_id = Set(record.cas_id.clone());
			active.inode = Set(inode);
			active.date_modified = Set(record.date_modified);
			active.last_scanned_at = Set(now);
			active.update(db).await
		}
		None => {
			file::ActiveModel {
				id: NotSet,
				uuid: Set(Uuid::new_v4()),
				location_id: Set(record.location_id),
				relative_path: Set(record.relative_path.clone()),
				name: Set(record.name.clone()),
				extension: Set(record.extension.clone()),
				kind: Set(record.kind.to_string()),
				size_bytes: Set(size_bytes),
				cas_id: Set(record.cas_id.clone()),
				inode: Set(inode),
				date_modified: Set(record.date_modified),
				last_scanned_at: Set(now),
			}
			.insert(db)
			.await
		}
	}
}

/// Deletes file rows together with their tag assignments
pub(crate) async fn delete_files<C: ConnectionTrait>(db: &C, ids: Vec<i32>) -> Result<u64, DbErr> {
	if ids.is_empty() {
		return Ok(0);
	}

	tag_on_file::Entity::delete_many()
		.filter(tag_on_file::Column::FileId.is_in(ids.clone()))
		.exec(db)
		.await?;

	let res = file::Entity::delete_many()
		.filter(file::Column::Id.is_in(ids))
		.exec(db)
		.await?;

	Ok(res.rows_affected)
}

impl ContentIndex {
	/// Create or update the record for `(location_id, relative_path)`
	pub async fn upsert_file(&self, record: FileRecord) -> IndexResult<file::Model> {
		let txn = self.begin_write().await?;

		location::Entity::find_by_id(record.location_id)
			.one(&*txn)
			.await?
			.ok_or(IndexError::LocationNotFound(record.location_id))?;

		let existing = file::Entity::find()
			.filter(file::Column::LocationId.eq(record.location_id))
			.filter(file::Column::RelativePath.eq(record.relative_path.as_str()))
			.one(&*txn)
			.await?;

		let model = write_file(&*txn, existing.as_ref(), &record, Utc::now()).await?;
		txn.commit().await?;

		debug!(file_id = model.id, path = %model.relative_path, "Upserted file");

		Ok(model)
	}

	pub async fn get_file(&self, file_id: i32) -> IndexResult<file::Model> {
		file::Entity::find_by_id(file_id)
			.one(&self.db)
			.await?
			.ok_or(IndexError::FileNotFound(file_id))
	}

	/// Remove a file record. The file on disk is left alone.
	pub async fn delete_file(&self, file_id: i32) -> IndexResult<()> {
		let txn = self.begin_write().await?;

		file::Entity::find_by_id(file_id)
			.one(&*txn)
			.await?
			.ok_or(IndexError::FileNotFound(file_id))?;

		delete_files(&*txn, vec![file_id]).await?;
		txn.commit().await?;

		self.events.emit(Event::FileRemoved {
			library_id: self.library_id,
			file_id,
		});

		Ok(())
	}

	pub async fn list_files_by_location(&self, location_id: i32) -> IndexResult<Vec<file::Model>> {
		location::Entity::find_by_id(location_id)
			.one(&self.db)
			.await?
			.ok_or(IndexError::LocationNotFound(location_id))?;

		Ok(file::Entity::find()
			.filter(file::Column::LocationId.eq(location_id))
			.order_by_asc(file::Column::RelativePath)
			.all(&self.db)
			.await?)
	}

	pub async fn list_files_by_kind(&self, kind: ObjectKind) -> IndexResult<Vec<file::Model>> {
		Ok(file::Entity::find()
			.filter(file::Column::Kind.eq(kind.as_ref()))
			.order_by_asc(file::Column::Id)
			.all(&self.db)
			.await?)
	}

	pub async fn list_files_by_tag(&self, tag_id: i32) -> IndexResult<Vec<file::Model>> {
		tag::Entity::find_by_id(tag_id)
			.one(&self.db)
			.await?
			.ok_or(IndexError::TagNotFound(tag_id))?;

		Ok(file::Entity::find()
			.filter(
				file::Column::Id.in_subquery(
					Query::select()
						.column(tag_on_file::Column::FileId)
						.from(tag_on_file::Entity)
						.and_where(tag_on_file::Column::TagId.eq(tag_id))
						.to_owned(),
				),
			)
			.order_by_asc(file::Column::Id)
			.all(&self.db)
			.await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_name_and_extension() {
		let now = Utc::now();

		let record = FileRecord::new(1, "photos/2024/Beach.JPG".into(), 10, now);
		assert_eq!(record.name, "Beach");
		assert_eq!(record.extension.as_deref(), Some("jpg"));
		assert_eq!(record.kind, ObjectKind::Image);

		let dotfile = FileRecord::new(1, ".bashrc".into(), 10, now);
		assert_eq!(dotfile.name, ".bashrc");
		assert_eq!(dotfile.extension, None);
		assert_eq!(dotfile.kind, ObjectKind::Unknown);

		let plain = FileRecord::new(1, "docs/README".into(), 10, now);
		assert_eq!(plain.name, "README");
		assert_eq!(plain.extension, None);
	}

	#[test]
	fn modification_dates_are_truncated_to_millis() {
		let date = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
		let record = FileRecord::new(1, "a.txt".into(), 1, date);
		assert_eq!(record.date_modified.timestamp_subsec_nanos(), 123_000_000);
	}
}
