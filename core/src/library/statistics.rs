use super::{error::LibraryError, Library};
use crate::{
	infra::db::entities::{file, location},
	util::fs::get_size_or_zero,
	volume::VolumeManager,
};

use sea_orm::{
	ColumnTrait, DbBackend, EntityTrait, FromQueryResult, QueryOrder, QuerySelect, Statement,
	TransactionTrait,
};
use serde::Serialize;
use std::{collections::HashMap, path::Path};
use tracing::{debug, warn};

/// Aggregate view of a library, recomputed on every request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
	pub total_file_count: u64,
	/// Sum of the sizes of every indexed file
	pub total_bytes_used: u64,
	/// Same sum counting each distinct content only once
	pub total_unique_bytes: u64,
	pub total_bytes_capacity: u64,
	pub total_bytes_free: u64,
	pub library_db_size: u64,
	pub preview_media_bytes: u64,
	pub locations: Vec<LocationStatistics>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationStatistics {
	pub location_id: i32,
	pub name: String,
	pub file_count: u64,
	pub bytes: u64,
}

#[derive(Debug, FromQueryResult)]
struct UniqueBytes {
	unique_bytes: i64,
}

// Files sharing a content hash count once, files without one each count
const UNIQUE_BYTES_SQL: &str = "SELECT \
	COALESCE((SELECT SUM(size_bytes) FROM \
		(SELECT MAX(size_bytes) AS size_bytes FROM files WHERE cas_id IS NOT NULL GROUP BY cas_id)), 0) \
	+ COALESCE((SELECT SUM(size_bytes) FROM files WHERE cas_id IS NULL), 0) \
	AS unique_bytes";

fn to_u64(value: Option<i64>) -> u64 {
	value.and_then(|v| u64::try_from(v).ok()).unwrap_or(0)
}

impl Statistics {
	/// Index aggregates are read inside one transaction, which under WAL sees a
	/// single snapshot and never blocks a concurrent scan.
	pub async fn calculate(
		library: &Library,
		volumes: &VolumeManager,
		data_dir: &Path,
	) -> Result<Self, LibraryError> {
		let txn = library.db().conn().begin().await?;

		let per_location = file::Entity::find()
			.select_only()
			.column(file::Column::LocationId)
			.column_as(file::Column::Id.count(), "file_count")
			.column_as(file::Column::SizeBytes.sum(), "bytes")
			.group_by(file::Column::LocationId)
			.into_tuple::<(i32, i64, Option<i64>)>()
			.all(&txn)
			.await?
			.into_iter()
			.map(|(location_id, count, bytes)| (location_id, (to_u64(Some(count)), to_u64(bytes))))
			.collect::<HashMap<_, _>>();

		let total_unique_bytes = UniqueBytes::find_by_statement(Statement::from_string(
			DbBackend::Sqlite,
			UNIQUE_BYTES_SQL,
		))
		.one(&txn)
		.await?
		.map(|row| to_u64(Some(row.unique_bytes)))
		.unwrap_or(0);

		let locations = location::Entity::find()
			.order_by_asc(location::Column::Id)
			.all(&txn)
			.await?
			.into_iter()
			.map(|location| {
				let (file_count, bytes) =
					per_location.get(&location.id).copied().unwrap_or_default();
				LocationStatistics {
					location_id: location.id,
					name: location.name,
					file_count,
					bytes,
				}
			})
			.collect::<Vec<_>>();

		txn.commit().await?;

		if let Err(e) = volumes.refresh().await {
			warn!(?e, "Failed to refresh volumes, using last known capacity");
		}
		let (total_bytes_capacity, total_bytes_free) = volumes.mounted_totals().await;

		let mut library_db_size = 0;
		for path in library.db().files() {
			library_db_size += get_size_or_zero(&path).await.unwrap_or(0);
		}

		let preview_media_bytes = get_size_or_zero(data_dir.join("thumbnails"))
			.await
			.unwrap_or_else(|e| {
				warn!(?e, "Failed to measure preview media");
				0
			});

		let stats = Self {
			total_file_count: per_location.values().map(|(count, _)| count).sum(),
			total_bytes_used: per_location.values().map(|(_, bytes)| bytes).sum(),
			total_unique_bytes,
			total_bytes_capacity,
			total_bytes_free,
			library_db_size,
			preview_media_bytes,
			locations,
		};

		debug!(library_id = %library.id(), ?stats, "Calculated library statistics");

		Ok(stats)
	}
}
