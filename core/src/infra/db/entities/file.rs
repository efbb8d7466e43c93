//! File entity
//!
//! One row per regular file found under a location. Directories are walked but
//! not recorded.

use crate::index::ObjectKind;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "files")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub id: i32,
	pub uuid: Uuid,
	pub location_id: i32,
	/// `/` separated path relative to the location root
	pub relative_path: String,
	pub name: String,
	pub extension: Option<String>,
	/// [`ObjectKind`] in snake case
	pub kind: String,
	pub size_bytes: i64,
	/// Sampled content hash, used for deduplication
	pub cas_id: Option<String>,
	pub inode: Option<i64>,
	pub date_modified: DateTimeUtc,
	/// Last time a scan wrote this record
	pub last_scanned_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(
		belongs_to = "super::location::Entity",
		from = "Column::LocationId",
		to = "super::location::Column::Id",
		on_delete = "Cascade"
	)]
	Location,
	#[sea_orm(has_many = "super::tag_on_file::Entity")]
	TagOnFile,
}

impl Related<super::location::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Location.def()
	}
}

impl Related<super::tag_on_file::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::TagOnFile.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
	pub fn size(&self) -> u64 {
		u64::try_from(self.size_bytes).unwrap_or(0)
	}

	/// Unknown values (written by a newer version) read as `Unknown`
	pub fn kind(&self) -> ObjectKind {
		self.kind.parse().unwrap_or_default()
	}
}
