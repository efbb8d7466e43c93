//! Location entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{AsRefStr, Display, EnumString};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "locations")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub id: i32,
	pub uuid: Uuid,
	pub name: String,
	#[sea_orm(unique)]
	pub path: String,
	/// Node that registered (and scans) this location
	pub node_id: Uuid,
	/// Fingerprint of the volume the location lives on, a weak reference
	pub volume_fingerprint: Option<String>,
	pub is_online: bool,
	pub scan_state: String,
	pub last_scan_at: Option<DateTimeUtc>,
	pub error_message: Option<String>,
	pub total_file_count: i64,
	pub total_byte_size: i64,
	pub date_created: DateTimeUtc,
	pub date_modified: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(has_many = "super::file::Entity")]
	File,
}

impl Related<super::file::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::File.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}

/// Lifecycle of the most recent scan of a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScanState {
	Pending,
	Scanning,
	Completed,
	Cancelled,
	Failed,
}

impl Model {
	pub fn path_buf(&self) -> PathBuf {
		PathBuf::from(&self.path)
	}

	/// Unknown values (written by a newer version) read as `Pending`
	pub fn scan_state(&self) -> ScanState {
		self.scan_state.parse().unwrap_or(ScanState::Pending)
	}
}
