//! Tag entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tags")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub id: i32,
	pub uuid: Uuid,
	pub name: String,
	pub color: String,
	pub date_created: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(has_many = "super::tag_on_file::Entity")]
	TagOnFile,
}

impl Related<super::tag_on_file::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::TagOnFile.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}
