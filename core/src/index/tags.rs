use super::{ContentIndex, IndexError, IndexResult};
use crate::infra::{
	db::entities::{file, tag, tag_on_file},
	event::Event,
};

use chrono::Utc;
use sea_orm::{
	ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::debug;
use uuid::Uuid;

const DEFAULT_TAG_COLOR: &str = "#A0A0A0";

impl ContentIndex {
	pub async fn create_tag(&self, name: &str, color: Option<&str>) -> IndexResult<tag::Model> {
		let name = name.trim();
		if name.is_empty() {
			return Err(IndexError::InvalidTag("name must not be empty".to_string()));
		}

		// Names are unique per library, ignoring case
		let _writing = self.writer.hold().await;
		let lowered = name.to_lowercase();
		if self
			.list_tags()
			.await?
			.iter()
			.any(|tag| tag.name.to_lowercase() == lowered)
		{
			return Err(IndexError::TagAlreadyExists(name.to_string()));
		}

		let tag = tag::ActiveModel {
			id: NotSet,
			uuid: Set(Uuid::new_v4()),
			name: Set(name.to_string()),
			color: Set(color.unwrap_or(DEFAULT_TAG_COLOR).to_string()),
			date_created: Set(Utc::now()),
		}
		.insert(&self.db)
		.await?;

		debug!(tag_id = tag.id, name = %tag.name, "Created tag");
		self.events.emit(Event::TagCreated {
			library_id: self.library_id,
			tag_id: tag.id,
		});

		Ok(tag)
	}

	pub async fn list_tags(&self) -> IndexResult<Vec<tag::Model>> {
		Ok(tag::Entity::find()
			.order_by_asc(tag::Column::Name)
			.all(&self.db)
			.await?)
	}

	/// Assign a tag to a file. Returns `false` when the assignment already existed.
	pub async fn assign_tag(&self, file_id: i32, tag_id: i32) -> IndexResult<bool> {
		let txn = self.begin_write().await?;

		file::Entity::find_by_id(file_id)
			.one(&*txn)
			.await?
			.ok_or(IndexError::FileNotFound(file_id))?;
		tag::Entity::find_by_id(tag_id)
			.one(&*txn)
			.await?
			.ok_or(IndexError::TagNotFound(tag_id))?;

		if tag_on_file::Entity::find_by_id((tag_id, file_id))
			.one(&*txn)
			.await?
			.is_some()
		{
			return Ok(false);
		}

		tag_on_file::ActiveModel {
			tag_id: Set(tag_id),
			file_id: Set(file_id),
			date_created: Set(Utc::now()),
		}
		.insert(&*txn)
		.await?;
		txn.commit().await?;

		self.events.emit(Event::TagAssigned {
			library_id: self.library_id,
			tag_id,
			file_id,
		});

		Ok(true)
	}

	/// Remove a tag from a file. Returns `false` when it was not assigned.
	pub async fn unassign_tag(&self, file_id: i32, tag_id: i32) -> IndexResult<bool> {
		let txn = self.begin_write().await?;

		file::Entity::find_by_id(file_id)
			.one(&*txn)
			.await?
			.ok_or(IndexError::FileNotFound(file_id))?;
		tag::Entity::find_by_id(tag_id)
			.one(&*txn)
			.await?
			.ok_or(IndexError::TagNotFound(tag_id))?;

		let res = tag_on_file::Entity::delete_by_id((tag_id, file_id))
			.exec(&*txn)
			.await?;
		txn.commit().await?;

		Ok(res.rows_affected > 0)
	}

	/// Delete a tag along with every assignment of it
	pub async fn delete_tag(&self, tag_id: i32) -> IndexResult<()> {
		let txn = self.begin_write().await?;

		tag::Entity::find_by_id(tag_id)
			.one(&*txn)
			.await?
			.ok_or(IndexError::TagNotFound(tag_id))?;

		tag_on_file::Entity::delete_many()
			.filter(tag_on_file::Column::TagId.eq(tag_id))
			.exec(&*txn)
			.await?;
		tag::Entity::delete_by_id(tag_id).exec(&*txn).await?;
		txn.commit().await?;

		self.events.emit(Event::TagDeleted {
			library_id: self.library_id,
			tag_id,
		});

		Ok(())
	}
}
