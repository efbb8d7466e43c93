//! Content index
//!
//! Durable store for files, tags and tag assignments of a single library. Every
//! mutation checks that the rows it references exist before writing and runs in
//! its own write transaction, so callers never observe a dangling assignment
//! and never trip over a scan writing to the same library.

mod error;
pub(crate) mod files;
mod kind;
mod tags;

pub use error::{IndexError, IndexResult};
pub use files::FileRecord;
pub use kind::ObjectKind;

use crate::infra::{
	db::{WriteLock, WriteTransaction},
	event::EventBus,
};

use sea_orm::{DatabaseConnection, DbErr};
use uuid::Uuid;

/// Handle to a library's content index, cheap to clone
#[derive(Debug, Clone)]
pub struct ContentIndex {
	library_id: Uuid,
	db: DatabaseConnection,
	writer: WriteLock,
	events: EventBus,
}

impl ContentIndex {
	pub fn new(library_id: Uuid, db: DatabaseConnection, writer: WriteLock, events: EventBus) -> Self {
		Self {
			library_id,
			db,
			writer,
			events,
		}
	}

	pub fn library_id(&self) -> Uuid {
		self.library_id
	}

	async fn begin_write(&self) -> Result<WriteTransaction, DbErr> {
		self.writer.begin(&self.db).await
	}
}
