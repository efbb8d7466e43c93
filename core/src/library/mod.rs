//! Libraries
//!
//! A library is the unit of ownership: it exclusively owns its locations, files
//! and tags, all stored in one database. Deleting a library deletes that
//! database, which takes every owned entity with it.

mod config;
mod error;
mod manager;
mod statistics;

pub use config::LibraryConfig;
pub use error::LibraryError;
pub use manager::LibraryManager;
pub use statistics::{LocationStatistics, Statistics};

use crate::{index::ContentIndex, infra::db::Database};

use parking_lot::RwLock;
use serde::Serialize;
use std::{
	path::{Path, PathBuf},
	sync::atomic::{AtomicBool, Ordering},
};
use uuid::Uuid;

/// An open library
#[derive(Debug)]
pub struct Library {
	id: Uuid,
	config: RwLock<LibraryConfig>,
	config_path: PathBuf,
	db: Database,
	index: ContentIndex,
	/// Set once the library is taken out of its manager, work still holding
	/// it must not start anything new
	closed: AtomicBool,
}

/// Summary returned by `library.list`
#[derive(Debug, Clone, Serialize)]
pub struct LibraryInfo {
	pub id: Uuid,
	#[serde(flatten)]
	pub config: LibraryConfig,
}

impl Library {
	pub fn id(&self) -> Uuid {
		self.id
	}

	pub fn config(&self) -> LibraryConfig {
		self.config.read().clone()
	}

	pub fn name(&self) -> String {
		self.config.read().name.clone()
	}

	pub fn info(&self) -> LibraryInfo {
		LibraryInfo {
			id: self.id,
			config: self.config(),
		}
	}

	pub fn db(&self) -> &Database {
		&self.db
	}

	pub fn index(&self) -> &ContentIndex {
		&self.index
	}

	pub fn config_path(&self) -> &Path {
		&self.config_path
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	fn set_closed(&self, closed: bool) {
		self.closed.store(closed, Ordering::Release);
	}
}
