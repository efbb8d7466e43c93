use crate::util::FileIOError;

use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum LibraryError {
	#[error("Library not found (id: {0})")]
	NotFound(Uuid),
	#[error("Library already exists (name: {0})")]
	AlreadyExists(String),
	#[error("No library available")]
	NoLibrary,
	#[error("Invalid library configuration: {0}")]
	InvalidConfig(String),
	#[error("error serializing or deserializing the library config: {0}")]
	Json(#[from] serde_json::Error),
	#[error("Database error (error: {0})")]
	Database(#[from] DbErr),
	#[error(transparent)]
	FileIO(#[from] FileIOError),
}
