use sea_orm::DbErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
	#[error("File not found (id: {0})")]
	FileNotFound(i32),
	#[error("Tag not found (id: {0})")]
	TagNotFound(i32),
	#[error("Location not found (id: {0})")]
	LocationNotFound(i32),
	#[error("Tag already exists (name: {0})")]
	TagAlreadyExists(String),
	#[error("Invalid tag: {0}")]
	InvalidTag(String),
	#[error("Database error (error: {0})")]
	Database(#[from] DbErr),
}

pub type IndexResult<T> = Result<T, IndexError>;
