use crate::util::{FileIOError, NonUtf8PathError};

use sea_orm::DbErr;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for location related errors
#[derive(Error, Debug)]
pub enum LocationError {
	// Not Found errors
	#[error("Location not found (path: {0:?})")]
	PathNotFound(PathBuf),
	#[error("Location not found (id: {0})")]
	IdNotFound(i32),

	// User errors
	#[error("Location not a directory (path: {0:?})")]
	NotDirectory(PathBuf),
	#[error("Permission denied reading location (path: {0:?})")]
	PermissionDenied(PathBuf),
	#[error("Location already indexed (path: {0:?})")]
	AlreadyIndexed(PathBuf),
	#[error("Location is busy, try again later (id: {0})")]
	Busy(i32),

	// Internal Errors
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error(transparent)]
	NonUtf8Path(#[from] NonUtf8PathError),
	#[error("Database error (error: {0})")]
	Database(#[from] DbErr),
}
