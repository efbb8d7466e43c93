use crate::{
	index::IndexError,
	util::{FileIOError, NonUtf8PathError},
};

use sea_orm::DbErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
	#[error("Location not found (id: {0})")]
	LocationNotFound(i32),
	#[error("File not found (id: {0})")]
	FileNotFound(i32),
	#[error("Location is offline (id: {0})")]
	LocationOffline(i32),
	#[error("A scan is already running on location (id: {0})")]
	ScanInProgress(i32),
	#[error("Location is busy, try again later (id: {0})")]
	Busy(i32),
	#[error("Scan queue is full")]
	QueueFull,
	#[error("Scan workers are shut down")]
	PoolClosed,

	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error(transparent)]
	NonUtf8Path(#[from] NonUtf8PathError),
	#[error(transparent)]
	Index(#[from] IndexError),
	#[error("Database error (error: {0})")]
	Database(#[from] DbErr),
}

/// Non fatal problem met while walking, the entry is skipped and the scan goes on
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ScanWarning {
	/// `/` separated path relative to the location root
	pub path: String,
	pub message: String,
}
