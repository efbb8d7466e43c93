use std::path::PathBuf;
use thiserror::Error;

/// Volume operation errors
#[derive(Error, Debug)]
pub enum VolumeError {
	#[error("Volume not found (id: {0})")]
	NotFound(u32),
	#[error("Device is busy, unmount refused (mount point: {0:?})")]
	DeviceBusy(PathBuf),
	#[error("Permission denied while unmounting (mount point: {0:?})")]
	PermissionDenied(PathBuf),
	#[error("Unmount is not supported on this platform")]
	Unsupported,
	#[error("Platform error: {0}")]
	Platform(String),
}

pub type VolumeResult<T> = Result<T, VolumeError>;
