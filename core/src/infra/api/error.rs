//! Error taxonomy shared by every client facing surface

use crate::{
	index::IndexError,
	library::LibraryError,
	location::LocationError,
	ops::indexing::ScanError,
	util::FileIOError,
	volume::VolumeError,
};

use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum ErrorKind {
	NotFound,
	AlreadyExists,
	AlreadyIndexed,
	PermissionDenied,
	LocationOffline,
	ScanInProgress,
	Busy,
	DeviceBusy,
	InvalidRequest,
	Internal,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct CoreError {
	pub kind: ErrorKind,
	pub message: String,
}

impl CoreError {
	pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
		}
	}

	pub fn invalid_request(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::InvalidRequest, message)
	}

	pub fn not_found(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::NotFound, message)
	}

	pub fn internal(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Internal, message)
	}
}

fn io_kind(err: &FileIOError) -> ErrorKind {
	match err.kind() {
		io::ErrorKind::NotFound => ErrorKind::NotFound,
		io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
		_ => ErrorKind::Internal,
	}
}

impl From<FileIOError> for CoreError {
	fn from(err: FileIOError) -> Self {
		Self::new(io_kind(&err), err.to_string())
	}
}

impl From<DbErr> for CoreError {
	fn from(err: DbErr) -> Self {
		Self::internal(err.to_string())
	}
}

impl From<serde_json::Error> for CoreError {
	fn from(err: serde_json::Error) -> Self {
		Self::invalid_request(err.to_string())
	}
}

impl From<IndexError> for CoreError {
	fn from(err: IndexError) -> Self {
		let kind = match &err {
			IndexError::FileNotFound(_)
			| IndexError::TagNotFound(_)
			| IndexError::LocationNotFound(_) => ErrorKind::NotFound,
			IndexError::TagAlreadyExists(_) => ErrorKind::AlreadyExists,
			IndexError::InvalidTag(_) => ErrorKind::InvalidRequest,
			IndexError::Database(_) => ErrorKind::Internal,
		};

		Self::new(kind, err.to_string())
	}
}

impl From<LocationError> for CoreError {
	fn from(err: LocationError) -> Self {
		let kind = match &err {
			// Not found errors
			LocationError::PathNotFound(_)
			| LocationError::IdNotFound(_)
			| LocationError::NotDirectory(_) => ErrorKind::NotFound,

			LocationError::PermissionDenied(_) => ErrorKind::PermissionDenied,
			LocationError::AlreadyIndexed(_) => ErrorKind::AlreadyIndexed,
			LocationError::Busy(_) => ErrorKind::Busy,
			LocationError::NonUtf8Path(_) => ErrorKind::InvalidRequest,
			LocationError::FileIO(e) => io_kind(e),
			LocationError::Database(_) => ErrorKind::Internal,
		};

		Self::new(kind, err.to_string())
	}
}

impl From<ScanError> for CoreError {
	fn from(err: ScanError) -> Self {
		let kind = match &err {
			ScanError::LocationNotFound(_) | ScanError::FileNotFound(_) => ErrorKind::NotFound,
			ScanError::LocationOffline(_) => ErrorKind::LocationOffline,
			ScanError::ScanInProgress(_) => ErrorKind::ScanInProgress,
			ScanError::Busy(_) | ScanError::QueueFull => ErrorKind::Busy,
			ScanError::FileIO(e) => io_kind(e),
			ScanError::Index(e) => match e {
				IndexError::FileNotFound(_)
				| IndexError::TagNotFound(_)
				| IndexError::LocationNotFound(_) => ErrorKind::NotFound,
				_ => ErrorKind::Internal,
			},
			ScanError::PoolClosed | ScanError::NonUtf8Path(_) | ScanError::Database(_) => {
				ErrorKind::Internal
			}
		};

		Self::new(kind, err.to_string())
	}
}

impl From<VolumeError> for CoreError {
	fn from(err: VolumeError) -> Self {
		let kind = match &err {
			VolumeError::NotFound(_) => ErrorKind::NotFound,
			VolumeError::DeviceBusy(_) => ErrorKind::DeviceBusy,
			VolumeError::PermissionDenied(_) => ErrorKind::PermissionDenied,
			VolumeError::Unsupported | VolumeError::Platform(_) => ErrorKind::Internal,
		};

		Self::new(kind, err.to_string())
	}
}

impl From<LibraryError> for CoreError {
	fn from(err: LibraryError) -> Self {
		let kind = match &err {
			LibraryError::NotFound(_) | LibraryError::NoLibrary => ErrorKind::NotFound,
			LibraryError::AlreadyExists(_) => ErrorKind::AlreadyExists,
			LibraryError::InvalidConfig(_) => ErrorKind::InvalidRequest,
			LibraryError::FileIO(e) => io_kind(e),
			LibraryError::Json(_) | LibraryError::Database(_) => ErrorKind::Internal,
		};

		Self::new(kind, err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	#[test]
	fn component_errors_keep_their_kind() {
		assert_eq!(
			CoreError::from(ScanError::ScanInProgress(1)).kind,
			ErrorKind::ScanInProgress
		);
		assert_eq!(
			CoreError::from(LocationError::AlreadyIndexed(PathBuf::from("/a"))).kind,
			ErrorKind::AlreadyIndexed
		);
		assert_eq!(
			CoreError::from(VolumeError::DeviceBusy(PathBuf::from("/mnt"))).kind,
			ErrorKind::DeviceBusy
		);
		assert_eq!(
			CoreError::from(IndexError::TagNotFound(9)).kind,
			ErrorKind::NotFound
		);

		let io = FileIOError::from((
			"/secret",
			io::Error::from(io::ErrorKind::PermissionDenied),
		));
		assert_eq!(CoreError::from(io).kind, ErrorKind::PermissionDenied);
	}

	#[test]
	fn serializes_kind_and_message() {
		let json = serde_json::to_value(CoreError::not_found("File not found (id: 3)")).unwrap();
		assert_eq!(json["kind"], "NotFound");
		assert_eq!(json["message"], "File not found (id: 3)");
	}
}
