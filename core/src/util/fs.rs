use std::{
	io,
	path::{Path, PathBuf},
};

use tokio::fs;

/// Total size in bytes of a file, or of every file below a directory.
/// Symlinks are measured, never followed.
pub async fn get_size(path: impl AsRef<Path>) -> Result<u64, io::Error> {
	let path = path.as_ref();
	let metadata = fs::symlink_metadata(path).await?;

	if metadata.is_dir() {
		let mut result = 0;
		let mut to_walk = vec![path.to_path_buf()];

		while let Some(path) = to_walk.pop() {
			let mut read_dir = fs::read_dir(&path).await?;

			while let Some(entry) = read_dir.next_entry().await? {
				let metadata = entry.metadata().await?;
				if metadata.is_dir() {
					to_walk.push(entry.path())
				} else {
					result += metadata.len()
				}
			}
		}

		Ok(result)
	} else {
		Ok(metadata.len())
	}
}

/// Same as [`get_size`] but a missing path counts as zero bytes.
pub async fn get_size_or_zero(path: impl AsRef<Path>) -> Result<u64, io::Error> {
	match get_size(path).await {
		Ok(size) => Ok(size),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
		Err(e) => Err(e),
	}
}

/// Joins a `/` separated path stored in the index onto `root`.
pub fn from_relative_path(root: &Path, relative_path: &str) -> PathBuf {
	relative_path
		.split('/')
		.filter(|part| !part.is_empty())
		.fold(root.to_path_buf(), |path, part| path.join(part))
}

#[cfg(unix)]
pub fn inode(metadata: &std::fs::Metadata) -> Option<u64> {
	use std::os::unix::fs::MetadataExt;
	Some(metadata.ino())
}

#[cfg(not(unix))]
pub fn inode(_metadata: &std::fs::Metadata) -> Option<u64> {
	None
}
