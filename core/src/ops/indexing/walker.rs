//! Directory walker
//!
//! Directories are kept in an arena and referenced by index, children point at
//! their parent so relative paths are rebuilt on demand instead of being cloned
//! for every entry. Symlinks are never followed, which also rules out cycles.

use super::error::ScanWarning;
use crate::util::{fs::inode, FileIOError};

use chrono::{DateTime, Utc};
use std::{fs::Metadata, path::PathBuf};
use tokio::fs::{self, ReadDir};
use tokio_util::sync::CancellationToken;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirId(usize);

impl DirId {
	pub const ROOT: DirId = DirId(0);
}

#[derive(Debug)]
struct DirNode {
	parent: Option<DirId>,
	name: String,
}

/// A regular file found on disk
#[derive(Debug, Clone)]
pub struct WalkedFile {
	pub relative_path: String,
	pub full_path: PathBuf,
	pub size: u64,
	pub modified: DateTime<Utc>,
	pub inode: Option<u64>,
}

#[derive(Debug)]
pub enum WalkStep {
	File(WalkedFile),
	Cancelled,
	Done,
}

#[derive(Debug)]
pub struct Walker {
	root: PathBuf,
	arena: Vec<DirNode>,
	pending: Vec<DirId>,
	current: Option<(DirId, ReadDir)>,
	warnings: Vec<ScanWarning>,
	/// Relative paths of directories that could not be read
	skipped_dirs: Vec<String>,
}

impl Walker {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			arena: vec![DirNode {
				parent: None,
				name: String::new(),
			}],
			pending: vec![DirId::ROOT],
			current: None,
			warnings: Vec::new(),
			skipped_dirs: Vec::new(),
		}
	}

	pub fn relative_path(&self, dir: DirId) -> String {
		let mut names = Vec::new();
		let mut cursor = Some(dir);
		while let Some(id) = cursor {
			let node = &self.arena[id.0];
			if !node.name.is_empty() {
				names.push(node.name.as_str());
			}
			cursor = node.parent;
		}
		names.reverse();
		names.join("/")
	}

	fn join(&self, dir: DirId, name: &str) -> String {
		let parent = self.relative_path(dir);
		if parent.is_empty() {
			name.to_string()
		} else {
			format!("{parent}/{name}")
		}
	}

	pub fn full_path(&self, dir: DirId) -> PathBuf {
		let relative = self.relative_path(dir);
		if relative.is_empty() {
			self.root.clone()
		} else {
			crate::util::fs::from_relative_path(&self.root, &relative)
		}
	}

	fn warn(&mut self, path: String, message: impl Into<String>) {
		let message = message.into();
		trace!(%path, %message, "Skipping entry");
		self.warnings.push(ScanWarning { path, message });
	}

	/// Advance to the next regular file, checking `cancel` before visiting every entry.
	///
	/// Failing to read the root itself is an error, anything below it becomes a warning.
	pub async fn next_file(&mut self, cancel: &CancellationToken) -> Result<WalkStep, FileIOError> {
		loop {
			if cancel.is_cancelled() {
				return Ok(WalkStep::Cancelled);
			}

			if self.current.is_none() {
				let Some(dir) = self.pending.pop() else {
					return Ok(WalkStep::Done);
				};

				let path = self.full_path(dir);
				match fs::read_dir(&path).await {
					Ok(read_dir) => self.current = Some((dir, read_dir)),
					Err(e) if dir == DirId::ROOT => return Err(FileIOError::from((path, e))),
					Err(e) => {
						let relative = self.relative_path(dir);
						self.warn(relative.clone(), format!("failed to read directory: {e}"));
						self.skipped_dirs.push(relative);
					}
				}
				continue;
			}

			let Some((dir, read_dir)) = self.current.as_mut() else {
				continue;
			};
			let dir = *dir;

			let entry = match read_dir.next_entry().await {
				Ok(Some(entry)) => entry,
				Ok(None) => {
					self.current = None;
					continue;
				}
				Err(e) => {
					let relative = self.relative_path(dir);
					self.warn(relative.clone(), format!("failed to list directory: {e}"));
					self.skipped_dirs.push(relative);
					self.current = None;
					continue;
				}
			};

			let file_name = entry.file_name();
			let Some(name) = file_name.to_str() else {
				let lossy = self.join(dir, &file_name.to_string_lossy());
				self.warn(lossy, "file name is not valid UTF-8");
				continue;
			};
			let relative_path = self.join(dir, name);

			// Doesn't traverse symlinks
			let file_type = match entry.file_type().await {
				Ok(file_type) => file_type,
				Err(e) => {
					self.warn(relative_path, format!("failed to read file type: {e}"));
					continue;
				}
			};

			if file_type.is_symlink() {
				trace!(%relative_path, "Not following symlink");
				continue;
			}

			if file_type.is_dir() {
				let id = DirId(self.arena.len());
				self.arena.push(DirNode {
					parent: Some(dir),
					name: name.to_string(),
				});
				self.pending.push(id);
				continue;
			}

			if !file_type.is_file() {
				continue;
			}

			match entry.metadata().await {
				Ok(metadata) => {
					return Ok(WalkStep::File(WalkedFile {
						full_path: entry.path(),
						..walked_file(relative_path, &metadata)
					}))
				}
				Err(e) => self.warn(relative_path, format!("failed to read metadata: {e}")),
			}
		}
	}

	pub fn warnings(&self) -> &[ScanWarning] {
		&self.warnings
	}

	pub fn into_warnings(self) -> Vec<ScanWarning> {
		self.warnings
	}

	/// Whether `relative_path` lies below a directory that could not be read,
	/// or was itself reported in a warning
	pub fn was_skipped(&self, relative_path: &str) -> bool {
		self.warnings.iter().any(|w| w.path == relative_path)
			|| self.skipped_dirs.iter().any(|dir| {
				dir.is_empty()
					|| relative_path
						.strip_prefix(dir.as_str())
						.map(|rest| rest.starts_with('/'))
						.unwrap_or(false)
			})
	}
}

/// Builds a [`WalkedFile`] from metadata, `full_path` is left empty for the caller to fill
pub fn walked_file(relative_path: String, metadata: &Metadata) -> WalkedFile {
	let modified = metadata
		.modified()
		.map(DateTime::<Utc>::from)
		.unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH);

	WalkedFile {
		relative_path,
		full_path: PathBuf::new(),
		size: metadata.len(),
		modified,
		inode: inode(metadata),
	}
}
