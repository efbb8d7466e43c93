//! Library configuration stored next to the library database

use super::error::LibraryError;
use crate::util::FileIOError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Contents of `<id>.sdlibrary`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
	/// Version of the configuration format
	pub version: u32,

	/// Human-readable name
	pub name: String,

	pub description: Option<String>,

	pub date_created: DateTime<Utc>,
}

impl LibraryConfig {
	const VERSION: u32 = 1;

	pub fn new(name: String, description: Option<String>) -> Self {
		Self {
			version: Self::VERSION,
			name,
			description,
			date_created: Utc::now(),
		}
	}

	pub async fn load(path: &Path) -> Result<Self, LibraryError> {
		let data = fs::read_to_string(path)
			.await
			.map_err(|e| FileIOError::from((path, e)))?;

		let config: Self = serde_json::from_str(&data)?;
		if config.version > Self::VERSION {
			return Err(LibraryError::InvalidConfig(format!(
				"unsupported library config version {}",
				config.version
			)));
		}

		Ok(config)
	}

	pub async fn save(&self, path: &Path) -> Result<(), LibraryError> {
		let data = serde_json::to_string_pretty(self)?;
		fs::write(path, data)
			.await
			.map_err(|e| FileIOError::from((path, e)).into())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn saves_and_loads() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("lib.sdlibrary");

		let config = LibraryConfig::new("Photos".into(), Some("family".into()));
		config.save(&path).await.unwrap();

		assert_eq!(LibraryConfig::load(&path).await.unwrap(), config);
	}

	#[tokio::test]
	async fn rejects_configs_from_the_future() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("lib.sdlibrary");

		let mut config = LibraryConfig::new("Photos".into(), None);
		config.version = 99;
		config.save(&path).await.unwrap();

		assert!(matches!(
			LibraryConfig::load(&path).await,
			Err(LibraryError::InvalidConfig(_))
		));
	}
}
