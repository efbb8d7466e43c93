//! Application configuration management

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration,
};
use tracing::{info, warn};
use uuid::Uuid;

const CONFIG_FILE_NAME: &str = "sd_index.json";

/// Platform-specific data directory resolution
pub fn default_data_dir() -> Result<PathBuf> {
	#[cfg(target_os = "windows")]
	let dir = dirs::data_dir()
		.ok_or_else(|| anyhow!("Could not determine data directory"))?
		.join("SdIndex");

	#[cfg(target_os = "linux")]
	let dir = dirs::data_local_dir()
		.ok_or_else(|| anyhow!("Could not determine data directory"))?
		.join("sd-index");

	#[cfg(not(any(target_os = "windows", target_os = "linux")))]
	let dir = dirs::data_dir()
		.ok_or_else(|| anyhow!("Could not determine data directory"))?
		.join("sd-index");

	fs::create_dir_all(&dir)?;

	Ok(dir)
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
	/// Config schema version
	pub version: u32,

	/// Data directory path
	pub data_dir: PathBuf,

	/// Identity of this node, recorded on every Location it registers
	pub node_id: Uuid,

	pub node_name: String,

	/// Default `EnvFilter` directive when `RUST_LOG` is unset
	pub log_level: String,

	#[serde(default)]
	pub scanner: ScannerConfig,

	#[serde(default)]
	pub volumes: VolumeConfig,
}

/// Scanner worker pool and reconciliation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
	/// Number of scan workers, scans on distinct locations run in parallel up to this bound
	pub workers: usize,

	/// Pending scans accepted before new requests are rejected as busy
	pub queue_capacity: usize,

	/// File records written per transaction during a full scan
	pub batch_size: usize,

	/// Whether to compute content hashes (cas ids) while scanning
	pub hash_content: bool,

	/// How long non-scan commands wait for a busy location before giving up
	pub lock_timeout_ms: u64,
}

impl ScannerConfig {
	pub fn lock_timeout(&self) -> Duration {
		Duration::from_millis(self.lock_timeout_ms)
	}
}

impl Default for ScannerConfig {
	fn default() -> Self {
		Self {
			workers: 4,
			queue_capacity: 64,
			batch_size: 500,
			hash_content: true,
			lock_timeout_ms: 500,
		}
	}
}

/// Volume polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
	/// Seconds between volume polls, 0 disables background polling
	pub refresh_interval_secs: u64,
}

impl Default for VolumeConfig {
	fn default() -> Self {
		Self {
			refresh_interval_secs: 30,
		}
	}
}

impl AppConfig {
	/// Load configuration from a specific data directory
	pub fn load_from(data_dir: &Path) -> Result<Self> {
		let config_path = data_dir.join(CONFIG_FILE_NAME);

		if config_path.exists() {
			info!("Loading config from {:?}", config_path);
			let json = fs::read_to_string(&config_path)?;
			let mut config: AppConfig = serde_json::from_str(&json)?;

			if config.version < Self::target_version() {
				info!(
					"Migrating config from v{} to v{}",
					config.version,
					Self::target_version()
				);
				config.migrate()?;
				config.save()?;
			}

			// The directory may have been moved since the config was written
			config.data_dir = data_dir.to_path_buf();

			Ok(config)
		} else {
			warn!("No config found, creating default at {:?}", config_path);
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			Ok(config)
		}
	}

	/// Load or create configuration
	pub fn load_or_create(data_dir: &Path) -> Result<Self> {
		Self::load_from(data_dir).or_else(|e| {
			warn!("Failed to load config, recreating it: {e:#}");
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			Ok(config)
		})
	}

	/// Create default configuration with specific data directory
	pub fn default_with_dir(data_dir: PathBuf) -> Self {
		Self {
			version: Self::target_version(),
			data_dir,
			node_id: Uuid::new_v4(),
			node_name: default_node_name(),
			log_level: "info".to_string(),
			scanner: ScannerConfig::default(),
			volumes: VolumeConfig::default(),
		}
	}

	/// Save configuration to disk
	pub fn save(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;

		let config_path = self.data_dir.join(CONFIG_FILE_NAME);
		let json = serde_json::to_string_pretty(self)?;
		fs::write(&config_path, json)?;
		info!("Saved config to {:?}", config_path);
		Ok(())
	}

	pub fn logs_dir(&self) -> PathBuf {
		self.data_dir.join("logs")
	}

	pub fn libraries_dir(&self) -> PathBuf {
		self.data_dir.join("libraries")
	}

	pub fn thumbnails_dir(&self) -> PathBuf {
		self.data_dir.join("thumbnails")
	}

	/// Ensure all required directories exist
	pub fn ensure_directories(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;
		fs::create_dir_all(self.logs_dir())?;
		fs::create_dir_all(self.libraries_dir())?;
		Ok(())
	}

	fn target_version() -> u32 {
		1
	}

	fn migrate(&mut self) -> Result<()> {
		match self.version {
			0 => {
				// v0 configs predate the scanner section, serde defaults already filled it
				self.version = 1;
				Ok(())
			}
			1 => Ok(()),
			v => Err(anyhow!("Unknown config version: {}", v)),
		}
	}
}

fn default_node_name() -> String {
	std::env::var("HOSTNAME")
		.or_else(|_| std::env::var("COMPUTERNAME"))
		.unwrap_or_else(|_| "sd-index-node".to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn creates_then_reloads_the_same_node_identity() {
		let dir = tempfile::tempdir().unwrap();

		let created = AppConfig::load_or_create(dir.path()).unwrap();
		assert!(dir.path().join(CONFIG_FILE_NAME).exists());

		let loaded = AppConfig::load_from(dir.path()).unwrap();
		assert_eq!(created.node_id, loaded.node_id);
		assert_eq!(loaded.scanner.workers, ScannerConfig::default().workers);
	}

	#[test]
	fn migrates_v0_configs_without_scanner_section() {
		let dir = tempfile::tempdir().unwrap();
		let raw = serde_json::json!({
			"version": 0,
			"data_dir": dir.path(),
			"node_id": Uuid::new_v4(),
			"node_name": "old",
			"log_level": "debug",
		});
		fs::write(dir.path().join(CONFIG_FILE_NAME), raw.to_string()).unwrap();

		let config = AppConfig::load_from(dir.path()).unwrap();
		assert_eq!(config.version, 1);
		assert!(config.scanner.hash_content);
		assert_eq!(config.volumes.refresh_interval_secs, 30);
	}
}
