use crate::{
	infra::db::entities::{location, tag},
	library::LibraryInfo,
	ops::indexing::QuickScanOutcome,
	volume::Volume,
};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Every mutation a client can request, keyed by its wire name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr)]
#[serde(tag = "key", content = "params")]
pub enum ClientCommand {
	LibCreate {
		name: String,
		#[serde(default)]
		description: Option<String>,
	},
	LibDelete {
		library_id: Uuid,
	},
	LocCreate {
		path: PathBuf,
		#[serde(default)]
		name: Option<String>,
	},
	LocScanFull {
		location_id: i32,
	},
	LocDelete {
		location_id: i32,
	},
	FileScanQuick {
		file_id: i32,
	},
	FileScanFull {
		file_id: i32,
	},
	FileDelete {
		file_id: i32,
	},
	TagCreate {
		name: String,
		#[serde(default)]
		color: Option<String>,
	},
	TagAssign {
		file_id: i32,
		tag_id: i32,
	},
	TagUnassign {
		file_id: i32,
		tag_id: i32,
	},
	TagDelete {
		tag_id: i32,
	},
	SysVolumeUnmount {
		volume_id: u32,
	},
}

impl ClientCommand {
	/// Whether the command runs against a library
	pub fn is_library_scoped(&self) -> bool {
		!matches!(
			self,
			Self::LibCreate { .. } | Self::LibDelete { .. } | Self::SysVolumeUnmount { .. }
		)
	}

	/// Queries whose cached results are stale once the command succeeded
	pub fn invalidates(&self) -> &'static [&'static str] {
		match self {
			Self::LibCreate { .. } | Self::LibDelete { .. } => &["library.list"],
			Self::LocCreate { .. } | Self::LocScanFull { .. } => {
				&["locations.list", "library.getStatistics"]
			}
			Self::LocDelete { .. } => &[
				"locations.list",
				"files.byLocation",
				"files.byTag",
				"library.getStatistics",
			],
			Self::FileScanQuick { .. } | Self::FileScanFull { .. } | Self::FileDelete { .. } => {
				&["files.byLocation", "files.byTag", "library.getStatistics"]
			}
			Self::TagCreate { .. } | Self::TagDelete { .. } => &["tags.list", "files.byTag"],
			Self::TagAssign { .. } | Self::TagUnassign { .. } => &["files.byTag"],
			Self::SysVolumeUnmount { .. } => &["volumes.list", "locations.list"],
		}
	}
}

/// A command addressed to a library. Without `library_id`, library scoped
/// commands go to the default library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
	#[serde(default)]
	pub library_id: Option<Uuid>,
	pub command: ClientCommand,
}

impl CommandRequest {
	pub fn new(library_id: Option<Uuid>, command: ClientCommand) -> Self {
		Self {
			library_id,
			command,
		}
	}
}

impl From<ClientCommand> for CommandRequest {
	fn from(command: ClientCommand) -> Self {
		Self::new(None, command)
	}
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
	Library(LibraryInfo),
	Location(location::Model),
	/// The scan was accepted, completion is reported through events
	ScanQueued { location_id: i32 },
	FileScan(QuickScanOutcome),
	Tag(tag::Model),
	/// Whether a tag assignment was added or removed
	Changed { changed: bool },
	Volume(Volume),
	Done,
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn commands_use_key_and_params_envelopes() {
		let command: ClientCommand = serde_json::from_value(json!({
			"key": "TagAssign",
			"params": { "file_id": 4, "tag_id": 2 }
		}))
		.unwrap();
		assert_eq!(
			command,
			ClientCommand::TagAssign {
				file_id: 4,
				tag_id: 2
			}
		);
		assert_eq!(command.as_ref(), "TagAssign");

		let command: ClientCommand = serde_json::from_value(json!({
			"key": "LocCreate",
			"params": { "path": "/data" }
		}))
		.unwrap();
		assert_eq!(
			command,
			ClientCommand::LocCreate {
				path: "/data".into(),
				name: None
			}
		);
	}

	#[test]
	fn unknown_keys_are_rejected() {
		assert!(serde_json::from_value::<ClientCommand>(json!({
			"key": "LocExplode",
			"params": {}
		}))
		.is_err());
	}

	#[test]
	fn scope_follows_the_command() {
		assert!(!ClientCommand::SysVolumeUnmount { volume_id: 1 }.is_library_scoped());
		assert!(ClientCommand::TagDelete { tag_id: 1 }.is_library_scoped());
	}
}
