use crate::{
	index::ObjectKind,
	infra::db::entities::{file, location, tag},
	library::{LibraryInfo, Statistics},
	volume::Volume,
};

use serde::{Deserialize, Serialize};

/// Read-only requests, keyed by dotted names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr)]
#[serde(tag = "key", content = "params")]
pub enum ClientQuery {
	#[serde(rename = "library.list")]
	#[strum(serialize = "library.list")]
	LibraryList,
	#[serde(rename = "library.getStatistics")]
	#[strum(serialize = "library.getStatistics")]
	LibraryGetStatistics,
	#[serde(rename = "locations.list")]
	#[strum(serialize = "locations.list")]
	LocationsList,
	#[serde(rename = "locations.get")]
	#[strum(serialize = "locations.get")]
	LocationsGet { location_id: i32 },
	#[serde(rename = "files.byLocation")]
	#[strum(serialize = "files.byLocation")]
	FilesByLocation { location_id: i32 },
	#[serde(rename = "files.byTag")]
	#[strum(serialize = "files.byTag")]
	FilesByTag { tag_id: i32 },
	#[serde(rename = "files.byKind")]
	#[strum(serialize = "files.byKind")]
	FilesByKind { kind: ObjectKind },
	#[serde(rename = "files.get")]
	#[strum(serialize = "files.get")]
	FilesGet { file_id: i32 },
	#[serde(rename = "tags.list")]
	#[strum(serialize = "tags.list")]
	TagsList,
	#[serde(rename = "volumes.list")]
	#[strum(serialize = "volumes.list")]
	VolumesList,
}

impl ClientQuery {
	pub fn is_library_scoped(&self) -> bool {
		!matches!(self, Self::LibraryList | Self::VolumesList)
	}
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
	Libraries(Vec<LibraryInfo>),
	Statistics(Statistics),
	Locations(Vec<location::Model>),
	Location(location::Model),
	Files(Vec<file::Model>),
	File(file::Model),
	Tags(Vec<tag::Model>),
	Volumes(Vec<Volume>),
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn queries_use_dotted_keys() {
		let query: ClientQuery = serde_json::from_value(json!({ "key": "library.list" })).unwrap();
		assert_eq!(query, ClientQuery::LibraryList);

		let query: ClientQuery = serde_json::from_value(json!({
			"key": "files.byTag",
			"params": { "tag_id": 3 }
		}))
		.unwrap();
		assert_eq!(query, ClientQuery::FilesByTag { tag_id: 3 });
		assert_eq!(query.as_ref(), "files.byTag");

		let query: ClientQuery = serde_json::from_value(json!({
			"key": "files.byKind",
			"params": { "kind": "image" }
		}))
		.unwrap();
		assert_eq!(
			query,
			ClientQuery::FilesByKind {
				kind: ObjectKind::Image
			}
		);
	}
}
