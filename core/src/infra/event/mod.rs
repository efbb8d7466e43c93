//! Event bus for decoupled communication
//!
//! Long running work (scans, volume polling) reports completion here instead of
//! blocking the caller that requested it. Bridges forward these events to the UI.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use crate::infra::api::CommandState;

/// A central event type that represents all events that can be emitted throughout the system
#[derive(Debug, Clone, Serialize, Deserialize, strum::AsRefStr)]
#[serde(tag = "key", content = "payload")]
pub enum Event {
	// Core lifecycle events
	CoreStarted,
	CoreShutdown,

	// Library events
	LibraryCreated {
		id: Uuid,
		name: String,
	},
	LibraryDeleted {
		id: Uuid,
	},

	// Location events
	LocationAdded {
		library_id: Uuid,
		location_id: i32,
		path: PathBuf,
	},
	LocationRemoved {
		library_id: Uuid,
		location_id: i32,
	},
	LocationOnlineChanged {
		library_id: Uuid,
		location_id: i32,
		is_online: bool,
	},

	// Scan events
	ScanQueued {
		library_id: Uuid,
		location_id: i32,
	},
	ScanStarted {
		library_id: Uuid,
		location_id: i32,
	},
	ScanCompleted {
		library_id: Uuid,
		location_id: i32,
		files_found: u64,
		files_updated: u64,
		files_removed: u64,
		warnings: u64,
	},
	ScanCancelled {
		library_id: Uuid,
		location_id: i32,
	},
	ScanFailed {
		library_id: Uuid,
		location_id: i32,
		error: String,
	},

	// Index events
	FileRemoved {
		library_id: Uuid,
		file_id: i32,
	},
	TagCreated {
		library_id: Uuid,
		tag_id: i32,
	},
	TagDeleted {
		library_id: Uuid,
		tag_id: i32,
	},
	TagAssigned {
		library_id: Uuid,
		tag_id: i32,
		file_id: i32,
	},

	// Volume events
	VolumeAdded {
		volume_id: u32,
		mount_point: PathBuf,
	},
	VolumeMountChanged {
		volume_id: u32,
		is_mounted: bool,
	},

	// Dispatcher events
	CommandStateChanged {
		command_id: Uuid,
		key: String,
		state: CommandState,
	},

	/// Cached results of the named query are stale
	InvalidateQuery {
		key: String,
	},
}

/// Event bus for broadcasting events
#[derive(Debug, Clone)]
pub struct EventBus {
	sender: broadcast::Sender<Event>,
}

impl EventBus {
	/// Create a new event bus with specified capacity
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Emit an event
	pub fn emit(&self, event: Event) {
		trace!(event = event.as_ref(), "Emitting event");
		// No receivers is fine
		let _ = self.sender.send(event);
	}

	/// Subscribe to events
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.sender.subscribe()
	}

	pub fn invalidate_query(&self, key: impl Into<String>) {
		self.emit(Event::InvalidateQuery { key: key.into() });
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}
