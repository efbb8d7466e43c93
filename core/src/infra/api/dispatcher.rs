//! Command dispatcher - central router for every client request

use super::{
	command::{ClientCommand, CommandOutput, CommandRequest},
	error::{CoreError, ErrorKind},
	query::{ClientQuery, QueryOutput},
	CommandState,
};
use crate::{
	infra::{
		db::entities::{location, tag},
		event::{Event, EventBus},
	},
	library::{Library, LibraryManager, Statistics},
	location::LocationManager,
	ops::indexing::{LocationLocks, ScanPool, Scanner},
	util::{fs::from_relative_path, FileIOError},
	volume::VolumeManager,
};

use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{io, path::PathBuf, sync::Arc, time::Duration};
use tokio::fs;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Routes commands and queries to the component that owns them
#[derive(Debug)]
pub struct Dispatcher {
	libraries: Arc<LibraryManager>,
	locations: Arc<LocationManager>,
	volumes: Arc<VolumeManager>,
	scanner: Arc<Scanner>,
	pool: Arc<ScanPool>,
	locks: Arc<LocationLocks>,
	events: EventBus,
	data_dir: PathBuf,
	lock_timeout: Duration,
}

/// Line oriented envelope used by the bridge
#[derive(Debug, Deserialize)]
struct Envelope {
	#[serde(default)]
	id: Option<Value>,
	#[serde(rename = "type")]
	kind: EnvelopeKind,
	key: String,
	#[serde(default)]
	params: Value,
	#[serde(default)]
	library_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EnvelopeKind {
	Command,
	Query,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Response<T: Serialize> {
	Ok {
		#[serde(skip_serializing_if = "Option::is_none")]
		id: Option<Value>,
		data: T,
	},
	Error {
		#[serde(skip_serializing_if = "Option::is_none")]
		id: Option<Value>,
		kind: ErrorKind,
		message: String,
	},
}

impl Dispatcher {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		libraries: Arc<LibraryManager>,
		locations: Arc<LocationManager>,
		volumes: Arc<VolumeManager>,
		scanner: Arc<Scanner>,
		pool: Arc<ScanPool>,
		locks: Arc<LocationLocks>,
		events: EventBus,
		data_dir: PathBuf,
		lock_timeout: Duration,
	) -> Self {
		Self {
			libraries,
			locations,
			volumes,
			scanner,
			pool,
			locks,
			events,
			data_dir,
			lock_timeout,
		}
	}

	fn transition(&self, command_id: Uuid, key: &str, state: CommandState) {
		debug!(%command_id, key, %state, "Command state changed");
		self.events.emit(Event::CommandStateChanged {
			command_id,
			key: key.to_string(),
			state,
		});
	}

	/// Run a command through `Received -> Validated -> Executing -> Completed | Failed`
	pub async fn dispatch(&self, request: CommandRequest) -> Result<CommandOutput, CoreError> {
		let command_id = Uuid::new_v4();
		let key = request.command.as_ref().to_string();
		self.transition(command_id, &key, CommandState::Received);

		let result = async {
			let library = self.validate(&request).await?;
			self.transition(command_id, &key, CommandState::Validated);

			self.transition(command_id, &key, CommandState::Executing);
			self.execute(library, &request.command).await
		}
		.await;

		match &result {
			Ok(_) => {
				info!(%command_id, %key, "Command completed");
				self.transition(command_id, &key, CommandState::Completed);
				for query in request.command.invalidates() {
					self.events.invalidate_query(*query);
				}
			}
			Err(e) => {
				warn!(%command_id, %key, kind = %e.kind, message = %e.message, "Command failed");
				self.transition(command_id, &key, CommandState::Failed);
			}
		}

		result
	}

	/// Resolve the target library and make sure every referenced id exists
	async fn validate(&self, request: &CommandRequest) -> Result<Option<Arc<Library>>, CoreError> {
		let library = if request.command.is_library_scoped() {
			Some(self.libraries.resolve(request.library_id).await?)
		} else {
			None
		};

		match (&request.command, library.as_deref()) {
			(ClientCommand::LibCreate { name, .. }, _) if name.trim().is_empty() => {
				return Err(CoreError::invalid_request("library name must not be empty"));
			}
			(ClientCommand::LibDelete { library_id }, _) => {
				self.libraries
					.get(library_id)
					.await
					.ok_or_else(|| CoreError::not_found(format!("Library not found (id: {library_id})")))?;
			}
			(ClientCommand::LocCreate { path, .. }, _) if path.as_os_str().is_empty() => {
				return Err(CoreError::invalid_request("location path must not be empty"));
			}
			(
				ClientCommand::LocScanFull { location_id } | ClientCommand::LocDelete { location_id },
				Some(library),
			) => {
				self.locations.get(library, *location_id).await?;
			}
			(
				ClientCommand::FileScanQuick { file_id }
				| ClientCommand::FileScanFull { file_id }
				| ClientCommand::FileDelete { file_id },
				Some(library),
			) => {
				library.index().get_file(*file_id).await?;
			}
			(ClientCommand::TagCreate { name, .. }, _) if name.trim().is_empty() => {
				return Err(CoreError::invalid_request("tag name must not be empty"));
			}
			(
				ClientCommand::TagAssign { file_id, tag_id }
				| ClientCommand::TagUnassign { file_id, tag_id },
				Some(library),
			) => {
				library.index().get_file(*file_id).await?;
				ensure_tag(library, *tag_id).await?;
			}
			(ClientCommand::TagDelete { tag_id }, Some(library)) => {
				ensure_tag(library, *tag_id).await?;
			}
			(ClientCommand::SysVolumeUnmount { volume_id }, _) => {
				self.volumes.get(*volume_id).await.ok_or_else(|| {
					CoreError::not_found(format!("Volume not found (id: {volume_id})"))
				})?;
			}
			_ => {}
		}

		Ok(library)
	}

	async fn execute(
		&self,
		library: Option<Arc<Library>>,
		command: &ClientCommand,
	) -> Result<CommandOutput, CoreError> {
		let library = || {
			library
				.clone()
				.ok_or_else(|| CoreError::internal("library scoped command without a library"))
		};

		match command {
			ClientCommand::LibCreate { name, description } => Ok(CommandOutput::Library(
				self.libraries
					.create(name, description.clone())
					.await?
					.info(),
			)),

			ClientCommand::LibDelete { library_id } => {
				self.delete_library(*library_id).await?;
				Ok(CommandOutput::Done)
			}

			ClientCommand::LocCreate { path, name } => {
				let library = library()?;
				let location = self
					.locations
					.add_location(&library, path, name.clone())
					.await?;

				// The location is registered even if the initial scan can't be queued now
				match self.locks.reserve(library.id(), location.id) {
					Ok(reservation) => {
						if let Err(e) = self.pool.enqueue(Arc::clone(&library), reservation) {
							warn!(location_id = location.id, ?e, "Failed to queue initial scan");
						}
					}
					Err(e) => warn!(location_id = location.id, ?e, "Failed to queue initial scan"),
				}

				Ok(CommandOutput::Location(location))
			}

			ClientCommand::LocScanFull { location_id } => {
				let library = library()?;
				let location = self.locations.get(&library, *location_id).await?;
				ensure_online(&location)?;

				let reservation = self.locks.reserve(library.id(), location.id)?;
				self.pool.enqueue(library, reservation)?;

				Ok(CommandOutput::ScanQueued {
					location_id: location.id,
				})
			}

			ClientCommand::LocDelete { location_id } => {
				self.locations
					.delete_location(&*library()?, *location_id)
					.await?;
				Ok(CommandOutput::Done)
			}

			ClientCommand::FileScanQuick { file_id } | ClientCommand::FileScanFull { file_id } => {
				let library = library()?;
				let file = library.index().get_file(*file_id).await?;
				let _guard = self.locks.try_acquire(library.id(), file.location_id)?;

				let outcome = if matches!(command, ClientCommand::FileScanFull { .. }) {
					self.scanner.scan_file_full(&library, *file_id).await?
				} else {
					self.scanner.scan_quick(&library, *file_id).await?
				};

				Ok(CommandOutput::FileScan(outcome))
			}

			ClientCommand::FileDelete { file_id } => {
				let library = library()?;
				self.delete_file(&library, *file_id).await?;
				Ok(CommandOutput::Done)
			}

			ClientCommand::TagCreate { name, color } => Ok(CommandOutput::Tag(
				library()?
					.index()
					.create_tag(name, color.as_deref())
					.await?,
			)),

			ClientCommand::TagAssign { file_id, tag_id } => Ok(CommandOutput::Changed {
				changed: library()?.index().assign_tag(*file_id, *tag_id).await?,
			}),

			ClientCommand::TagUnassign { file_id, tag_id } => Ok(CommandOutput::Changed {
				changed: library()?.index().unassign_tag(*file_id, *tag_id).await?,
			}),

			ClientCommand::TagDelete { tag_id } => {
				library()?.index().delete_tag(*tag_id).await?;
				Ok(CommandOutput::Done)
			}

			ClientCommand::SysVolumeUnmount { volume_id } => {
				let volume = self.volumes.unmount(*volume_id).await?;

				for library in self.libraries.list().await {
					let changed = self.locations.mark_volume_offline(&library, &volume).await?;
					debug!(library_id = %library.id(), changed, "Took locations offline after unmount");
				}

				Ok(CommandOutput::Volume(volume))
			}
		}
	}

	/// Stop the library from resolving, stop its scans, then drop it together
	/// with its files
	async fn delete_library(&self, library_id: Uuid) -> Result<(), CoreError> {
		let library = self.libraries.detach(&library_id).await?;

		let mut guards = Vec::new();
		for location_id in self.locks.cancel_library(library_id) {
			match self
				.locks
				.acquire_timeout(library_id, location_id, self.lock_timeout)
				.await
			{
				Ok(guard) => guards.push(guard),
				Err(e) => {
					warn!(%library_id, location_id, "Scan did not stop in time, keeping library");
					self.libraries.reattach(library).await;
					return Err(e.into());
				}
			}
		}

		self.libraries.destroy(library).await?;

		drop(guards);
		self.locks.forget_library(library_id);

		Ok(())
	}

	/// Remove a file from disk and then its record
	async fn delete_file(&self, library: &Library, file_id: i32) -> Result<(), CoreError> {
		let file = library.index().get_file(file_id).await?;
		let location = self.locations.get(library, file.location_id).await?;
		ensure_online(&location)?;

		let _guard = self.locations.lock(library, location.id).await?;

		let path = from_relative_path(&location.path_buf(), &file.relative_path);
		match fs::remove_file(&path).await {
			Ok(()) => {}
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				debug!(path = %path.display(), "File already gone from disk");
			}
			Err(e) => return Err(FileIOError::from((path, e)).into()),
		}

		library.index().delete_file(file_id).await?;

		Ok(())
	}

	pub async fn query(
		&self,
		library_id: Option<Uuid>,
		query: ClientQuery,
	) -> Result<QueryOutput, CoreError> {
		let library = if query.is_library_scoped() {
			Some(self.libraries.resolve(library_id).await?)
		} else {
			None
		};
		let library = || {
			library
				.clone()
				.ok_or_else(|| CoreError::internal("library scoped query without a library"))
		};

		Ok(match query {
			ClientQuery::LibraryList => QueryOutput::Libraries(
				self.libraries
					.list()
					.await
					.iter()
					.map(|library| library.info())
					.collect(),
			),
			ClientQuery::LibraryGetStatistics => QueryOutput::Statistics(
				Statistics::calculate(&*library()?, &self.volumes, &self.data_dir).await?,
			),
			ClientQuery::LocationsList => {
				QueryOutput::Locations(self.locations.list(&*library()?).await?)
			}
			ClientQuery::LocationsGet { location_id } => {
				QueryOutput::Location(self.locations.get(&*library()?, location_id).await?)
			}
			ClientQuery::FilesByLocation { location_id } => QueryOutput::Files(
				library()?
					.index()
					.list_files_by_location(location_id)
					.await?,
			),
			ClientQuery::FilesByKind { kind } => {
				QueryOutput::Files(library()?.index().list_files_by_kind(kind).await?)
			}
			ClientQuery::FilesByTag { tag_id } => {
				QueryOutput::Files(library()?.index().list_files_by_tag(tag_id).await?)
			}
			ClientQuery::FilesGet { file_id } => {
				QueryOutput::File(library()?.index().get_file(file_id).await?)
			}
			ClientQuery::TagsList => QueryOutput::Tags(library()?.index().list_tags().await?),
			ClientQuery::VolumesList => QueryOutput::Volumes(self.volumes.list().await),
		})
	}

	/// Bridge entry point: one JSON request in, one JSON response out.
	/// Never fails, problems are reported inside the response envelope.
	pub async fn handle_json(&self, line: &str) -> String {
		let envelope = match serde_json::from_str::<Envelope>(line) {
			Ok(envelope) => envelope,
			Err(e) => return respond::<()>(None, Err(CoreError::invalid_request(e.to_string()))),
		};

		// Unit variants take no params at all
		let tagged = if envelope.params.is_null() {
			json!({ "key": envelope.key })
		} else {
			json!({ "key": envelope.key, "params": envelope.params })
		};

		match envelope.kind {
			EnvelopeKind::Command => {
				let result = match serde_json::from_value::<ClientCommand>(tagged) {
					Ok(command) => {
						self.dispatch(CommandRequest::new(envelope.library_id, command))
							.await
					}
					Err(e) => Err(e.into()),
				};
				respond(envelope.id, result)
			}
			EnvelopeKind::Query => {
				let result = match serde_json::from_value::<ClientQuery>(tagged) {
					Ok(query) => self.query(envelope.library_id, query).await,
					Err(e) => Err(e.into()),
				};
				respond(envelope.id, result)
			}
		}
	}
}

fn respond<T: Serialize>(id: Option<Value>, result: Result<T, CoreError>) -> String {
	let response = match result {
		Ok(data) => Response::Ok { id, data },
		Err(CoreError { kind, message }) => Response::Error { id, kind, message },
	};

	serde_json::to_string(&response).unwrap_or_else(|e| {
		error!(?e, "Failed to serialize response");
		json!({
			"status": "error",
			"kind": ErrorKind::Internal,
			"message": e.to_string(),
		})
		.to_string()
	})
}

fn ensure_online(location: &location::Model) -> Result<(), CoreError> {
	if location.is_online {
		Ok(())
	} else {
		Err(CoreError::new(
			ErrorKind::LocationOffline,
			format!("Location is offline (id: {})", location.id),
		))
	}
}

async fn ensure_tag(library: &Library, tag_id: i32) -> Result<tag::Model, CoreError> {
	tag::Entity::find_by_id(tag_id)
		.one(library.db().conn())
		.await?
		.ok_or_else(|| CoreError::not_found(format!("Tag not found (id: {tag_id})")))
}

