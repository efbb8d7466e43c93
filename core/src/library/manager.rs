use super::{config::LibraryConfig, error::LibraryError, Library};
use crate::{
	index::ContentIndex,
	infra::{
		db::Database,
		event::{Event, EventBus},
	},
	util::FileIOError,
};

use parking_lot::RwLock as SyncRwLock;
use std::{
	collections::HashMap,
	io,
	path::{Path, PathBuf},
	str::FromStr,
	sync::{atomic::AtomicBool, Arc},
};
use tokio::{fs, sync::RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Owns every open library of this node
#[derive(Debug)]
pub struct LibraryManager {
	/// Directory holding `<id>.sdlibrary` configs and `<id>.db` databases
	libraries_dir: PathBuf,
	libraries: RwLock<HashMap<Uuid, Arc<Library>>>,
	events: EventBus,
}

impl LibraryManager {
	pub fn new(libraries_dir: PathBuf, events: EventBus) -> Self {
		Self {
			libraries_dir,
			libraries: RwLock::new(HashMap::new()),
			events,
		}
	}

	/// Opens every library found on disk, returns how many were loaded.
	///
	/// Entries with an invalid file name or without a database are skipped.
	pub async fn init(&self) -> Result<usize, LibraryError> {
		fs::create_dir_all(&self.libraries_dir)
			.await
			.map_err(|e| FileIOError::from((&self.libraries_dir, e)))?;

		let mut read_dir = fs::read_dir(&self.libraries_dir)
			.await
			.map_err(|e| FileIOError::from((&self.libraries_dir, e)))?;

		let mut loaded = 0;
		while let Some(entry) = read_dir
			.next_entry()
			.await
			.map_err(|e| FileIOError::from((&self.libraries_dir, e)))?
		{
			let config_path = entry.path();
			if config_path.extension().map(|ext| ext != "sdlibrary").unwrap_or(true) {
				continue;
			}

			let Some(Ok(id)) = config_path
				.file_stem()
				.and_then(|stem| stem.to_str().map(Uuid::from_str))
			else {
				warn!(
					config_path = %config_path.display(),
					"Found library config with an invalid file name, skipping",
				);
				continue;
			};

			let db_path = config_path.with_extension("db");
			match fs::metadata(&db_path).await {
				Ok(_) => {}
				Err(e) if e.kind() == io::ErrorKind::NotFound => {
					warn!(
						config_path = %config_path.display(),
						"Found library but no matching database file, skipping",
					);
					continue;
				}
				Err(e) => return Err(FileIOError::from((db_path, e)).into()),
			}

			let config = LibraryConfig::load(&config_path).await?;
			let db = Database::open(&db_path).await?;
			db.migrate().await?;

			self.insert(id, config, config_path, db).await;
			loaded += 1;
		}

		info!(loaded, "Loaded libraries");

		Ok(loaded)
	}

	#[instrument(skip(self), err)]
	pub async fn create(
		&self,
		name: &str,
		description: Option<String>,
	) -> Result<Arc<Library>, LibraryError> {
		let name = name.trim();
		if name.is_empty() {
			return Err(LibraryError::InvalidConfig(
				"name cannot be empty".to_string(),
			));
		}

		if self
			.list()
			.await
			.iter()
			.any(|library| library.name().eq_ignore_ascii_case(name))
		{
			return Err(LibraryError::AlreadyExists(name.to_string()));
		}

		let id = Uuid::new_v4();
		let config_path = self.libraries_dir.join(format!("{id}.sdlibrary"));
		let config = LibraryConfig::new(name.to_string(), description);

		fs::create_dir_all(&self.libraries_dir)
			.await
			.map_err(|e| FileIOError::from((&self.libraries_dir, e)))?;

		let db = Database::create(&self.libraries_dir.join(format!("{id}.db"))).await?;
		db.migrate().await?;
		config.save(&config_path).await?;

		debug!(config_path = %config_path.display(), "Created library");

		let library = self.insert(id, config, config_path, db).await;

		self.events.emit(Event::LibraryCreated {
			id,
			name: name.to_string(),
		});
		self.events.invalidate_query("library.list");

		Ok(library)
	}

	async fn insert(
		&self,
		id: Uuid,
		config: LibraryConfig,
		config_path: PathBuf,
		db: Database,
	) -> Arc<Library> {
		let library = Arc::new(Library {
			id,
			config: SyncRwLock::new(config),
			config_path,
			closed: AtomicBool::new(false),
			index: ContentIndex::new(
				id,
				db.conn().clone(),
				db.writer().clone(),
				self.events.clone(),
			),
			db,
		});

		self.libraries
			.write()
			.await
			.insert(id, Arc::clone(&library));

		library
	}

	pub async fn get(&self, id: &Uuid) -> Option<Arc<Library>> {
		self.libraries.read().await.get(id).cloned()
	}

	/// Libraries ordered by creation date, oldest first
	pub async fn list(&self) -> Vec<Arc<Library>> {
		let mut libraries = self
			.libraries
			.read()
			.await
			.values()
			.cloned()
			.collect::<Vec<_>>();
		libraries.sort_by_key(|library| (library.config.read().date_created, library.id));
		libraries
	}

	/// The requested library, or the oldest one when no id is given
	pub async fn resolve(&self, id: Option<Uuid>) -> Result<Arc<Library>, LibraryError> {
		match id {
			Some(id) => self.get(&id).await.ok_or(LibraryError::NotFound(id)),
			None => self
				.list()
				.await
				.into_iter()
				.next()
				.ok_or(LibraryError::NoLibrary),
		}
	}

	/// Take the library out of the manager, it no longer resolves afterwards
	pub async fn detach(&self, id: &Uuid) -> Result<Arc<Library>, LibraryError> {
		let library = self
			.libraries
			.write()
			.await
			.remove(id)
			.ok_or(LibraryError::NotFound(*id))?;
		library.set_closed(true);

		debug!(%id, "Detached library");

		Ok(library)
	}

	/// Put back a library whose deletion was abandoned
	pub async fn reattach(&self, library: Arc<Library>) {
		library.set_closed(false);
		self.libraries.write().await.insert(library.id, library);
	}

	/// Close a detached library and remove its files.
	///
	/// Callers must stop scans running against the library first, any that are
	/// still running will fail once the database is closed.
	#[instrument(skip(self, library), fields(id = %library.id), err)]
	pub async fn destroy(&self, library: Arc<Library>) -> Result<(), LibraryError> {
		library.db.close().await?;

		for path in library
			.db
			.files()
			.iter()
			.map(PathBuf::as_path)
			.chain([library.config_path()])
		{
			remove_if_exists(path).await?;
		}

		info!(id = %library.id, "Removed library");

		self.events.emit(Event::LibraryDeleted { id: library.id });
		self.events.invalidate_query("library.list");

		Ok(())
	}

	pub async fn close_all(&self) {
		for library in self.libraries.write().await.drain().map(|(_, library)| library) {
			library.set_closed(true);
			if let Err(e) = library.db.close().await {
				warn!(library_id = %library.id, ?e, "Failed to close library database");
			}
		}
	}
}

async fn remove_if_exists(path: &Path) -> Result<(), FileIOError> {
	match fs::remove_file(path).await {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(FileIOError::from((path, e))),
	}
}
