//! Database infrastructure using SeaORM
//!
//! Every Library owns exactly one SQLite database file. The connection pool is
//! switched to WAL journaling on open so readers get a point-in-time snapshot
//! while a scan is writing.
//!
//! SQLite allows a single writer. A transaction that reads before it writes
//! can't wait for that writer the way a plain statement does: once another
//! connection commits, its snapshot is stale and the upgrade fails right away
//! with "database is locked". Write transactions therefore go through the
//! database's [`WriteLock`], which admits one of them at a time.

use sea_orm::{
	ConnectOptions, ConnectionTrait, Database as SeaDatabase, DatabaseConnection,
	DatabaseTransaction, DbErr, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::{
	ops::Deref,
	path::{Path, PathBuf},
	sync::Arc,
	time::Duration,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

pub mod entities;
pub mod migration;

/// Database wrapper for a Library
#[derive(Debug)]
pub struct Database {
	/// SeaORM database connection
	conn: DatabaseConnection,
	writer: WriteLock,
	path: PathBuf,
}

/// Serializes write transactions on one database, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct WriteLock(Arc<Mutex<()>>);

impl WriteLock {
	/// Wait for the other writers, then open a transaction on `conn`
	pub async fn begin(&self, conn: &DatabaseConnection) -> Result<WriteTransaction, DbErr> {
		let guard = Arc::clone(&self.0).lock_owned().await;
		let txn = conn.begin().await?;

		Ok(WriteTransaction { txn, _guard: guard })
	}

	/// Hold off every write transaction until the returned guard is dropped
	pub async fn hold(&self) -> OwnedMutexGuard<()> {
		Arc::clone(&self.0).lock_owned().await
	}
}

/// Transaction that keeps its database's [`WriteLock`] until it ends.
///
/// Dropping it without committing rolls back.
pub struct WriteTransaction {
	// Rolled back before the lock is released
	txn: DatabaseTransaction,
	_guard: OwnedMutexGuard<()>,
}

impl WriteTransaction {
	pub async fn commit(self) -> Result<(), DbErr> {
		let Self { txn, _guard } = self;
		txn.commit().await
	}
}

impl std::fmt::Debug for WriteTransaction {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WriteTransaction").finish_non_exhaustive()
	}
}

impl Deref for WriteTransaction {
	type Target = DatabaseTransaction;

	fn deref(&self) -> &Self::Target {
		&self.txn
	}
}

impl Database {
	/// Create a new database at the specified path
	pub async fn create(path: &Path) -> Result<Self, DbErr> {
		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent)
				.await
				.map_err(|e| DbErr::Custom(format!("Failed to create directory: {}", e)))?;
		}

		let db = Self::connect(path, "rwc").await?;

		info!("Created new database at {:?}", path);

		Ok(db)
	}

	/// Open an existing database
	pub async fn open(path: &Path) -> Result<Self, DbErr> {
		if !path.exists() {
			return Err(DbErr::Custom(format!(
				"Database does not exist: {}",
				path.display()
			)));
		}

		let db = Self::connect(path, "rw").await?;

		info!("Opened database at {:?}", path);

		Ok(db)
	}

	async fn connect(path: &Path, mode: &str) -> Result<Self, DbErr> {
		let db_url = format!("sqlite://{}?mode={mode}", path.display());

		let mut opt = ConnectOptions::new(db_url);
		opt.max_connections(8)
			.min_connections(1)
			.connect_timeout(Duration::from_secs(8))
			.idle_timeout(Duration::from_secs(60))
			.sqlx_logging(false); // We'll use tracing instead

		let conn = SeaDatabase::connect(opt).await?;

		// Persistent for the file, so doing it once per open is enough
		conn.execute_unprepared("PRAGMA journal_mode = WAL;").await?;
		debug!("Enabled WAL journaling for {:?}", path);

		Ok(Self {
			conn,
			writer: WriteLock::default(),
			path: path.to_path_buf(),
		})
	}

	/// Run migrations
	pub async fn migrate(&self) -> Result<(), DbErr> {
		migration::Migrator::up(&self.conn, None).await?;
		info!("Database migrations completed successfully");
		Ok(())
	}

	/// Get the database connection
	pub fn conn(&self) -> &DatabaseConnection {
		&self.conn
	}

	pub fn writer(&self) -> &WriteLock {
		&self.writer
	}

	/// Open a transaction that is allowed to write
	pub async fn begin_write(&self) -> Result<WriteTransaction, DbErr> {
		self.writer.begin(&self.conn).await
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Main database file plus its WAL and shared-memory companions
	pub fn files(&self) -> [PathBuf; 3] {
		let wal = sidecar_path(&self.path, "-wal");
		let shm = sidecar_path(&self.path, "-shm");
		[self.path.clone(), wal, shm]
	}

	/// Close the pool, every clone of the connection stops working
	pub async fn close(&self) -> Result<(), DbErr> {
		self.conn.clone().close().await
	}
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
	let mut raw = path.as_os_str().to_os_string();
	raw.push(suffix);
	PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn create_migrate_and_reopen() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("library.db");

		let db = Database::create(&path).await.unwrap();
		db.migrate().await.unwrap();
		db.close().await.unwrap();

		let reopened = Database::open(&path).await.unwrap();
		reopened.migrate().await.unwrap();
		assert_eq!(reopened.path(), path.as_path());
		assert!(reopened.files()[1].to_string_lossy().ends_with("library.db-wal"));
	}

	#[tokio::test]
	async fn concurrent_read_then_write_transactions_all_commit() {
		use entities::tag;
		use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, EntityTrait, PaginatorTrait, Set};

		let dir = tempfile::tempdir().unwrap();
		let db = Arc::new(Database::create(&dir.path().join("library.db")).await.unwrap());
		db.migrate().await.unwrap();

		let tasks = (0..16)
			.map(|n| {
				let db = Arc::clone(&db);
				tokio::spawn(async move {
					let txn = db.begin_write().await?;
					let existing = tag::Entity::find().count(&*txn).await?;
					tag::ActiveModel {
						id: NotSet,
						uuid: Set(uuid::Uuid::new_v4()),
						name: Set(format!("tag-{n}-{existing}")),
						color: Set("#FFFFFF".to_string()),
						date_created: Set(chrono::Utc::now()),
					}
					.insert(&*txn)
					.await?;
					txn.commit().await
				})
			})
			.collect::<Vec<_>>();

		for task in tasks {
			task.await.unwrap().unwrap();
		}

		assert_eq!(tag::Entity::find().count(db.conn()).await.unwrap(), 16);
	}

	#[tokio::test]
	async fn opening_a_missing_database_fails() {
		let dir = tempfile::tempdir().unwrap();
		assert!(Database::open(&dir.path().join("missing.db")).await.is_err());
	}
}
