//! Per-location exclusion
//!
//! At most one task may mutate a location at a time. A full scan reserves the
//! location without waiting and fails with `ScanInProgress` when it is already
//! held or reserved; the reservation only turns into a hold once a worker picks
//! the scan up. Other mutations wait a bounded time and fail with `Busy`. The
//! holder's cancellation token lets a deletion ask a running or queued scan to
//! stop early.

use super::error::ScanError;

use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

type LocationKey = (Uuid, i32);
type Entries = Arc<Mutex<HashMap<LocationKey, LockEntry>>>;

#[derive(Debug)]
struct LockEntry {
	lock: Arc<AsyncMutex<()>>,
	cancel: CancellationToken,
	/// A queued scan is waiting for this location
	reserved: bool,
}

impl Default for LockEntry {
	fn default() -> Self {
		Self {
			lock: Arc::new(AsyncMutex::new(())),
			cancel: CancellationToken::new(),
			reserved: false,
		}
	}
}

impl LockEntry {
	fn is_busy(&self) -> bool {
		self.reserved || self.lock.try_lock().is_err()
	}

	/// The token for a new holder, replacing one left cancelled by a previous holder
	fn fresh_token(&mut self) -> CancellationToken {
		if self.cancel.is_cancelled() {
			self.cancel = CancellationToken::new();
		}
		self.cancel.clone()
	}
}

#[derive(Debug, Default)]
pub struct LocationLocks {
	entries: Entries,
}

/// Exclusive hold on a location, released on drop
#[derive(Debug)]
pub struct LocationGuard {
	location_id: i32,
	cancel: CancellationToken,
	_guard: OwnedMutexGuard<()>,
}

impl LocationGuard {
	pub fn location_id(&self) -> i32 {
		self.location_id
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	pub fn cancellation_token(&self) -> &CancellationToken {
		&self.cancel
	}
}

/// Claim on a location for a scan that is still waiting in the queue.
///
/// Nothing else can reserve or take the location without waiting while the
/// claim lives, but a waiting deletion gets through right away. Dropping it
/// gives up the claim.
#[derive(Debug)]
pub struct ScanReservation {
	key: LocationKey,
	lock: Arc<AsyncMutex<()>>,
	cancel: CancellationToken,
	entries: Entries,
}

impl ScanReservation {
	pub fn location_id(&self) -> i32 {
		self.key.1
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Turn the claim into a hold, or `None` if it was cancelled while queued
	pub async fn acquire(self) -> Option<LocationGuard> {
		if self.cancel.is_cancelled() {
			return None;
		}

		let guard = tokio::select! {
			biased;
			_ = self.cancel.cancelled() => return None,
			guard = Arc::clone(&self.lock).lock_owned() => guard,
		};

		// Cancelled while we were waiting for the previous holder
		if self.cancel.is_cancelled() {
			return None;
		}

		Some(LocationGuard {
			location_id: self.key.1,
			cancel: self.cancel.clone(),
			_guard: guard,
		})
	}
}

impl Drop for ScanReservation {
	fn drop(&mut self) {
		if let Some(entry) = self.entries.lock().get_mut(&self.key) {
			// The location may have been forgotten and registered again since
			if Arc::ptr_eq(&entry.lock, &self.lock) {
				entry.reserved = false;
			}
		}
	}
}

impl LocationLocks {
	fn lock_for(&self, key: LocationKey) -> Arc<AsyncMutex<()>> {
		Arc::clone(&self.entries.lock().entry(key).or_default().lock)
	}

	fn guard(&self, key: LocationKey, guard: OwnedMutexGuard<()>) -> LocationGuard {
		let cancel = self.entries.lock().entry(key).or_default().fresh_token();

		LocationGuard {
			location_id: key.1,
			cancel,
			_guard: guard,
		}
	}

	/// Claim the location for a queued scan without waiting
	pub fn reserve(&self, library_id: Uuid, location_id: i32) -> Result<ScanReservation, ScanError> {
		let key = (library_id, location_id);
		let mut entries = self.entries.lock();
		let entry = entries.entry(key).or_default();

		if entry.is_busy() {
			return Err(ScanError::ScanInProgress(location_id));
		}

		entry.reserved = true;

		Ok(ScanReservation {
			key,
			lock: Arc::clone(&entry.lock),
			cancel: entry.fresh_token(),
			entries: Arc::clone(&self.entries),
		})
	}

	/// Take the location without waiting
	pub fn try_acquire(&self, library_id: Uuid, location_id: i32) -> Result<LocationGuard, ScanError> {
		let key = (library_id, location_id);
		let guard = {
			let mut entries = self.entries.lock();
			let entry = entries.entry(key).or_default();
			if entry.reserved {
				return Err(ScanError::ScanInProgress(location_id));
			}

			Arc::clone(&entry.lock)
				.try_lock_owned()
				.map_err(|_| ScanError::ScanInProgress(location_id))?
		};

		Ok(self.guard(key, guard))
	}

	/// Take the location, waiting at most `timeout` for the current holder.
	///
	/// A queued scan's claim does not count as holding the location.
	pub async fn acquire_timeout(
		&self,
		library_id: Uuid,
		location_id: i32,
		timeout: Duration,
	) -> Result<LocationGuard, ScanError> {
		let key = (library_id, location_id);
		let guard = tokio::time::timeout(timeout, self.lock_for(key).lock_owned())
			.await
			.map_err(|_| ScanError::Busy(location_id))?;

		Ok(self.guard(key, guard))
	}

	/// Ask the current holder, or the scan waiting for the location, to stop
	pub fn cancel(&self, library_id: Uuid, location_id: i32) {
		if let Some(entry) = self.entries.lock().get(&(library_id, location_id)) {
			debug!(%library_id, location_id, "Cancelling location holder");
			entry.cancel.cancel();
		}
	}

	/// Cancel every holder and queued scan in a library, returns the ids of
	/// locations that were held or reserved
	pub fn cancel_library(&self, library_id: Uuid) -> Vec<i32> {
		let mut ids = self
			.entries
			.lock()
			.iter()
			.filter(|((lib, _), entry)| *lib == library_id && entry.is_busy())
			.map(|((_, location_id), entry)| {
				entry.cancel.cancel();
				*location_id
			})
			.collect::<Vec<_>>();
		ids.sort_unstable();
		ids
	}

	pub fn cancel_all(&self) {
		for entry in self.entries.lock().values() {
			entry.cancel.cancel();
		}
	}

	/// Drop bookkeeping for a location that no longer exists
	pub fn forget(&self, library_id: Uuid, location_id: i32) {
		self.entries.lock().remove(&(library_id, location_id));
	}

	pub fn forget_library(&self, library_id: Uuid) {
		self.entries.lock().retain(|(lib, _), _| *lib != library_id);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn second_acquire_fails_fast_while_held() {
		let locks = LocationLocks::default();
		let library = Uuid::new_v4();

		let guard = locks.try_acquire(library, 1).unwrap();
		assert!(matches!(
			locks.try_acquire(library, 1),
			Err(ScanError::ScanInProgress(1))
		));
		assert!(matches!(
			locks.reserve(library, 1),
			Err(ScanError::ScanInProgress(1))
		));

		// Other locations are independent
		let _other = locks.try_acquire(library, 2).unwrap();

		drop(guard);
		assert!(locks.try_acquire(library, 1).is_ok());
	}

	#[tokio::test(start_paused = true)]
	async fn waiting_acquire_times_out_as_busy() {
		let locks = LocationLocks::default();
		let library = Uuid::new_v4();

		let _guard = locks.try_acquire(library, 7).unwrap();
		assert!(matches!(
			locks
				.acquire_timeout(library, 7, Duration::from_millis(100))
				.await,
			Err(ScanError::Busy(7))
		));
	}

	#[tokio::test]
	async fn cancellation_reaches_holder_and_resets_for_the_next_one() {
		let locks = LocationLocks::default();
		let library = Uuid::new_v4();

		let guard = locks.try_acquire(library, 3).unwrap();
		assert_eq!(locks.cancel_library(library), vec![3]);
		assert!(guard.is_cancelled());
		drop(guard);

		let next = locks
			.acquire_timeout(library, 3, Duration::from_millis(100))
			.await
			.unwrap();
		assert!(!next.is_cancelled());
	}

	#[tokio::test]
	async fn reservation_rejects_others_until_dropped() {
		let locks = LocationLocks::default();
		let library = Uuid::new_v4();

		let reservation = locks.reserve(library, 4).unwrap();
		assert_eq!(reservation.location_id(), 4);
		assert!(matches!(
			locks.reserve(library, 4),
			Err(ScanError::ScanInProgress(4))
		));
		assert!(matches!(
			locks.try_acquire(library, 4),
			Err(ScanError::ScanInProgress(4))
		));

		drop(reservation);
		assert!(locks.reserve(library, 4).is_ok());
	}

	#[tokio::test]
	async fn reservation_becomes_a_hold_when_acquired() {
		let locks = LocationLocks::default();
		let library = Uuid::new_v4();

		let guard = locks.reserve(library, 5).unwrap().acquire().await.unwrap();
		assert_eq!(guard.location_id(), 5);
		assert!(matches!(
			locks.reserve(library, 5),
			Err(ScanError::ScanInProgress(5))
		));

		drop(guard);
		assert!(locks.try_acquire(library, 5).is_ok());
	}

	#[tokio::test(start_paused = true)]
	async fn queued_scan_does_not_block_a_deletion() {
		let locks = LocationLocks::default();
		let library = Uuid::new_v4();

		let reservation = locks.reserve(library, 6).unwrap();

		locks.cancel(library, 6);
		let deleting = locks
			.acquire_timeout(library, 6, Duration::from_millis(100))
			.await
			.unwrap();
		assert!(!deleting.is_cancelled());

		assert!(reservation.is_cancelled());
		assert!(reservation.acquire().await.is_none());
	}

	#[tokio::test]
	async fn cancelling_a_library_includes_queued_scans() {
		let locks = LocationLocks::default();
		let library = Uuid::new_v4();

		let held = locks.try_acquire(library, 1).unwrap();
		let queued = locks.reserve(library, 2).unwrap();
		drop(locks.try_acquire(library, 3).unwrap());

		assert_eq!(locks.cancel_library(library), vec![1, 2]);
		assert!(held.is_cancelled());
		assert!(queued.is_cancelled());
		assert!(locks.cancel_library(Uuid::new_v4()).is_empty());
	}
}
