//! Bounded pool of scan workers
//!
//! Scans are queued with the location already reserved, so a request for a
//! location that is being scanned (or waiting to be) is rejected up front. The
//! location itself is only taken once a worker picks the scan up, a scan that
//! got cancelled in the meantime is dropped without touching the index.

use super::{error::ScanError, locks::ScanReservation, scanner::Scanner};
use crate::{
	infra::event::{Event, EventBus},
	library::Library,
};

use async_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

struct ScanJob {
	library: Arc<Library>,
	reservation: ScanReservation,
}

pub struct ScanPool {
	sender: Sender<ScanJob>,
	workers: Mutex<Vec<JoinHandle<()>>>,
	events: EventBus,
}

impl ScanPool {
	pub fn start(scanner: Arc<Scanner>, workers: usize, capacity: usize, events: EventBus) -> Self {
		let (sender, receiver) = async_channel::bounded(capacity.max(1));

		let handles = (0..workers.max(1))
			.map(|worker_id| {
				tokio::spawn(worker(
					worker_id,
					Arc::clone(&scanner),
					receiver.clone(),
					events.clone(),
				))
			})
			.collect();

		debug!(workers, capacity, "Started scan workers");

		Self {
			sender,
			workers: Mutex::new(handles),
			events,
		}
	}

	/// Queue a full scan, returning as soon as it is accepted
	pub fn enqueue(
		&self,
		library: Arc<Library>,
		reservation: ScanReservation,
	) -> Result<(), ScanError> {
		let library_id = library.id();
		let location_id = reservation.location_id();

		match self.sender.try_send(ScanJob {
			library,
			reservation,
		}) {
			Ok(()) => {
				self.events.emit(Event::ScanQueued {
					library_id,
					location_id,
				});
				Ok(())
			}
			Err(TrySendError::Full(_)) => Err(ScanError::QueueFull),
			Err(TrySendError::Closed(_)) => Err(ScanError::PoolClosed),
		}
	}

	/// Scans waiting for a worker
	pub fn pending(&self) -> usize {
		self.sender.len()
	}

	/// Stop accepting scans and wait for the workers to drain the queue
	pub async fn shutdown(&self) {
		self.sender.close();

		let handles = std::mem::take(&mut *self.workers.lock());
		for handle in handles {
			if let Err(e) = handle.await {
				warn!(?e, "Scan worker panicked");
			}
		}
	}
}

async fn worker(
	worker_id: usize,
	scanner: Arc<Scanner>,
	receiver: Receiver<ScanJob>,
	events: EventBus,
) {
	while let Ok(ScanJob {
		library,
		reservation,
	}) = receiver.recv().await
	{
		let location_id = reservation.location_id();
		trace!(worker_id, location_id, "Picked up scan");

		let guard = if library.is_closed() {
			None
		} else {
			reservation.acquire().await
		};

		let Some(guard) = guard else {
			debug!(worker_id, location_id, "Dropped scan cancelled while queued");
			events.emit(Event::ScanCancelled {
				library_id: library.id(),
				location_id,
			});
			continue;
		};

		// Failures are reported through events and the location's scan state
		let _ = scanner.scan_full(&library, location_id, guard).await;
	}

	trace!(worker_id, "Scan worker exiting");
}

impl std::fmt::Debug for ScanPool {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ScanPool")
			.field("pending", &self.pending())
			.finish_non_exhaustive()
	}
}
