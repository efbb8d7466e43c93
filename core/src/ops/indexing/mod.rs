//! Filesystem indexing
//!
//! Walks locations, hashes file contents and reconciles the results with the
//! content index. Scans run on a bounded worker pool, one at a time per location.

pub mod cas;
pub mod error;
pub mod locks;
pub mod pool;
pub mod scanner;
pub mod walker;

pub use error::{ScanError, ScanWarning};
pub use locks::{LocationGuard, LocationLocks, ScanReservation};
pub use pool::ScanPool;
pub use scanner::{QuickScanOutcome, ScanOutcome, ScanReport, Scanner};
