//! Tracing setup
//!
//! Logs go to the console (stderr, stdout carries bridge responses) and to a
//! daily rotating file under `<data_dir>/logs`.
//! `RUST_LOG` takes precedence over the configured level.

use std::path::Path;
use tracing_appender::{
	non_blocking::WorkerGuard,
	rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "sd-index.log";

/// Install the global subscriber. Keep the returned guard alive for as long as
/// file logging is needed, dropping it flushes and stops the writer thread.
pub fn init_logging(
	logs_dir: &Path,
	level: &str,
	console: bool,
) -> Result<WorkerGuard, Box<dyn std::error::Error + Send + Sync>> {
	std::fs::create_dir_all(logs_dir)?;

	let file_appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, LOG_FILE_PREFIX);
	let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

	let default_filter = format!("sd_index={level}");

	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
		.with(console.then(|| {
			fmt::layer()
				.with_target(true)
				.with_thread_ids(true)
				.with_writer(std::io::stderr)
		}))
		.with(
			fmt::layer()
				.with_target(true)
				.with_thread_ids(true)
				.with_ansi(false)
				.with_writer(file_writer),
		)
		.try_init()?;

	Ok(guard)
}
