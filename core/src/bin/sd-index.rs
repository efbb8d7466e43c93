//! Line oriented bridge: one JSON request per stdin line, one JSON response per stdout line

use clap::Parser;
use sd_index::{config::AppConfig, infra::logging::init_logging, Core};
use std::{path::PathBuf, sync::Arc};
use tokio::{
	io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
	signal,
	sync::{broadcast::error::RecvError, mpsc},
	task::JoinSet,
};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "sd-index", about = "File indexing core over a JSON line bridge")]
struct Args {
	/// Path to the data directory
	#[arg(long, env = "SD_INDEX_DATA_DIR")]
	data_dir: Option<PathBuf>,

	/// Forward core events to stdout next to responses
	#[arg(long)]
	events: bool,

	/// Also log to stderr
	#[arg(long)]
	verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	let args = Args::parse();

	let data_dir = match args.data_dir {
		Some(dir) => dir,
		None => sd_index::config::default_data_dir()?,
	};

	let config = AppConfig::load_or_create(&data_dir)?;
	let _log_guard = init_logging(&config.logs_dir(), &config.log_level, args.verbose)?;

	let core = Arc::new(Core::new(&data_dir).await?);

	let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

	let writer = tokio::spawn(async move {
		let mut stdout = tokio::io::stdout();
		while let Some(line) = out_rx.recv().await {
			if stdout.write_all(line.as_bytes()).await.is_err()
				|| stdout.write_all(b"\n").await.is_err()
				|| stdout.flush().await.is_err()
			{
				break;
			}
		}
	});

	let forwarder = args.events.then(|| {
		let mut rx = core.events.subscribe();
		let out_tx = out_tx.clone();
		tokio::spawn(async move {
			loop {
				match rx.recv().await {
					Ok(event) => {
						let line = serde_json::json!({ "type": "event", "event": event });
						if out_tx.send(line.to_string()).is_err() {
							break;
						}
					}
					Err(RecvError::Lagged(skipped)) => {
						warn!(skipped, "Event forwarder lagged behind");
					}
					Err(RecvError::Closed) => break,
				}
			}
		})
	});

	// Requests in flight, answered before the core goes down
	let mut requests = JoinSet::new();

	let serve = {
		let core = Arc::clone(&core);
		let out_tx = out_tx.clone();
		let requests = &mut requests;
		async move {
			let mut lines = BufReader::new(tokio::io::stdin()).lines();
			loop {
				match lines.next_line().await {
					Ok(Some(line)) if line.trim().is_empty() => continue,
					Ok(Some(line)) => {
						while requests.try_join_next().is_some() {}

						let core = Arc::clone(&core);
						let out_tx = out_tx.clone();
						requests.spawn(async move {
							let response = core.handle_json(&line).await;
							let _ = out_tx.send(response);
						});
					}
					Ok(None) => {
						info!("Stdin closed");
						break;
					}
					Err(e) => {
						error!(?e, "Failed to read from stdin");
						break;
					}
				}
			}
		}
	};

	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!(?e, "Failed to install Ctrl+C handler");
			std::future::pending::<()>().await;
		}
	};

	tokio::select! {
		() = serve => {}
		() = ctrl_c => info!("Received Ctrl+C, shutting down gracefully..."),
	}

	let in_flight = requests.len();
	if in_flight > 0 {
		info!(in_flight, "Waiting for in-flight requests");
	}
	while let Some(res) = requests.join_next().await {
		if let Err(e) = res {
			error!(?e, "Request task failed");
		}
	}

	core.shutdown().await;

	// The bus outlives the core handle, so the forwarder never sees it close
	if let Some(forwarder) = forwarder {
		forwarder.abort();
	}
	drop(out_tx);
	let _ = writer.await;

	Ok(())
}
