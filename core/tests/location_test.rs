//! Location lifecycle: registration, deletion and liveness

mod helpers;

use helpers::{setup, setup_with, wait_for_scan_end};
use pretty_assertions::assert_eq;
use sd_index::infra::{
	api::{ClientCommand, ClientQuery, CommandOutput, ErrorKind, QueryOutput},
	db::entities::location::ScanState,
	event::Event,
};

async fn locations(test: &helpers::TestCore) -> Vec<sd_index::infra::db::entities::location::Model> {
	match test.core.query(None, ClientQuery::LocationsList).await.unwrap() {
		QueryOutput::Locations(locations) => locations,
		other => panic!("unexpected output: {other:?}"),
	}
}

#[tokio::test]
async fn new_locations_are_scanned_and_counted() {
	let test = setup().await;
	let root = test.populate("camera", &[("a.raw", 40), ("b.raw", 60)]);

	let location = test.add_scanned_location(&root).await;
	assert_eq!(location.name, "camera");
	assert_eq!(location.path, root.to_str().unwrap());
	assert!(location.volume_fingerprint.is_some());

	let stored = locations(&test).await.remove(0);
	assert_eq!(stored.scan_state(), ScanState::Completed);
	assert_eq!(stored.total_file_count, 2);
	assert_eq!(stored.total_byte_size, 100);
	assert!(stored.last_scan_at.is_some());

	test.core.shutdown().await;
}

#[tokio::test]
async fn registering_invalid_paths_fails() {
	let test = setup().await;
	let root = test.populate("dup", &[("file.txt", 1)]);
	test.add_scanned_location(&root).await;

	let err = test
		.run(ClientCommand::LocCreate {
			path: root.clone(),
			name: None,
		})
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::AlreadyIndexed);

	let err = test
		.run(ClientCommand::LocCreate {
			path: test.files_root.join("missing"),
			name: None,
		})
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::NotFound);

	let err = test
		.run(ClientCommand::LocCreate {
			path: root.join("file.txt"),
			name: None,
		})
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::NotFound);

	test.core.shutdown().await;
}

#[tokio::test]
async fn deleting_a_location_keeps_files_on_disk() {
	let test = setup().await;
	let root = test.populate("keep", &[("one.txt", 10), ("sub/two.txt", 20)]);
	let location = test.add_scanned_location(&root).await;

	test.run(ClientCommand::LocDelete {
		location_id: location.id,
	})
	.await
	.unwrap();

	assert!(root.join("one.txt").is_file());
	assert!(root.join("sub/two.txt").is_file());
	assert!(locations(&test).await.is_empty());

	let err = test
		.core
		.query(
			None,
			ClientQuery::FilesByLocation {
				location_id: location.id,
			},
		)
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::NotFound);

	// The same directory can be registered again
	let output = test
		.run(ClientCommand::LocCreate {
			path: root.clone(),
			name: Some("again".to_string()),
		})
		.await
		.unwrap();
	assert!(matches!(output, CommandOutput::Location(l) if l.name == "again"));

	test.core.shutdown().await;
}

#[tokio::test]
async fn deleting_a_held_location_times_out_as_busy() {
	let test = setup().await;
	let location = test
		.add_scanned_location(&test.populate("held", &[("x", 1)]))
		.await;
	let library = test.core.libraries.resolve(None).await.unwrap();

	let guard = test
		.core
		.locks
		.try_acquire(library.id(), location.id)
		.unwrap();

	let err = test
		.run(ClientCommand::LocDelete {
			location_id: location.id,
		})
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::Busy);
	assert!(guard.is_cancelled());
	assert_eq!(locations(&test).await.len(), 1);

	test.core.shutdown().await;
}

#[tokio::test]
async fn deleting_locations_cancels_their_queued_and_running_scans() {
	// One worker, so the second scan has to wait behind the first
	let test = setup_with(|config| {
		config.scanner.workers = 1;
		config.scanner.lock_timeout_ms = 5_000;
	})
	.await;
	let small_root = test.populate("small", &[("a.txt", 1), ("b.txt", 1)]);
	let small = test.add_scanned_location(&small_root).await;
	let big_root = test.populate_many("big", 3_000);

	let mut big_events = test.core.events.subscribe();
	let mut small_events = test.core.events.subscribe();
	let big = test.add_location(&big_root).await;
	test.run(ClientCommand::LocScanFull {
		location_id: small.id,
	})
	.await
	.unwrap();

	// Queued behind the big initial scan, the deletion doesn't wait for it
	test.run(ClientCommand::LocDelete {
		location_id: small.id,
	})
	.await
	.unwrap();

	// Running (or about to), the deletion stops it first
	test.run(ClientCommand::LocDelete {
		location_id: big.id,
	})
	.await
	.unwrap();

	let ended = wait_for_scan_end(&mut big_events, big.id).await;
	assert!(matches!(ended, Event::ScanCancelled { .. }), "{ended:?}");
	let ended = wait_for_scan_end(&mut small_events, small.id).await;
	assert!(matches!(ended, Event::ScanCancelled { .. }), "{ended:?}");

	assert!(locations(&test).await.is_empty());
	assert!(small_root.join("a.txt").is_file());
	assert!(big_root.join("dir0/file0.txt").is_file());

	// The pool is free again for new work
	let again = test.add_scanned_location(&small_root).await;
	assert_eq!(locations(&test).await[0].id, again.id);
	assert_eq!(locations(&test).await[0].total_file_count, 2);

	test.core.shutdown().await;
}

#[tokio::test]
async fn vanished_roots_go_offline_on_refresh() {
	let test = setup().await;
	let root = test.populate("temp", &[("x", 1)]);
	let location = test.add_scanned_location(&root).await;
	let library = test.core.libraries.resolve(None).await.unwrap();

	std::fs::remove_dir_all(&root).unwrap();
	assert_eq!(
		test.core
			.locations
			.refresh_online_status(&library)
			.await
			.unwrap(),
		1
	);
	assert!(!locations(&test).await[0].is_online);

	let err = test
		.run(ClientCommand::LocScanFull {
			location_id: location.id,
		})
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::LocationOffline);

	std::fs::create_dir_all(&root).unwrap();
	test.core
		.locations
		.refresh_online_status(&library)
		.await
		.unwrap();
	assert!(locations(&test).await[0].is_online);

	test.core.shutdown().await;
}
