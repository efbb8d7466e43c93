//! Full and quick scans against a real directory tree

mod helpers;

use helpers::{setup, wait_for_scan_end, write_file};
use pretty_assertions::assert_eq;
use sd_index::{
	infra::{
		api::{ClientCommand, ClientQuery, CommandOutput, ErrorKind, QueryOutput},
		db::entities::{file, location::ScanState},
		event::Event,
	},
	ops::indexing::QuickScanOutcome,
};
use std::collections::HashSet;

async fn files_of(test: &helpers::TestCore, location_id: i32) -> Vec<file::Model> {
	match test
		.core
		.query(None, ClientQuery::FilesByLocation { location_id })
		.await
		.unwrap()
	{
		QueryOutput::Files(files) => files,
		other => panic!("unexpected output: {other:?}"),
	}
}

#[tokio::test]
async fn rescanning_an_unchanged_tree_changes_nothing() {
	let test = setup().await;
	let root = test.populate(
		"photos",
		&[("a.jpg", 10), ("b.JPG", 20), ("nested/c.png", 30), (".hidden", 5)],
	);

	let location = test.add_scanned_location(&root).await;
	let before = files_of(&test, location.id).await;
	assert_eq!(before.len(), 4);

	let counts = match test.full_scan(location.id).await {
		Event::ScanCompleted {
			files_found,
			files_updated,
			files_removed,
			..
		} => (files_found, files_updated, files_removed),
		other => panic!("unexpected event: {other:?}"),
	};
	assert_eq!(counts, (4, 0, 0));

	let after = files_of(&test, location.id).await;
	assert_eq!(before, after);

	let jpg = after.iter().find(|f| f.name == "b").unwrap();
	assert_eq!(jpg.extension.as_deref(), Some("jpg"));
	let hidden = after.iter().find(|f| f.name == ".hidden").unwrap();
	assert_eq!(hidden.extension, None);

	test.core.shutdown().await;
}

#[tokio::test]
async fn full_scan_picks_up_changes_and_removals() {
	let test = setup().await;
	let root = test.populate("docs", &[("keep.txt", 10), ("grow.txt", 10), ("gone.txt", 10)]);
	let location = test.add_scanned_location(&root).await;

	std::fs::remove_file(root.join("gone.txt")).unwrap();
	write_file(&root.join("grow.txt"), 500);
	write_file(&root.join("new/fresh.txt"), 7);

	test.full_scan(location.id).await;

	let files = files_of(&test, location.id).await;
	let mut paths = files
		.iter()
		.map(|f| f.relative_path.as_str())
		.collect::<Vec<_>>();
	paths.sort_unstable();
	assert_eq!(paths, vec!["grow.txt", "keep.txt", "new/fresh.txt"]);
	assert_eq!(
		files.iter().find(|f| f.name == "grow").unwrap().size_bytes,
		500
	);

	test.core.shutdown().await;
}

#[tokio::test]
async fn quick_scan_removes_records_of_vanished_files() {
	let test = setup().await;
	let root = test.populate("music", &[("song.mp3", 100), ("other.mp3", 50)]);
	let location = test.add_scanned_location(&root).await;

	let song = files_of(&test, location.id)
		.await
		.into_iter()
		.find(|f| f.name == "song")
		.unwrap();

	let output = test
		.run(ClientCommand::FileScanQuick { file_id: song.id })
		.await
		.unwrap();
	assert!(matches!(
		output,
		CommandOutput::FileScan(QuickScanOutcome::Unchanged)
	));

	std::fs::remove_file(root.join("song.mp3")).unwrap();

	let output = test
		.run(ClientCommand::FileScanQuick { file_id: song.id })
		.await
		.unwrap();
	assert!(matches!(
		output,
		CommandOutput::FileScan(QuickScanOutcome::Removed)
	));
	assert_eq!(files_of(&test, location.id).await.len(), 1);

	let err = test
		.run(ClientCommand::FileScanQuick { file_id: song.id })
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::NotFound);

	test.core.shutdown().await;
}

#[tokio::test]
async fn a_busy_location_rejects_scans_while_others_proceed() {
	let test = setup().await;
	let first = test.add_scanned_location(&test.populate("one", &[("a", 1)])).await;
	let second = test.add_scanned_location(&test.populate("two", &[("b", 1)])).await;
	let library = test.core.libraries.resolve(None).await.unwrap();

	let guard = test.core.locks.try_acquire(library.id(), first.id).unwrap();

	let err = test
		.run(ClientCommand::LocScanFull {
			location_id: first.id,
		})
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::ScanInProgress);

	let event = test.full_scan(second.id).await;
	assert!(matches!(event, Event::ScanCompleted { .. }));

	drop(guard);
	let event = test.full_scan(first.id).await;
	assert!(matches!(event, Event::ScanCompleted { .. }));

	test.core.shutdown().await;
}

#[tokio::test]
async fn cancelled_scans_leave_a_consistent_index() {
	let test = setup().await;
	let files = (0..200)
		.map(|i| (format!("dir{}/file{i}.bin", i % 7), 16 + i))
		.collect::<Vec<_>>();
	let borrowed = files
		.iter()
		.map(|(path, size)| (path.as_str(), *size))
		.collect::<Vec<_>>();
	let root = test.populate("bulk", &borrowed);

	let library = test.core.libraries.resolve(None).await.unwrap();
	let location = test
		.core
		.locations
		.add_location(&library, &root, None)
		.await
		.unwrap();

	let mut rx = test.core.events.subscribe();
	test.run(ClientCommand::LocScanFull {
		location_id: location.id,
	})
	.await
	.unwrap();
	test.core.locks.cancel(library.id(), location.id);

	let ended = wait_for_scan_end(&mut rx, location.id).await;
	assert!(matches!(
		ended,
		Event::ScanCancelled { .. } | Event::ScanCompleted { .. }
	));

	// Whatever got written is real and unique
	let indexed = files_of(&test, location.id).await;
	let unique = indexed
		.iter()
		.map(|f| f.relative_path.clone())
		.collect::<HashSet<_>>();
	assert_eq!(unique.len(), indexed.len());
	for file in &indexed {
		assert!(root.join(&file.relative_path).is_file());
	}

	let stored = match test
		.core
		.query(
			None,
			ClientQuery::LocationsGet {
				location_id: location.id,
			},
		)
		.await
		.unwrap()
	{
		QueryOutput::Location(location) => location,
		other => panic!("unexpected output: {other:?}"),
	};
	assert_ne!(stored.scan_state(), ScanState::Scanning);

	// The next scan finishes the job
	test.full_scan(location.id).await;
	assert_eq!(files_of(&test, location.id).await.len(), 200);

	test.core.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn symlinks_are_not_followed() {
	let test = setup().await;
	let outside = test.populate("outside", &[("secret.txt", 10)]);
	let root = test.populate("linked", &[("real.txt", 10)]);

	std::os::unix::fs::symlink(&outside, root.join("to_outside")).unwrap();
	std::os::unix::fs::symlink(&root, root.join("loop")).unwrap();
	std::os::unix::fs::symlink(outside.join("secret.txt"), root.join("file_link")).unwrap();

	let location = test.add_scanned_location(&root).await;

	let paths = files_of(&test, location.id)
		.await
		.into_iter()
		.map(|f| f.relative_path)
		.collect::<Vec<_>>();
	assert_eq!(paths, vec!["real.txt".to_string()]);

	test.core.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_directories_warn_and_keep_their_records() {
	use std::os::unix::fs::PermissionsExt;

	let test = setup().await;
	let root = test.populate(
		"guarded",
		&[("open/a.txt", 1), ("locked/b.txt", 2), ("locked/c.txt", 3)],
	);
	let location = test.add_scanned_location(&root).await;
	assert_eq!(files_of(&test, location.id).await.len(), 3);

	let locked = root.join("locked");
	std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

	// Permission bits don't stop root
	if std::fs::read_dir(&locked).is_ok() {
		std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
		test.core.shutdown().await;
		return;
	}

	let event = test.full_scan(location.id).await;
	std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

	match event {
		Event::ScanCompleted {
			warnings,
			files_removed,
			..
		} => {
			assert!(warnings > 0);
			assert_eq!(files_removed, 0);
		}
		other => panic!("unexpected scan end: {other:?}"),
	}

	let paths = files_of(&test, location.id)
		.await
		.into_iter()
		.map(|f| f.relative_path)
		.collect::<HashSet<_>>();
	assert!(paths.contains("locked/b.txt"));
	assert!(paths.contains("locked/c.txt"));
	assert!(paths.contains("open/a.txt"));

	test.core.shutdown().await;
}
