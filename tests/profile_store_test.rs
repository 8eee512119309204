use atlsync::policy::BackupMode;
use atlsync::profile::ProfileStore;
use atlsync::types::{Loader, Server};
use std::fs;
use tempfile::TempDir;
use uuid::Uuid;

fn make_server(root: &std::path::Path) -> Server {
	Server {
		id: Uuid::new_v4(),
		name: "Integration Server".to_string(),
		root: root.to_path_buf(),
		mc_version: "1.21.1".to_string(),
		loader: Loader::Paper,
		loader_version: None,
	}
}

#[test]
fn save_restore_round_trip_preserves_file_contents() {
	let atlsync_dir = TempDir::new().unwrap();
	let server_root = TempDir::new().unwrap();
	fs::write(server_root.path().join("server.properties"), b"motd=hello world").unwrap();
	fs::write(server_root.path().join("eula.txt"), b"eula=true").unwrap();
	fs::create_dir_all(server_root.path().join("config")).unwrap();
	fs::write(server_root.path().join("config/paper-global.yml"), b"settings: {}").unwrap();

	let store = ProfileStore::new(atlsync_dir.path());
	let server = make_server(server_root.path());

	let profile = store.save(&server, "pre-update", Some("before 1.21.1 bump".to_string()), BackupMode::Normal).unwrap();
	assert_eq!(profile.contents.total_file_count, 3);

	fs::write(server_root.path().join("server.properties"), b"motd=corrupted").unwrap();
	fs::remove_file(server_root.path().join("eula.txt")).unwrap();

	store.restore(&server, profile.id).unwrap();

	let restored_motd = fs::read_to_string(server_root.path().join("server.properties")).unwrap();
	assert_eq!(restored_motd, "motd=hello world");
	assert!(server_root.path().join("eula.txt").exists());
}

#[test]
fn diff_reports_round_trip_invariant() {
	let atlsync_dir = TempDir::new().unwrap();
	let server_root = TempDir::new().unwrap();
	fs::write(server_root.path().join("server.properties"), b"motd=hi").unwrap();
	fs::create_dir_all(server_root.path().join("mods")).unwrap();
	fs::write(server_root.path().join("mods/fancymenu.jar"), b"jarbytes").unwrap();

	let store = ProfileStore::new(atlsync_dir.path());
	let server = make_server(server_root.path());
	store.save(&server, "v1", None, BackupMode::NormalPlusMods).unwrap();

	let result = atlsync::change_detector::detect_changes(&store, &server).unwrap();
	assert!(!result.has_changes, "a save immediately followed by a diff must report no changes");
	assert_eq!(result.total_changes(), 0);
}

#[test]
fn listing_multiple_profiles_preserves_insertion_order() {
	let atlsync_dir = TempDir::new().unwrap();
	let server_root = TempDir::new().unwrap();
	fs::write(server_root.path().join("server.properties"), b"x").unwrap();

	let store = ProfileStore::new(atlsync_dir.path());
	let server = make_server(server_root.path());

	let first = store.save(&server, "v1", None, BackupMode::Normal).unwrap();
	let second = store.save(&server, "v2", None, BackupMode::Normal).unwrap();
	let third = store.save(&server, "v3", None, BackupMode::Normal).unwrap();

	let listed = store.list(&server).unwrap();
	assert_eq!(listed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![first.id, second.id, third.id]);
	assert_eq!(store.active(&server).unwrap().unwrap().id, third.id);
}

#[test]
fn deleting_a_profile_leaves_its_archive_removed_on_disk() {
	let atlsync_dir = TempDir::new().unwrap();
	let server_root = TempDir::new().unwrap();
	fs::write(server_root.path().join("server.properties"), b"x").unwrap();

	let store = ProfileStore::new(atlsync_dir.path());
	let server = make_server(server_root.path());
	let profile = store.save(&server, "v1", None, BackupMode::Normal).unwrap();
	let archive_path = store.server_profile_dir(&server).join(&profile.archive_filename);
	assert!(archive_path.exists());

	store.delete(&server, profile.id).unwrap();
	assert!(!archive_path.exists());
}
