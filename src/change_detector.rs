//! Change Detector (C5): compares the current on-disk tree to the active
//! profile's checksum set. Consulted by the orchestrator's caller as a
//! pre-flight advisory, never by the orchestrator itself.

use std::collections::BTreeSet;
use walkdir::WalkDir;

use crate::archive;
use crate::error::ProfileStoreError;
use crate::hash::sha256_file;
use crate::policy;
use crate::profile::ProfileStore;
use crate::types::{ChangeDetectionResult, Server};

/// Full comparison: enumerates every currently-included path and every
/// previously-checksummed path to report added/modified/deleted sets.
///
/// Iterates in the same stable order `archive::enumerate_included` uses, so
/// a `save` immediately followed by `detect_changes` reports no differences.
pub fn detect_changes(
	store: &ProfileStore,
	server: &Server,
) -> Result<ChangeDetectionResult, ProfileStoreError> {
	let Some(profile) = store.active(server)? else {
		return Ok(ChangeDetectionResult::untracked());
	};

	let mode = profile.backup_mode;
	let current = archive::enumerate_included(&server.root, mode)?;

	let mut added = Vec::new();
	let mut modified = Vec::new();
	let mut seen = BTreeSet::new();
	for rel in &current {
		seen.insert(rel.clone());
		let digest = sha256_file(&server.root.join(rel))?;
		match profile.file_checksums.get(rel) {
			None => added.push(rel.clone()),
			Some(saved) if saved != &digest => modified.push(rel.clone()),
			_ => {}
		}
	}

	let mut deleted: Vec<String> =
		profile.file_checksums.keys().filter(|p| !seen.contains(p.as_str())).cloned().collect();
	deleted.sort();

	let has_changes = !added.is_empty() || !modified.is_empty() || !deleted.is_empty();
	Ok(ChangeDetectionResult {
		added_files: added,
		modified_files: modified,
		deleted_files: deleted,
		compared_to_profile_id: Some(profile.id),
		compared_to_profile_name: Some(profile.name),
		has_changes,
	})
}

/// Short-circuiting probe: true as soon as the first added/modified file is
/// found while walking, or (failing that) as soon as any previously-saved
/// path is missing from the walk. Treats "no active profile" as "has
/// changes" — a conservative gate used ahead of destructive sync.
pub fn has_unsaved_changes(store: &ProfileStore, server: &Server) -> Result<bool, ProfileStoreError> {
	let Some(profile) = store.active(server)? else {
		return Ok(true);
	};
	let mode = profile.backup_mode;

	let mut seen = BTreeSet::new();
	// Prune directories `may_contain_included` rules out for `mode` so the
	// probe stays fast even when a large `world/` tree sits outside the
	// active profile's mode (spec.md §4.5).
	let walker = WalkDir::new(&server.root)
		.sort_by_file_name()
		.into_iter()
		.filter_entry(|e| {
			if !e.file_type().is_dir() {
				return true;
			}
			let rel = e.path().strip_prefix(&server.root).unwrap_or(e.path()).to_string_lossy().replace('\\', "/");
			policy::may_contain_included(&rel, mode)
		});
	for entry in walker {
		let entry = entry.map_err(|e| {
			ProfileStoreError::Io(
				e.into_io_error()
					.unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk error")),
			)
		})?;
		if !entry.file_type().is_file() {
			continue;
		}
		let rel = entry
			.path()
			.strip_prefix(&server.root)
			.unwrap_or(entry.path())
			.to_string_lossy()
			.replace('\\', "/");
		if !policy::included(&rel, mode) {
			continue;
		}
		let digest = sha256_file(entry.path())?;
		match profile.file_checksums.get(&rel) {
			None => return Ok(true),
			Some(saved) if saved != &digest => return Ok(true),
			_ => {}
		}
		seen.insert(rel);
	}

	if profile.file_checksums.keys().any(|p| !seen.contains(p.as_str())) {
		return Ok(true);
	}
	Ok(false)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::policy::BackupMode;
	use crate::types::Loader;
	use filetime::{set_file_mtime, FileTime};
	use std::fs;
	use tempfile::TempDir;
	use uuid::Uuid;

	fn make_server(root: &std::path::Path) -> Server {
		Server {
			id: Uuid::new_v4(),
			name: "Test Server".to_string(),
			root: root.to_path_buf(),
			mc_version: "1.21.1".to_string(),
			loader: Loader::Vanilla,
			loader_version: None,
		}
	}

	#[test]
	fn fresh_save_reports_no_changes() {
		let atlsync_dir = TempDir::new().unwrap();
		let server_root = TempDir::new().unwrap();
		fs::write(server_root.path().join("server.properties"), b"motd=hi").unwrap();

		let store = ProfileStore::new(atlsync_dir.path());
		let server = make_server(server_root.path());
		store.save(&server, "v1", None, BackupMode::Normal).unwrap();

		let result = detect_changes(&store, &server).unwrap();
		assert!(!result.has_changes);
		assert_eq!(result.total_changes(), 0);
		assert!(!has_unsaved_changes(&store, &server).unwrap());
	}

	#[test]
	fn no_active_profile_is_untracked() {
		let atlsync_dir = TempDir::new().unwrap();
		let server_root = TempDir::new().unwrap();
		let store = ProfileStore::new(atlsync_dir.path());
		let server = make_server(server_root.path());

		let result = detect_changes(&store, &server).unwrap();
		assert!(result.has_changes);
		assert!(result.compared_to_profile_id.is_none());
		assert!(has_unsaved_changes(&store, &server).unwrap());
	}

	#[test]
	fn added_file_is_detected() {
		let atlsync_dir = TempDir::new().unwrap();
		let server_root = TempDir::new().unwrap();
		fs::write(server_root.path().join("server.properties"), b"motd=hi").unwrap();
		fs::create_dir_all(server_root.path().join("mods")).unwrap();
		fs::write(server_root.path().join("mods/a.jar"), b"jar").unwrap();

		let store = ProfileStore::new(atlsync_dir.path());
		let server = make_server(server_root.path());
		store.save(&server, "v1", None, BackupMode::NormalPlusMods).unwrap();

		fs::write(server_root.path().join("mods/b.jar"), b"extra").unwrap();

		let result = detect_changes(&store, &server).unwrap();
		assert_eq!(result.added_files, vec!["mods/b.jar".to_string()]);
		assert!(result.modified_files.is_empty());
		assert!(result.deleted_files.is_empty());
		assert!(has_unsaved_changes(&store, &server).unwrap());
	}

	#[test]
	fn modified_byte_is_detected() {
		let atlsync_dir = TempDir::new().unwrap();
		let server_root = TempDir::new().unwrap();
		fs::write(server_root.path().join("server.properties"), b"motd=hi").unwrap();

		let store = ProfileStore::new(atlsync_dir.path());
		let server = make_server(server_root.path());
		store.save(&server, "v1", None, BackupMode::Normal).unwrap();

		fs::write(server_root.path().join("server.properties"), b"motd=bye").unwrap();

		let result = detect_changes(&store, &server).unwrap();
		assert_eq!(result.modified_files, vec!["server.properties".to_string()]);
		assert!(has_unsaved_changes(&store, &server).unwrap());
	}

	#[test]
	fn deleted_file_is_detected() {
		let atlsync_dir = TempDir::new().unwrap();
		let server_root = TempDir::new().unwrap();
		fs::write(server_root.path().join("server.properties"), b"motd=hi").unwrap();
		fs::write(server_root.path().join("eula.txt"), b"true").unwrap();

		let store = ProfileStore::new(atlsync_dir.path());
		let server = make_server(server_root.path());
		store.save(&server, "v1", None, BackupMode::Normal).unwrap();

		fs::remove_file(server_root.path().join("eula.txt")).unwrap();

		let result = detect_changes(&store, &server).unwrap();
		assert_eq!(result.deleted_files, vec!["eula.txt".to_string()]);
		assert!(has_unsaved_changes(&store, &server).unwrap());
	}

	/// Detection is content-hash-based, not mtime-based: touching a file's
	/// modification time without altering its bytes must not register as a
	/// change.
	#[test]
	fn touching_mtime_without_changing_content_reports_no_changes() {
		let atlsync_dir = TempDir::new().unwrap();
		let server_root = TempDir::new().unwrap();
		let properties_path = server_root.path().join("server.properties");
		fs::write(&properties_path, b"motd=hi").unwrap();

		let store = ProfileStore::new(atlsync_dir.path());
		let server = make_server(server_root.path());
		store.save(&server, "v1", None, BackupMode::Normal).unwrap();

		let far_future = FileTime::from_unix_time(4_102_444_800, 0);
		set_file_mtime(&properties_path, far_future).unwrap();

		let result = detect_changes(&store, &server).unwrap();
		assert!(!result.has_changes, "mtime-only change must not be reported: {result:?}");
		assert!(!has_unsaved_changes(&store, &server).unwrap());
	}

	#[test]
	fn fast_path_agrees_with_full_detection() {
		let atlsync_dir = TempDir::new().unwrap();
		let server_root = TempDir::new().unwrap();
		fs::write(server_root.path().join("server.properties"), b"motd=hi").unwrap();

		let store = ProfileStore::new(atlsync_dir.path());
		let server = make_server(server_root.path());
		store.save(&server, "v1", None, BackupMode::Normal).unwrap();

		for mutate in [false, true] {
			if mutate {
				fs::write(server_root.path().join("server.properties"), b"motd=changed").unwrap();
			}
			let full = detect_changes(&store, &server).unwrap();
			let fast = has_unsaved_changes(&store, &server).unwrap();
			assert_eq!(fast, full.total_changes() > 0);
		}
	}

	/// An unreadable `world/` directory proves the fast probe never descends
	/// into it under `Normal` mode — the old unfiltered walk would surface
	/// the permission error and fail the whole probe.
	#[cfg(unix)]
	#[test]
	fn has_unsaved_changes_prunes_unreadable_world_directory_under_normal_mode() {
		use std::os::unix::fs::PermissionsExt;

		let atlsync_dir = TempDir::new().unwrap();
		let server_root = TempDir::new().unwrap();
		fs::write(server_root.path().join("server.properties"), b"motd=hi").unwrap();
		fs::create_dir_all(server_root.path().join("world/region")).unwrap();
		fs::write(server_root.path().join("world/region/r.0.0.mca"), b"world-bytes").unwrap();

		let store = ProfileStore::new(atlsync_dir.path());
		let server = make_server(server_root.path());
		store.save(&server, "v1", None, BackupMode::Normal).unwrap();

		let world_dir = server_root.path().join("world");
		fs::set_permissions(&world_dir, fs::Permissions::from_mode(0o000)).unwrap();

		if fs::read_dir(&world_dir).is_ok() {
			fs::set_permissions(&world_dir, fs::Permissions::from_mode(0o755)).unwrap();
			return;
		}

		let result = has_unsaved_changes(&store, &server);

		fs::set_permissions(&world_dir, fs::Permissions::from_mode(0o755)).unwrap();

		assert!(!result.unwrap(), "world/ should never have been descended into under Normal mode");
	}
}
