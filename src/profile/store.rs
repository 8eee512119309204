//! Profile Store (C4): per-server on-disk index of snapshots, with CRUD and
//! integrity guarantees described in spec.md §4.4.

use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::archive;
use crate::error::ProfileStoreError;
use crate::hash::sha256_file;
use crate::policy::BackupMode;
use crate::profile::types::{ProfileContents, ServerProfile, ServerProfileIndex};
use crate::types::{sanitize, Server};

/// Root directory under which every server's profile index and archives
/// live: `<atlsync_dir>/profiles/<server-safe-name>/`.
pub struct ProfileStore {
	base_dir: PathBuf,
}

impl ProfileStore {
	pub fn new(atlsync_dir: impl Into<PathBuf>) -> Self {
		ProfileStore { base_dir: atlsync_dir.into().join("profiles") }
	}

	fn server_dir(&self, server: &Server) -> PathBuf {
		self.base_dir.join(server.safe_name())
	}

	fn index_path(&self, server: &Server) -> PathBuf {
		self.server_dir(server).join("profiles.json")
	}

	/// Loads the index for `server`, returning an empty index (not yet
	/// persisted) if none exists on disk — the index is created lazily on
	/// first save.
	fn load_index(&self, server: &Server) -> Result<ServerProfileIndex, ProfileStoreError> {
		let path = self.index_path(server);
		if !path.exists() {
			return Ok(ServerProfileIndex::new(server.safe_name()));
		}
		let contents = fs::read_to_string(&path)?;
		let index: ServerProfileIndex = serde_json::from_str(&contents)
			.map_err(|e| ProfileStoreError::IndexCorrupted(e.to_string()))?;
		if index.server_safe_name != server.safe_name() {
			return Err(ProfileStoreError::IndexCorrupted(format!(
				"index server name '{}' does not match expected '{}'",
				index.server_safe_name,
				server.safe_name()
			)));
		}
		Ok(index)
	}

	/// Rewrites the index atomically: write to a temp file in the same
	/// directory, then rename over the target. A crash between these two
	/// steps leaves the previous index intact.
	fn persist_index(
		&self,
		server: &Server,
		index: &ServerProfileIndex,
	) -> Result<(), ProfileStoreError> {
		let dir = self.server_dir(server);
		fs::create_dir_all(&dir)?;
		let final_path = self.index_path(server);
		let tmp_path = dir.join(format!(".profiles.json.{}.tmp", std::process::id()));
		let serialized = serde_json::to_string_pretty(index)
			.map_err(|e| ProfileStoreError::IndexCorrupted(e.to_string()))?;
		fs::write(&tmp_path, serialized)?;
		fs::rename(&tmp_path, &final_path)?;
		Ok(())
	}

	/// Lists profiles in insertion order.
	pub fn list(&self, server: &Server) -> Result<Vec<ServerProfile>, ProfileStoreError> {
		Ok(self.load_index(server)?.profiles)
	}

	/// Returns the active profile, if any.
	pub fn active(&self, server: &Server) -> Result<Option<ServerProfile>, ProfileStoreError> {
		Ok(self.load_index(server)?.active().cloned())
	}

	/// Saves a new snapshot of `server.root` under `mode`.
	///
	/// Sequence: walk tree → compute checksums + contents → create ZIP →
	/// stat + hash the ZIP → append to index → set active → persist index.
	/// If any step before the index append fails, no mutation is persisted.
	pub fn save(
		&self,
		server: &Server,
		name: &str,
		description: Option<String>,
		mode: BackupMode,
	) -> Result<ServerProfile, ProfileStoreError> {
		validate_name(name)?;

		let mut index = self.load_index(server)?;
		if index.find_by_name_ci(name).is_some() {
			return Err(ProfileStoreError::DuplicateName(name.to_string()));
		}

		let dir = self.server_dir(server);
		fs::create_dir_all(&dir)?;

		let included = archive::enumerate_included(&server.root, mode)?;
		let mut file_checksums = BTreeMap::new();
		let mut contents = ProfileContents::default();
		for rel in &included {
			let full = server.root.join(rel);
			let digest = sha256_file(&full)?;
			file_checksums.insert(rel.clone(), digest);
			contents.total_file_count += 1;
			if rel == "server.properties" {
				contents.has_server_properties = true;
			}
			if rel.starts_with("mods/") {
				contents.has_mods = true;
				contents.mod_count += 1;
			}
			if rel.starts_with("plugins/") {
				contents.has_plugins = true;
				contents.plugin_count += 1;
			}
			if rel.starts_with("world/") {
				contents.has_world = true;
			}
		}

		let epoch_millis = Utc::now().timestamp_millis();
		let archive_filename = format!("{}-{}.zip", sanitize(name), epoch_millis);
		let archive_path = dir.join(&archive_filename);
		archive::create_zip(&server.root, &archive_path, mode)?;

		let archive_size_bytes = fs::metadata(&archive_path)?.len();
		let archive_hash = sha256_file(&archive_path)?;

		let profile = ServerProfile {
			id: Uuid::new_v4(),
			name: name.to_string(),
			description,
			created_at: Utc::now(),
			backup_mode: mode,
			archive_filename,
			archive_size_bytes,
			archive_hash,
			file_checksums,
			contents,
		};

		index.profiles.push(profile.clone());
		index.active_profile_id = Some(profile.id);
		self.persist_index(server, &index)?;

		Ok(profile)
	}

	/// Extracts the profile's archive into `server.root`, then marks it
	/// active. Files outside the archive's set are left untouched (overlay
	/// semantics — see DESIGN.md's note on the Open Question).
	pub fn restore(&self, server: &Server, profile_id: Uuid) -> Result<(), ProfileStoreError> {
		let mut index = self.load_index(server)?;
		let profile =
			index.find_by_id(profile_id).cloned().ok_or(ProfileStoreError::NotFound(profile_id))?;

		let archive_path = self.server_dir(server).join(&profile.archive_filename);
		if !archive_path.exists() {
			return Err(ProfileStoreError::ArchiveMissing(archive_path));
		}

		fs::create_dir_all(&server.root)?;
		archive::extract(&archive_path, &server.root, profile.backup_mode)?;

		index.active_profile_id = Some(profile.id);
		self.persist_index(server, &index)?;
		Ok(())
	}

	/// Removes the archive (best-effort) and the index entry. Clears
	/// `active_profile_id` if it pointed at the removed profile.
	pub fn delete(&self, server: &Server, profile_id: Uuid) -> Result<(), ProfileStoreError> {
		let mut index = self.load_index(server)?;
		let position = index
			.profiles
			.iter()
			.position(|p| p.id == profile_id)
			.ok_or(ProfileStoreError::NotFound(profile_id))?;

		let profile = index.profiles.remove(position);
		let archive_path = self.server_dir(server).join(&profile.archive_filename);
		let _ = fs::remove_file(archive_path);

		if index.active_profile_id == Some(profile_id) {
			index.active_profile_id = None;
		}

		self.persist_index(server, &index)?;
		Ok(())
	}

	/// Resolves the on-disk path of a profile's directory (used by callers
	/// that need the archive path directly, e.g. the CLI's `profile list`).
	pub fn server_profile_dir(&self, server: &Server) -> PathBuf {
		self.server_dir(server)
	}
}

/// Name must be 1–100 chars.
fn validate_name(name: &str) -> Result<(), ProfileStoreError> {
	let len = name.chars().count();
	if len == 0 || len > 100 {
		return Err(ProfileStoreError::InvalidName(format!(
			"name must be 1-100 characters, got {}",
			len
		)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::Loader;
	use tempfile::TempDir;

	fn make_server(root: &Path) -> Server {
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
	fn save_then_list_round_trips() {
		let atlsync_dir = TempDir::new().unwrap();
		let server_root = TempDir::new().unwrap();
		fs::write(server_root.path().join("server.properties"), b"motd=hi").unwrap();
		fs::create_dir_all(server_root.path().join("mods")).unwrap();
		fs::write(server_root.path().join("mods/a.jar"), b"jarbytes").unwrap();

		let store = ProfileStore::new(atlsync_dir.path());
		let server = make_server(server_root.path());

		let profile =
			store.save(&server, "v1", None, BackupMode::NormalPlusMods).unwrap();
		assert_eq!(profile.contents.total_file_count, 2);
		assert!(profile.contents.has_mods);
		assert!(!profile.contents.has_world);

		let listed = store.list(&server).unwrap();
		assert_eq!(listed.len(), 1);
		assert_eq!(listed[0].id, profile.id);

		let active = store.active(&server).unwrap().unwrap();
		assert_eq!(active.id, profile.id);
	}

	#[test]
	fn duplicate_name_is_rejected_case_insensitively() {
		let atlsync_dir = TempDir::new().unwrap();
		let server_root = TempDir::new().unwrap();
		fs::write(server_root.path().join("server.properties"), b"x").unwrap();
		let store = ProfileStore::new(atlsync_dir.path());
		let server = make_server(server_root.path());

		store.save(&server, "v1", None, BackupMode::Normal).unwrap();
		let result = store.save(&server, "V1", None, BackupMode::Normal);
		assert!(matches!(result, Err(ProfileStoreError::DuplicateName(_))));
		assert_eq!(store.list(&server).unwrap().len(), 1);
	}

	#[test]
	fn restore_overlays_without_deleting_extra_files() {
		let atlsync_dir = TempDir::new().unwrap();
		let server_root = TempDir::new().unwrap();
		fs::write(server_root.path().join("server.properties"), b"motd=hi").unwrap();
		fs::create_dir_all(server_root.path().join("mods")).unwrap();
		fs::write(server_root.path().join("mods/a.jar"), b"jarbytes").unwrap();

		let store = ProfileStore::new(atlsync_dir.path());
		let server = make_server(server_root.path());
		let profile = store.save(&server, "v1", None, BackupMode::NormalPlusMods).unwrap();

		fs::write(server_root.path().join("mods/b.jar"), b"extra").unwrap();
		store.restore(&server, profile.id).unwrap();

		assert!(server_root.path().join("mods/a.jar").exists());
		assert!(server_root.path().join("mods/b.jar").exists());
		assert_eq!(store.active(&server).unwrap().unwrap().id, profile.id);
	}

	#[test]
	fn delete_clears_active_profile() {
		let atlsync_dir = TempDir::new().unwrap();
		let server_root = TempDir::new().unwrap();
		fs::write(server_root.path().join("server.properties"), b"x").unwrap();
		let store = ProfileStore::new(atlsync_dir.path());
		let server = make_server(server_root.path());

		let profile = store.save(&server, "v1", None, BackupMode::Normal).unwrap();
		store.delete(&server, profile.id).unwrap();

		assert!(store.active(&server).unwrap().is_none());
		assert!(store.list(&server).unwrap().is_empty());
	}

	#[test]
	fn restore_missing_archive_fails_without_touching_index() {
		let atlsync_dir = TempDir::new().unwrap();
		let server_root = TempDir::new().unwrap();
		fs::write(server_root.path().join("server.properties"), b"x").unwrap();
		let store = ProfileStore::new(atlsync_dir.path());
		let server = make_server(server_root.path());

		let profile = store.save(&server, "v1", None, BackupMode::Normal).unwrap();
		let archive_path = store.server_profile_dir(&server).join(&profile.archive_filename);
		fs::remove_file(&archive_path).unwrap();

		let result = store.restore(&server, profile.id);
		assert!(matches!(result, Err(ProfileStoreError::ArchiveMissing(_))));
		assert_eq!(store.active(&server).unwrap().unwrap().id, profile.id);
	}
}
