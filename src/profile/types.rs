//! Persisted data model for the Profile Store: a snapshot descriptor and the
//! per-server index that lists them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::policy::BackupMode;

/// Counts and presence flags captured alongside a profile's checksums, used
/// to answer "does this profile have mods?" without re-reading the archive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileContents {
	pub has_server_properties: bool,
	pub has_mods: bool,
	pub has_plugins: bool,
	pub has_world: bool,
	pub mod_count: usize,
	pub plugin_count: usize,
	pub total_file_count: usize,
}

/// An immutable snapshot descriptor. Once persisted, `id`, `created_at`,
/// `file_checksums`, and `archive_hash` are frozen — a profile is never
/// mutated in place, only replaced by a new `save`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProfile {
	pub id: Uuid,
	pub name: String,
	pub description: Option<String>,
	pub created_at: DateTime<Utc>,
	pub backup_mode: BackupMode,
	pub archive_filename: String,
	pub archive_size_bytes: u64,
	pub archive_hash: String,
	pub file_checksums: BTreeMap<String, String>,
	pub contents: ProfileContents,
}

/// One per server, persisted as `profiles.json` under a per-server
/// safe-name directory. Mutated only by [`super::store::ProfileStore`]
/// operations and rewritten atomically on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProfileIndex {
	pub server_safe_name: String,
	pub profiles: Vec<ServerProfile>,
	pub active_profile_id: Option<Uuid>,
	pub version: u32,
}

impl ServerProfileIndex {
	pub fn new(server_safe_name: String) -> Self {
		ServerProfileIndex {
			server_safe_name,
			profiles: Vec::new(),
			active_profile_id: None,
			version: 1,
		}
	}

	pub fn find_by_id(&self, id: Uuid) -> Option<&ServerProfile> {
		self.profiles.iter().find(|p| p.id == id)
	}

	pub fn find_by_name_ci(&self, name: &str) -> Option<&ServerProfile> {
		self.profiles.iter().find(|p| p.name.eq_ignore_ascii_case(name))
	}

	pub fn active(&self) -> Option<&ServerProfile> {
		self.active_profile_id.and_then(|id| self.find_by_id(id))
	}
}
