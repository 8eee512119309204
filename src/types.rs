//! Core data types shared across the Profile Engine and the Sync Orchestrator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The Minecraft modding platform a server runs, mapped to a container type
/// tag for the remote version manifest (`.atlauncher.env`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Loader {
	Vanilla,
	Forge,
	NeoForge,
	Fabric,
	Quilt,
	Paper,
	Purpur,
}

impl Loader {
	/// The `MC_TYPE` value written to the remote version manifest.
	pub fn container_type_tag(&self) -> &'static str {
		match self {
			Loader::Vanilla => "VANILLA",
			Loader::Forge => "FORGE",
			Loader::NeoForge => "NEOFORGE",
			Loader::Fabric => "FABRIC",
			Loader::Quilt => "QUILT",
			Loader::Paper => "PAPER",
			Loader::Purpur => "PURPUR",
		}
	}

	/// The loader-specific version env var name, if one applies.
	/// Vanilla, Paper, and Purpur carry no separate loader version.
	pub fn version_env_var(&self) -> Option<&'static str> {
		match self {
			Loader::Forge => Some("FORGE_VERSION"),
			Loader::NeoForge => Some("NEOFORGE_VERSION"),
			Loader::Fabric => Some("FABRIC_LOADER_VERSION"),
			Loader::Quilt => Some("QUILT_LOADER_VERSION"),
			Loader::Vanilla | Loader::Paper | Loader::Purpur => None,
		}
	}
}

/// The minimal shape of a server entity the core reads. The surrounding
/// application's full `Server` model (settings, UI state, etc.) is out of
/// scope; this is only the fields the Profile Engine and Sync Orchestrator
/// consume.
#[derive(Debug, Clone)]
pub struct Server {
	pub id: uuid::Uuid,
	pub name: String,
	pub root: PathBuf,
	pub mc_version: String,
	pub loader: Loader,
	pub loader_version: Option<String>,
}

impl Server {
	/// A filesystem-safe identifier derived from `name`, used as the profile
	/// index directory name. Non `[A-Za-z0-9_-]` characters are replaced with
	/// `_`, matching the sanitization rule used for archive filenames.
	pub fn safe_name(&self) -> String {
		sanitize(&self.name)
	}
}

/// Replaces any character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize(input: &str) -> String {
	input
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
		.collect()
}

/// The result of comparing the current tree to the active profile's
/// checksum set.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetectionResult {
	pub added_files: Vec<String>,
	pub modified_files: Vec<String>,
	pub deleted_files: Vec<String>,
	pub compared_to_profile_id: Option<uuid::Uuid>,
	pub compared_to_profile_name: Option<String>,
	pub has_changes: bool,
}

impl ChangeDetectionResult {
	/// The "no active profile to compare against" sentinel: conservative,
	/// reports `has_changes = true` ("untracked") without enumerating anything.
	pub fn untracked() -> Self {
		ChangeDetectionResult {
			added_files: Vec::new(),
			modified_files: Vec::new(),
			deleted_files: Vec::new(),
			compared_to_profile_id: None,
			compared_to_profile_name: None,
			has_changes: true,
		}
	}

	pub fn total_changes(&self) -> usize {
		self.added_files.len() + self.modified_files.len() + self.deleted_files.len()
	}
}

/// How the orchestrator authenticates to the remote host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
	Key,
	Password,
}

/// Whether a sync run also drives remote container lifecycle (`Commands`) or
/// is restricted to pushing files (`Transfer`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
	Commands,
	Transfer,
}

/// Connection and policy configuration for one `sync()` invocation. Owned by
/// the caller (CLI or surrounding UI) and constructed fresh per run; never
/// persisted as-is since `password`/key passphrase are runtime-only secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSyncConfig {
	pub host: String,
	pub port: u16,
	pub username: String,
	pub remote_path: String,
	pub auth_method: AuthMethod,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub password: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub key_passphrase: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub private_key_path: Option<PathBuf>,
	pub sync_mode: SyncMode,
	pub sync_server_properties: bool,
	pub sync_mods: bool,
	pub sync_configs: bool,
	pub sync_plugins: bool,
	pub sync_world: bool,
	pub sync_version: bool,
	pub clean_before_sync: bool,
	pub restart_after_sync: bool,
	pub use_fast_transfer: bool,
	pub parallel_transfer_count: usize,
	pub status_command: String,
	pub start_command: String,
	pub stop_command: String,
	pub connection_timeout_ms: u64,
}

impl RemoteSyncConfig {
	/// Validates field ranges independent of any network access. Matches
	/// spec.md §3's validation rules verbatim.
	pub fn validate(&self) -> Result<(), String> {
		if self.host.trim().is_empty() {
			return Err("host must not be empty".to_string());
		}
		if self.username.trim().is_empty() {
			return Err("username must not be empty".to_string());
		}
		if self.port == 0 {
			return Err("port must be in range 1-65535".to_string());
		}
		if self.remote_path.trim().is_empty() {
			return Err("remotePath must not be empty".to_string());
		}
		if self.auth_method == AuthMethod::Password && self.password.as_deref().unwrap_or("").is_empty()
		{
			return Err("password is required when authMethod is password".to_string());
		}
		if self.parallel_transfer_count == 0 || self.parallel_transfer_count > 64 {
			return Err("parallelTransferCount must be in range 1-64".to_string());
		}
		Ok(())
	}

	/// The subtrees selected for enumeration, in spec.md §4.8's fixed order.
	pub fn selected_subtrees(&self) -> Vec<&'static str> {
		let mut subtrees = Vec::new();
		if self.sync_server_properties {
			subtrees.push("server.properties");
		}
		if self.sync_mods {
			subtrees.push("mods");
		}
		if self.sync_configs {
			subtrees.push("config");
		}
		if self.sync_plugins {
			subtrees.push("plugins");
		}
		if self.sync_world {
			subtrees.push("world");
		}
		subtrees
	}
}

/// A unit of work discovered while enumerating what the orchestrator should
/// upload: either a whole directory (handled by fast-transfer or recursive
/// SFTP) or left to the flattened per-file queue.
#[derive(Debug, Clone)]
pub struct SyncTask {
	pub description: String,
	pub local_path: PathBuf,
	pub remote_path: String,
	pub is_directory: bool,
}

/// A single file queued for upload by the bounded worker pool.
#[derive(Debug, Clone)]
pub struct FileUploadTask {
	pub local_path: PathBuf,
	pub remote_path: String,
	pub display_name: String,
}

/// A progress snapshot the orchestrator emits as tasks complete.
#[derive(Debug, Clone)]
pub struct SyncProgress {
	pub current_task: String,
	pub completed_tasks: u64,
	pub total_tasks: u64,
}

impl SyncProgress {
	pub fn percentage(&self) -> f64 {
		if self.total_tasks == 0 {
			0.0
		} else {
			(self.completed_tasks as f64 / self.total_tasks as f64) * 100.0
		}
	}
}

/// The final outcome of a `sync()` invocation.
#[derive(Debug, Clone)]
pub struct SyncResult {
	pub success: bool,
	pub message: String,
	pub files_attempted: u64,
	pub files_succeeded: u64,
	pub files_failed: u64,
}

impl SyncResult {
	pub fn ok(message: impl Into<String>, attempted: u64, succeeded: u64, failed: u64) -> Self {
		SyncResult {
			success: failed == 0,
			message: message.into(),
			files_attempted: attempted,
			files_succeeded: succeeded,
			files_failed: failed,
		}
	}

	pub fn failure(message: impl Into<String>) -> Self {
		SyncResult {
			success: false,
			message: message.into(),
			files_attempted: 0,
			files_succeeded: 0,
			files_failed: 0,
		}
	}
}
