//! Global configuration for the `atlsync` CLI: where profile state lives on
//! disk and the defaults a `RemoteSyncConfig` is seeded from. Distinct from
//! `RemoteSyncConfig` itself, which is per-invocation and never persisted
//! as-is since it can carry a plaintext password.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ProfileStoreError;

/// Default wall-clock budget for opening a session, in milliseconds.
const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 10_000;
/// Default worker-pool width for the orchestrator's parallel upload phase.
const DEFAULT_PARALLEL_TRANSFER_COUNT: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	/// Root directory holding every server's profile store
	/// (`<atlsync_dir>/<server>/profiles.json` plus archives).
	pub atlsync_dir: PathBuf,

	/// Default session-open budget, used to seed a fresh `RemoteSyncConfig`.
	pub connection_timeout_ms: u64,

	/// Default worker count, used to seed a fresh `RemoteSyncConfig`.
	pub parallel_transfer_count: usize,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			atlsync_dir: default_atlsync_dir(),
			connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
			parallel_transfer_count: DEFAULT_PARALLEL_TRANSFER_COUNT,
		}
	}
}

impl Config {
	/// Loads `path` if present, falling back to [`Config::default`] when the
	/// file doesn't exist. A present-but-unparseable file is an error.
	pub fn load(path: &Path) -> Result<Config, ProfileStoreError> {
		if !path.exists() {
			return Ok(Config::default());
		}
		let contents = std::fs::read_to_string(path)?;
		let config: Config = serde_json::from_str(&contents)
			.map_err(|e| ProfileStoreError::IndexCorrupted(format!("{}: {e}", path.display())))?;
		Ok(config)
	}

	/// Loads from the platform default config path
	/// (`~/.config/atlsync/config.json` on Unix, via the `dirs` crate).
	pub fn load_default() -> Result<Config, ProfileStoreError> {
		Config::load(&default_config_path())
	}

	pub fn save(&self, path: &Path) -> Result<(), ProfileStoreError> {
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let json = serde_json::to_string_pretty(self)
			.map_err(|e| ProfileStoreError::IndexCorrupted(e.to_string()))?;
		std::fs::write(path, json)?;
		Ok(())
	}
}

fn default_atlsync_dir() -> PathBuf {
	dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".atlsync")
}

fn default_config_path() -> PathBuf {
	dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("atlsync").join("config.json")
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn load_missing_file_falls_back_to_default() {
		let dir = TempDir::new().unwrap();
		let config = Config::load(&dir.path().join("config.json")).unwrap();
		assert_eq!(config.connection_timeout_ms, DEFAULT_CONNECTION_TIMEOUT_MS);
		assert_eq!(config.parallel_transfer_count, DEFAULT_PARALLEL_TRANSFER_COUNT);
	}

	#[test]
	fn save_then_load_round_trips() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.json");
		let mut config = Config::default();
		config.parallel_transfer_count = 8;
		config.save(&path).unwrap();

		let loaded = Config::load(&path).unwrap();
		assert_eq!(loaded.parallel_transfer_count, 8);
		assert_eq!(loaded.atlsync_dir, config.atlsync_dir);
	}

	#[test]
	fn corrupt_config_file_is_an_error() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.json");
		std::fs::write(&path, b"not json").unwrap();
		assert!(Config::load(&path).is_err());
	}
}
