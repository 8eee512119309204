//! File locking for profile state directories: a PID-stamped marker file
//! that prevents two concurrent CLI invocations from racing on the same
//! profile store. Lives one layer above the Profile Store itself, which
//! provides no locking of its own.

use std::path::{Path, PathBuf};

use crate::error::ProfileStoreError;

const LOCK_FILE_NAME: &str = ".atlsync-lock";

/// Holds an exclusive lock on a server's profile directory for as long as
/// it's alive. Removes the lock file on drop, whether the guarded operation
/// succeeded or not.
pub struct ProfileLock {
	path: PathBuf,
}

impl ProfileLock {
	/// Acquires the lock, failing fast if another process already holds one.
	pub fn acquire(server_profile_dir: &Path) -> Result<Self, ProfileStoreError> {
		let lock_path = server_profile_dir.join(LOCK_FILE_NAME);

		if lock_path.exists() {
			let holder = std::fs::read_to_string(&lock_path).unwrap_or_default();
			return Err(ProfileStoreError::LockHeld(format!(
				"another atlsync operation (pid {}) is already running against {}",
				holder.trim(),
				server_profile_dir.display()
			)));
		}

		std::fs::create_dir_all(server_profile_dir)?;
		std::fs::write(&lock_path, std::process::id().to_string())?;
		Ok(ProfileLock { path: lock_path })
	}
}

impl Drop for ProfileLock {
	fn drop(&mut self) {
		if let Err(e) = std::fs::remove_file(&self.path) {
			tracing::warn!(path = %self.path.display(), "failed to remove lock file: {e}");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn acquire_writes_pid_and_removes_on_drop() {
		let dir = TempDir::new().unwrap();
		let lock_path = dir.path().join(LOCK_FILE_NAME);
		{
			let _lock = ProfileLock::acquire(dir.path()).unwrap();
			assert!(lock_path.exists());
			let contents = std::fs::read_to_string(&lock_path).unwrap();
			assert_eq!(contents, std::process::id().to_string());
		}
		assert!(!lock_path.exists());
	}

	#[test]
	fn second_concurrent_acquire_fails() {
		let dir = TempDir::new().unwrap();
		let _held = ProfileLock::acquire(dir.path()).unwrap();
		let result = ProfileLock::acquire(dir.path());
		assert!(matches!(result, Err(ProfileStoreError::LockHeld(_))));
	}

	#[test]
	fn lock_can_be_reacquired_after_release() {
		let dir = TempDir::new().unwrap();
		{
			let _lock = ProfileLock::acquire(dir.path()).unwrap();
		}
		assert!(ProfileLock::acquire(dir.path()).is_ok());
	}
}
