//! Error types for atlsync operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;
use uuid::Uuid;

/// Errors raised while hashing a file.
#[derive(Debug)]
pub enum HashError {
	Io(io::Error),
}

impl fmt::Display for HashError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			HashError::Io(e) => write!(f, "hash failed: {}", e),
		}
	}
}

impl Error for HashError {}

impl From<io::Error> for HashError {
	fn from(e: io::Error) -> Self {
		HashError::Io(e)
	}
}

/// Errors raised while creating or extracting a ZIP archive.
#[derive(Debug)]
pub enum ArchiveError {
	Io(io::Error),
	Zip(String),
	Hash(HashError),
}

impl fmt::Display for ArchiveError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ArchiveError::Io(e) => write!(f, "archive I/O error: {}", e),
			ArchiveError::Zip(msg) => write!(f, "zip error: {}", msg),
			ArchiveError::Hash(e) => write!(f, "archive hash error: {}", e),
		}
	}
}

impl Error for ArchiveError {}

impl From<io::Error> for ArchiveError {
	fn from(e: io::Error) -> Self {
		ArchiveError::Io(e)
	}
}

impl From<HashError> for ArchiveError {
	fn from(e: HashError) -> Self {
		ArchiveError::Hash(e)
	}
}

impl From<zip::result::ZipError> for ArchiveError {
	fn from(e: zip::result::ZipError) -> Self {
		ArchiveError::Zip(e.to_string())
	}
}

/// Errors raised by the Profile Store (save/restore/delete/list).
#[derive(Debug)]
pub enum ProfileStoreError {
	DuplicateName(String),
	InvalidName(String),
	NotFound(Uuid),
	ArchiveMissing(PathBuf),
	Io(io::Error),
	Hash(HashError),
	Archive(ArchiveError),
	IndexCorrupted(String),
	LockHeld(String),
}

impl fmt::Display for ProfileStoreError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProfileStoreError::DuplicateName(name) => {
				write!(f, "a profile named '{}' already exists", name)
			}
			ProfileStoreError::InvalidName(reason) => write!(f, "invalid profile name: {}", reason),
			ProfileStoreError::NotFound(id) => write!(f, "no profile with id {}", id),
			ProfileStoreError::ArchiveMissing(path) => {
				write!(f, "profile archive missing: {}", path.display())
			}
			ProfileStoreError::Io(e) => write!(f, "I/O error: {}", e),
			ProfileStoreError::Hash(e) => write!(f, "{}", e),
			ProfileStoreError::Archive(e) => write!(f, "{}", e),
			ProfileStoreError::IndexCorrupted(msg) => write!(f, "profile index corrupted: {}", msg),
			ProfileStoreError::LockHeld(msg) => write!(f, "{}", msg),
		}
	}
}

impl Error for ProfileStoreError {}

impl From<io::Error> for ProfileStoreError {
	fn from(e: io::Error) -> Self {
		ProfileStoreError::Io(e)
	}
}

impl From<HashError> for ProfileStoreError {
	fn from(e: HashError) -> Self {
		ProfileStoreError::Hash(e)
	}
}

impl From<ArchiveError> for ProfileStoreError {
	fn from(e: ArchiveError) -> Self {
		ProfileStoreError::Archive(e)
	}
}

/// Errors raised establishing or using an SSH session.
#[derive(Debug)]
pub enum SshError {
	AuthFailed(String),
	ConnectFailed(String),
	ExecFailed(String),
	SftpFailed(String),
	Io(io::Error),
}

impl fmt::Display for SshError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SshError::AuthFailed(msg) => write!(f, "authentication failed: {}", msg),
			SshError::ConnectFailed(msg) => write!(f, "connection failed: {}", msg),
			SshError::ExecFailed(msg) => write!(f, "remote command failed: {}", msg),
			SshError::SftpFailed(msg) => write!(f, "SFTP operation failed: {}", msg),
			SshError::Io(e) => write!(f, "I/O error: {}", e),
		}
	}
}

impl Error for SshError {}

impl From<io::Error> for SshError {
	fn from(e: io::Error) -> Self {
		SshError::Io(e)
	}
}

impl From<ssh2::Error> for SshError {
	fn from(e: ssh2::Error) -> Self {
		SshError::ConnectFailed(e.to_string())
	}
}

/// Errors raised by the Auto-Key Lifecycle (C7).
#[derive(Debug)]
pub enum AutoKeyError {
	PasswordRequired,
	NoPublicKey,
	RemoteInstallFailed(String),
	Io(io::Error),
	Ssh(SshError),
}

impl fmt::Display for AutoKeyError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AutoKeyError::PasswordRequired => {
				write!(f, "a password is required to install the auto-generated key")
			}
			AutoKeyError::NoPublicKey => write!(f, "no public key available to install"),
			AutoKeyError::RemoteInstallFailed(msg) => {
				write!(f, "failed to install key on remote host: {}", msg)
			}
			AutoKeyError::Io(e) => write!(f, "I/O error: {}", e),
			AutoKeyError::Ssh(e) => write!(f, "{}", e),
		}
	}
}

impl Error for AutoKeyError {}

impl From<io::Error> for AutoKeyError {
	fn from(e: io::Error) -> Self {
		AutoKeyError::Io(e)
	}
}

impl From<SshError> for AutoKeyError {
	fn from(e: SshError) -> Self {
		AutoKeyError::Ssh(e)
	}
}

/// Errors raised by the Sync Orchestrator (C8).
#[derive(Debug)]
pub enum SyncError {
	Validation(String),
	NothingSelected,
	Ssh(SshError),
	AutoKey(AutoKeyError),
	Timeout,
	Cancelled,
	PartialStart(String),
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Validation(msg) => write!(f, "invalid sync configuration: {}", msg),
			SyncError::NothingSelected => write!(f, "no files were selected for upload"),
			SyncError::Ssh(e) => write!(f, "{}", e),
			SyncError::AutoKey(e) => write!(f, "{}", e),
			SyncError::Timeout => write!(f, "upload phase exceeded the 60-minute ceiling"),
			SyncError::Cancelled => write!(f, "sync was cancelled"),
			SyncError::PartialStart(msg) => {
				write!(f, "sync completed but start failed: {}", msg)
			}
		}
	}
}

impl Error for SyncError {}

impl From<SshError> for SyncError {
	fn from(e: SshError) -> Self {
		SyncError::Ssh(e)
	}
}

impl From<AutoKeyError> for SyncError {
	fn from(e: AutoKeyError) -> Self {
		SyncError::AutoKey(e)
	}
}

/// Top-level error type for the CLI front-end, wrapping every subsystem error.
#[derive(Debug)]
pub enum AtlSyncError {
	Config(String),
	ProfileStore(ProfileStoreError),
	Sync(SyncError),
	AutoKey(AutoKeyError),
	Other(String),
}

impl fmt::Display for AtlSyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AtlSyncError::Config(msg) => write!(f, "configuration error: {}", msg),
			AtlSyncError::ProfileStore(e) => write!(f, "{}", e),
			AtlSyncError::Sync(e) => write!(f, "{}", e),
			AtlSyncError::AutoKey(e) => write!(f, "{}", e),
			AtlSyncError::Other(msg) => write!(f, "{}", msg),
		}
	}
}

impl Error for AtlSyncError {}

impl From<ProfileStoreError> for AtlSyncError {
	fn from(e: ProfileStoreError) -> Self {
		AtlSyncError::ProfileStore(e)
	}
}

impl From<SyncError> for AtlSyncError {
	fn from(e: SyncError) -> Self {
		AtlSyncError::Sync(e)
	}
}

impl From<AutoKeyError> for AtlSyncError {
	fn from(e: AutoKeyError) -> Self {
		AtlSyncError::AutoKey(e)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hash_error_display() {
		let e = HashError::Io(io::Error::new(io::ErrorKind::NotFound, "missing"));
		assert!(e.to_string().contains("hash failed"));
	}

	#[test]
	fn profile_store_error_display() {
		let e = ProfileStoreError::DuplicateName("v1".to_string());
		assert!(e.to_string().contains("v1"));
	}
}
