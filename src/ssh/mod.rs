//! SSH transport: session lifecycle (C6) and the dedicated auto-key it can
//! use to skip password prompts on repeat syncs (C7).

pub mod autokey;
pub mod session;

pub use autokey::AutoKey;
pub use session::SshSession;

use std::path::Path;

use crate::error::SshError;

/// The subset of session operations the Sync Orchestrator (C8) drives. A
/// trait seam so the orchestrator's phase logic can be exercised against a
/// fake in-process backend in tests, without opening a real TCP connection.
pub trait RemoteControl: Send {
	fn exec(&self, command: &str) -> Result<String, SshError>;
	fn sftp_put(
		&self,
		local: &Path,
		remote: &str,
		progress: Option<&mut dyn FnMut(u64, u64)>,
	) -> Result<(), SshError>;
	fn mkdirp(&self, remote: &str) -> Result<(), SshError>;
	fn exists(&self, remote: &str) -> bool;
}

impl RemoteControl for SshSession {
	fn exec(&self, command: &str) -> Result<String, SshError> {
		SshSession::exec(self, command)
	}

	fn sftp_put(
		&self,
		local: &Path,
		remote: &str,
		progress: Option<&mut dyn FnMut(u64, u64)>,
	) -> Result<(), SshError> {
		SshSession::sftp_put(self, local, remote, progress)
	}

	fn mkdirp(&self, remote: &str) -> Result<(), SshError> {
		SshSession::mkdirp(self, remote)
	}

	fn exists(&self, remote: &str) -> bool {
		SshSession::exists(self, remote)
	}
}
