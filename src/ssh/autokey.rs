//! Auto-Key Lifecycle (C7): a single 4096-bit RSA key pair generated,
//! persisted, and installed on a remote host via a one-time
//! password-authenticated session, so later syncs skip the password prompt.

use ssh_key::private::{KeypairData, RsaKeypair};
use ssh_key::rand_core::OsRng;
use ssh_key::{LineEnding, PrivateKey};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AutoKeyError;
use crate::ssh::session::SshSession;
use crate::types::RemoteSyncConfig;

const KEY_BITS: usize = 4096;
const KEY_COMMENT: &str = "atlsync-autokey";
/// Printed by the install command on success so a truncated/garbled session
/// transcript can't be mistaken for a completed install.
const INSTALL_CONFIRMATION: &str = "ATLSYNC_KEY_INSTALLED";

/// Handle to the well-known key pair path inside the user's `~/.ssh`.
pub struct AutoKey {
	private_key_path: PathBuf,
}

impl AutoKey {
	pub fn new() -> Self {
		let ssh_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".ssh");
		AutoKey { private_key_path: ssh_dir.join("atlauncher_id_rsa") }
	}

	pub fn with_path(private_key_path: impl Into<PathBuf>) -> Self {
		AutoKey { private_key_path: private_key_path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.private_key_path
	}

	pub fn public_key_path(&self) -> PathBuf {
		let mut name = self.private_key_path.as_os_str().to_owned();
		name.push(".pub");
		PathBuf::from(name)
	}

	pub fn exists(&self) -> bool {
		self.private_key_path.exists()
	}

	/// Generates the key pair if it doesn't already exist. A no-op
	/// otherwise — `setup()` can be called repeatedly without rotating keys.
	pub fn generate(&self) -> Result<(), AutoKeyError> {
		if self.exists() {
			return Ok(());
		}
		if let Some(parent) = self.private_key_path.parent() {
			fs::create_dir_all(parent)?;
		}

		let keypair = RsaKeypair::random(&mut OsRng, KEY_BITS)
			.map_err(|e| AutoKeyError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
		let private_key = PrivateKey::new(KeypairData::from(keypair), KEY_COMMENT)
			.map_err(|e| AutoKeyError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;

		let private_pem = private_key
			.to_openssh(LineEnding::LF)
			.map_err(|e| AutoKeyError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
		let public_line = private_key
			.public_key()
			.to_openssh()
			.map_err(|e| AutoKeyError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;

		fs::write(&self.private_key_path, private_pem.as_str())?;
		set_private_key_permissions(&self.private_key_path)?;
		fs::write(self.public_key_path(), format!("{public_line} {KEY_COMMENT}\n"))?;

		tracing::info!(path = %self.private_key_path.display(), "generated auto-key");
		Ok(())
	}

	/// Installs the public key on the remote host via a password-
	/// authenticated session — the key is not yet accepted there. Confirms
	/// success via [`INSTALL_CONFIRMATION`] appearing in the command output.
	pub fn install(&self, config: &RemoteSyncConfig, password: &str) -> Result<(), AutoKeyError> {
		if !self.exists() {
			return Err(AutoKeyError::NoPublicKey);
		}
		let public_key = fs::read_to_string(self.public_key_path())?;
		let public_key = public_key.trim();

		let session = SshSession::connect_with_password(config, password)?;
		let command = format!(
			"mkdir -p ~/.ssh && chmod 700 ~/.ssh && echo '{public_key}' >> ~/.ssh/authorized_keys && chmod 600 ~/.ssh/authorized_keys && echo {INSTALL_CONFIRMATION}"
		);
		let output = session.exec(&command)?;
		session.close();

		if !output.contains(INSTALL_CONFIRMATION) {
			return Err(AutoKeyError::RemoteInstallFailed(format!(
				"remote did not confirm install (got: {output:?})"
			)));
		}
		tracing::info!(host = %config.host, "installed auto-key on remote");
		Ok(())
	}

	/// Ensures the key exists, then installs it. Requires a password since
	/// the key can't yet authenticate on its own.
	pub fn setup(&self, config: &RemoteSyncConfig, password: Option<&str>) -> Result<(), AutoKeyError> {
		self.generate()?;
		let password = password.ok_or(AutoKeyError::PasswordRequired)?;
		self.install(config, password)
	}
}

impl Default for AutoKey {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(unix)]
fn set_private_key_permissions(path: &Path) -> std::io::Result<()> {
	use std::os::unix::fs::PermissionsExt;
	fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_private_key_permissions(_path: &Path) -> std::io::Result<()> {
	Ok(())
}
