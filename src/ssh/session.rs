//! SSH Session (C6): authentication (key / password / auto-key), command
//! execution, SFTP upload, idempotent directory creation, and existence
//! checks. Host key verification is intentionally not performed — the
//! system is documented as operator-trust (spec.md §9).

use ssh2::Session;
use std::fs::File;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::SshError;
use crate::ssh::autokey::AutoKey;
use crate::types::{AuthMethod, RemoteSyncConfig};

/// Server-side keepalive interval: long uploads shouldn't drop an idle
/// control channel while a worker is busy elsewhere.
const KEEPALIVE_INTERVAL_SECS: u32 = 30;
/// Consecutive keepalive failures tolerated before a connection is
/// considered dead. ssh2 doesn't track this itself; callers that hold a
/// session open across a long operation call [`SshSession::keepalive`] at
/// safe points and give up after this many consecutive errors.
pub const KEEPALIVE_MAX_MISSES: u32 = 10;

/// An authenticated SSH session with an established TCP connection. Single
/// owner, single lifecycle — never shared across threads (spec.md §5, §9).
pub struct SshSession {
	session: Session,
	_stream: TcpStream,
	connected_at: Instant,
}

impl SshSession {
	/// Establishes a session for `config`, choosing an authentication path
	/// per spec.md §4.6:
	///
	/// - `authMethod = Key`: use the configured key (or the platform default
	///   if empty/missing), preferring the auto-key when the configured path
	///   is empty or missing.
	/// - `authMethod = Password`: try the auto-key first if one exists (a
	///   fresh session per attempt — a half-authenticated session is never
	///   reused across credential types), falling back to password auth.
	pub fn connect(config: &RemoteSyncConfig, auto_key: &AutoKey) -> Result<Self, SshError> {
		match config.auth_method {
			AuthMethod::Key => {
				let key_path = resolve_key_path(config, auto_key);
				Self::connect_with_key(config, &key_path, config.key_passphrase.as_deref())
			}
			AuthMethod::Password => {
				if auto_key.exists() {
					match Self::connect_with_key(config, auto_key.path(), None) {
						Ok(session) => return Ok(session),
						Err(e) => {
							tracing::debug!("auto-key auth failed ({e}), falling back to password");
						}
					}
				}
				let password = config
					.password
					.as_deref()
					.ok_or_else(|| SshError::AuthFailed("password auth selected but no password set".into()))?;
				Self::connect_with_password(config, password)
			}
		}
	}

	/// Connects and authenticates with a private key.
	pub fn connect_with_key(
		config: &RemoteSyncConfig,
		key_path: &Path,
		passphrase: Option<&str>,
	) -> Result<Self, SshError> {
		let (stream, mut session) = open_and_handshake(config)?;
		session
			.userauth_pubkey_file(&config.username, None, key_path, passphrase)
			.map_err(|e| SshError::AuthFailed(e.to_string()))?;
		if !session.authenticated() {
			return Err(SshError::AuthFailed("key authentication was not accepted".into()));
		}
		session.set_keepalive(true, KEEPALIVE_INTERVAL_SECS);
		tracing::info!(host = %config.host, "authenticated via key");
		Ok(SshSession { session, _stream: stream, connected_at: Instant::now() })
	}

	/// Connects and authenticates with a password. Used directly by auto-key
	/// install, which must authenticate before the key is accepted anywhere.
	pub fn connect_with_password(config: &RemoteSyncConfig, password: &str) -> Result<Self, SshError> {
		let (stream, mut session) = open_and_handshake(config)?;
		session
			.userauth_password(&config.username, password)
			.map_err(|e| SshError::AuthFailed(e.to_string()))?;
		if !session.authenticated() {
			return Err(SshError::AuthFailed("password authentication was not accepted".into()));
		}
		session.set_keepalive(true, KEEPALIVE_INTERVAL_SECS);
		tracing::info!(host = %config.host, "authenticated via password");
		Ok(SshSession { session, _stream: stream, connected_at: Instant::now() })
	}

	/// Sends one keepalive packet. Callers looping over a long sequential
	/// upload call this between files; `KEEPALIVE_MAX_MISSES` consecutive
	/// errors should be treated as a dead connection.
	pub fn keepalive(&self) -> Result<(), SshError> {
		self.session.keepalive_send().map(|_| ()).map_err(SshError::from)
	}

	/// Opens an exec channel, streams stdout/stderr to completion, logs
	/// stderr line-by-line and the exit status, and returns trimmed stdout.
	/// A nonzero exit is logged, not raised — `command` is an operator-
	/// supplied shell string whose semantics the core cannot judge.
	pub fn exec(&self, command: &str) -> Result<String, SshError> {
		let mut channel = self.session.channel_session()?;
		channel.exec(command)?;

		let mut stdout = String::new();
		channel.read_to_string(&mut stdout)?;
		let mut stderr = String::new();
		channel.stderr().read_to_string(&mut stderr)?;

		channel.wait_close()?;
		let exit_status = channel.exit_status()?;

		for line in stderr.lines() {
			tracing::warn!(%command, "remote stderr: {line}");
		}
		if exit_status != 0 {
			tracing::warn!(%command, exit_status, "remote command exited non-zero");
		}

		Ok(stdout.trim().to_string())
	}

	/// Uploads `local` to `remote`, overwriting unconditionally. `progress`,
	/// when given, is called with `(bytes_sent, bytes_total)` after each
	/// chunk.
	pub fn sftp_put(
		&self,
		local: &Path,
		remote: &str,
		mut progress: Option<&mut dyn FnMut(u64, u64)>,
	) -> Result<(), SshError> {
		let sftp = self.session.sftp()?;
		let total = std::fs::metadata(local)?.len();
		let mut source = File::open(local)?;
		let mut dest = sftp.create(Path::new(remote))?;

		let mut buf = [0u8; 64 * 1024];
		let mut sent: u64 = 0;
		loop {
			let read = source.read(&mut buf)?;
			if read == 0 {
				break;
			}
			dest.write_all(&buf[..read])?;
			sent += read as u64;
			if let Some(cb) = progress.as_deref_mut() {
				cb(sent, total);
			}
		}
		Ok(())
	}

	/// Creates every prefix of `remote`, ignoring "already exists" failures.
	pub fn mkdirp(&self, remote: &str) -> Result<(), SshError> {
		let sftp = self.session.sftp()?;
		let absolute = remote.starts_with('/');
		let mut prefix = String::new();
		for part in remote.split('/').filter(|p| !p.is_empty()) {
			if prefix.is_empty() {
				if absolute {
					prefix.push('/');
				}
			} else {
				prefix.push('/');
			}
			prefix.push_str(part);
			match sftp.mkdir(Path::new(&prefix), 0o755) {
				Ok(()) => {}
				Err(e) if is_already_exists(&e) => {}
				Err(e) => return Err(e.into()),
			}
		}
		Ok(())
	}

	/// One `stat` call; any failure (missing path, permission, etc.) maps to
	/// `false`.
	pub fn exists(&self, remote: &str) -> bool {
		self.session.sftp().and_then(|sftp| sftp.stat(Path::new(remote))).is_ok()
	}

	/// Idempotent; logs connection lifetime. Consumes `self` so a closed
	/// session can't be reused.
	pub fn close(self) {
		tracing::debug!(lifetime_ms = self.connected_at.elapsed().as_millis(), "ssh session closed");
	}
}

fn is_already_exists(e: &ssh2::Error) -> bool {
	matches!(e.code(), ssh2::ErrorCode::SFTP(_)) && e.message().to_lowercase().contains("exist")
}

fn open_and_handshake(config: &RemoteSyncConfig) -> Result<(TcpStream, Session), SshError> {
	let addr = format!("{}:{}", config.host, config.port);
	let stream = TcpStream::connect(&addr)
		.map_err(|e| SshError::ConnectFailed(format!("{addr}: {e}")))?;
	stream
		.set_read_timeout(Some(Duration::from_millis(config.connection_timeout_ms)))
		.map_err(SshError::Io)?;

	let mut session = Session::new().map_err(|e| SshError::ConnectFailed(e.to_string()))?;
	session.set_tcp_stream(stream.try_clone().map_err(SshError::Io)?);
	// Host key verification is intentionally not performed; see spec.md §9.
	session.handshake().map_err(|e| SshError::ConnectFailed(e.to_string()))?;

	Ok((stream, session))
}

/// Resolves the key path used under `authMethod = Key`: the configured path
/// if non-empty and present, else the auto-key if it exists, else the
/// configured path anyway (so a missing-file error surfaces from `ssh2`
/// rather than being silently swallowed here).
fn resolve_key_path(config: &RemoteSyncConfig, auto_key: &AutoKey) -> std::path::PathBuf {
	if let Some(configured) = &config.private_key_path {
		if !configured.as_os_str().is_empty() && configured.exists() {
			return configured.clone();
		}
	}
	if auto_key.exists() {
		return auto_key.path().to_path_buf();
	}
	config.private_key_path.clone().unwrap_or_else(|| auto_key.path().to_path_buf())
}
