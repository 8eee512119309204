//! Sync Orchestrator (C8): a cancellable, multi-phase remote push. Phases
//! run in the fixed order from spec.md §4.8: pre-stop, version manifest,
//! clean, enumeration, upload, post-start.

pub mod manifest;
pub mod workers;

use crossbeam_channel::unbounded;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use crate::error::SshError;
use crate::ssh::{AutoKey, RemoteControl, SshSession};
use crate::types::{
	AuthMethod, FileUploadTask, RemoteSyncConfig, Server, SyncMode, SyncProgress, SyncResult, SyncTask,
};
use workers::{spawn_workers, FileTransport, ScpTransport};

/// The 60-minute wall-clock ceiling on the upload phase (spec.md §4.8, §5).
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60 * 60);
/// Fixed delay between invoking `startCommand` and polling `statusCommand`.
const POST_START_STATUS_DELAY: Duration = Duration::from_secs(2);

pub type ProgressCallback = Arc<dyn Fn(SyncProgress) + Send + Sync>;
pub type SessionFactory = Box<dyn Fn() -> Result<Box<dyn RemoteControl>, SshError> + Send + Sync>;

/// A shared flag an external caller can flip to stop the run at its next
/// safe point (between sequential tasks, between parallel queue polls).
#[derive(Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

#[derive(Debug, Default, Clone, Copy)]
struct UploadCounts {
	attempted: u64,
	succeeded: u64,
	failed: u64,
}

enum UploadOutcome {
	Completed(UploadCounts),
	Cancelled(UploadCounts),
	TimedOut(UploadCounts),
	Failed(SshError),
}

pub struct SyncOrchestrator {
	server: Server,
	config: RemoteSyncConfig,
	auto_key: AutoKey,
	cancel: Arc<AtomicBool>,
	session_factory: SessionFactory,
}

impl SyncOrchestrator {
	pub fn new(server: Server, config: RemoteSyncConfig) -> Self {
		let auto_key = AutoKey::new();
		SyncOrchestrator::with_auto_key(server, config, auto_key)
	}

	pub fn with_auto_key(server: Server, config: RemoteSyncConfig, auto_key: AutoKey) -> Self {
		let factory_config = config.clone();
		let factory_auto_key = AutoKey::with_path(auto_key.path());
		SyncOrchestrator {
			server,
			config,
			auto_key,
			cancel: Arc::new(AtomicBool::new(false)),
			session_factory: Box::new(move || {
				SshSession::connect(&factory_config, &factory_auto_key)
					.map(|s| Box::new(s) as Box<dyn RemoteControl>)
			}),
		}
	}

	/// Overrides how command-phase sessions are opened — the seam the test
	/// suite uses to substitute a fake in-process SSH backend instead of a
	/// real TCP connection.
	pub fn with_session_factory(mut self, factory: SessionFactory) -> Self {
		self.session_factory = factory;
		self
	}

	pub fn cancel_handle(&self) -> CancelHandle {
		CancelHandle(self.cancel.clone())
	}

	/// Runs the full phase pipeline and returns the aggregated result.
	pub fn sync(&self, on_progress: Option<ProgressCallback>) -> SyncResult {
		if let Err(e) = self.config.validate() {
			return SyncResult::failure(format!("invalid sync configuration: {e}"));
		}

		let commands_enabled = self.config.sync_mode == SyncMode::Commands;

		if commands_enabled && self.config.restart_after_sync {
			if let Err(e) = self.phase_pre_stop() {
				tracing::warn!("pre-stop failed (advisory, continuing): {e}");
			}
		}

		if commands_enabled && self.config.sync_version {
			if let Err(e) = self.phase_version_manifest() {
				return SyncResult::failure(format!("version manifest phase failed: {e}"));
			}
		}

		if commands_enabled && self.config.clean_before_sync {
			if let Err(e) = self.phase_clean() {
				return SyncResult::failure(format!("clean phase failed: {e}"));
			}
		}

		let tasks = match self.phase_enumerate() {
			Ok(tasks) if !tasks.is_empty() => tasks,
			Ok(_) => return SyncResult::failure("no files were selected for upload"),
			Err(e) => return SyncResult::failure(format!("enumeration failed: {e}")),
		};

		let use_parallel = self.config.parallel_transfer_count > 1 && self.auto_key.exists();
		let outcome = if use_parallel {
			self.phase_upload_parallel(&tasks, on_progress.clone())
		} else {
			self.phase_upload_sequential(&tasks, on_progress.clone())
		};

		match outcome {
			UploadOutcome::Cancelled(counts) => SyncResult {
				success: false,
				message: "sync was cancelled".to_string(),
				files_attempted: counts.attempted,
				files_succeeded: counts.succeeded,
				files_failed: counts.failed,
			},
			UploadOutcome::TimedOut(counts) => SyncResult {
				success: false,
				message: "upload phase exceeded the 60-minute ceiling".to_string(),
				files_attempted: counts.attempted,
				files_succeeded: counts.succeeded,
				files_failed: counts.failed,
			},
			UploadOutcome::Failed(e) => SyncResult::failure(format!("upload phase failed: {e}")),
			UploadOutcome::Completed(counts) => self.finish(counts, commands_enabled),
		}
	}

	fn finish(&self, counts: UploadCounts, commands_enabled: bool) -> SyncResult {
		let upload_summary = format!(
			"{} of {} files succeeded ({} failed)",
			counts.succeeded, counts.attempted, counts.failed
		);

		if commands_enabled && self.config.restart_after_sync {
			return match self.phase_post_start() {
				Ok(status) => SyncResult {
					success: counts.failed == 0,
					message: format!("sync completed: {upload_summary}; remote status: {status}"),
					files_attempted: counts.attempted,
					files_succeeded: counts.succeeded,
					files_failed: counts.failed,
				},
				Err(e) => SyncResult {
					success: false,
					message: format!("sync completed but start failed: {e} ({upload_summary})"),
					files_attempted: counts.attempted,
					files_succeeded: counts.succeeded,
					files_failed: counts.failed,
				},
			};
		}

		SyncResult {
			success: counts.failed == 0,
			message: format!("sync completed: {upload_summary}"),
			files_attempted: counts.attempted,
			files_succeeded: counts.succeeded,
			files_failed: counts.failed,
		}
	}

	// --- Phase 1: pre-stop (best-effort) ---

	fn phase_pre_stop(&self) -> Result<(), SshError> {
		let session = (self.session_factory)()?;
		let _ = session.exec(&self.config.stop_command)?;
		Ok(())
	}

	// --- Phase 2: version manifest ---

	fn phase_version_manifest(&self) -> Result<(), SshError> {
		let session = (self.session_factory)()?;
		let command = manifest::write_command(&self.config.remote_path, &self.server);
		session.exec(&command)?;
		Ok(())
	}

	// --- Phase 3: clean ---

	fn phase_clean(&self) -> Result<(), SshError> {
		let session = (self.session_factory)()?;
		let remote_path = self.config.remote_path.trim_end_matches('/');
		let cleanable: &[(&str, bool)] = &[
			("mods", self.config.sync_mods),
			("config", self.config.sync_configs),
			("plugins", self.config.sync_plugins),
		];
		for (subtree, selected) in cleanable {
			if *selected {
				session.exec(&format!("rm -rf {remote_path}/{subtree}/*"))?;
			}
		}
		Ok(())
	}

	// --- Phase 4: enumeration ---

	fn phase_enumerate(&self) -> Result<Vec<SyncTask>, std::io::Error> {
		let remote_root = self.config.remote_path.trim_end_matches('/');
		let mut tasks = Vec::new();
		for subtree in self.config.selected_subtrees() {
			let local = self.server.root.join(subtree);
			if !local.exists() {
				continue;
			}
			tasks.push(SyncTask {
				description: format!("sync {subtree}"),
				is_directory: local.is_dir(),
				remote_path: format!("{remote_root}/{subtree}"),
				local_path: local,
			});
		}
		Ok(tasks)
	}

	// --- Phase 5: upload ---

	fn phase_upload_sequential(&self, tasks: &[SyncTask], on_progress: Option<ProgressCallback>) -> UploadOutcome {
		let session = match (self.session_factory)() {
			Ok(s) => s,
			Err(e) => {
				tracing::error!("failed to open upload session: {e}");
				return UploadOutcome::Failed(e);
			}
		};

		let mut counts = UploadCounts::default();
		let total_files = tasks
			.iter()
			.map(|t| if t.is_directory { count_files(&t.local_path) } else { 1 })
			.sum::<u64>();

		for task in tasks {
			if self.cancel.load(Ordering::SeqCst) {
				return UploadOutcome::Cancelled(counts);
			}

			if task.is_directory {
				let _ = session.mkdirp(&task.remote_path);
				if self.config.use_fast_transfer && self.auto_key.exists() {
					let file_count = count_files(&task.local_path);
					match scp_dir(&self.config, &self.auto_key, task) {
						Ok(()) => counts.succeeded += file_count,
						Err(e) => {
							tracing::warn!(task = %task.description, "fast-transfer failed: {e}");
							counts.failed += file_count;
						}
					}
					counts.attempted += file_count;
				} else {
					for file in flatten_directory(task) {
						counts.attempted += 1;
						let _ = session.mkdirp(parent_path(&file.remote_path));
						match session.sftp_put(&file.local_path, &file.remote_path, None) {
							Ok(()) => counts.succeeded += 1,
							Err(e) => {
								tracing::warn!(file = %file.display_name, "sftp upload failed: {e}");
								counts.failed += 1;
							}
						}
						emit_progress(&on_progress, &file.display_name, counts.succeeded + counts.failed, total_files);
					}
				}
			} else {
				counts.attempted += 1;
				let _ = session.mkdirp(parent_path(&task.remote_path));
				match session.sftp_put(&task.local_path, &task.remote_path, None) {
					Ok(()) => counts.succeeded += 1,
					Err(e) => {
						tracing::warn!(task = %task.description, "sftp upload failed: {e}");
						counts.failed += 1;
					}
				}
				emit_progress(&on_progress, &task.description, counts.succeeded + counts.failed, total_files);
			}
		}

		UploadOutcome::Completed(counts)
	}

	fn phase_upload_parallel(&self, tasks: &[SyncTask], on_progress: Option<ProgressCallback>) -> UploadOutcome {
		// Pre-create every remote directory with a single setup session so
		// workers never race on `mkdir` (spec.md §4.8).
		if let Ok(setup) = (self.session_factory)() {
			for task in tasks {
				if task.is_directory {
					let _ = setup.mkdirp(&task.remote_path);
					for entry in WalkDir::new(&task.local_path) {
						if let Ok(entry) = entry {
							if entry.file_type().is_dir() {
								let rel = relative_forward_slash(&task.local_path, entry.path());
								if !rel.is_empty() {
									let _ = setup.mkdirp(&format!("{}/{rel}", task.remote_path));
								}
							}
						}
					}
				} else {
					let _ = setup.mkdirp(parent_path(&task.remote_path));
				}
			}
		} else {
			tracing::warn!("failed to open setup session for pre-creating remote directories");
		}

		let files: Vec<FileUploadTask> = tasks.iter().flat_map(flatten_task).collect();
		let total = files.len() as u64;
		let (tx, rx) = unbounded();
		for file in files {
			let _ = tx.send(file);
		}
		drop(tx);

		let completed = Arc::new(AtomicU64::new(0));
		let failed = Arc::new(AtomicU64::new(0));
		let transport: Arc<dyn FileTransport> = Arc::new(ScpTransport {
			host: self.config.host.clone(),
			port: self.config.port,
			username: self.config.username.clone(),
			key_path: self.auto_key.path().to_path_buf(),
		});

		let handles = spawn_workers(
			rx,
			self.config.parallel_transfer_count,
			transport,
			self.cancel.clone(),
			completed.clone(),
			failed.clone(),
			total,
			on_progress,
		);

		let deadline = Instant::now() + UPLOAD_TIMEOUT;
		let mut timed_out = false;
		while handles.iter().any(|h| !h.is_finished()) {
			if Instant::now() >= deadline {
				timed_out = true;
				self.cancel.store(true, Ordering::SeqCst);
				break;
			}
			thread::sleep(Duration::from_millis(50));
		}
		for handle in handles {
			let _ = handle.join();
		}

		let succeeded = completed.load(Ordering::SeqCst);
		let failed = failed.load(Ordering::SeqCst);
		// A cancelled or timed-out run only actually attempted the files a
		// worker dequeued, not the full enumeration (spec.md §7's per-file
		// counts must reflect what really happened, not the queue size).
		let ran_to_completion = !timed_out && !(self.cancel.load(Ordering::SeqCst) && succeeded + failed < total);
		let counts = UploadCounts {
			attempted: if ran_to_completion { total } else { succeeded + failed },
			succeeded,
			failed,
		};

		if timed_out {
			UploadOutcome::TimedOut(counts)
		} else if !ran_to_completion {
			UploadOutcome::Cancelled(counts)
		} else {
			UploadOutcome::Completed(counts)
		}
	}

	// --- Phase 6: post-start ---

	fn phase_post_start(&self) -> Result<String, SshError> {
		let session = (self.session_factory)()?;
		session.exec(&self.config.start_command)?;
		thread::sleep(POST_START_STATUS_DELAY);
		session.exec(&self.config.status_command)
	}
}

fn emit_progress(on_progress: &Option<ProgressCallback>, current: &str, completed: u64, total: u64) {
	if let Some(cb) = on_progress {
		cb(SyncProgress { current_task: current.to_string(), completed_tasks: completed, total_tasks: total });
	}
}

fn parent_path(remote_path: &str) -> &str {
	remote_path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or(remote_path)
}

fn relative_forward_slash(base: &std::path::Path, target: &std::path::Path) -> String {
	target.strip_prefix(base).unwrap_or(target).to_string_lossy().replace('\\', "/")
}

fn count_files(dir: &std::path::Path) -> u64 {
	WalkDir::new(dir).into_iter().filter_map(Result::ok).filter(|e| e.file_type().is_file()).count() as u64
}

fn flatten_directory(task: &SyncTask) -> Vec<FileUploadTask> {
	let mut files = Vec::new();
	for entry in WalkDir::new(&task.local_path).sort_by_file_name() {
		let entry = match entry {
			Ok(e) => e,
			Err(_) => continue,
		};
		if !entry.file_type().is_file() {
			continue;
		}
		let rel = relative_forward_slash(&task.local_path, entry.path());
		files.push(FileUploadTask {
			local_path: entry.path().to_path_buf(),
			remote_path: format!("{}/{rel}", task.remote_path),
			display_name: rel,
		});
	}
	files
}

fn flatten_task(task: &SyncTask) -> Vec<FileUploadTask> {
	if task.is_directory {
		flatten_directory(task)
	} else {
		let display_name =
			task.local_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
		vec![FileUploadTask {
			local_path: task.local_path.clone(),
			remote_path: task.remote_path.clone(),
			display_name,
		}]
	}
}

/// `scp -r` fast-transfer for an entire directory task, used by sequential
/// mode when enabled and a key is available (spec.md §4.6, §6).
fn scp_dir(config: &RemoteSyncConfig, auto_key: &AutoKey, task: &SyncTask) -> Result<(), String> {
	let destination = format!("{}@{}:{}/", config.username, config.host, parent_path(&task.remote_path));
	let output = std::process::Command::new("scp")
		.arg("-r")
		.arg("-o")
		.arg("StrictHostKeyChecking=no")
		.arg("-o")
		.arg("BatchMode=yes")
		.arg("-P")
		.arg(config.port.to_string())
		.arg("-i")
		.arg(auto_key.path())
		.arg(&task.local_path)
		.arg(&destination)
		.output()
		.map_err(|e| format!("failed to spawn scp: {e}"))?;

	if output.status.success() {
		Ok(())
	} else {
		Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
	}
}

/// Authentication guard used only by callers that need to know, ahead of
/// connecting, whether password auth is even viable.
pub fn requires_password(config: &RemoteSyncConfig) -> bool {
	config.auth_method == AuthMethod::Password && config.password.is_none()
}
