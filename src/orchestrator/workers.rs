//! Transfer Workers (C9): a bounded pool draining a shared file queue. Each
//! worker is stateless beyond its loop and owns no SSH session — the
//! parallel path deliberately shells out to `scp` so every worker gets an
//! independent TCP/SSH channel (spec.md §9).

use crossbeam_channel::Receiver;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::types::{FileUploadTask, SyncProgress};

/// A single file's transport. The parallel pool's default is
/// [`ScpTransport`]; tests substitute a fake that never shells out.
pub trait FileTransport: Send + Sync {
	fn upload(&self, task: &FileUploadTask) -> Result<(), String>;
}

/// Uploads via `scp -r -o StrictHostKeyChecking=no -o BatchMode=yes -P
/// <port> -i <keyPath> <local> <user>@<host>:<remote>` (spec.md §6).
pub struct ScpTransport {
	pub host: String,
	pub port: u16,
	pub username: String,
	pub key_path: std::path::PathBuf,
}

impl FileTransport for ScpTransport {
	fn upload(&self, task: &FileUploadTask) -> Result<(), String> {
		let destination = format!("{}@{}:{}", self.username, self.host, task.remote_path);
		let output = Command::new("scp")
			.arg("-o")
			.arg("StrictHostKeyChecking=no")
			.arg("-o")
			.arg("BatchMode=yes")
			.arg("-P")
			.arg(self.port.to_string())
			.arg("-i")
			.arg(&self.key_path)
			.arg(&task.local_path)
			.arg(&destination)
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.output()
			.map_err(|e| format!("failed to spawn scp: {e}"))?;

		if output.status.success() {
			Ok(())
		} else {
			Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
		}
	}
}

/// Spawns `worker_count` threads draining `queue`. Each increments `completed`
/// or `failed` atomically after every file and emits a progress snapshot;
/// workers never mutate shared state beyond these two counters. A worker
/// exits when the queue is empty (non-blocking poll) or `cancel` is observed
/// — either way it finishes whatever upload is already in flight first.
pub fn spawn_workers(
	queue: Receiver<FileUploadTask>,
	worker_count: usize,
	transport: Arc<dyn FileTransport>,
	cancel: Arc<AtomicBool>,
	completed: Arc<AtomicU64>,
	failed: Arc<AtomicU64>,
	total: u64,
	on_progress: Option<Arc<dyn Fn(SyncProgress) + Send + Sync>>,
) -> Vec<JoinHandle<()>> {
	(0..worker_count)
		.map(|worker_id| {
			let queue = queue.clone();
			let transport = transport.clone();
			let cancel = cancel.clone();
			let completed = completed.clone();
			let failed = failed.clone();
			let on_progress = on_progress.clone();
			thread::spawn(move || {
				worker_loop(worker_id, &queue, transport.as_ref(), &cancel, &completed, &failed, total, &on_progress);
			})
		})
		.collect()
}

fn worker_loop(
	worker_id: usize,
	queue: &Receiver<FileUploadTask>,
	transport: &dyn FileTransport,
	cancel: &AtomicBool,
	completed: &AtomicU64,
	failed: &AtomicU64,
	total: u64,
	on_progress: &Option<Arc<dyn Fn(SyncProgress) + Send + Sync>>,
) {
	loop {
		if cancel.load(Ordering::SeqCst) {
			tracing::debug!(worker_id, "cancellation observed, stopping");
			return;
		}
		let task = match queue.try_recv() {
			Ok(task) => task,
			Err(_) => return,
		};

		let outcome = transport.upload(&task);
		match outcome {
			Ok(()) => {
				completed.fetch_add(1, Ordering::SeqCst);
			}
			Err(ref e) => {
				tracing::warn!(worker_id, file = %task.display_name, error = %e, "transfer failed");
				failed.fetch_add(1, Ordering::SeqCst);
			}
		}
		let done = completed.load(Ordering::SeqCst) + failed.load(Ordering::SeqCst);

		if let Some(cb) = on_progress {
			cb(SyncProgress {
				current_task: format!("[w{worker_id}] {}", task.display_name),
				completed_tasks: done,
				total_tasks: total,
			});
		}
	}
}
