//! ZIP archive codec: creates and extracts a server-root snapshot filtered
//! through an [`policy::BackupMode`] inclusion policy.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::ArchiveError;
use crate::policy::{self, BackupMode};

/// Walks `source_dir` in a stable (lexicographic) order and returns every
/// relative, forward-slash-normalized path admitted by `mode`.
///
/// The order is deterministic so that two calls against the same tree and
/// mode always enumerate files identically — this is what lets `save`
/// followed immediately by `detectChanges` observe no differences.
///
/// Directories that [`policy::may_contain_included`] rules out for `mode`
/// are pruned via `filter_entry` rather than descended and discarded — under
/// `Normal`/`NormalPlusMods` this keeps a multi-gigabyte `world/` tree out of
/// the walk entirely (spec.md §4.1).
pub fn enumerate_included(
	source_dir: &Path,
	mode: BackupMode,
) -> Result<Vec<String>, ArchiveError> {
	let mut paths = Vec::new();
	let walker = WalkDir::new(source_dir)
		.sort_by_file_name()
		.into_iter()
		.filter_entry(|e| dir_may_recurse(e, source_dir, mode));
	for entry in walker {
		let entry = entry.map_err(|e| ArchiveError::Io(e.into_io_error().unwrap_or_else(
			|| std::io::Error::new(std::io::ErrorKind::Other, "walk error"),
		)))?;
		if !entry.file_type().is_file() {
			continue;
		}
		let rel = relative_forward_slash(source_dir, entry.path());
		if policy::included(&rel, mode) {
			paths.push(rel);
		}
	}
	paths.sort();
	Ok(paths)
}

/// `filter_entry` predicate: directories `may_contain_included` rules out are
/// pruned (not descended); files always pass through to the caller's own
/// per-file `policy::included` check.
fn dir_may_recurse(entry: &walkdir::DirEntry, root: &Path, mode: BackupMode) -> bool {
	if !entry.file_type().is_dir() {
		return true;
	}
	let rel = relative_forward_slash(root, entry.path());
	policy::may_contain_included(&rel, mode)
}

fn relative_forward_slash(root: &Path, path: &Path) -> String {
	path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/")
}

/// Creates a ZIP at `output_path` containing every file under `source_dir`
/// admitted by `mode`, keyed by forward-slash relative path. On any failure
/// part-way through, the partial archive is removed.
pub fn create_zip(
	source_dir: &Path,
	output_path: &Path,
	mode: BackupMode,
) -> Result<(), ArchiveError> {
	match create_zip_inner(source_dir, output_path, mode) {
		Ok(()) => Ok(()),
		Err(e) => {
			let _ = fs::remove_file(output_path);
			Err(e)
		}
	}
}

fn create_zip_inner(
	source_dir: &Path,
	output_path: &Path,
	mode: BackupMode,
) -> Result<(), ArchiveError> {
	let file = File::create(output_path)?;
	let mut writer = ZipWriter::new(file);
	let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

	for rel in enumerate_included(source_dir, mode)? {
		let full = source_dir.join(&rel);
		let mut contents = Vec::new();
		File::open(&full)?.read_to_end(&mut contents)?;
		writer.start_file(rel, options)?;
		writer.write_all(&contents)?;
	}

	writer.finish()?;
	Ok(())
}

/// Extracts `archive_path` into `dest_dir`. Entries whose normalized name
/// fails the policy are skipped — defensive filtering in case the archive was
/// produced under a different (typically wider) mode than the one being
/// restored against.
pub fn extract(archive_path: &Path, dest_dir: &Path, mode: BackupMode) -> Result<(), ArchiveError> {
	let file = File::open(archive_path)?;
	let mut archive = ZipArchive::new(file)?;

	for i in 0..archive.len() {
		let mut entry = archive.by_index(i)?;
		let name = entry.name().replace('\\', "/");
		if !policy::included(&name, mode) {
			continue;
		}
		let out_path = sanitized_join(dest_dir, &name);
		if let Some(parent) = out_path.parent() {
			fs::create_dir_all(parent)?;
		}
		let mut out_file = File::create(&out_path)?;
		std::io::copy(&mut entry, &mut out_file)?;
	}
	Ok(())
}

/// Joins `dest_dir` with a ZIP entry name, rejecting path traversal
/// components (`..`) so a crafted archive can't write outside `dest_dir`.
fn sanitized_join(dest_dir: &Path, entry_name: &str) -> PathBuf {
	let mut out = dest_dir.to_path_buf();
	for part in entry_name.split('/') {
		if part.is_empty() || part == "." || part == ".." {
			continue;
		}
		out.push(part);
	}
	out
}
