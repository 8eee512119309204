//! SHA-256 file hashing.
//!
//! Streaming read so large world files don't need to be buffered in memory;
//! the digest is stable across platforms since it only depends on byte
//! content, never metadata.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::error::HashError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Returns the 64-char lowercase hex SHA-256 digest of `path`'s contents.
pub fn sha256_file(path: &Path) -> Result<String, HashError> {
	let mut file = File::open(path)?;
	let mut hasher = Sha256::new();
	let mut buf = vec![0u8; CHUNK_SIZE];
	loop {
		let read = file.read(&mut buf)?;
		if read == 0 {
			break;
		}
		hasher.update(&buf[..read]);
	}
	Ok(hex::encode(hasher.finalize()))
}

/// Returns the 64-char lowercase hex SHA-256 digest of an in-memory buffer.
/// Used for the archive's own digest once it has been written to disk, and in
/// tests that don't want to touch the filesystem twice.
pub fn sha256_bytes(buf: &[u8]) -> String {
	let mut hasher = Sha256::new();
	hasher.update(buf);
	hex::encode(hasher.finalize())
}

/// Hashes an already-open reader, for callers streaming from something other
/// than a plain `File` (e.g. a reader positioned mid-archive).
pub fn sha256_reader<R: Read>(mut reader: R) -> io::Result<String> {
	let mut hasher = Sha256::new();
	let mut buf = vec![0u8; CHUNK_SIZE];
	loop {
		let read = reader.read(&mut buf)?;
		if read == 0 {
			break;
		}
		hasher.update(&buf[..read]);
	}
	Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::NamedTempFile;

	#[test]
	fn known_digest() {
		let mut file = NamedTempFile::new().unwrap();
		file.write_all(b"hello world").unwrap();
		let digest = sha256_file(file.path()).unwrap();
		assert_eq!(digest, "b94d27b9934d3e08a52e52d7da7dacefbd3c4b5d482cfda62392f5c0c8c15fd1");
		assert_eq!(digest.len(), 64);
	}

	#[test]
	fn missing_file_is_hash_failed() {
		let result = sha256_file(Path::new("/nonexistent/path/to/nowhere"));
		assert!(matches!(result, Err(HashError::Io(_))));
	}

	#[test]
	fn bytes_and_file_agree() {
		let mut file = NamedTempFile::new().unwrap();
		file.write_all(b"some content").unwrap();
		assert_eq!(sha256_file(file.path()).unwrap(), sha256_bytes(b"some content"));
	}
}
