//! MD5 content hashing with memory-adaptive read chunks.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use sysinfo::System;

use filedex_core::ScanError;

/// Smallest read chunk, used on hosts reporting little free memory.
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;

/// Largest read chunk regardless of free memory.
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Read chunk size: half of the currently available memory, clamped to
/// `[MIN_CHUNK_SIZE, MAX_CHUNK_SIZE]`.
pub fn chunk_size() -> usize {
    let mut sys = System::new();
    sys.refresh_memory();
    clamp_chunk_size(sys.available_memory() / 2)
}

fn clamp_chunk_size(half_available: u64) -> usize {
    let capped = half_available.min(MAX_CHUNK_SIZE as u64) as usize;
    capped.max(MIN_CHUNK_SIZE)
}

/// Hash a file's content and return the lowercase hex digest.
pub fn hash_file(path: impl AsRef<Path>) -> Result<String, ScanError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ScanError::io(path, e))?;
    let len = file.metadata().map_err(|e| ScanError::io(path, e))?.len();

    // No point allocating a large buffer for a small file.
    let file_len = usize::try_from(len).unwrap_or(usize::MAX);
    let chunk = chunk_size().min(file_len.max(MIN_CHUNK_SIZE));

    hash_reader(file, chunk).map_err(|e| ScanError::io(path, e))
}

/// Fold everything readable from `reader` into an MD5 digest using reads of
/// at most `chunk` bytes.
pub fn hash_reader(mut reader: impl Read, chunk: usize) -> std::io::Result<String> {
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; chunk.max(1)];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        context.consume(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", context.compute()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_known_digests() {
        assert_eq!(
            hash_reader(&b""[..], 4096).unwrap(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            hash_reader(&b"hello world"[..], 4096).unwrap(),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }

    #[test]
    fn test_chunking_does_not_change_digest() {
        let data = vec![7u8; 10_000];
        let whole = hash_reader(&data[..], 1 << 20).unwrap();
        let tiny = hash_reader(&data[..], 3).unwrap();
        assert_eq!(whole, tiny);
    }

    #[test]
    fn test_chunk_size_bounds() {
        assert_eq!(clamp_chunk_size(0), MIN_CHUNK_SIZE);
        assert_eq!(clamp_chunk_size(10_000), 10_000);
        assert_eq!(clamp_chunk_size(u64::MAX), MAX_CHUNK_SIZE);

        let live = chunk_size();
        assert!((MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&live));
    }

    #[test]
    fn test_hash_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        fs::write(&path, "hello world").unwrap();

        let digest = hash_file(&path).unwrap();
        assert_eq!(digest, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(digest.len(), 32);
    }

    #[test]
    fn test_hash_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = hash_file(temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, ScanError::NotFound { .. }));
    }
}
