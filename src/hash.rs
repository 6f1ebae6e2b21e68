//! Content digests for the rewrite engine.
//!
//! Hashing sits behind [`FileHasher`] so integrity failures can be injected in tests.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::fs_ops::io_error_with_help_io;

const BUF_SIZE: usize = 1024 * 1024;

pub trait FileHasher: Send + Sync {
    /// Hex digest of the file's full contents.
    fn hash(&self, path: &Path) -> io::Result<String>;
}

/// Streaming SHA-256.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl FileHasher for Sha256Hasher {
    fn hash(&self, path: &Path) -> io::Result<String> {
        let mut file = File::open(path).map_err(io_error_with_help_io("open for hashing", path))?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; BUF_SIZE];
        loop {
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}
