//! Streaming SHA-256 file hashing.
//!
//! Digests are persisted in the baseline file, so they must match a standard
//! SHA-256 of the file bytes.

use crate::error::VaultError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, trace};

/// Streaming read size (64KB)
const BUFFER_SIZE: usize = 64 * 1024;

/// SHA-256 digest of a file's contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out).map_err(|e| VaultError::InvalidDigest(format!("{s}: {e}")))?;
        Ok(Self(out))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn hash_reader<R: Read>(reader: &mut R) -> std::io::Result<Digest> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(Digest(hasher.finalize().into()))
}

/// Hash a file, returning `None` when it cannot be read.
///
/// Permission denial is routine on user trees and stays at trace level; other
/// failures (locked, vanished, is a directory) are logged at debug.
pub fn hash_file(path: &Path) -> Option<Digest> {
    let result = File::open(path).and_then(|mut file| hash_reader(&mut file));
    match result {
        Ok(digest) => Some(digest),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            trace!(path = %path.display(), "permission denied while hashing");
            None
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "cannot hash file");
            None
        }
    }
}
