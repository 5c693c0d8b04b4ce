//! Decoy file placement.

use crate::error::Result;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::info;

pub const HONEYPOT_FILE: &str = "honeypot_fake_sensitive.txt";
pub const HONEYPOT_CONTENT: &str = "DO NOT TOUCH! This file is a honeypot.";

/// Write the decoy unless something already exists at `path`.
///
/// Returns `Ok(true)` when the file was written, `Ok(false)` when it was already
/// there. `create_new` makes the existence check and the write one step.
pub fn create_if_absent(path: &Path) -> Result<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    file.write_all(HONEYPOT_CONTENT.as_bytes())?;
    info!(path = %path.display(), "honeypot created");
    Ok(true)
}
