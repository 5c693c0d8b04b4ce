//! Noise filter shared by the baseline walk, the scanners and the monitors.
//!
//! Paths are inspected as strings only. Both `/` and `\` separate segments, so a
//! Windows-style path is classified the same way on every host.

use std::path::Path;

/// Directories whose whole subtree is never hashed or watched.
pub const EXCLUDED_DIRS: &[&str] = &[
    "AppData",
    ".gemini",
    ".git",
    ".vscode",
    "__pycache__",
    "node_modules",
];

/// Hibernation, swap and registry hive files.
pub const EXCLUDED_FILES: &[&str] = &[
    "ntuser.dat",
    "pagefile.sys",
    "swapfile.sys",
    "dumpstack.log.tmp",
];

/// Temp, log, compiled bytecode and lock/journal extensions (lower case, with dot).
pub const EXCLUDED_EXTENSIONS: &[&str] = &[
    ".tmp",
    ".log",
    ".pyc",
    ".pyd",
    ".ldb",
    ".vscdb-journal",
    ".swp",
    ".lock",
];

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', '\\']).filter(|s| !s.is_empty())
}

/// Last path segment, or the whole string when it has no separator.
pub fn basename(path: &str) -> &str {
    segments(path).last().unwrap_or("")
}

/// Extension including the leading dot, following the usual splitext rule:
/// leading dots of the basename do not start an extension.
pub fn extension(name: &str) -> Option<&str> {
    let trimmed = name.trim_start_matches('.');
    let offset = name.len() - trimmed.len();
    trimmed.rfind('.').map(|idx| &name[offset + idx..])
}

/// Whether a single directory name is on the denylist.
pub fn is_excluded_dir(name: &str) -> bool {
    EXCLUDED_DIRS.iter().any(|d| d.eq_ignore_ascii_case(name))
}

/// Decide whether `path` is noise.
pub fn should_ignore(path: &str) -> bool {
    if segments(path).any(is_excluded_dir) {
        return true;
    }

    let name = basename(path);
    if EXCLUDED_FILES.iter().any(|f| f.eq_ignore_ascii_case(name)) {
        return true;
    }

    if let Some(ext) = extension(name) {
        let ext = ext.to_lowercase();
        if EXCLUDED_EXTENSIONS.contains(&ext.as_str()) {
            return true;
        }
    }

    name.starts_with('~') || name.starts_with('$')
}

/// `should_ignore` for filesystem paths; non UTF-8 names are checked lossily.
pub fn should_ignore_path(path: &Path) -> bool {
    should_ignore(&path.to_string_lossy())
}
