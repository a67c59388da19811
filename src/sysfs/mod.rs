//! # Hardware Control Surface
//!
//! Small text attributes addressed by path: battery capacity and status,
//! LED brightness, RGB intensity. The kernel names LED and power-supply
//! directories after the input number it assigned, so callers locate them
//! with [`ControlSurface::glob`] instead of hard-coding paths.
//!
//! [`SysFs`] talks to the real filesystem; tests use [`mocks::FakeSurface`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Trait for attribute-level hardware access
pub trait ControlSurface: Send + Sync {
    /// Read an attribute, with surrounding whitespace removed
    fn read_attr(&self, path: &Path) -> io::Result<String>;

    /// Write an attribute
    fn write_attr(&self, path: &Path, value: &str) -> io::Result<()>;

    /// List existing paths matching `pattern`, sorted
    ///
    /// Only the final path component may contain wildcards (`*`, `?`).
    /// A missing parent directory yields an empty list.
    fn glob(&self, pattern: &Path) -> io::Result<Vec<PathBuf>>;

    /// Whether `path` currently exists
    fn exists(&self, path: &Path) -> bool;
}

/// Real sysfs/devfs access through `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct SysFs;

impl ControlSurface for SysFs {
    fn read_attr(&self, path: &Path) -> io::Result<String> {
        Ok(fs::read_to_string(path)?.trim().to_string())
    }

    fn write_attr(&self, path: &Path, value: &str) -> io::Result<()> {
        fs::write(path, value)
    }

    fn glob(&self, pattern: &Path) -> io::Result<Vec<PathBuf>> {
        let (dir, name_pattern) = split_pattern(pattern)?;

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut matches = Vec::new();
        for entry in entries {
            let entry = entry?;
            if wildcard_match(name_pattern, &entry.file_name().to_string_lossy()) {
                matches.push(entry.path());
            }
        }

        // Deterministic order when several entries match
        matches.sort();
        Ok(matches)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Split a glob pattern into its literal directory and file-name pattern
pub(crate) fn split_pattern(pattern: &Path) -> io::Result<(&Path, &str)> {
    let dir = pattern.parent().unwrap_or_else(|| Path::new("."));
    let name = pattern
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid glob pattern: {}", pattern.display()),
            )
        })?;
    Ok((dir, name))
}

/// Match a file name against a pattern where `*` matches any run of
/// characters and `?` matches exactly one
pub(crate) fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, n));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            n = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeState {
        files: BTreeMap<PathBuf, String>,
        dirs: BTreeSet<PathBuf>,
        writes: Vec<(PathBuf, String)>,
        write_error: Option<io::ErrorKind>,
    }

    /// In-memory control surface for testing
    ///
    /// Writes are recorded and also stored, so a later read sees them.
    /// Globs match against every known file and directory.
    #[derive(Clone, Default)]
    pub struct FakeSurface {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeSurface {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_file(&self, path: impl Into<PathBuf>, value: &str) {
            let path = path.into();
            let mut state = self.state.lock().unwrap();
            let mut parent = path.parent();
            while let Some(dir) = parent {
                state.dirs.insert(dir.to_path_buf());
                parent = dir.parent();
            }
            state.files.insert(path, value.to_string());
        }

        pub fn add_dir(&self, path: impl Into<PathBuf>) {
            let path = path.into();
            let mut state = self.state.lock().unwrap();
            let mut current = Some(path.as_path());
            while let Some(dir) = current {
                state.dirs.insert(dir.to_path_buf());
                current = dir.parent();
            }
        }

        /// Remove a path and everything below it
        pub fn remove(&self, path: impl AsRef<Path>) {
            let path = path.as_ref();
            let mut state = self.state.lock().unwrap();
            state.files.retain(|p, _| !p.starts_with(path));
            state.dirs.retain(|p| !p.starts_with(path));
        }

        pub fn get_writes(&self) -> Vec<(PathBuf, String)> {
            self.state.lock().unwrap().writes.clone()
        }

        pub fn write_count(&self) -> usize {
            self.state.lock().unwrap().writes.len()
        }

        pub fn clear_writes(&self) {
            self.state.lock().unwrap().writes.clear();
        }

        pub fn set_write_error(&self, error: Option<io::ErrorKind>) {
            self.state.lock().unwrap().write_error = error;
        }
    }

    impl ControlSurface for FakeSurface {
        fn read_attr(&self, path: &Path) -> io::Result<String> {
            self.state
                .lock()
                .unwrap()
                .files
                .get(path)
                .map(|value| value.trim().to_string())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Mock file not found"))
        }

        fn write_attr(&self, path: &Path, value: &str) -> io::Result<()> {
            let mut state = self.state.lock().unwrap();
            if let Some(error) = state.write_error {
                return Err(io::Error::new(error, "Mock write error"));
            }
            state.writes.push((path.to_path_buf(), value.to_string()));
            state.files.insert(path.to_path_buf(), value.to_string());
            Ok(())
        }

        fn glob(&self, pattern: &Path) -> io::Result<Vec<PathBuf>> {
            let (dir, name_pattern) = split_pattern(pattern)?;
            let state = self.state.lock().unwrap();
            let matches: BTreeSet<PathBuf> = state
                .files
                .keys()
                .chain(state.dirs.iter())
                .filter(|p| p.parent() == Some(dir))
                .filter(|p| {
                    p.file_name()
                        .map(|name| wildcard_match(name_pattern, &name.to_string_lossy()))
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
            Ok(matches.into_iter().collect())
        }

        fn exists(&self, path: &Path) -> bool {
            let state = self.state.lock().unwrap();
            state.files.contains_key(path) || state.dirs.contains(path)
        }
    }
}
