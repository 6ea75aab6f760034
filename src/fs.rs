//! Filesystem collaborator: the handful of primitives the engines need,
//! behind a trait so runs can be exercised against a scratch tree.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("cannot {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl FsError {
    fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        FsError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

pub trait Filesystem {
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Every regular file under `root` (recursively) whose name matches one
    /// of `patterns`, in a stable order.
    fn list_files(&self, root: &Path, patterns: &[&str]) -> Result<Vec<PathBuf>>;

    /// Every directory under `root`, excluding `root` itself.
    fn list_directories(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// Immediate children of `dir`.
    fn list_entries(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    fn file_size(&self, path: &Path) -> Result<u64>;

    fn create_dir(&self, path: &Path) -> Result<()>;

    fn move_file(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Remove a file, or an empty directory.
    fn remove(&self, path: &Path) -> Result<()>;
}

/// Name matching for `*`, `*.ext` and literal patterns. Extension matches
/// ignore case.
pub fn matches_pattern(file_name: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_prefix("*.") {
        Some(ext) => file_name
            .rsplit_once('.')
            .is_some_and(|(_, actual)| actual.eq_ignore_ascii_case(ext)),
        None => file_name == pattern,
    }
}

/// Number of components below the filesystem root.
pub fn depth(path: &Path) -> usize {
    path.components().count()
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    fn walk(&self, root: &Path) -> impl Iterator<Item = Result<walkdir::DirEntry>> {
        WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(Ok(e)),
                // Unreadable subtrees are skipped; only a bad root is fatal.
                Err(e) if e.depth() > 0 => {
                    log::warn!("Skipping unreadable entry: {}", e);
                    None
                }
                Err(e) => Some(Err(FsError::from(e))),
            })
    }
}

impl Filesystem for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_files(&self, root: &Path, patterns: &[&str]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in self.walk(root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if patterns.iter().any(|p| matches_pattern(&name, p)) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn list_directories(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in self.walk(root) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
            }
        }
        Ok(dirs)
    }

    fn list_entries(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let read = std::fs::read_dir(dir).map_err(|e| FsError::io("read", dir, e))?;
        let mut entries = Vec::new();
        for entry in read {
            let entry = entry.map_err(|e| FsError::io("read", dir, e))?;
            entries.push(entry.path());
        }
        Ok(entries)
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        std::fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| FsError::io("stat", path, e))
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| FsError::io("create", path, e))
    }

    fn move_file(&self, src: &Path, dst: &Path) -> Result<()> {
        match std::fs::rename(src, dst) {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                // rename(2) cannot cross devices; fall back to copy + delete.
                if std::fs::copy(src, dst).is_err() {
                    return Err(FsError::io("move", src, rename_err));
                }
                std::fs::remove_file(src).map_err(|e| FsError::io("move", src, e))
            }
        }
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let result = if path.is_dir() {
            std::fs::remove_dir(path)
        } else {
            std::fs::remove_file(path)
        };
        result.map_err(|e| FsError::io("remove", path, e))
    }
}
