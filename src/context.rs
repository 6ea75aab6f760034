use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::AppConfig;
use crate::fs::{Filesystem, FsError};
use crate::metadata::MetadataAdapter;
use crate::metadata::tags::TagExtractor;
use crate::report::{Event, Reporter, Task};

/// Batch-level failures. Everything per-file is counted, not raised.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("source directory does not exist: {}", .0.display())]
    SourceMissing(PathBuf),
    #[error("cannot list {}: {source}", .path.display())]
    Listing {
        path: PathBuf,
        #[source]
        source: FsError,
    },
    #[error("cannot create destination {}: {source}", .path.display())]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: FsError,
    },
}

/// Counters every batch reports back.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub processed: usize,
    pub errors: usize,
    pub removed: usize,
    pub renamed: usize,
}

impl BatchOutcome {
    pub fn absorb(&mut self, other: BatchOutcome) {
        self.processed += other.processed;
        self.errors += other.errors;
        self.removed += other.removed;
        self.renamed += other.renamed;
    }
}

/// Collaborators and settings for one run, built once and passed down.
pub struct RunContext<'a> {
    pub config: &'a AppConfig,
    pub fs: &'a dyn Filesystem,
    pub extractor: &'a dyn TagExtractor,
    pub reporter: &'a dyn Reporter,
    simulate: bool,
}

impl<'a> RunContext<'a> {
    pub fn new(
        config: &'a AppConfig,
        fs: &'a dyn Filesystem,
        extractor: &'a dyn TagExtractor,
        reporter: &'a dyn Reporter,
        simulate: bool,
    ) -> Self {
        Self {
            config,
            fs,
            extractor,
            reporter,
            simulate: simulate || config.simulate_only,
        }
    }

    /// True when mutations must be reported instead of performed.
    pub fn simulate(&self) -> bool {
        self.simulate
    }

    pub fn metadata(&self) -> MetadataAdapter<'a> {
        MetadataAdapter::new(self.extractor, self.fs)
    }

    pub fn emit(&self, event: Event) {
        self.reporter.emit(event);
    }

    /// Common batch prologue: simulate note, then the source-directory check.
    pub fn begin(&self, source: &Path) -> Result<(), TaskError> {
        if self.simulate {
            self.emit(Event::SimulateOnly);
        }
        if !self.fs.is_dir(source) {
            self.emit(Event::SourceMissing { path: source.to_path_buf() });
            return Err(TaskError::SourceMissing(source.to_path_buf()));
        }
        Ok(())
    }

    /// Audio files under `source`, per the configured patterns.
    pub fn audio_files(&self, source: &Path) -> Result<Vec<PathBuf>, TaskError> {
        self.list_files(source, &self.config.patterns())
    }

    pub fn list_files(&self, source: &Path, patterns: &[&str]) -> Result<Vec<PathBuf>, TaskError> {
        self.fs
            .list_files(source, patterns)
            .map_err(|source_err| TaskError::Listing {
                path: source.to_path_buf(),
                source: source_err,
            })
    }

    pub fn start(&self, task: Task, total: usize) {
        self.emit(Event::Started { task, total });
    }

    pub fn skipped(&self, path: &Path, reason: impl ToString) {
        self.emit(Event::FileSkipped {
            file: file_name(path),
            reason: reason.to_string(),
        });
    }
}

/// Base name for display.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
