//! Move audio files into `<destination>/<Artist>/<Artist> - <Title>.<ext>`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::context::{BatchOutcome, RunContext, TaskError, file_name};
use crate::fs::FsError;
use crate::metadata::{AudioFileRecord, MetadataError};
use crate::naming::{canonical_name, primary_artist, resolve_unique_path, sanitize_file, sanitize_folder};
use crate::report::{Event, Task};

#[derive(Error, Debug)]
pub enum ResortError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Fs(#[from] FsError),
}

/// Sort every audio file under `source` into per-artist folders below
/// `destination`. Per-file failures are counted and the batch continues.
pub fn resort(ctx: &RunContext, source: &Path, destination: &Path) -> Result<BatchOutcome, TaskError> {
    ctx.begin(source)?;

    let mut placer = Placer::new(ctx, destination);
    placer
        .ensure_dir(destination)
        .map_err(|err| TaskError::CreateDestination {
            path: destination.to_path_buf(),
            source: err,
        })?;

    let files = ctx.audio_files(source)?;
    ctx.start(Task::Resort, files.len());

    let mut outcome = BatchOutcome::default();
    for (index, path) in files.iter().enumerate() {
        match placer.place(path, index) {
            Ok(()) => outcome.processed += 1,
            Err(e) => {
                log::debug!("Resort failed for {}: {}", path.display(), e);
                outcome.errors += 1;
                ctx.skipped(path, e);
            }
        }
        ctx.emit(Event::Advanced);
    }

    ctx.emit(Event::Finished);
    Ok(outcome)
}

struct Placer<'c, 'a> {
    ctx: &'c RunContext<'a>,
    destination: PathBuf,
    /// Folders created (or, when simulating, announced) during this run.
    made_dirs: HashSet<PathBuf>,
}

impl<'c, 'a> Placer<'c, 'a> {
    fn new(ctx: &'c RunContext<'a>, destination: &Path) -> Self {
        Self {
            ctx,
            destination: destination.to_path_buf(),
            made_dirs: HashSet::new(),
        }
    }

    fn ensure_dir(&mut self, dir: &Path) -> Result<(), FsError> {
        if self.made_dirs.contains(dir) || self.ctx.fs.exists(dir) {
            return Ok(());
        }
        let simulated = self.ctx.simulate();
        if !simulated {
            self.ctx.fs.create_dir(dir)?;
        }
        self.ctx.emit(Event::DirCreated {
            path: dir.to_path_buf(),
            simulated,
        });
        self.made_dirs.insert(dir.to_path_buf());
        Ok(())
    }

    fn place(&mut self, path: &Path, index: usize) -> Result<(), ResortError> {
        let record = self.ctx.metadata().analyze(path, index)?;
        let artist = primary_artist(record.artist());

        let folder = sanitize_folder(&artist, &self.ctx.config.fallback_artist_folder);
        let artist_dir = self.destination.join(&folder);
        self.ensure_dir(&artist_dir)?;

        let stem = sanitize_file(
            &format!("{} - {}", artist, record.title()),
            &self.ctx.config.fallback_file_name,
        );
        let desired = artist_dir.join(format!("{}.{}", stem, extension_for(&record)?));

        if already_placed(path, &desired) {
            log::debug!("{} is already in place", path.display());
            return Ok(());
        }

        let target = resolve_unique_path(self.ctx.fs, &desired);
        let simulated = self.ctx.simulate();
        if !simulated {
            self.ctx.fs.move_file(path, &target)?;
        }
        self.ctx.emit(Event::Moved {
            file: file_name(path),
            dest: Path::new(&folder).join(file_name(&target)),
            simulated,
        });
        Ok(())
    }
}

/// The file's own extension, lower-cased; the codec's when it has none.
fn extension_for(record: &AudioFileRecord) -> Result<String, MetadataError> {
    match record.path().extension() {
        Some(ext) => Ok(ext.to_string_lossy().to_lowercase()),
        None => record.canonical_extension().map(str::to_string),
    }
}

/// `path` already is `desired`, or a suffixed sibling of it.
fn already_placed(path: &Path, desired: &Path) -> bool {
    if path == desired {
        return true;
    }
    if path.parent() != desired.parent() {
        return false;
    }
    path.file_name()
        .and_then(canonical_name)
        .is_some_and(|canonical| Some(canonical.as_os_str()) == desired.file_name())
}
