//! Removal of invalid audio files and of directories left empty.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::context::{BatchOutcome, RunContext, TaskError, file_name};
use crate::fs::depth;
use crate::report::{Event, Task};

/// Delete audio files that are too small or whose metadata does not hold up.
pub fn clean(ctx: &RunContext, source: &Path) -> Result<BatchOutcome, TaskError> {
    ctx.begin(source)?;

    let files = ctx.audio_files(source)?;
    ctx.start(Task::Clean, files.len());

    let min_size = ctx.config.min_file_size;
    let mut outcome = BatchOutcome::default();
    for path in &files {
        outcome.processed += 1;
        ctx.emit(Event::Advanced);

        let size = match ctx.fs.file_size(path) {
            Ok(size) => size,
            Err(e) => {
                outcome.errors += 1;
                ctx.skipped(path, e);
                continue;
            }
        };
        let reason = if size < min_size {
            format!("{} bytes, below the {} byte minimum", size, min_size)
        } else if let Some(problem) = integrity_problem(ctx, path) {
            problem
        } else {
            continue;
        };
        log::debug!("{} is invalid: {}", path.display(), reason);

        let simulated = ctx.simulate();
        if !simulated {
            if let Err(e) = ctx.fs.remove(path) {
                outcome.errors += 1;
                ctx.skipped(path, e);
                continue;
            }
        }
        outcome.removed += 1;
        ctx.emit(Event::Deleted {
            file: file_name(path),
            simulated,
        });
    }

    ctx.emit(Event::Finished);
    Ok(outcome)
}

/// Why the file is not intact, or `None` if it is. A file the decoder
/// rejects is not intact.
fn integrity_problem(ctx: &RunContext, path: &Path) -> Option<String> {
    let record = match ctx.metadata().analyze(path, 0) {
        Ok(record) => record,
        Err(e) => return Some(e.to_string()),
    };
    if record.duration().is_none() {
        return Some("no positive duration".into());
    }
    if record.bitrate() == Some(0) {
        return Some("zero bitrate".into());
    }
    None
}

/// Remove empty directories below `source`, deepest first, so a parent
/// emptied by the removal of its children goes in the same pass. `source`
/// itself is kept.
pub fn clean_empty_dirs(ctx: &RunContext, source: &Path) -> Result<BatchOutcome, TaskError> {
    ctx.begin(source)?;

    let mut dirs = ctx.fs.list_directories(source).map_err(|e| TaskError::Listing {
        path: source.to_path_buf(),
        source: e,
    })?;
    // stable, so siblings keep their walk order
    dirs.sort_by_key(|d| std::cmp::Reverse(depth(d)));
    ctx.start(Task::CleanEmptyDirs, dirs.len());

    let mut outcome = BatchOutcome::default();
    let mut gone: HashSet<PathBuf> = HashSet::new();
    for dir in &dirs {
        outcome.processed += 1;
        ctx.emit(Event::Advanced);

        let entries = match ctx.fs.list_entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                outcome.errors += 1;
                ctx.skipped(dir, e);
                continue;
            }
        };
        if !entries.iter().all(|e| gone.contains(e)) {
            continue;
        }

        let simulated = ctx.simulate();
        if !simulated {
            if let Err(e) = ctx.fs.remove(dir) {
                outcome.errors += 1;
                ctx.skipped(dir, e);
                continue;
            }
        }
        gone.insert(dir.clone());
        outcome.removed += 1;
        ctx.emit(Event::DirRemoved {
            path: dir.clone(),
            simulated,
        });
    }

    ctx.emit(Event::Finished);
    Ok(outcome)
}
