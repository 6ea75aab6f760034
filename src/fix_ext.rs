//! Rename files whose extension disagrees with the codec inside.

use std::path::Path;

use crate::ALL_FILES;
use crate::context::{BatchOutcome, RunContext, TaskError, file_name};
use crate::naming::resolve_unique_path;
use crate::report::{Event, Task};

/// Every file under `source` is decoded regardless of its name; `processed`
/// counts the renames.
pub fn fix_extensions(ctx: &RunContext, source: &Path) -> Result<BatchOutcome, TaskError> {
    ctx.begin(source)?;

    let files = ctx.list_files(source, ALL_FILES)?;
    ctx.start(Task::FixExtensions, files.len());

    let metadata = ctx.metadata();
    let mut outcome = BatchOutcome::default();
    for (index, path) in files.iter().enumerate() {
        ctx.emit(Event::Advanced);

        let wanted = match metadata
            .analyze(path, index)
            .and_then(|record| record.canonical_extension().map(str::to_string))
        {
            Ok(ext) => ext,
            Err(e) => {
                outcome.errors += 1;
                ctx.skipped(path, e);
                continue;
            }
        };

        let current = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());
        if current.as_deref() == Some(wanted.as_str()) {
            continue;
        }

        let mut name = path.file_stem().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(&wanted);
        let target = resolve_unique_path(ctx.fs, &path.with_file_name(name));
        log::debug!("{} holds {} data", path.display(), wanted);

        let simulated = ctx.simulate();
        if !simulated {
            if let Err(e) = ctx.fs.move_file(path, &target) {
                outcome.errors += 1;
                ctx.skipped(path, e);
                continue;
            }
        }
        outcome.processed += 1;
        outcome.renamed += 1;
        ctx.emit(Event::Renamed {
            from: file_name(path),
            to: file_name(&target),
            simulated,
        });
    }

    ctx.emit(Event::Finished);
    Ok(outcome)
}
