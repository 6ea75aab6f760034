//! The full maintenance sequence over one library.

use std::path::Path;

use crate::clean::{clean, clean_empty_dirs};
use crate::context::{BatchOutcome, RunContext, TaskError};
use crate::dedupe::deduplicate;
use crate::fix_ext::fix_extensions;
use crate::report::Task;
use crate::resort::resort;

/// Resort (when a destination is given), then repair extensions, deduplicate,
/// clean, and prune empty directories, all on `source`. Returns each step's
/// counters in order; the first fatal error ends the run.
pub fn run_all(
    ctx: &RunContext,
    source: &Path,
    destination: Option<&Path>,
) -> Result<Vec<(Task, BatchOutcome)>, TaskError> {
    let mut steps = Vec::new();

    if let Some(destination) = destination {
        steps.push((Task::Resort, resort(ctx, source, destination)?));
    }
    steps.push((Task::FixExtensions, fix_extensions(ctx, source)?));
    steps.push((Task::Deduplicate, deduplicate(ctx, source)?.outcome));
    steps.push((Task::Clean, clean(ctx, source)?));
    steps.push((Task::CleanEmptyDirs, clean_empty_dirs(ctx, source)?));

    log::debug!("Completed {} maintenance steps on {}", steps.len(), source.display());
    Ok(steps)
}
