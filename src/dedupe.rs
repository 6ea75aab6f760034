//! Duplicate removal by tag identity, followed by suffix renormalization.
//!
//! A run goes: analyze every audio file, group by normalized
//! "artist - title", keep the best file of each group, delete the rest, then
//! strip `_N` collision suffixes where the plain name has become free.
//! Names that stay ambiguous are reported as [`RenameCollision`]s.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::context::{BatchOutcome, RunContext, TaskError, file_name};
use crate::fs::Filesystem;
use crate::metadata::AudioFileRecord;
use crate::naming::canonical_name;
use crate::report::{Event, Task};

/// Identity key → every record carrying it, in discovery order.
pub type DuplicateGroups = BTreeMap<String, Vec<AudioFileRecord>>;

/// A suffixed file whose plain name is taken by a different file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameCollision {
    pub source: PathBuf,
    pub target: PathBuf,
}

#[derive(Debug, Default)]
pub struct DedupeReport {
    pub outcome: BatchOutcome,
    pub collisions: Vec<RenameCollision>,
}

pub fn deduplicate(ctx: &RunContext, source: &Path) -> Result<DedupeReport, TaskError> {
    ctx.begin(source)?;

    let files = ctx.audio_files(source)?;
    ctx.start(Task::Deduplicate, files.len());

    let mut outcome = BatchOutcome::default();
    let records = analyze_all(ctx, &files, &mut outcome);
    let groups = group_by_identity(records);

    let mut state = PlannedState::default();
    for (key, group) in groups {
        let Some((survivor, losers)) = split_survivor(group) else {
            continue;
        };
        log::debug!(
            "Keeping {} for \"{}\" over {} duplicate(s)",
            survivor.path().display(),
            key,
            losers.len()
        );
        for loser in &losers {
            remove_duplicate(ctx, loser.path(), &mut state, &mut outcome);
        }
    }

    let collisions = normalize_suffixes(ctx, source, &mut state, &mut outcome);
    report_collisions(ctx, &collisions);

    ctx.emit(Event::Finished);
    Ok(DedupeReport { outcome, collisions })
}

fn analyze_all(ctx: &RunContext, files: &[PathBuf], outcome: &mut BatchOutcome) -> Vec<AudioFileRecord> {
    let metadata = ctx.metadata();
    let mut records = Vec::with_capacity(files.len());
    for path in files {
        match metadata.analyze(path, records.len()) {
            Ok(record) => {
                records.push(record);
                outcome.processed += 1;
            }
            Err(e) => {
                outcome.errors += 1;
                ctx.skipped(path, e);
            }
        }
        ctx.emit(Event::Advanced);
    }
    records
}

pub fn group_by_identity(records: Vec<AudioFileRecord>) -> DuplicateGroups {
    let mut groups = DuplicateGroups::new();
    for record in records {
        groups.entry(record.identity_key()).or_default().push(record);
    }
    groups
}

/// Better files sort first: longer, then larger, then higher bitrate, then
/// discovered earlier.
pub fn compare_quality(a: &AudioFileRecord, b: &AudioFileRecord) -> Ordering {
    b.duration()
        .cmp(&a.duration())
        .then_with(|| b.size().cmp(&a.size()))
        .then_with(|| b.bitrate().cmp(&a.bitrate()))
        .then_with(|| a.sequence_index().cmp(&b.sequence_index()))
}

/// Best record and the rest, or `None` when there is nothing to deduplicate.
pub fn split_survivor(mut group: Vec<AudioFileRecord>) -> Option<(AudioFileRecord, Vec<AudioFileRecord>)> {
    if group.len() <= 1 {
        return None;
    }
    group.sort_by(compare_quality);
    let losers = group.split_off(1);
    let survivor = group.pop()?;
    Some((survivor, losers))
}

/// Removals and renames made (or, when simulating, planned) so far in the
/// run, layered over what the filesystem says.
#[derive(Debug, Default)]
struct PlannedState {
    gone: HashSet<PathBuf>,
    arrived: HashSet<PathBuf>,
}

impl PlannedState {
    fn exists(&self, fs: &dyn Filesystem, path: &Path) -> bool {
        self.arrived.contains(path) || (!self.gone.contains(path) && fs.exists(path))
    }

    fn removed(&mut self, path: &Path) {
        self.arrived.remove(path);
        self.gone.insert(path.to_path_buf());
    }

    fn moved(&mut self, from: &Path, to: &Path) {
        self.removed(from);
        self.gone.remove(to);
        self.arrived.insert(to.to_path_buf());
    }
}

fn remove_duplicate(ctx: &RunContext, path: &Path, state: &mut PlannedState, outcome: &mut BatchOutcome) {
    let simulated = ctx.simulate();
    if !simulated {
        if let Err(e) = ctx.fs.remove(path) {
            outcome.errors += 1;
            ctx.skipped(path, e);
            return;
        }
    }
    state.removed(path);
    outcome.removed += 1;
    ctx.emit(Event::Deleted {
        file: file_name(path),
        simulated,
    });
}

fn normalize_suffixes(
    ctx: &RunContext,
    source: &Path,
    state: &mut PlannedState,
    outcome: &mut BatchOutcome,
) -> Vec<RenameCollision> {
    let mut collisions = Vec::new();

    let files = match ctx.audio_files(source) {
        Ok(files) => files,
        Err(e) => {
            outcome.errors += 1;
            ctx.skipped(source, e);
            return collisions;
        }
    };

    for path in &files {
        if state.gone.contains(path) {
            continue;
        }
        let Some(canonical) = path.file_name().and_then(canonical_name) else {
            continue;
        };
        let target = path.with_file_name(&canonical);

        if state.exists(ctx.fs, &target) {
            collisions.push(RenameCollision {
                source: path.clone(),
                target,
            });
            continue;
        }

        let simulated = ctx.simulate();
        if !simulated {
            if let Err(e) = ctx.fs.move_file(path, &target) {
                outcome.errors += 1;
                ctx.skipped(path, e);
                continue;
            }
        }
        state.moved(path, &target);
        outcome.renamed += 1;
        ctx.emit(Event::Renamed {
            from: file_name(path),
            to: file_name(&target),
            simulated,
        });
    }

    collisions
}

fn report_collisions(ctx: &RunContext, collisions: &[RenameCollision]) {
    if collisions.is_empty() {
        return;
    }
    ctx.emit(Event::CollisionsFound {
        count: collisions.len(),
    });
    for c in collisions {
        ctx.emit(Event::Collision {
            from: file_name(&c.source),
            to: file_name(&c.target),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::fs::{FsError, LocalFs};
    use crate::metadata::MetadataAdapter;
    use crate::testutil::{FakeExtractor, Harness, RecordingReporter, snapshot, tagged, track};

    fn record(h: &Harness, path: &Path, index: usize) -> AudioFileRecord {
        MetadataAdapter::new(&h.extractor, &h.fs).analyze(path, index).unwrap()
    }

    #[test]
    fn longer_file_survives_and_suffix_is_not_needed() {
        let h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("A - X.mp3");
        let second = dir.path().join("A - X_2.mp3");
        h.add(&first, 300, track("A", "X", 200, 320));
        h.add(&second, 300, track("A", "X", 180, 128));

        let report = deduplicate(&h.ctx(false), dir.path()).unwrap();

        assert_eq!(report.outcome.processed, 2);
        assert_eq!(report.outcome.errors, 0);
        assert_eq!(report.outcome.removed, 1);
        assert!(first.is_file());
        assert!(!second.exists());
        assert!(report.collisions.is_empty());
    }

    #[test]
    fn survivor_ordering_walks_the_tie_breakers() {
        let h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        let p = |n: &str| dir.path().join(n);
        h.add(&p("a.mp3"), 100, track("A", "X", 200, 128));
        h.add(&p("b.mp3"), 500, track("A", "X", 199, 320));
        h.add(&p("c.mp3"), 150, track("A", "X", 200, 64));
        h.add(&p("d.mp3"), 150, track("A", "X", 200, 96));
        h.add(&p("e.mp3"), 150, track("A", "X", 200, 96));

        let group: Vec<_> = ["a.mp3", "b.mp3", "c.mp3", "d.mp3", "e.mp3"]
            .iter()
            .enumerate()
            .map(|(i, n)| record(&h, &p(n), i))
            .collect();
        let (survivor, losers) = split_survivor(group).unwrap();

        // duration 200 beats 199; size 150 beats 100; bitrate 96 beats 64;
        // d and e tie on everything, so the earlier one wins
        assert_eq!(survivor.path(), p("d.mp3"));
        let order: Vec<_> = losers.iter().map(|r| file_name(r.path())).collect();
        assert_eq!(order, vec!["e.mp3", "c.mp3", "a.mp3", "b.mp3"]);
    }

    #[test]
    fn missing_duration_loses_to_any_duration() {
        let h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.mp3");
        h.add(&a, 900, tagged("A", "X"));
        h.add(&b, 100, track("A", "X", 1, 8));
        let (survivor, _) = split_survivor(vec![record(&h, &a, 0), record(&h, &b, 1)]).unwrap();
        assert_eq!(survivor.path(), b);
    }

    #[test]
    fn singletons_are_not_groups() {
        let h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        h.add(&a, 10, tagged("A", "X"));
        assert!(split_survivor(vec![record(&h, &a, 0)]).is_none());
        assert!(split_survivor(Vec::new()).is_none());
    }

    #[test]
    fn grouping_ignores_case_and_spacing() {
        let h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.mp3");
        let c = dir.path().join("c.mp3");
        h.add(&a, 10, tagged("The Band", "Song"));
        h.add(&b, 10, tagged("the  band", " SONG"));
        h.add(&c, 10, tagged("The Band", "Other"));
        let groups = group_by_identity(vec![record(&h, &a, 0), record(&h, &b, 1), record(&h, &c, 2)]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["the band - song"].len(), 2);
    }

    #[test]
    fn second_run_deletes_nothing() {
        let h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        for (i, name) in ["x1.mp3", "x2.mp3", "x3.mp3"].iter().enumerate() {
            h.add(&dir.path().join(name), 100 + i, track("A", "X", 200, 128));
        }
        h.add(&dir.path().join("y.mp3"), 100, track("B", "Y", 100, 128));

        let first = deduplicate(&h.ctx(false), dir.path()).unwrap();
        assert_eq!(first.outcome.removed, 2);
        assert!(dir.path().join("x3.mp3").is_file());

        let second = deduplicate(&h.ctx(false), dir.path()).unwrap();
        assert_eq!(second.outcome.removed, 0);
        assert_eq!(second.outcome.processed, 2);
    }

    #[test]
    fn distinct_recordings_sharing_a_name_are_a_collision() {
        let h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("Artist - Title.mp3");
        let suffixed = dir.path().join("Artist - Title_1.mp3");
        h.add(&plain, 100, track("Artist", "Title", 200, 320));
        h.add(&suffixed, 200, track("Artist", "Title (Live)", 300, 320));

        let report = deduplicate(&h.ctx(false), dir.path()).unwrap();

        assert!(plain.is_file());
        assert!(suffixed.is_file());
        assert_eq!(std::fs::read(&plain).unwrap().len(), 100);
        assert_eq!(
            report.collisions,
            vec![RenameCollision {
                source: suffixed.clone(),
                target: plain.clone(),
            }]
        );
        let events = h.reporter.significant();
        assert!(events.contains(&Event::CollisionsFound { count: 1 }));
        assert!(events.contains(&Event::Collision {
            from: "Artist - Title_1.mp3".into(),
            to: "Artist - Title.mp3".into(),
        }));
    }

    #[test]
    fn orphaned_suffix_is_stripped() {
        let h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        h.add(&dir.path().join("B - Y_1.mp3"), 100, track("B", "Y", 100, 128));

        let report = deduplicate(&h.ctx(false), dir.path()).unwrap();

        assert_eq!(report.outcome.renamed, 1);
        assert!(dir.path().join("B - Y.mp3").is_file());
        assert!(!dir.path().join("B - Y_1.mp3").exists());
    }

    #[test]
    fn second_suffix_collides_with_first_rename() {
        let h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        h.add(&dir.path().join("S_1.mp3"), 100, track("A", "One", 100, 128));
        h.add(&dir.path().join("S_2.mp3"), 100, track("A", "Two", 100, 128));

        let report = deduplicate(&h.ctx(false), dir.path()).unwrap();

        assert_eq!(report.outcome.renamed, 1);
        assert!(dir.path().join("S.mp3").is_file());
        assert!(dir.path().join("S_2.mp3").is_file());
        assert_eq!(report.collisions.len(), 1);
    }

    #[test]
    fn unreadable_files_are_errors_and_left_alone() {
        let h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        h.add(&dir.path().join("a.mp3"), 100, track("A", "X", 100, 128));
        crate::testutil::write_file(&dir.path().join("junk.mp3"), 5, 0);

        let report = deduplicate(&h.ctx(false), dir.path()).unwrap();

        assert_eq!(report.outcome.processed, 1);
        assert_eq!(report.outcome.errors, 1);
        assert!(dir.path().join("junk.mp3").exists());
    }

    fn build_tree(h: &Harness, root: &Path) {
        h.add(&root.join("A - X.mp3"), 100, track("A", "X", 150, 128));
        h.add(&root.join("A - X_1.mp3"), 200, track("A", "X", 200, 320));
        h.add(&root.join("sub/B - Y.flac"), 100, track("B", "Y", 100, 900));
        h.add(&root.join("sub/B - Y_3.flac"), 100, track("B", "Y", 100, 900));
        h.add(&root.join("C - Z_1.m4a"), 100, track("C", "Z", 100, 256));
    }

    fn unsimulated(events: Vec<Event>) -> Vec<Event> {
        events
            .into_iter()
            .filter(|e| *e != Event::SimulateOnly)
            .map(|e| match e {
                Event::Deleted { file, .. } => Event::Deleted { file, simulated: false },
                Event::Renamed { from, to, .. } => Event::Renamed { from, to, simulated: false },
                other => other,
            })
            .collect()
    }

    #[test]
    fn simulation_matches_a_real_run_without_touching_anything() {
        let dry = Harness::new();
        let dry_dir = tempfile::tempdir().unwrap();
        build_tree(&dry, dry_dir.path());
        let before = snapshot(dry_dir.path());

        let dry_report = deduplicate(&dry.ctx(true), dry_dir.path()).unwrap();
        assert_eq!(before, snapshot(dry_dir.path()));
        assert_eq!(dry_report.outcome.processed, 5);

        let real = Harness::new();
        let real_dir = tempfile::tempdir().unwrap();
        build_tree(&real, real_dir.path());
        let real_report = deduplicate(&real.ctx(false), real_dir.path()).unwrap();

        assert_eq!(dry_report.outcome, real_report.outcome);
        assert_eq!(
            unsimulated(dry.reporter.significant()),
            real.reporter.significant()
        );
        // The worse "A - X.mp3" goes and the better copy takes its name.
        assert!(real_dir.path().join("A - X.mp3").is_file());
        assert_eq!(std::fs::read(real_dir.path().join("A - X.mp3")).unwrap().len(), 200);
        assert!(real_dir.path().join("C - Z.m4a").is_file());
    }

    /// Local filesystem whose removals and/or moves are refused.
    struct RefusingFs {
        remove: bool,
        rename: bool,
    }

    fn refused(op: &'static str, path: &Path) -> FsError {
        FsError::Io {
            op,
            path: path.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        }
    }

    impl Filesystem for RefusingFs {
        fn exists(&self, path: &Path) -> bool {
            LocalFs.exists(path)
        }
        fn is_dir(&self, path: &Path) -> bool {
            LocalFs.is_dir(path)
        }
        fn list_files(&self, root: &Path, patterns: &[&str]) -> crate::fs::Result<Vec<PathBuf>> {
            LocalFs.list_files(root, patterns)
        }
        fn list_directories(&self, root: &Path) -> crate::fs::Result<Vec<PathBuf>> {
            LocalFs.list_directories(root)
        }
        fn list_entries(&self, dir: &Path) -> crate::fs::Result<Vec<PathBuf>> {
            LocalFs.list_entries(dir)
        }
        fn file_size(&self, path: &Path) -> crate::fs::Result<u64> {
            LocalFs.file_size(path)
        }
        fn create_dir(&self, path: &Path) -> crate::fs::Result<()> {
            LocalFs.create_dir(path)
        }
        fn move_file(&self, src: &Path, dst: &Path) -> crate::fs::Result<()> {
            if self.rename {
                return Err(refused("move", src));
            }
            LocalFs.move_file(src, dst)
        }
        fn remove(&self, path: &Path) -> crate::fs::Result<()> {
            if self.remove {
                return Err(refused("remove", path));
            }
            LocalFs.remove(path)
        }
    }

    fn skipped_count(reporter: &RecordingReporter) -> usize {
        reporter
            .significant()
            .into_iter()
            .filter(|e| matches!(e, Event::FileSkipped { .. }))
            .count()
    }

    #[test]
    fn failed_deletions_are_counted_and_do_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor::default();
        for name in ["x1.mp3", "x2.mp3", "y1.mp3", "y2.mp3"] {
            let path = dir.path().join(name);
            crate::testutil::write_file(&path, 100, 0);
            let title = &name[..1];
            extractor.insert(&path, track("A", title, 100, 128));
        }
        let config = AppConfig::default();
        let reporter = RecordingReporter::default();
        let fs = RefusingFs { remove: true, rename: false };
        let ctx = RunContext::new(&config, &fs, &extractor, &reporter, false);

        let report = deduplicate(&ctx, dir.path()).unwrap();

        assert_eq!(report.outcome.processed, 4);
        assert_eq!(report.outcome.errors, 2);
        assert_eq!(report.outcome.removed, 0);
        assert_eq!(skipped_count(&reporter), 2);
    }

    #[test]
    fn failed_suffix_renames_are_counted_and_do_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor::default();
        let names = ["B - Y_1.mp3", "C - Z_1.mp3"];
        for (name, title) in names.iter().zip(["Y", "Z"]) {
            let path = dir.path().join(name);
            crate::testutil::write_file(&path, 100, 0);
            extractor.insert(&path, track("A", title, 100, 128));
        }
        let config = AppConfig::default();
        let reporter = RecordingReporter::default();
        let fs = RefusingFs { remove: false, rename: true };
        let ctx = RunContext::new(&config, &fs, &extractor, &reporter, false);

        let report = deduplicate(&ctx, dir.path()).unwrap();

        assert_eq!(report.outcome.processed, 2);
        assert_eq!(report.outcome.errors, 2);
        assert_eq!(report.outcome.renamed, 0);
        assert!(report.collisions.is_empty());
        assert_eq!(skipped_count(&reporter), 2);
        for name in names {
            assert!(dir.path().join(name).is_file());
        }
        assert!(!dir.path().join("B - Y.mp3").exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_collide_on_their_real_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join(OsStr::from_bytes(b"caf\xe9.mp3"));
        let suffixed = dir.path().join(OsStr::from_bytes(b"caf\xe9_1.mp3"));
        h.add(&plain, 100, track("A", "One", 100, 128));
        h.add(&suffixed, 100, track("A", "Two", 100, 128));

        let report = deduplicate(&h.ctx(false), dir.path()).unwrap();

        assert_eq!(report.outcome.renamed, 0);
        assert_eq!(
            report.collisions,
            vec![RenameCollision { source: suffixed.clone(), target: plain.clone() }]
        );
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(plain.is_file());
        assert!(suffixed.is_file());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_orphan_suffix_is_stripped_byte_for_byte() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        h.add(&dir.path().join(OsStr::from_bytes(b"na\xefve_2.flac")), 100, track("A", "X", 100, 128));

        let report = deduplicate(&h.ctx(false), dir.path()).unwrap();

        assert_eq!(report.outcome.renamed, 1);
        assert!(dir.path().join(OsStr::from_bytes(b"na\xefve.flac")).is_file());
    }

    #[test]
    fn missing_source_is_fatal() {
        let h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            deduplicate(&h.ctx(false), &dir.path().join("gone")),
            Err(TaskError::SourceMissing(_))
        ));
    }
}
