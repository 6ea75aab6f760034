//! Fakes for the decoder and reporter collaborators, plus tree helpers.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::context::RunContext;
use crate::fs::LocalFs;
use crate::metadata::tags::{TagExtractor, TagFamily, TagTree, TagValue};
use crate::report::{Event, Reporter};

/// Decoder that answers from a fixed table keyed by path.
#[derive(Default)]
pub struct FakeExtractor {
    trees: RefCell<HashMap<PathBuf, TagTree>>,
}

impl FakeExtractor {
    pub fn with(self, path: &Path, tree: TagTree) -> Self {
        self.insert(path, tree);
        self
    }

    pub fn insert(&self, path: &Path, tree: TagTree) {
        self.trees.borrow_mut().insert(path.to_path_buf(), tree);
    }
}

impl TagExtractor for FakeExtractor {
    fn extract(&self, path: &Path) -> Result<TagTree, String> {
        self.trees
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| format!("no audio stream in {}", path.display()))
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    pub events: RefCell<Vec<Event>>,
}

impl RecordingReporter {
    /// Events minus progress ticks.
    pub fn significant(&self) -> Vec<Event> {
        self.events
            .borrow()
            .iter()
            .filter(|e| !matches!(e, Event::Started { .. } | Event::Advanced | Event::Finished))
            .cloned()
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn emit(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

/// ID3v2-tagged tree with the given artist and title.
pub fn tagged(artist: &str, title: &str) -> TagTree {
    TagTree::default().with_container(
        TagFamily::Id3v2,
        &[("artist", artist.into()), ("title", title.into())],
    )
}

/// Tagged tree with duration (seconds) and bitrate (kbps) set.
pub fn track(artist: &str, title: &str, duration: i64, bitrate: i64) -> TagTree {
    let mut tree = tagged(artist, title);
    tree.playtime = Some(TagValue::Integer(duration));
    tree.bitrate = Some(TagValue::Integer(bitrate));
    tree.stream_format = Some("mp3".into());
    tree
}

/// Create a file of `size` bytes filled with `fill`, making parent dirs.
pub fn write_file(path: &Path, size: usize, fill: u8) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, vec![fill; size]).unwrap();
}

/// Relative path → contents of every file and directory under `root`.
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            let contents = e.file_type().is_file().then(|| std::fs::read(e.path()).unwrap());
            (rel, contents)
        })
        .collect()
}

/// Everything a test run needs, owned in one place.
pub struct Harness {
    pub config: AppConfig,
    pub fs: LocalFs,
    pub extractor: FakeExtractor,
    pub reporter: RecordingReporter,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            fs: LocalFs,
            extractor: FakeExtractor::default(),
            reporter: RecordingReporter::default(),
        }
    }

    pub fn ctx(&self, simulate: bool) -> RunContext<'_> {
        RunContext::new(&self.config, &self.fs, &self.extractor, &self.reporter, simulate)
    }

    /// Write an audio file and register its tags.
    pub fn add(&self, path: &Path, size: usize, tree: TagTree) {
        write_file(path, size, size as u8);
        self.extractor.insert(path, tree);
    }
}
