pub mod lofty_source;
pub mod tags;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::fs::{Filesystem, FsError};
use tags::{TagExtractor, TagFamily, TagFields, TagTree, TagValue};

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("unreadable audio file: {0}")]
    Unreadable(String),
    #[error("decoder reported: {0}")]
    DecoderReported(String),
    #[error("no tags found in metadata")]
    NoTags,
    #[error("no id3v2/id3v1/quicktime/vorbis tags found")]
    NoRecognizedTags,
    #[error("no artist information found in metadata")]
    NoArtist,
    #[error("no title information found in metadata")]
    NoTitle,
    #[error("unknown format: {0}")]
    UnknownFormat(String),
    #[error(transparent)]
    Size(#[from] FsError),
}

pub type Result<T> = std::result::Result<T, MetadataError>;

/// Artist fields, in fallback order.
const ARTIST_FIELDS: &[&str] = &["artist", "albumartist", "band", "performer"];
const TITLE_FIELDS: &[&str] = &["title"];

/// Detected codec → the extension a file of that codec should carry.
const EXTENSION_MAP: &[(&str, &str)] = &[
    ("mp3", "mp3"),
    ("mp2", "mp2"),
    ("mp1", "mp1"),
    ("flac", "flac"),
    ("wav", "wav"),
    ("wma", "wma"),
    ("vorbis", "ogg"),
    ("aac", "m4a"),
    ("mp4", "m4a"),
    ("quicktime", "m4a"),
];

/// Canonical file extension for a lower-cased codec name.
pub fn canonical_extension(format: &str) -> Option<&'static str> {
    EXTENSION_MAP
        .iter()
        .find(|(codec, _)| *codec == format)
        .map(|(_, ext)| *ext)
}

/// Identity and quality attributes of one audio file, fixed at analysis time.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFileRecord {
    path: PathBuf,
    artist: String,
    title: String,
    duration: Option<u64>,
    bitrate: Option<u64>,
    format: Option<String>,
    size: u64,
    sequence_index: usize,
}

impl AudioFileRecord {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full artist credit, possibly naming several artists.
    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Seconds; absent when nothing reported a positive length.
    pub fn duration(&self) -> Option<u64> {
        self.duration
    }

    /// `Some(0)` is kept as-is: it marks a broken stream.
    pub fn bitrate(&self) -> Option<u64> {
        self.bitrate
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Position in discovery order; the last tie-breaker between duplicates.
    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    pub fn canonical_extension(&self) -> Result<&'static str> {
        let format = self.format.as_deref().unwrap_or_default();
        canonical_extension(format).ok_or_else(|| MetadataError::UnknownFormat(format.to_string()))
    }

    /// Identity key: lower-cased, whitespace-collapsed "artist - title".
    pub fn identity_key(&self) -> String {
        identity_key(&self.artist, &self.title)
    }
}

pub fn identity_key(artist: &str, title: &str) -> String {
    format!("{} - {}", artist, title)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Turns decoder output into [`AudioFileRecord`]s.
pub struct MetadataAdapter<'a> {
    extractor: &'a dyn TagExtractor,
    fs: &'a dyn Filesystem,
}

impl<'a> MetadataAdapter<'a> {
    pub fn new(extractor: &'a dyn TagExtractor, fs: &'a dyn Filesystem) -> Self {
        Self { extractor, fs }
    }

    pub fn analyze(&self, path: &Path, sequence_index: usize) -> Result<AudioFileRecord> {
        let tree = self
            .extractor
            .extract(path)
            .map_err(MetadataError::Unreadable)?;

        if let Some(diagnostics) = tree.diagnostics() {
            return Err(MetadataError::DecoderReported(diagnostics));
        }

        let tags = select_container(&tree)?;
        let artist = first_text(tags, ARTIST_FIELDS).ok_or(MetadataError::NoArtist)?;
        let title = first_text(tags, TITLE_FIELDS).ok_or(MetadataError::NoTitle)?;
        let size = self.fs.file_size(path)?;

        Ok(AudioFileRecord {
            path: path.to_path_buf(),
            artist,
            title,
            duration: duration(&tree, tags),
            bitrate: bitrate(&tree),
            format: format(&tree),
            size,
            sequence_index,
        })
    }
}

fn select_container(tree: &TagTree) -> Result<&TagFields> {
    if tree.containers.is_empty() {
        return Err(MetadataError::NoTags);
    }
    TagFamily::RECOGNIZED
        .iter()
        .find_map(|family| tree.containers.get(family))
        .ok_or(MetadataError::NoRecognizedTags)
}

/// First field, in order, holding non-blank text.
fn first_text(tags: &TagFields, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|field| tags.get(*field).and_then(TagValue::as_text))
}

fn duration(tree: &TagTree, tags: &TagFields) -> Option<u64> {
    // Tag lengths are milliseconds (ID3v2 TLEN); stream playtime is seconds.
    tags.get("length")
        .and_then(TagValue::as_positive)
        .map(|ms| ms / 1000)
        .filter(|secs| *secs > 0)
        .or_else(|| tree.playtime.as_ref().and_then(TagValue::as_positive))
}

fn bitrate(tree: &TagTree) -> Option<u64> {
    tree.bitrate
        .as_ref()
        .and_then(TagValue::as_integer)
        .filter(|b| *b >= 0)
        .map(|b| b as u64)
}

fn format(tree: &TagTree) -> Option<String> {
    tree.stream_format
        .as_ref()
        .and_then(TagValue::as_text)
        .or_else(|| tree.file_format.as_ref().and_then(TagValue::as_text))
        .map(|f| f.to_lowercase())
}
