//! Format-neutral tag tree handed over by the extraction collaborator.

use std::collections::BTreeMap;
use std::path::Path;

/// A raw tag value as the decoder saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    Integer(i64),
    Float(f64),
    List(Vec<TagValue>),
}

impl TagValue {
    /// Multi-valued fields resolve to their first element.
    fn first(&self) -> Option<&TagValue> {
        match self {
            TagValue::List(items) => items.first().and_then(TagValue::first),
            other => Some(other),
        }
    }

    /// Trimmed, non-empty text.
    pub fn as_text(&self) -> Option<String> {
        match self.first()? {
            TagValue::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            TagValue::Integer(n) => Some(n.to_string()),
            TagValue::Float(x) => Some(x.to_string()),
            TagValue::List(_) => None,
        }
    }

    /// Integer view of a numeric value (numeric text included), truncating
    /// fractions. Non-numeric values have none.
    pub fn as_integer(&self) -> Option<i64> {
        match self.first()? {
            TagValue::Integer(n) => Some(*n),
            TagValue::Float(x) if x.is_finite() => Some(x.trunc() as i64),
            TagValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|x| x.is_finite()).map(|x| x.trunc() as i64))
            }
            _ => None,
        }
    }

    /// Strictly positive integer; zero and negatives count as absent.
    pub fn as_positive(&self) -> Option<u64> {
        self.as_integer().filter(|n| *n > 0).map(|n| n as u64)
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        TagValue::Text(s.to_string())
    }
}

impl From<i64> for TagValue {
    fn from(n: i64) -> Self {
        TagValue::Integer(n)
    }
}

/// Tag container families, in resolution preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagFamily {
    Id3v2,
    Id3v1,
    QuickTime,
    VorbisComment,
    Ape,
    RiffInfo,
    AiffText,
}

impl TagFamily {
    /// Families the adapter will take artist/title from.
    pub const RECOGNIZED: [TagFamily; 4] = [
        TagFamily::Id3v2,
        TagFamily::Id3v1,
        TagFamily::QuickTime,
        TagFamily::VorbisComment,
    ];
}

pub type TagFields = BTreeMap<String, TagValue>;

/// Everything the decoder reports about one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagTree {
    pub containers: BTreeMap<TagFamily, TagFields>,
    /// Codec of the first audio stream.
    pub stream_format: Option<TagValue>,
    /// Container-level format.
    pub file_format: Option<TagValue>,
    /// Audio bitrate in kbps.
    pub bitrate: Option<TagValue>,
    /// Stream playtime in seconds.
    pub playtime: Option<TagValue>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl TagTree {
    pub fn with_container(mut self, family: TagFamily, fields: &[(&str, TagValue)]) -> Self {
        let entry = self.containers.entry(family).or_default();
        for (key, value) in fields {
            entry.insert(key.to_string(), value.clone());
        }
        self
    }

    /// Any signal from the decoder that it did not fully trust the file.
    pub fn diagnostics(&self) -> Option<String> {
        let all: Vec<&str> = self
            .errors
            .iter()
            .chain(self.warnings.iter())
            .map(String::as_str)
            .collect();
        (!all.is_empty()).then(|| all.join("; "))
    }
}

/// The external decoder. Failing to open or parse the file at all is an
/// `Err`; softer complaints go in [`TagTree::errors`]/[`TagTree::warnings`].
pub trait TagExtractor {
    fn extract(&self, path: &Path) -> Result<TagTree, String>;
}
