//! File and folder naming: sanitizing tag text into path fragments, picking
//! collision-free destinations, and reading collision suffixes back.

use regex::Regex;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::fs::Filesystem;

/// Characters no platform we care about accepts in a path component.
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '|', '?', '*', '/', '\\'];

/// Limits in bytes, so a name plus its extension stays under NAME_MAX.
pub const FOLDER_NAME_LIMIT: usize = 100;
pub const FILE_NAME_LIMIT: usize = 150;

/// Multi-artist separators, highest priority first.
const ARTIST_SEPARATORS: &[&str] = &[";", ",", "/", "&"];

// "feat", "feat.", "ft", "ft." and "featuring" after whitespace, any case
static FEATURING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?:featuring|feat|ft)\b\.?").unwrap());

// "<stem>_<digits><.ext>", as left behind by resolve_unique_path. Matched on
// raw bytes so names that are not valid UTF-8 survive intact.
#[cfg(unix)]
static SUFFIX_RE: LazyLock<regex::bytes::Regex> =
    LazyLock::new(|| regex::bytes::Regex::new(r"(?-u)^(.*)_([0-9]+)(\.[^.]+)$").unwrap());

#[cfg(not(unix))]
static SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)_([0-9]+)(\.[^.]+)$").unwrap());

fn trim_dots_and_spaces(s: &str) -> &str {
    s.trim_matches(|c| c == '.' || c == ' ')
}

/// At most `limit` bytes, cut on a character boundary.
fn truncate_bytes(s: &str, limit: usize) -> String {
    let mut end = limit.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Folder name for an artist: forbidden characters dropped.
pub fn sanitize_folder(name: &str, fallback: &str) -> String {
    let stripped: String = name.chars().filter(|c| !FORBIDDEN.contains(c)).collect();
    let name = truncate_bytes(trim_dots_and_spaces(&stripped), FOLDER_NAME_LIMIT);
    if name.is_empty() {
        fallback.to_string()
    } else {
        name
    }
}

/// File name fragment: forbidden characters become `_` so distinct titles
/// stay distinct.
pub fn sanitize_file(name: &str, fallback: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .filter(|c| !c.is_ascii_control())
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let name = truncate_bytes(trim_dots_and_spaces(&collapsed), FILE_NAME_LIMIT);
    if name.is_empty() {
        fallback.to_string()
    } else {
        name
    }
}

/// First credited artist of a possibly multi-artist credit.
///
/// Separators are tried in priority order and the first one that occurs
/// anywhere in the credit is the one split on, even when a lower-priority
/// separator appears earlier: `"Bob & Alice, Carol"` gives `"Bob & Alice"`.
pub fn primary_artist(artist: &str) -> String {
    let artist = artist.trim();
    for sep in ARTIST_SEPARATORS {
        if artist.contains(sep) {
            return first_segment(artist.split(sep), artist);
        }
    }
    if FEATURING_RE.is_match(artist) {
        return first_segment(FEATURING_RE.split(artist), artist);
    }
    artist.to_string()
}

fn first_segment<'s>(parts: impl Iterator<Item = &'s str>, whole: &'s str) -> String {
    parts
        .map(str::trim)
        .find(|p| !p.is_empty())
        .unwrap_or(whole)
        .to_string()
}

/// `desired` if free, otherwise the first free `stem_N.ext` with N = 1, 2, …
///
/// Only the filesystem is consulted, so planned-but-unperformed moves are
/// invisible here.
pub fn resolve_unique_path(fs: &dyn Filesystem, desired: &Path) -> PathBuf {
    if !fs.exists(desired) {
        return desired.to_path_buf();
    }

    let stem = desired.file_stem().unwrap_or_default();
    let ext = desired.extension();

    let mut counter: u64 = 1;
    loop {
        let mut name = stem.to_os_string();
        name.push(format!("_{counter}"));
        if let Some(ext) = ext {
            name.push(".");
            name.push(ext);
        }
        let candidate = desired.with_file_name(name);
        if !fs.exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Base name with a trailing `_<digits>` collision suffix removed, if it
/// has one.
#[cfg(unix)]
pub fn canonical_name(file_name: &OsStr) -> Option<OsString> {
    use std::os::unix::ffi::{OsStrExt, OsStringExt};

    let caps = SUFFIX_RE.captures(file_name.as_bytes())?;
    let mut name = caps[1].to_vec();
    name.extend_from_slice(&caps[3]);
    Some(OsString::from_vec(name))
}

/// Base name with a trailing `_<digits>` collision suffix removed, if it
/// has one. Names that are not valid Unicode are left alone.
#[cfg(not(unix))]
pub fn canonical_name(file_name: &OsStr) -> Option<OsString> {
    let caps = SUFFIX_RE.captures(file_name.to_str()?)?;
    Some(format!("{}{}", &caps[1], &caps[3]).into())
}
