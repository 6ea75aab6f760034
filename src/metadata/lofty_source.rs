use std::path::Path;

use lofty::config::{ParseOptions, ParsingMode};
use lofty::file::{FileType, TaggedFile, TaggedFileExt};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag, TagType};

use super::tags::{TagExtractor, TagFamily, TagFields, TagTree, TagValue};

/// Tag extraction backed by lofty.
///
/// Files are parsed in strict mode and the file type is sniffed from the
/// content rather than trusted from the extension, so a mislabelled file
/// still reports its real codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyExtractor;

impl TagExtractor for LoftyExtractor {
    fn extract(&self, path: &Path) -> Result<TagTree, String> {
        let tagged_file = Probe::open(path)
            .map_err(|e| e.to_string())?
            .options(
                ParseOptions::new()
                    .parsing_mode(ParsingMode::Strict)
                    .read_cover_art(false),
            )
            .guess_file_type()
            .map_err(|e| e.to_string())?
            .read()
            .map_err(|e| {
                log::debug!("Could not read tags from {}: {}", path.display(), e);
                e.to_string()
            })?;

        Ok(tree_from(&tagged_file))
    }
}

fn tree_from(tagged_file: &TaggedFile) -> TagTree {
    let mut tree = TagTree::default();

    for tag in tagged_file.tags() {
        if let Some(family) = family_of(tag.tag_type()) {
            tree.containers.insert(family, container_fields(tag));
        }
    }

    let file_type = tagged_file.file_type();
    tree.stream_format = stream_format(file_type).map(TagValue::from);
    tree.file_format = file_format(file_type).map(TagValue::from);

    let props = tagged_file.properties();
    tree.bitrate = props.audio_bitrate().map(|b| TagValue::Integer(i64::from(b)));
    tree.playtime = Some(TagValue::Integer(props.duration().as_secs() as i64));

    tree
}

fn family_of(tag_type: TagType) -> Option<TagFamily> {
    match tag_type {
        TagType::Id3v2 => Some(TagFamily::Id3v2),
        TagType::Id3v1 => Some(TagFamily::Id3v1),
        TagType::Mp4Ilst => Some(TagFamily::QuickTime),
        TagType::VorbisComments => Some(TagFamily::VorbisComment),
        TagType::Ape => Some(TagFamily::Ape),
        TagType::RiffInfo => Some(TagFamily::RiffInfo),
        TagType::AiffText => Some(TagFamily::AiffText),
        _ => None,
    }
}

fn container_fields(tag: &Tag) -> TagFields {
    // ID3v2 keeps the album artist in TPE2, historically labelled "band".
    let album_artist = if tag.tag_type() == TagType::Id3v2 {
        "band"
    } else {
        "albumartist"
    };

    let mut fields = TagFields::new();
    put_strings(&mut fields, tag, "artist", &ItemKey::TrackArtist);
    put_strings(&mut fields, tag, album_artist, &ItemKey::AlbumArtist);
    put_strings(&mut fields, tag, "performer", &ItemKey::Performer);
    put_strings(&mut fields, tag, "title", &ItemKey::TrackTitle);
    put_strings(&mut fields, tag, "length", &ItemKey::Length);
    fields
}

fn put_strings(fields: &mut TagFields, tag: &Tag, name: &str, key: &ItemKey) {
    let mut values: Vec<TagValue> = tag.get_strings(key).map(TagValue::from).collect();
    let value = match values.len() {
        0 => return,
        1 => values.remove(0),
        _ => TagValue::List(values),
    };
    fields.insert(name.to_string(), value);
}

fn stream_format(file_type: FileType) -> Option<&'static str> {
    match file_type {
        FileType::Mpeg => Some("mp3"),
        FileType::Flac => Some("flac"),
        FileType::Mp4 => Some("mp4"),
        FileType::Aac => Some("aac"),
        FileType::Vorbis => Some("vorbis"),
        FileType::Opus => Some("opus"),
        FileType::Speex => Some("speex"),
        FileType::Wav => Some("wav"),
        FileType::Aiff => Some("aiff"),
        FileType::Ape => Some("monkeys audio"),
        FileType::WavPack => Some("wavpack"),
        FileType::Mpc => Some("musepack"),
        _ => None,
    }
}

fn file_format(file_type: FileType) -> Option<&'static str> {
    match file_type {
        FileType::Mpeg => Some("mp3"),
        FileType::Flac => Some("flac"),
        FileType::Mp4 => Some("quicktime"),
        FileType::Aac => Some("aac"),
        FileType::Vorbis | FileType::Opus | FileType::Speex => Some("ogg"),
        FileType::Wav => Some("riff"),
        FileType::Aiff => Some("aiff"),
        FileType::Ape => Some("mac"),
        FileType::WavPack => Some("wavpack"),
        FileType::Mpc => Some("mpc"),
        _ => None,
    }
}
