use std::fs::File;
use std::path::Path;

use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey, Tag, Value};
use symphonia::core::probe::{Hint, ProbeResult, ProbedMetadata};

use crate::error::CodecError;
use crate::models::AudioMetadata;

/// Metadata extractor for audio files using symphonia
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Probe `path` and return its container reader plus probed metadata
    pub fn probe(path: &Path) -> Result<ProbeResult, CodecError> {
        let file = File::open(path).map_err(|e| CodecError::OpenFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let media_source = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(ext_str) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext_str);
        }

        symphonia::default::get_probe()
            .format(&hint, media_source, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| CodecError::UnsupportedFormat {
                format: format!("Probe failed for {}: {}", path.display(), e),
            })
    }

    /// Read the tags and the length of an audio file without decoding it
    pub fn extract_from_file(path: &Path) -> Result<AudioMetadata, CodecError> {
        let probed = Self::probe(path)?;
        let mut format_reader = probed.format;

        let length = format_reader
            .default_track()
            .and_then(|track| {
                let frames = track.codec_params.n_frames?;
                let rate = track.codec_params.sample_rate?;
                Some((frames / rate as u64) as u32)
            })
            .unwrap_or(0);

        let mut metadata = Self::extract_from_format_reader(format_reader.as_mut(), probed.metadata);
        metadata.length = length;
        Ok(metadata)
    }

    /// Collect tags from probed metadata first, then from the container itself
    pub fn extract_from_format_reader(
        format_reader: &mut dyn FormatReader,
        mut probed_metadata: ProbedMetadata,
    ) -> AudioMetadata {
        let mut metadata = AudioMetadata::new();

        if let Some(probed_meta) = probed_metadata.get() {
            if let Some(revision) = probed_meta.current() {
                Self::extract_from_revision(revision, &mut metadata);
            }
        }

        if let Some(revision) = format_reader.metadata().current() {
            Self::extract_from_revision(revision, &mut metadata);
        }

        metadata
    }

    fn extract_from_revision(revision: &MetadataRevision, metadata: &mut AudioMetadata) {
        for tag in revision.tags() {
            Self::apply_tag(tag, metadata);
        }
    }

    fn apply_tag(tag: &Tag, metadata: &mut AudioMetadata) {
        let key = match tag.std_key {
            Some(StandardTagKey::TrackTitle) => "title".to_string(),
            Some(StandardTagKey::Artist) => "artist".to_string(),
            Some(StandardTagKey::AlbumArtist) => "albumartist".to_string(),
            Some(StandardTagKey::Album) => "album".to_string(),
            Some(StandardTagKey::TrackNumber) => "tracknumber".to_string(),
            Some(StandardTagKey::Date) => "date".to_string(),
            Some(StandardTagKey::Genre) => "genre".to_string(),
            Some(_) => return,
            None => tag.key.to_lowercase(),
        };
        Self::apply_value(&key, &tag.value, metadata);
    }

    /// Store one tag value under its lowercase key
    fn apply_value(key: &str, value: &Value, metadata: &mut AudioMetadata) {
        match (key, value) {
            ("title" | "tit2", Value::String(s)) => metadata.title = Some(s.clone()),
            ("artist" | "tpe1", Value::String(s)) => metadata.artist = Some(s.clone()),
            // Album artist only fills in a missing artist
            ("albumartist" | "tpe2", Value::String(s)) => {
                if metadata.artist.is_none() {
                    metadata.artist = Some(s.clone());
                }
            }
            ("album" | "talb", Value::String(s)) => metadata.album = Some(s.clone()),
            ("genre" | "tcon", Value::String(s)) => metadata.genre = Some(s.clone()),
            ("tracknumber" | "trck", Value::String(s)) => {
                if let Some(n) = parse_track_number(s) {
                    metadata.track_number = Some(n);
                }
            }
            ("tracknumber" | "trck", Value::UnsignedInt(n)) => {
                metadata.track_number = Some(*n as u32);
            }
            ("date" | "tyer" | "tdrc", Value::String(s)) => {
                if let Some(year) = parse_year(s) {
                    metadata.year = Some(year);
                }
            }
            ("date" | "tyer" | "tdrc", Value::UnsignedInt(n)) => {
                metadata.year = Some(*n as u32);
            }
            _ => {}
        }
    }
}

/// "3" or "3/12"
fn parse_track_number(value: &str) -> Option<u32> {
    value.split('/').next()?.trim().parse().ok()
}

/// "1999" or "1999-05-01"
fn parse_year(value: &str) -> Option<u32> {
    value.split('-').next()?.trim().parse().ok()
}
