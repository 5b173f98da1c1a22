use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatReader, SeekMode, SeekTo};
use symphonia::core::units::Time;

use crate::audio::{AudioBuffer, AudioMetadata, Codec, CodecFactory, Format, MetadataExtractor};
use crate::error::CodecError;

/// Extensions decoded through symphonia by default
pub const DEFAULT_EXTENSIONS: &[&str] = &["flac", "wav", "mp3", "ogg", "oga", "m4a", "aac", "alac"];

struct OpenStream {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
}

/// Decoder for every container and codec symphonia supports
pub struct SymphoniaCodec {
    path: PathBuf,
    stream: Option<OpenStream>,
    format: Format,
    metadata: AudioMetadata,
}

impl SymphoniaCodec {
    /// Create a codec for `path`. Nothing is read before `open`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            stream: None,
            format: Format::new(0, 0),
            metadata: AudioMetadata::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Codec for SymphoniaCodec {
    fn open(&mut self) -> Result<(), CodecError> {
        let probed = MetadataExtractor::probe(&self.path)?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| CodecError::UnsupportedFormat {
                format: format!("No audio track found in {}", self.path.display()),
            })?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| CodecError::OpenFailed {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

        let rate = params.sample_rate.unwrap_or(44100);
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(2);
        self.format = Format::new(rate, channels);
        self.format.validate().map_err(|e| CodecError::OpenFailed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        self.metadata = MetadataExtractor::extract_from_format_reader(format_reader.as_mut(), probed.metadata);
        if let Some(frames) = params.n_frames {
            self.metadata.length = (frames / rate as u64) as u32;
        }

        debug!("Opened {} ({})", self.path.display(), self.format);

        self.stream = Some(OpenStream {
            format_reader,
            decoder,
            track_id,
        });
        Ok(())
    }

    fn format(&self) -> Format {
        self.format
    }

    fn decode(&mut self) -> Result<Option<AudioBuffer>, CodecError> {
        let stream = self.stream.as_mut().ok_or(CodecError::NotOpened)?;

        loop {
            let packet = match stream.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(err) => {
                    return Err(CodecError::DecodeFailed(format!("Failed to read packet: {}", err)));
                }
            };

            // Only process packets for our track
            if packet.track_id() != stream.track_id {
                continue;
            }

            let decoded = match stream.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // A corrupt packet is skipped, the stream may still recover
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping corrupt packet in {}: {}", self.path.display(), e);
                    continue;
                }
                Err(e) => return Err(CodecError::DecodeFailed(format!("Failed to decode packet: {}", e))),
            };

            let spec = *decoded.spec();
            if decoded.frames() == 0 {
                continue;
            }

            let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            samples.copy_interleaved_ref(decoded);

            return Ok(Some(AudioBuffer::from_interleaved(
                samples.samples().to_vec(),
                spec.channels.count() as u16,
                spec.rate,
            )));
        }
    }

    fn seek(&mut self, frame: u64) -> Result<(), CodecError> {
        let rate = self.format.rate as u64;
        let stream = self.stream.as_mut().ok_or(CodecError::NotOpened)?;

        let time = Time::new(frame / rate, (frame % rate) as f64 / rate as f64);
        stream
            .format_reader
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time,
                    track_id: Some(stream.track_id),
                },
            )
            .map_err(|e| CodecError::SeekError(format!("Seek failed: {}", e)))?;

        // Reset the decoder state after seeking
        stream.decoder.reset();
        Ok(())
    }

    fn metadata(&self) -> &AudioMetadata {
        &self.metadata
    }
}

type Constructor = Box<dyn Fn(&Path) -> Box<dyn Codec> + Send + Sync>;

/// Maps lowercase file extensions to codec constructors
pub struct CodecManager {
    constructors: HashMap<String, Constructor>,
}

impl CodecManager {
    /// An empty manager that knows no file types
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, extension: &str, constructor: F)
    where
        F: Fn(&Path) -> Box<dyn Codec> + Send + Sync + 'static,
    {
        self.constructors
            .insert(extension.to_lowercase(), Box::new(constructor));
    }

    /// Registered extensions, sorted
    pub fn extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self.constructors.keys().cloned().collect();
        extensions.sort();
        extensions
    }

    fn constructor_for(&self, path: &Path) -> Option<&Constructor> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        self.constructors.get(&extension)
    }
}

impl Default for CodecManager {
    fn default() -> Self {
        let mut manager = Self::empty();
        for extension in DEFAULT_EXTENSIONS {
            manager.register(extension, |path| Box::new(SymphoniaCodec::new(path)));
        }
        manager
    }
}

impl CodecFactory for CodecManager {
    fn create(&self, path: &Path) -> Option<Box<dyn Codec>> {
        self.constructor_for(path).map(|constructor| constructor(path))
    }

    fn is_media_file(&self, path: &Path) -> bool {
        self.constructor_for(path).is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn test_codec_manager_extensions() {
        let manager = CodecManager::default();

        assert!(manager.is_media_file(Path::new("/music/a.flac")));
        assert!(manager.is_media_file(Path::new("/music/b.MP3")));
        assert!(manager.is_media_file(Path::new("c.Ogg")));
        assert!(!manager.is_media_file(Path::new("/music/cover.jpg")));
        assert!(!manager.is_media_file(Path::new("/music/README")));

        assert_eq!(manager.extensions().len(), DEFAULT_EXTENSIONS.len());
        assert!(manager.create(Path::new("notes.txt")).is_none());
    }

    #[test]
    fn test_empty_manager_knows_nothing() {
        let manager = CodecManager::empty();
        assert!(!manager.is_media_file(Path::new("a.flac")));
        assert!(manager.create(Path::new("a.flac")).is_none());
    }

    #[test]
    fn test_open_nonexistent_file() {
        let manager = CodecManager::default();
        let mut codec = manager
            .create(Path::new("/nonexistent/file.wav"))
            .expect("wav is registered");

        assert!(matches!(codec.open(), Err(CodecError::OpenFailed { .. })));
    }

    #[test]
    fn test_decode_before_open() {
        let mut codec = SymphoniaCodec::new("/nonexistent/file.flac");
        assert!(matches!(codec.decode(), Err(CodecError::NotOpened)));
        assert!(matches!(codec.seek(0), Err(CodecError::NotOpened)));
    }

    #[test]
    fn test_decode_generated_wav() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 8000, 2, 8000);

        let mut codec = SymphoniaCodec::new(&path);
        codec.open().expect("wav should open");
        assert_eq!(codec.format(), Format::new(8000, 2));
        assert_eq!(codec.metadata().length, 1);

        let mut frames = 0;
        while let Some(buffer) = codec.decode().expect("decode should succeed") {
            assert_eq!(buffer.channels, 2);
            frames += buffer.frames;
        }
        assert_eq!(frames, 8000);

        codec.seek(4000).expect("seek should succeed");
        assert!(codec.decode().expect("decode after seek").is_some());
    }

    /// Write a 16-bit PCM wav file with a constant signal
    pub(crate) fn write_test_wav(path: &Path, rate: u32, channels: u16, frames: u32) {
        let block_align = channels as u32 * 2;
        let data_len = frames * block_align;

        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&rate.to_le_bytes());
        bytes.extend_from_slice(&(rate * block_align).to_le_bytes());
        bytes.extend_from_slice(&(block_align as u16).to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for _ in 0..frames * channels as u32 {
            bytes.extend_from_slice(&1000i16.to_le_bytes());
        }

        std::fs::write(path, bytes).unwrap();
    }
}
