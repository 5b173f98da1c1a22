pub mod buffer;
pub mod codec;
pub mod device;
pub mod fifo;
pub mod format;
pub mod metadata;
pub mod resampler;
pub mod volume;

use std::path::Path;

use crate::error::{CodecError, OutputError};

pub use buffer::RingBuffer;
pub use codec::{CodecManager, SymphoniaCodec};
pub use device::CpalOutput;
pub use fifo::{Fifo, FifoEvent};
pub use format::Format;
pub use metadata::MetadataExtractor;
pub use resampler::{LinearResampler, Resample};
pub use volume::Volume;

// Re-export models for convenience
pub use crate::models::{AudioBuffer, AudioMetadata};

/// A decoder for one audio file
pub trait Codec: Send {
    /// Open the underlying file and read its stream parameters
    fn open(&mut self) -> Result<(), CodecError>;

    /// Stream format, valid after a successful `open`
    fn format(&self) -> Format;

    /// Decode the next block of interleaved samples, `None` at end of stream
    fn decode(&mut self) -> Result<Option<AudioBuffer>, CodecError>;

    /// Seek to an absolute frame
    fn seek(&mut self, frame: u64) -> Result<(), CodecError>;

    fn metadata(&self) -> &AudioMetadata;
}

/// Creates codecs for files by extension
pub trait CodecFactory: Send + Sync {
    /// Returns `None` when no codec is registered for the file type
    fn create(&self, path: &Path) -> Option<Box<dyn Codec>>;

    fn is_media_file(&self, path: &Path) -> bool;
}

/// An audio sink accepting interleaved f32 samples
pub trait Output: Send {
    fn setup(&mut self, format: Format) -> Result<(), OutputError>;

    fn format(&self) -> Option<Format>;

    /// Number of sample values that can be written without blocking
    fn free_size(&self) -> usize;

    /// Write as many samples as fit, returns the number accepted
    fn write(&mut self, samples: &[f32]) -> Result<usize, OutputError>;

    /// Discard audio queued in the device buffer
    fn drop_buffer(&mut self);
}

/// In-place processing of a block of interleaved samples
pub trait Filter {
    fn run(&mut self, samples: &mut Vec<f32>, format: Format);
}
