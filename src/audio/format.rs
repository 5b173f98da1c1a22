use serde::{Deserialize, Serialize};
use std::mem::size_of;

use crate::error::FormatError;

/// Sample rate and channel layout of an interleaved f32 stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    pub rate: u32,
    pub channels: u16,
}

impl Format {
    pub fn new(rate: u32, channels: u16) -> Self {
        Self { rate, channels }
    }

    /// Reject formats that would make the size arithmetic meaningless
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.rate == 0 || self.channels == 0 {
            return Err(FormatError::InvalidFormat {
                rate: self.rate,
                channels: self.channels,
            });
        }
        Ok(())
    }

    /// Size in bytes of one interleaved frame
    pub fn frame_size(&self) -> usize {
        size_of::<f32>() * self.channels as usize
    }

    /// Size in bytes of `seconds` of audio
    pub fn size_of_seconds(&self, seconds: f64) -> usize {
        (seconds * self.rate as f64) as usize * self.frame_size()
    }

    /// Size in bytes of `frames` frames
    pub fn size_of_samples(&self, frames: usize) -> usize {
        frames * self.frame_size()
    }

    /// Number of frames held in `bytes`
    pub fn num_of_samples(&self, bytes: usize) -> Result<usize, FormatError> {
        let frame_size = self.frame_size();
        if frame_size == 0 || bytes % frame_size != 0 {
            return Err(FormatError::PartialFrame { bytes, frame_size });
        }
        Ok(bytes / frame_size)
    }

    /// Number of frames held in `count` interleaved sample values
    pub fn frames_in(&self, count: usize) -> Result<usize, FormatError> {
        self.num_of_samples(count * size_of::<f32>())
    }

    /// Frames played in `seconds`
    pub fn frames_of_seconds(&self, seconds: u64) -> u64 {
        seconds * self.rate as u64
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Hz, {} ch", self.rate, self.channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_of_samples() {
        let format = Format::new(44100, 2);
        assert_eq!(format.size_of_samples(42), 4 * 42 * 2);
        assert_eq!(format.frame_size(), 8);
    }

    #[test]
    fn test_size_of_seconds() {
        let format = Format::new(48000, 2);
        assert_eq!(format.size_of_seconds(1.0), 48000 * 8);
        assert_eq!(format.size_of_seconds(0.5), 24000 * 8);
    }

    #[test]
    fn test_num_of_samples() {
        let format = Format::new(44100, 2);
        assert_eq!(format.num_of_samples(8 * 10), Ok(10));
        assert_eq!(
            format.num_of_samples(1),
            Err(FormatError::PartialFrame { bytes: 1, frame_size: 8 })
        );
    }

    #[test]
    fn test_frames_in() {
        let format = Format::new(44100, 2);
        assert_eq!(format.frames_in(6), Ok(3));
        assert!(format.frames_in(5).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(Format::new(44100, 2).validate().is_ok());
        assert!(Format::new(0, 2).validate().is_err());
        assert!(Format::new(44100, 0).validate().is_err());
        assert!(Format::new(44100, 0).num_of_samples(0).is_err());
    }
}
