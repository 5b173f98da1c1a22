use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A playable file known to the library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryFile {
    pub id: i32,
    pub directory_id: i32,
    /// Directory containing the file
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub artist_id: i32,
    pub album_id: i32,
    pub metadata: AudioMetadata,
}

impl LibraryFile {
    pub fn new(id: i32, path: PathBuf, name: impl Into<String>) -> Self {
        Self {
            id,
            directory_id: -1,
            path,
            name: name.into(),
            size: 0,
            artist_id: -1,
            album_id: -1,
            metadata: AudioMetadata::default(),
        }
    }

    /// Absolute path of the file on disk
    pub fn full_path(&self) -> PathBuf {
        self.path.join(&self.name)
    }

    /// Get the display name for this file (title or filename)
    pub fn display_name(&self) -> String {
        self.metadata.title.clone().unwrap_or_else(|| {
            std::path::Path::new(&self.name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Unknown")
                .to_string()
        })
    }

    /// Get the artist name or "Unknown Artist"
    pub fn artist_name(&self) -> String {
        self.metadata
            .artist
            .clone()
            .unwrap_or_else(|| "Unknown Artist".to_string())
    }
}

/// An album grouping files of the library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Album {
    pub id: i32,
    pub name: String,
    pub artist_id: i32,
    pub songs: u32,
    /// Total length in seconds
    pub length: u32,
}

impl Album {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            artist_id: -1,
            songs: 0,
            length: 0,
        }
    }
}

/// A scanned directory of the library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Directory {
    pub id: i32,
    pub name: String,
    pub path: PathBuf,
}

impl Directory {
    pub fn new(id: i32, path: PathBuf) -> Self {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        Self { id, name, path }
    }
}

/// Audio metadata extracted from files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AudioMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_number: Option<u32>,
    pub year: Option<u32>,
    pub genre: Option<String>,
    /// Length in seconds, 0 when unknown
    pub length: u32,
}

impl AudioMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if metadata has any tag information
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.track_number.is_none()
            && self.year.is_none()
            && self.genre.is_none()
    }

    /// Create metadata with basic information
    pub fn with_title_artist(title: String, artist: String) -> Self {
        Self {
            title: Some(title),
            artist: Some(artist),
            ..Default::default()
        }
    }
}

/// Decoded interleaved samples
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
    pub frames: usize,
}

impl AudioBuffer {
    pub fn new(channels: u16, sample_rate: u32, frames: usize) -> Self {
        let samples = vec![0.0; frames * channels as usize];
        Self {
            samples,
            channels,
            sample_rate,
            frames,
        }
    }

    /// Wrap already interleaved samples
    pub fn from_interleaved(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        let frames = if channels == 0 { 0 } else { samples.len() / channels as usize };
        Self {
            samples,
            channels,
            sample_rate,
            frames,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get duration of this buffer
    pub fn duration(&self) -> Duration {
        if self.sample_rate > 0 {
            Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64)
        } else {
            Duration::from_secs(0)
        }
    }
}

/// Playback state of the controller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Get a human-readable string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of the controller, recomputed on every request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Status {
    pub file: Option<LibraryFile>,
    pub path: Vec<usize>,
    pub state: PlaybackState,
    /// Position inside the current file in seconds
    pub position: u64,
    /// Volume level 0-100
    pub volume: u8,
}

impl Status {
    pub fn stopped(volume: u8) -> Self {
        Self {
            file: None,
            path: Vec::new(),
            state: PlaybackState::Stopped,
            position: 0,
            volume,
        }
    }

    /// Format position as MM:SS
    pub fn position_formatted(&self) -> String {
        format!("{:02}:{:02}", self.position / 60, self.position % 60)
    }

    /// Format the file length as MM:SS
    pub fn length_formatted(&self) -> String {
        let length = self.file.as_ref().map(|f| f.metadata.length).unwrap_or(0);
        format!("{:02}:{:02}", length / 60, length % 60)
    }

    /// Path rendered as dotted indices, e.g. "1.0"
    pub fn path_string(&self) -> String {
        format_path(&self.path)
    }
}

/// Render a queue path as dotted indices
pub fn format_path(path: &[usize]) -> String {
    path.iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_file_paths() {
        let mut file = LibraryFile::new(42, PathBuf::from("/music/album"), "hello.mp3");
        assert_eq!(file.full_path(), PathBuf::from("/music/album/hello.mp3"));
        assert_eq!(file.display_name(), "hello");
        assert_eq!(file.artist_name(), "Unknown Artist");

        file.metadata.title = Some("Hello".to_string());
        assert_eq!(file.display_name(), "Hello");
    }

    #[test]
    fn test_directory_name_from_path() {
        let dir = Directory::new(3, PathBuf::from("/music/Blue Train"));
        assert_eq!(dir.name, "Blue Train");
    }

    #[test]
    fn test_audio_buffer_from_interleaved() {
        let buffer = AudioBuffer::from_interleaved(vec![0.0; 8], 2, 4);
        assert_eq!(buffer.frames, 4);
        assert!((buffer.duration().as_secs_f64() - 1.0).abs() < 0.001);

        let empty = AudioBuffer::from_interleaved(Vec::new(), 0, 0);
        assert!(empty.is_empty());
        assert_eq!(empty.duration(), Duration::from_secs(0));
    }

    #[test]
    fn test_status_formatting() {
        let mut file = LibraryFile::new(1, PathBuf::from("/m"), "a.flac");
        file.metadata.length = 185;
        let status = Status {
            file: Some(file),
            path: vec![1, 0, 2],
            state: PlaybackState::Playing,
            position: 75,
            volume: 80,
        };

        assert_eq!(status.position_formatted(), "01:15");
        assert_eq!(status.length_formatted(), "03:05");
        assert_eq!(status.path_string(), "1.0.2");
        assert_eq!(Status::stopped(50).path_string(), "");
    }

    #[test]
    fn test_status_json_shape() {
        let status = Status::stopped(100);
        let json = serde_json::to_value(&status).expect("Failed to serialize Status");

        assert_eq!(json["state"], "Stopped");
        assert_eq!(json["volume"], 100);
        assert!(json["file"].is_null());
        assert_eq!(json["path"].as_array().map(|a| a.len()), Some(0));
    }

    #[test]
    fn test_playback_state_display() {
        assert_eq!(PlaybackState::Paused.to_string(), "Paused");
        assert_eq!(PlaybackState::Stopped.as_str(), "Stopped");
    }
}
