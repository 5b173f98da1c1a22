use thiserror::Error;

/// Main daemon error type
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Command parse error: {0}")]
    Parse(#[from] crate::cli::ParseError),
}

impl PlayerError {
    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::Codec(err) => err.user_message(),
            PlayerError::Format(err) => err.user_message(),
            PlayerError::Output(err) => err.user_message(),
            PlayerError::File(err) => Self::format_file_error(err),
            PlayerError::Config(err) => err.user_message(),
            PlayerError::Library(err) => err.user_message(),
            PlayerError::Parse(err) => format!("Command error: {}", err),
        }
    }

    /// Get suggested recovery actions for the error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PlayerError::Codec(err) => err.recovery_suggestions(),
            PlayerError::Format(_) => vec!["Report this as a bug, the sample stream was malformed".to_string()],
            PlayerError::Output(err) => err.recovery_suggestions(),
            PlayerError::File(_) => vec![
                "Check that the path exists and is readable".to_string(),
                "Try using an absolute path".to_string(),
            ],
            PlayerError::Config(err) => err.recovery_suggestions(),
            PlayerError::Library(err) => err.recovery_suggestions(),
            PlayerError::Parse(_) => vec!["Type 'help' to see available commands".to_string()],
        }
    }

    /// Check if the daemon can keep running after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            PlayerError::Codec(err) => err.is_recoverable(),
            PlayerError::Format(_) => false,
            PlayerError::Output(err) => err.is_recoverable(),
            PlayerError::File(_) => false,
            PlayerError::Config(err) => err.is_recoverable(),
            PlayerError::Library(err) => err.is_recoverable(),
            PlayerError::Parse(_) => true,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::Codec(CodecError::UnsupportedFormat { .. }) => ErrorSeverity::Warning,
            PlayerError::Codec(_) => ErrorSeverity::Error,
            PlayerError::Format(_) => ErrorSeverity::Critical,
            PlayerError::Output(OutputError::DeviceNotFound { .. }) => ErrorSeverity::Error,
            PlayerError::Output(_) => ErrorSeverity::Critical,
            PlayerError::File(_) => ErrorSeverity::Error,
            PlayerError::Config(_) => ErrorSeverity::Warning,
            PlayerError::Library(_) => ErrorSeverity::Warning,
            PlayerError::Parse(_) => ErrorSeverity::Info,
        }
    }

    fn format_file_error(err: &std::io::Error) -> String {
        match err.kind() {
            std::io::ErrorKind::NotFound => "File or directory not found".to_string(),
            std::io::ErrorKind::PermissionDenied => "Permission denied - cannot access file".to_string(),
            std::io::ErrorKind::AlreadyExists => "File already exists".to_string(),
            _ => format!("File system error: {}", err),
        }
    }
}

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Failures of the codec backend. A track that raises one is skipped.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Failed to open {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Codec used before open")]
    NotOpened,

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Seek error: {0}")]
    SeekError(String),
}

impl CodecError {
    pub fn user_message(&self) -> String {
        match self {
            CodecError::UnsupportedFormat { format } => {
                format!("Audio format '{}' is not supported", format)
            }
            CodecError::OpenFailed { path, reason } => {
                format!("Cannot open '{}' for playback: {}", path, reason)
            }
            CodecError::NotOpened => "Decoder was used before the file was opened".to_string(),
            CodecError::DecodeFailed(msg) => format!("Failed to decode audio data: {}", msg),
            CodecError::SeekError(msg) => format!("Cannot seek in this audio file: {}", msg),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            CodecError::UnsupportedFormat { .. } => vec![
                "Supported formats: FLAC, WAV, MP3, OGG/Vorbis, AAC/ALAC in M4A".to_string(),
                "Check if the file extension matches the actual format".to_string(),
            ],
            CodecError::OpenFailed { .. } => vec![
                "Check that the file still exists and is readable".to_string(),
                "Rescan the library if files were moved".to_string(),
            ],
            CodecError::NotOpened => vec!["Report this as a bug".to_string()],
            CodecError::DecodeFailed(_) => vec![
                "Verify the file is not corrupted".to_string(),
                "Try re-encoding the file".to_string(),
            ],
            CodecError::SeekError(_) => vec!["Play from the beginning instead of seeking".to_string()],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            CodecError::UnsupportedFormat { .. } => false,
            CodecError::OpenFailed { .. } => false,
            CodecError::NotOpened => false,
            CodecError::DecodeFailed(_) => false,
            CodecError::SeekError(_) => true, // playback continues from the current position
        }
    }
}

/// Sample-size arithmetic that does not add up to whole frames
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("{bytes} bytes is not a multiple of the frame size {frame_size}")]
    PartialFrame { bytes: usize, frame_size: usize },

    #[error("Invalid format: {rate} Hz, {channels} channels")]
    InvalidFormat { rate: u32, channels: u16 },
}

impl FormatError {
    pub fn user_message(&self) -> String {
        match self {
            FormatError::PartialFrame { bytes, frame_size } => {
                format!("Sample buffer of {} bytes does not hold whole frames of {} bytes", bytes, frame_size)
            }
            FormatError::InvalidFormat { rate, channels } => {
                format!("Audio format {} Hz / {} channels cannot be used", rate, channels)
            }
        }
    }
}

/// Audio output device failures
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("Output is not set up")]
    NotConfigured,

    #[error("Unsupported output format: {rate} Hz, {channels} channels")]
    UnsupportedFormat { rate: u32, channels: u16 },

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Audio initialization failed: {0}")]
    InitializationFailed(String),
}

impl OutputError {
    pub fn user_message(&self) -> String {
        match self {
            OutputError::DeviceNotFound { device } => {
                format!("Audio device '{}' is not available or has been disconnected", device)
            }
            OutputError::NotConfigured => "Audio output was used before it was set up".to_string(),
            OutputError::UnsupportedFormat { rate, channels } => {
                format!("The audio device cannot play {} Hz with {} channels", rate, channels)
            }
            OutputError::StreamError(msg) => format!("Audio playback interrupted: {}", msg),
            OutputError::InitializationFailed(msg) => format!("Failed to initialize audio output: {}", msg),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            OutputError::DeviceNotFound { .. } => vec![
                "Check that your audio device is connected".to_string(),
                "Remove preferred_device from the configuration to use the default device".to_string(),
            ],
            OutputError::NotConfigured => vec!["Report this as a bug".to_string()],
            OutputError::UnsupportedFormat { .. } => vec![
                "Change output_rate or output_channels in the configuration".to_string(),
            ],
            OutputError::StreamError(_) => vec![
                "Start playback again with 'play'".to_string(),
                "Check audio device connections".to_string(),
            ],
            OutputError::InitializationFailed(_) => vec![
                "Check that no other application holds exclusive access to the device".to_string(),
                "Verify audio drivers are properly installed".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            OutputError::DeviceNotFound { .. } => true, // can fall back to the default device
            OutputError::NotConfigured => false,
            OutputError::UnsupportedFormat { .. } => false,
            OutputError::StreamError(_) => true,
            OutputError::InitializationFailed(_) => true,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => {
                format!("Cannot access configuration file: {}", err)
            }
            ConfigError::SerializationError(_) => {
                "Failed to save configuration settings".to_string()
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
            ConfigError::InvalidValue { key, reason } => {
                format!("Configuration value '{}' is invalid: {}", key, reason)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ConfigDirNotFound => vec![
                "Check that you have write permissions to your home directory".to_string(),
                "Pass an explicit file with --config".to_string(),
            ],
            ConfigError::IoError(_) => vec![
                "Check file permissions for the configuration directory".to_string(),
                "Ensure the disk is not full".to_string(),
            ],
            ConfigError::SerializationError(_) => vec![
                "Configuration will use default values".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Delete the configuration file to reset to defaults".to_string(),
                "Check the configuration file format manually".to_string(),
            ],
            ConfigError::InvalidValue { key, .. } => vec![
                format!("Fix or remove '{}' in the configuration file", key),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            ConfigError::ConfigDirNotFound => true, // Can use defaults
            ConfigError::IoError(_) => true,
            ConfigError::SerializationError(_) => true,
            ConfigError::DeserializationError(_) => true,
            ConfigError::InvalidValue { .. } => false,
        }
    }
}

/// Library lookups and scanning
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("File not found: {id}")]
    FileNotFound { id: i32 },

    #[error("Album not found: {id}")]
    AlbumNotFound { id: i32 },

    #[error("Directory not found: {id}")]
    DirectoryNotFound { id: i32 },

    #[error("Not a media file: {path}")]
    NotMediaFile { path: String },

    #[error("Path not in the library: {path}")]
    PathNotFound { path: String },

    #[error("Scan failed: {0}")]
    Scan(#[from] std::io::Error),
}

impl LibraryError {
    pub fn user_message(&self) -> String {
        match self {
            LibraryError::FileNotFound { id } => format!("No file with id {} in the library", id),
            LibraryError::AlbumNotFound { id } => format!("No album with id {} in the library", id),
            LibraryError::DirectoryNotFound { id } => format!("No directory with id {} in the library", id),
            LibraryError::NotMediaFile { path } => format!("'{}' is not a playable audio file", path),
            LibraryError::PathNotFound { path } => format!("'{}' is not inside a library root", path),
            LibraryError::Scan(err) => format!("Could not scan the music library: {}", err),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            LibraryError::FileNotFound { .. }
            | LibraryError::AlbumNotFound { .. }
            | LibraryError::DirectoryNotFound { .. } => vec![
                "Rescan the library to refresh ids".to_string(),
            ],
            LibraryError::PathNotFound { .. } => vec![
                "Add the directory to library.roots in the configuration".to_string(),
                "Rescan the library".to_string(),
            ],
            LibraryError::NotMediaFile { .. } => vec![
                "Supported formats: FLAC, WAV, MP3, OGG/Vorbis, AAC/ALAC in M4A".to_string(),
            ],
            LibraryError::Scan(_) => vec![
                "Check the library roots in the configuration".to_string(),
                "Check directory permissions".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LibraryError::Scan(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_player_error_from_codec_error() {
        let codec_error = CodecError::UnsupportedFormat {
            format: "xm".to_string(),
        };
        let player_error: PlayerError = codec_error.into();

        match player_error {
            PlayerError::Codec(CodecError::UnsupportedFormat { format }) => {
                assert_eq!(format, "xm");
            }
            _ => panic!("Expected Codec error variant"),
        }
    }

    #[test]
    fn test_player_error_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let player_error: PlayerError = io_error.into();

        assert!(matches!(player_error, PlayerError::File(_)));
        assert_eq!(player_error.user_message(), "File or directory not found");
    }

    #[test]
    fn test_player_error_from_format_error() {
        let player_error: PlayerError = FormatError::PartialFrame { bytes: 4, frame_size: 8 }.into();

        assert!(!player_error.is_recoverable());
        assert_eq!(player_error.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_codec_error_display() {
        let error = CodecError::OpenFailed {
            path: "/music/a.flac".to_string(),
            reason: "no such file".to_string(),
        };
        assert_eq!(format!("{}", error), "Failed to open /music/a.flac: no such file");

        let error = CodecError::DecodeFailed("bad packet".to_string());
        assert_eq!(format!("{}", error), "Decode failed: bad packet");

        let error = CodecError::SeekError("out of range".to_string());
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_format_error_display() {
        let error = FormatError::PartialFrame { bytes: 12, frame_size: 8 };
        assert_eq!(format!("{}", error), "12 bytes is not a multiple of the frame size 8");
    }

    #[test]
    fn test_output_error_severity() {
        let error: PlayerError = OutputError::DeviceNotFound { device: "DAC".to_string() }.into();
        assert_eq!(error.severity(), ErrorSeverity::Error);
        assert!(error.is_recoverable());

        let error: PlayerError = OutputError::StreamError("underrun".to_string()).into();
        assert_eq!(error.severity(), ErrorSeverity::Critical);
        assert_eq!(error.severity().log_level(), log::Level::Error);
    }

    #[test]
    fn test_config_error_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let config_error: ConfigError = io_error.into();

        assert!(matches!(config_error, ConfigError::IoError(_)));
        assert!(config_error.is_recoverable());
    }

    #[test]
    fn test_library_error_messages() {
        let error = LibraryError::FileNotFound { id: 42 };
        assert_eq!(format!("{}", error), "File not found: 42");
        assert_eq!(error.user_message(), "No file with id 42 in the library");
        assert!(error.is_recoverable());

        let error: LibraryError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_severity_as_str() {
        assert_eq!(ErrorSeverity::Info.as_str(), "INFO");
        assert_eq!(ErrorSeverity::Warning.log_level(), log::Level::Warn);
    }
}
