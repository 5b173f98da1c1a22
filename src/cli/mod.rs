use std::path::PathBuf;

use clap::Parser;

pub mod status;
pub use status::StatusDisplay;

/// Music player daemon with a tree-structured play queue
#[derive(Debug, Parser)]
#[command(name = "hiresd")]
#[command(about = "A music player daemon with an interactive control console")]
#[command(version)]
pub struct CliApp {
    /// Configuration file, defaults to ~/.config/hires-player-daemon/config.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Pidfile path, overrides the configuration
    #[arg(long)]
    pub pidfile: Option<PathBuf>,

    /// Output device name, overrides the configuration
    #[arg(short, long)]
    pub device: Option<String>,

    /// Print the available output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

/// A line typed into the control console
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Play,
    Pause,
    Stop,
    Next,
    Prev,
    GoTo(Vec<usize>),
    /// Seek to an offset in seconds
    Seek(u64),
    Volume(u8),
    /// Queue a scanned file or directory
    Add(PathBuf),
    Remove(Vec<usize>),
    Clear,
    Status,
    Queue,
    Devices,
    Help,
    Quit,
}

impl CliApp {
    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home_dir) = dirs::home_dir() {
                return home_dir.join(rest);
            }
        } else if path == "~" {
            if let Some(home_dir) = dirs::home_dir() {
                return home_dir;
            }
        }
        PathBuf::from(path)
    }

    /// Parse one console line
    pub fn parse_command(input: &str) -> Result<ConsoleCommand, ParseError> {
        let args: Vec<&str> = input.split_whitespace().collect();
        let Some((&command, rest)) = args.split_first() else {
            return Err(ParseError::EmptyCommand);
        };

        let argument = |name: &str| -> Result<&str, ParseError> {
            rest.first().copied().ok_or_else(|| ParseError::MissingArgument {
                command: command.to_string(),
                argument: name.to_string(),
            })
        };

        match command {
            "play" => Ok(ConsoleCommand::Play),
            "pause" => Ok(ConsoleCommand::Pause),
            "stop" => Ok(ConsoleCommand::Stop),
            "next" => Ok(ConsoleCommand::Next),
            "prev" | "previous" => Ok(ConsoleCommand::Prev),
            "goto" => Ok(ConsoleCommand::GoTo(Self::parse_path(argument("path")?)?)),
            "seek" => Ok(ConsoleCommand::Seek(Self::parse_time(argument("position")?)?)),
            "volume" => {
                let value = argument("level")?;
                match value.parse::<u8>() {
                    Ok(level) if level <= 100 => Ok(ConsoleCommand::Volume(level)),
                    _ => Err(ParseError::InvalidArgument {
                        argument: "volume level".to_string(),
                        value: value.to_string(),
                        expected: "0-100".to_string(),
                    }),
                }
            }
            "add" => {
                argument("path")?;
                Ok(ConsoleCommand::Add(Self::expand_path(&rest.join(" "))))
            }
            "remove" => Ok(ConsoleCommand::Remove(Self::parse_path(argument("path")?)?)),
            "clear" => Ok(ConsoleCommand::Clear),
            "status" => Ok(ConsoleCommand::Status),
            "queue" => Ok(ConsoleCommand::Queue),
            "devices" => Ok(ConsoleCommand::Devices),
            "help" => Ok(ConsoleCommand::Help),
            "quit" | "exit" => Ok(ConsoleCommand::Quit),
            _ => Err(ParseError::UnknownCommand {
                command: command.to_string(),
            }),
        }
    }

    /// Parse a dotted queue path such as "1.0"
    pub fn parse_path(input: &str) -> Result<Vec<usize>, ParseError> {
        let invalid = || ParseError::InvalidPath {
            input: input.to_string(),
        };

        if input.trim().is_empty() {
            return Err(invalid());
        }
        input
            .trim()
            .split('.')
            .map(|part| part.parse::<usize>().map_err(|_| invalid()))
            .collect()
    }

    /// Parse "1:30", "90" or "90s" into whole seconds
    pub fn parse_time(time_str: &str) -> Result<u64, ParseError> {
        let trimmed = time_str.trim();
        let invalid = || ParseError::InvalidTimeFormat {
            input: time_str.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid());
        }

        if let Some((minutes, seconds)) = trimmed.split_once(':') {
            let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
            let seconds: u64 = seconds.parse().map_err(|_| invalid())?;
            if seconds >= 60 {
                return Err(invalid());
            }
            Ok(minutes * 60 + seconds)
        } else {
            trimmed
                .strip_suffix('s')
                .unwrap_or(trimmed)
                .parse()
                .map_err(|_| invalid())
        }
    }

    /// Display help information
    pub fn display_help() {
        println!("Player Daemon - Available Commands:");
        println!();
        println!("Playback Control:");
        println!("  play            - Start or resume playback");
        println!("  pause           - Pause playback");
        println!("  stop            - Stop playback");
        println!("  next            - Next song");
        println!("  prev            - Previous song");
        println!("  goto <path>     - Jump to a queue position (e.g., '1.0')");
        println!("  seek <time>     - Seek to position (e.g., '1:30', '90s')");
        println!("  volume <0-100>  - Set volume level");
        println!();
        println!("Queue Management:");
        println!("  add <path>      - Queue a file or directory from the library");
        println!("  remove <path>   - Remove a queue position with its contents");
        println!("  clear           - Remove everything from the queue");
        println!("  queue           - List queue contents");
        println!();
        println!("Information:");
        println!("  status          - Show current player status");
        println!("  devices         - List audio output devices");
        println!();
        println!("General:");
        println!("  help            - Show this help message");
        println!("  exit, quit      - Stop the daemon");
    }
}

/// Command parsing errors
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("Missing argument for {command}: {argument}")]
    MissingArgument { command: String, argument: String },

    #[error("Invalid argument {argument}: got '{value}', expected {expected}")]
    InvalidArgument {
        argument: String,
        value: String,
        expected: String,
    },

    #[error("Invalid time format: {input}")]
    InvalidTimeFormat { input: String },

    #[error("Invalid queue path: {input}")]
    InvalidPath { input: String },
}
