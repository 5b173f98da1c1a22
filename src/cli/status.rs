use crate::error::{ErrorSeverity, PlayerError};
use crate::models::{format_path, PlaybackState, Status};
use crate::queue::{Container, QueueItem};

/// Status display formatter for the console
pub struct StatusDisplay;

impl StatusDisplay {
    /// Display player status with track information
    pub fn display_status(status: &Status) {
        println!("┌─ Player Status ─────────────────────────────────────────┐");

        match &status.file {
            Some(file) => {
                println!("│ Track: {}", Self::truncate(&file.display_name(), 50));
                println!("│ Artist: {}", Self::truncate(&file.artist_name(), 49));
                if let Some(album) = &file.metadata.album {
                    println!("│ Album: {}", Self::truncate(album, 50));
                }
                println!("│ Queue position: {}", status.path_string());
                println!("│");
                println!("│ Status: {}", Self::format_playback_state(status.state));
                println!("│ Position: {} / {}", status.position_formatted(), status.length_formatted());

                let length = file.metadata.length as u64;
                if length > 0 {
                    let progress = (status.position as f32 / length as f32).min(1.0);
                    println!(
                        "│ Progress: [{}] {:.1}%",
                        Self::create_progress_bar(progress, 40),
                        progress * 100.0
                    );
                }
            }
            None => {
                println!("│ No track selected");
                println!("│ Status: {}", Self::format_playback_state(status.state));
            }
        }

        println!("│");
        println!("│ Volume: {}%", status.volume);
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display compact one-line status
    pub fn display_compact_status(status: &Status) {
        println!("{}", Self::compact_status(status));
    }

    pub fn compact_status(status: &Status) -> String {
        match &status.file {
            Some(file) => format!(
                "{} | {} | {} - {} | {}/{} | vol {}%",
                status.state.as_str(),
                status.path_string(),
                Self::truncate(&file.artist_name(), 25),
                Self::truncate(&file.display_name(), 30),
                status.position_formatted(),
                status.length_formatted(),
                status.volume
            ),
            None => format!("{} | No track selected | vol {}%", status.state.as_str(), status.volume),
        }
    }

    /// Print the queue tree with the current song marked
    pub fn display_queue(queue: &Container) {
        if queue.is_empty() {
            println!("Queue is empty");
            return;
        }
        for line in Self::queue_lines(queue) {
            println!("{}", line);
        }
    }

    /// One line per node, depth-first, indented by depth
    pub fn queue_lines(queue: &Container) -> Vec<String> {
        let current = queue.path();
        let mut lines = Vec::new();
        let mut path = Vec::new();
        Self::collect_lines(queue.items(), &current, &mut path, &mut lines);
        lines
    }

    fn collect_lines(items: &[QueueItem], current: &[usize], path: &mut Vec<usize>, lines: &mut Vec<String>) {
        for (index, item) in items.iter().enumerate() {
            path.push(index);

            let marker = if path.as_slice() == current { ">" } else { " " };
            let indent = "  ".repeat(path.len() - 1);
            match item {
                QueueItem::File(file) => lines.push(format!(
                    "{} {}{} {} - {}",
                    marker,
                    indent,
                    format_path(path),
                    file.artist_name(),
                    file.display_name()
                )),
                QueueItem::Container(container) => {
                    lines.push(format!(
                        "  {}{} [{}]",
                        indent,
                        format_path(path),
                        container.label()
                    ));
                    Self::collect_lines(container.items(), current, path, lines);
                }
            }

            path.pop();
        }
    }

    /// Display error message with formatting and recovery suggestions
    pub fn display_error(error: &PlayerError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };

        eprintln!(
            "┌─ {} {} ─────────────────────────────────────────────────┐",
            severity_icon,
            severity.as_str()
        );

        for line in Self::wrap_text(&error.user_message(), 55) {
            eprintln!("│ {}", line);
        }

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("│");
            eprintln!("│ Suggestions:");
            for suggestion in suggestions.iter().take(3) {
                for line in Self::wrap_text(&format!("• {}", suggestion), 53) {
                    eprintln!("│   {}", line);
                }
            }
        }

        eprintln!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display a simple error message for non-interactive contexts
    pub fn display_simple_error(error: &PlayerError) {
        eprintln!("[{}] {}", error.severity().as_str(), error.user_message());

        if let Some(suggestion) = error.recovery_suggestions().first() {
            eprintln!("Suggestion: {}", suggestion);
        }
    }

    /// Wrap text to fit within specified width
    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.len() + word.len() < width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(current_line);
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }
        lines
    }

    /// Format seconds as MM:SS or HH:MM:SS for longer spans
    pub fn format_seconds(total_seconds: u64) -> String {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    /// Truncate string to fit display width
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len || max_len <= 3 {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len - 3).collect();
            format!("{}...", kept)
        }
    }

    pub fn create_progress_bar(progress: f32, width: usize) -> String {
        let filled = ((progress.clamp(0.0, 1.0) * width as f32) as usize).min(width);
        format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
    }

    pub fn format_playback_state(state: PlaybackState) -> String {
        match state {
            PlaybackState::Playing => "▶ Playing".to_string(),
            PlaybackState::Paused => "⏸ Paused".to_string(),
            PlaybackState::Stopped => "⏹ Stopped".to_string(),
        }
    }
}
