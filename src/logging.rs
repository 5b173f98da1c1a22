use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::player::{Event, EventListener};

/// Environment variable overriding the default log level
pub const LOG_LEVEL_ENV: &str = "HIRES_PLAYER_LOG_LEVEL";

/// Initialize logging with `level`, or the level from the environment, or info
pub fn init(level: Option<&str>) -> Result<(), log::SetLoggerError> {
    let log_level = level
        .map(str::to_string)
        .or_else(|| std::env::var(LOG_LEVEL_ENV).ok())
        .unwrap_or_else(|| "info".to_string());

    let mut builder = env_logger::Builder::new();

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            std::thread::current().name().unwrap_or("main"),
            record.args()
        )
    });
    builder.filter_level(parse_level(&log_level));
    builder.try_init()?;

    info!("Player daemon logging initialized with level: {}", log_level);
    Ok(())
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

/// A controller event with the time it was received
#[derive(Debug, Clone)]
pub struct LoggedEvent {
    pub timestamp: DateTime<Utc>,
    pub event: Event,
}

/// Listener writing controller events to the log and keeping the most recent ones
pub struct EventLog {
    events: Mutex<VecDeque<LoggedEvent>>,
    max_events: usize,
}

impl EventLog {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            max_events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LoggedEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, event: Event) {
        match &event {
            Event::PositionChanged(_) | Event::VolumeChanged(_) => debug!("[EVENT] {}", event),
            _ => info!("[EVENT] {}", event),
        }

        let mut events = self.lock();
        events.push_back(LoggedEvent {
            timestamp: Utc::now(),
            event,
        });
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    /// The last `count` events, oldest first
    pub fn recent(&self, count: usize) -> Vec<LoggedEvent> {
        let events = self.lock();
        let skip = events.len().saturating_sub(count);
        events.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl EventListener for EventLog {
    fn started(&self) {
        self.record(Event::Started);
    }

    fn paused(&self) {
        self.record(Event::Paused);
    }

    fn stopped(&self) {
        self.record(Event::Stopped);
    }

    fn position_changed(&self, seconds: u64) {
        self.record(Event::PositionChanged(seconds));
    }

    fn song_changed(&self, path: &[usize]) {
        self.record(Event::SongChanged(path.to_vec()));
    }

    fn queue_changed(&self) {
        self.record(Event::QueueChanged);
    }

    fn volume_changed(&self, level: u8) {
        self.record(Event::VolumeChanged(level));
    }
}
