use std::fmt;
use std::sync::{Arc, RwLock};

use crate::models::format_path;

/// A notification produced by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started,
    Paused,
    Stopped,
    PositionChanged(u64),
    SongChanged(Vec<usize>),
    QueueChanged,
    VolumeChanged(u8),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Started => write!(f, "started"),
            Event::Paused => write!(f, "paused"),
            Event::Stopped => write!(f, "stopped"),
            Event::PositionChanged(seconds) => write!(f, "position-changed {}", seconds),
            Event::SongChanged(path) if path.is_empty() => write!(f, "song-changed"),
            Event::SongChanged(path) => write!(f, "song-changed {}", format_path(path)),
            Event::QueueChanged => write!(f, "queue-changed"),
            Event::VolumeChanged(level) => write!(f, "volume-changed {}", level),
        }
    }
}

/// Receiver of controller notifications. Every method defaults to a no-op.
pub trait EventListener: Send + Sync {
    fn started(&self) {}
    fn paused(&self) {}
    fn stopped(&self) {}
    fn position_changed(&self, _seconds: u64) {}
    /// `path` is empty when the queue has no current song
    fn song_changed(&self, _path: &[usize]) {}
    fn queue_changed(&self) {}
    fn volume_changed(&self, _level: u8) {}
}

/// Fans events out to every registered listener in registration order
#[derive(Default)]
pub struct EventListenerProxy {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl EventListenerProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn EventListener>) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(listener);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dispatch(&self, event: &Event) {
        // Snapshot so listeners may register others while being notified
        let listeners = match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        for listener in &listeners {
            match event {
                Event::Started => listener.started(),
                Event::Paused => listener.paused(),
                Event::Stopped => listener.stopped(),
                Event::PositionChanged(seconds) => listener.position_changed(*seconds),
                Event::SongChanged(path) => listener.song_changed(path),
                Event::QueueChanged => listener.queue_changed(),
                Event::VolumeChanged(level) => listener.volume_changed(*level),
            }
        }
    }
}

/// Listener that records every event as its display string
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingListener {
    pub events: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingListener {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event.to_string());
    }
}

#[cfg(test)]
impl EventListener for RecordingListener {
    fn started(&self) {
        self.push(Event::Started);
    }
    fn paused(&self) {
        self.push(Event::Paused);
    }
    fn stopped(&self) {
        self.push(Event::Stopped);
    }
    fn position_changed(&self, seconds: u64) {
        self.push(Event::PositionChanged(seconds));
    }
    fn song_changed(&self, path: &[usize]) {
        self.push(Event::SongChanged(path.to_vec()));
    }
    fn queue_changed(&self) {
        self.push(Event::QueueChanged);
    }
    fn volume_changed(&self, level: u8) {
        self.push(Event::VolumeChanged(level));
    }
}
