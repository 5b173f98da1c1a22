//! End-to-end tests running the controller with real decoder and player threads

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio_test::assert_ok;

use crate::audio::codec::tests::write_test_wav;
use crate::audio::{CodecFactory, CodecManager, Format, Output};
use crate::cli::{CliApp, ConsoleCommand};
use crate::config::{AudioConfig, ConfigManager};
use crate::error::{LibraryError, OutputError};
use crate::library::ScannedLibrary;
use crate::logging::EventLog;
use crate::models::PlaybackState;
use crate::player::events::RecordingListener;
use crate::player::{Controller, Event};

/// Output that accepts samples only while its gate is open
struct GatedOutput {
    format: Option<Format>,
    written: Arc<Mutex<Vec<f32>>>,
    open: Arc<AtomicBool>,
}

impl Output for GatedOutput {
    fn setup(&mut self, format: Format) -> Result<(), OutputError> {
        self.format = Some(format);
        Ok(())
    }

    fn format(&self) -> Option<Format> {
        self.format
    }

    fn free_size(&self) -> usize {
        if self.open.load(Ordering::SeqCst) {
            1 << 16
        } else {
            0
        }
    }

    fn write(&mut self, samples: &[f32]) -> Result<usize, OutputError> {
        if !self.open.load(Ordering::SeqCst) {
            return Ok(0);
        }
        self.written.lock().unwrap().extend_from_slice(samples);
        Ok(samples.len())
    }

    fn drop_buffer(&mut self) {}
}

struct Harness {
    controller: Arc<Controller>,
    library: ScannedLibrary,
    listener: Arc<RecordingListener>,
    written: Arc<Mutex<Vec<f32>>>,
    gate: Arc<AtomicBool>,
    dir: TempDir,
}

impl Harness {
    /// Two short tracks in one directory, played through a gated output
    fn new(gate_open: bool) -> Self {
        let dir = TempDir::new().unwrap();
        let album = dir.path().join("album");
        fs::create_dir_all(&album).unwrap();
        write_test_wav(&album.join("a.wav"), 44100, 2, 4410);
        write_test_wav(&album.join("b.wav"), 44100, 2, 4410);

        let codecs = Arc::new(CodecManager::default());
        let library = assert_ok!(ScannedLibrary::scan(&[dir.path().to_path_buf()], codecs.as_ref()));

        let written = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(AtomicBool::new(gate_open));
        let output = GatedOutput {
            format: None,
            written: Arc::clone(&written),
            open: Arc::clone(&gate),
        };

        let codecs: Arc<dyn CodecFactory> = codecs;
        let controller = Arc::new(assert_ok!(Controller::with_pipeline(
            &AudioConfig::default(),
            codecs,
            Box::new(output)
        )));
        let listener = Arc::new(RecordingListener::default());
        controller.add_listener(listener.clone());
        assert_ok!(controller.spawn());

        Self {
            controller,
            library,
            listener,
            written,
            gate,
            dir,
        }
    }

    fn album_path(&self) -> std::path::PathBuf {
        self.dir.path().join("album")
    }

    fn events(&self) -> Vec<String> {
        self.listener.events.lock().unwrap().clone()
    }

    /// Wait until `event` has been dispatched
    async fn wait_for(&self, event: &str) {
        let waited = tokio::time::timeout(Duration::from_secs(10), async {
            while !self.events().iter().any(|e| e == event) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "timed out waiting for {:?}, got {:?}", event, self.events());
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.gate.store(true, Ordering::SeqCst);
        self.controller.shutdown();
    }
}

#[tokio::test]
async fn test_plays_scanned_directory_to_the_end() {
    let harness = Harness::new(true);
    let item = assert_ok!(harness.library.item_for_path(&harness.album_path()));

    harness.controller.queue(item);
    harness.controller.play();
    harness.wait_for("stopped").await;

    assert_eq!(
        harness.events(),
        vec!["queue-changed", "song-changed 0.0", "started", "song-changed 0.1", "stopped"]
    );

    // both tracks reach the device, 4410 stereo frames each
    assert_eq!(harness.written.lock().unwrap().len(), 2 * 4410 * 2);
    assert_eq!(harness.controller.status().state, PlaybackState::Stopped);
}

#[tokio::test]
async fn test_pause_volume_and_resume() {
    let harness = Harness::new(false);
    let item = assert_ok!(harness.library.item_for_path(&harness.album_path()));

    harness.controller.queue(item);
    harness.controller.play();
    harness.wait_for("started").await;

    harness.controller.pause();
    harness.controller.set_volume(40);
    harness.wait_for("volume-changed 40").await;

    let status = harness.controller.status();
    assert_eq!(status.state, PlaybackState::Paused);
    assert_eq!(status.path, vec![0, 0]);
    assert_eq!(status.volume, 40);
    assert_eq!(status.file.map(|f| f.name), Some("a.wav".to_string()));
    assert!(harness.written.lock().unwrap().is_empty());

    harness.gate.store(true, Ordering::SeqCst);
    harness.controller.play();
    harness.wait_for("stopped").await;

    assert_eq!(
        harness.events(),
        vec![
            "queue-changed",
            "song-changed 0.0",
            "started",
            "paused",
            "volume-changed 40",
            "started",
            "song-changed 0.1",
            "stopped",
        ]
    );

    // the wav holds a constant signal, volume scales every sample
    let written = harness.written.lock().unwrap();
    let first = written.first().copied().unwrap();
    assert!(written.iter().all(|&s| (s - first).abs() < 1e-6));
}

#[tokio::test]
async fn test_console_commands_drive_the_controller() {
    let harness = Harness::new(false);
    let add = format!("add {}", harness.album_path().display());

    match CliApp::parse_command(&add).unwrap() {
        ConsoleCommand::Add(path) => harness
            .controller
            .queue(harness.library.item_for_path(&path).unwrap()),
        other => panic!("unexpected command {:?}", other),
    }
    match CliApp::parse_command("goto 0.1").unwrap() {
        ConsoleCommand::GoTo(path) => harness.controller.go_to(path),
        other => panic!("unexpected command {:?}", other),
    }
    harness.wait_for("song-changed 0.1").await;

    let status = harness.controller.status();
    assert_eq!(status.state, PlaybackState::Stopped);
    assert_eq!(status.path, vec![0, 1]);

    match CliApp::parse_command("clear").unwrap() {
        ConsoleCommand::Clear => harness.controller.remove_all(),
        other => panic!("unexpected command {:?}", other),
    }
    harness.wait_for("song-changed").await;
    assert!(harness.controller.queue_snapshot().is_empty());
}

#[tokio::test]
async fn test_event_log_records_pipeline_events() {
    let harness = Harness::new(true);
    let log = Arc::new(EventLog::default());
    harness.controller.add_listener(log.clone());

    harness
        .controller
        .queue(harness.library.item_for_path(&harness.album_path()).unwrap());
    harness.controller.play();
    harness.wait_for("stopped").await;

    let events: Vec<Event> = log.recent(10).into_iter().map(|e| e.event).collect();
    assert_eq!(events.first(), Some(&Event::QueueChanged));
    assert_eq!(events.last(), Some(&Event::Stopped));
}

#[test]
fn test_status_serializes_to_json() {
    let harness = Harness::new(false);
    let status = harness.controller.status();

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["state"], "Stopped");
    assert_eq!(json["volume"], 100);
    assert!(json["file"].is_null());
    assert_eq!(json["path"], serde_json::json!([]));
}

#[test]
fn test_unknown_paths_are_rejected() {
    let harness = Harness::new(false);
    fs::write(harness.album_path().join("cover.jpg"), b"not audio").unwrap();

    assert!(matches!(
        harness.library.item_for_path(&harness.album_path().join("cover.jpg")),
        Err(LibraryError::NotMediaFile { .. })
    ));
    assert!(matches!(
        harness.library.item_for_path(Path::new("/nowhere/at/all")),
        Err(LibraryError::PathNotFound { .. })
    ));
}

#[test]
fn test_configured_volume_reaches_the_pipeline() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "[audio]\nvolume = 25\n").unwrap();

    let manager = assert_ok!(ConfigManager::from_path(config_path));
    let output = GatedOutput {
        format: None,
        written: Arc::new(Mutex::new(Vec::new())),
        open: Arc::new(AtomicBool::new(false)),
    };
    let codecs: Arc<dyn CodecFactory> = Arc::new(CodecManager::default());
    let controller = assert_ok!(Controller::with_pipeline(
        &manager.get_config().audio,
        codecs,
        Box::new(output)
    ));

    assert_eq!(controller.volume(), 25);
    assert_eq!(controller.status(), crate::models::Status::stopped(25));
    controller.shutdown();
}
