use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info};

use crate::audio::{Fifo, FifoEvent, Format, Output, Volume};
use crate::player::mailbox::Mailbox;

/// Poll interval while the fifo is empty
const FIFO_POLL: Duration = Duration::from_millis(5);
/// Poll interval while the output buffer is full
const OUTPUT_POLL: Duration = Duration::from_millis(2);

/// Directives the controller gives the player thread
pub trait PlayerControl: Send {
    fn start(&mut self);

    /// Stop writing to the output, keeping everything buffered
    fn pause(&mut self);

    /// Stop writing, reset the position and drop audio queued in the output.
    /// Returns once the player thread has processed the request.
    fn stop(&mut self);

    fn seek(&mut self, seconds: u64);

    /// Position inside the current song in seconds
    fn position(&self) -> u64;

    fn volume(&self) -> u8;

    /// Returns false when `level` is out of range
    fn set_volume(&mut self, level: u8) -> bool;

    /// Terminate the player thread
    fn shutdown(&mut self) {}
}

enum PlayerCommand {
    Start,
    Pause,
    Stop,
    Seek(u64),
}

/// Callbacks the player thread reports through
pub struct PlayerCallbacks {
    /// A track marker reached the output
    pub song_finished: Box<dyn Fn() + Send>,
    /// The output device failed, playback stopped
    pub output_failed: Box<dyn Fn() + Send>,
}

/// Handle of the player thread
pub struct Player {
    mailbox: Arc<Mailbox<PlayerCommand>>,
    position: Arc<AtomicU64>,
    volume: Arc<Volume>,
    format: Format,
    handle: Option<JoinHandle<()>>,
}

impl Player {
    /// Start the player thread writing `format` samples from `fifo` to `output`
    pub fn spawn(
        fifo: Arc<Fifo>,
        output: Box<dyn Output>,
        format: Format,
        volume: Arc<Volume>,
        callbacks: PlayerCallbacks,
    ) -> std::io::Result<Self> {
        let mailbox = Arc::new(Mailbox::new());
        let position = Arc::new(AtomicU64::new(0));

        let worker = Worker {
            mailbox: Arc::clone(&mailbox),
            fifo,
            output,
            format,
            volume: Arc::clone(&volume),
            position: Arc::clone(&position),
            running: false,
            pending: Vec::new(),
            callbacks,
        };

        let handle = thread::Builder::new()
            .name("player".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            mailbox,
            position,
            volume,
            format,
            handle: Some(handle),
        })
    }
}

impl PlayerControl for Player {
    fn start(&mut self) {
        self.mailbox.send(PlayerCommand::Start);
    }

    fn pause(&mut self) {
        self.mailbox.send(PlayerCommand::Pause);
    }

    fn stop(&mut self) {
        self.mailbox.send_and_wait(PlayerCommand::Stop);
    }

    fn seek(&mut self, seconds: u64) {
        self.mailbox.send(PlayerCommand::Seek(seconds));
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed) / self.format.rate.max(1) as u64
    }

    fn volume(&self) -> u8 {
        self.volume.level()
    }

    fn set_volume(&mut self, level: u8) -> bool {
        self.volume.set_level(level)
    }

    fn shutdown(&mut self) {
        self.mailbox.close();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Player thread panicked");
            }
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    mailbox: Arc<Mailbox<PlayerCommand>>,
    fifo: Arc<Fifo>,
    output: Box<dyn Output>,
    format: Format,
    volume: Arc<Volume>,
    // frames played of the current song
    position: Arc<AtomicU64>,
    running: bool,
    // read from the fifo, not yet accepted by the output
    pending: Vec<f32>,
    callbacks: PlayerCallbacks,
}

impl Worker {
    fn run(mut self) {
        debug!("Player thread started");
        let mut idle_for: Option<Duration> = None;

        loop {
            let commands = match (self.running, idle_for) {
                (false, _) => self.mailbox.wait(None),
                (true, Some(timeout)) => self.mailbox.wait(Some(timeout)),
                (true, None) if self.mailbox.is_closed() => None,
                (true, None) => Some(self.mailbox.take()),
            };
            let Some(commands) = commands else {
                break;
            };

            let count = commands.len();
            for command in commands {
                self.handle(command);
            }
            self.mailbox.done(count);

            idle_for = if self.running { self.play() } else { None };
        }

        debug!("Player thread finished");
    }

    fn handle(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Start => {
                debug!("player: start");
                if self.output.format() != Some(self.format) {
                    if let Err(e) = self.output.setup(self.format) {
                        error!("player: output setup failed: {}", e);
                        (self.callbacks.output_failed)();
                        return;
                    }
                }
                self.running = true;
            }
            PlayerCommand::Pause => {
                debug!("player: pause");
                self.running = false;
            }
            PlayerCommand::Stop => {
                debug!("player: stop");
                self.running = false;
                self.position.store(0, Ordering::Relaxed);
                self.pending.clear();
                self.output.drop_buffer();
            }
            PlayerCommand::Seek(seconds) => {
                debug!("player: seek {}", seconds);
                self.position
                    .store(self.format.frames_of_seconds(seconds), Ordering::Relaxed);
                self.pending.clear();
                self.output.drop_buffer();
            }
        }
    }

    /// Move one step of data towards the output. Returns how long to idle
    /// before the next step, `None` to continue immediately.
    fn play(&mut self) -> Option<Duration> {
        if !self.pending.is_empty() {
            return self.flush_pending();
        }

        match self.fifo.next_event() {
            FifoEvent::None => Some(FIFO_POLL),
            FifoEvent::Marker => {
                info!("player: song finished");
                self.position.store(0, Ordering::Relaxed);
                (self.callbacks.song_finished)();
                None
            }
            FifoEvent::Samples => self.write_samples(),
        }
    }

    fn write_samples(&mut self) -> Option<Duration> {
        let channels = self.format.channels as usize;
        let free = self.output.free_size() / channels * channels;
        if free == 0 {
            return Some(OUTPUT_POLL);
        }

        self.pending.resize(free, 0.0);
        let read = self.fifo.read_samples(&mut self.pending);
        self.pending.truncate(read);

        if let Err(e) = self.format.frames_in(read) {
            error!("player: dropping read: {}", e);
            self.pending.clear();
            return None;
        }

        self.volume.apply(&mut self.pending);
        self.flush_pending()
    }

    /// Write pending samples, keeping whatever the output did not accept
    fn flush_pending(&mut self) -> Option<Duration> {
        let written = match self.output.write(&self.pending) {
            Ok(written) => written.min(self.pending.len()),
            Err(e) => {
                error!("player: output failed: {}", e);
                self.running = false;
                self.pending.clear();
                (self.callbacks.output_failed)();
                return None;
            }
        };

        self.pending.drain(..written);
        let channels = self.format.channels.max(1) as u64;
        self.position.fetch_add(written as u64 / channels, Ordering::Relaxed);

        if self.pending.is_empty() {
            None
        } else {
            Some(OUTPUT_POLL)
        }
    }
}
