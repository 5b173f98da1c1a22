use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::audio::{Codec, CodecFactory, Fifo, Format, Output, Volume};
use crate::config::AudioConfig;
use crate::error::{CodecError, PlayerError};
use crate::models::{format_path, PlaybackState, Status};
use crate::player::decoder::{Decoder, DecoderControl};
use crate::player::events::{Event, EventListener, EventListenerProxy};
use crate::player::mailbox::Mailbox;
use crate::player::playback::{Player, PlayerCallbacks, PlayerControl};
use crate::queue::{Container, Position, QueueItem};

/// Work item of the controller thread
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Queue(QueueItem),
    Remove(Vec<usize>),
    RemoveAll,
    Play,
    Pause,
    Stop,
    Seek(u64),
    Prev,
    Next,
    GoTo(Vec<usize>),
    SetVolume(u8),
    /// The decoder consumed its input. `epoch` identifies the pipeline run.
    DecoderFinished { epoch: u64 },
    /// The player reached the end of a song
    SongFinished { epoch: u64 },
    OutputFailed { epoch: u64 },
}

/// Clonable handle to the controller's command queue.
///
/// Completion reports are stamped with the current pipeline epoch. The epoch
/// advances whenever the pipeline is stopped, so reports from an earlier run
/// are recognised and dropped.
#[derive(Clone)]
pub struct CommandSender {
    mailbox: Arc<Mailbox<Command>>,
    epoch: Arc<AtomicU64>,
}

impl CommandSender {
    pub fn new() -> Self {
        Self {
            mailbox: Arc::new(Mailbox::new()),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn send(&self, command: Command) {
        self.mailbox.send(command);
    }

    pub fn decoder_finished(&self) {
        self.send(Command::DecoderFinished { epoch: self.epoch() });
    }

    pub fn song_finished(&self) {
        self.send(Command::SongFinished { epoch: self.epoch() });
    }

    pub fn output_failed(&self) {
        self.send(Command::OutputFailed { epoch: self.epoch() });
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn advance_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for CommandSender {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the command handlers mutate
struct Core {
    state: PlaybackState,
    player_queue: Container,
    decoder_queue: Container,
    decoder_initialized: bool,
    /// Set when navigation while paused dropped the decoder input, resuming
    /// has to open the new song
    reprime: bool,
    /// Paths primed after the audible song, oldest first
    upcoming: std::collections::VecDeque<Vec<usize>>,
    decoder: Box<dyn DecoderControl>,
    player: Box<dyn PlayerControl>,
    codecs: Arc<dyn CodecFactory>,
    sender: CommandSender,
}

/// Playback state machine.
///
/// Public operations only queue a command. A single thread (or
/// `process_pending` in tests) executes them in submission order; events are
/// dispatched after the state lock is released, in the order produced.
pub struct Controller {
    sender: CommandSender,
    core: Mutex<Core>,
    listeners: EventListenerProxy,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Controller {
    pub fn new(
        sender: CommandSender,
        codecs: Arc<dyn CodecFactory>,
        decoder: Box<dyn DecoderControl>,
        player: Box<dyn PlayerControl>,
    ) -> Self {
        Self {
            core: Mutex::new(Core {
                state: PlaybackState::Stopped,
                player_queue: Container::playlist(0),
                decoder_queue: Container::playlist(0),
                decoder_initialized: false,
                reprime: false,
                upcoming: Default::default(),
                decoder,
                player,
                codecs,
                sender: sender.clone(),
            }),
            sender,
            listeners: EventListenerProxy::new(),
            thread: Mutex::new(None),
        }
    }

    /// Build a controller driving real decoder and player threads
    pub fn with_pipeline(
        config: &AudioConfig,
        codecs: Arc<dyn CodecFactory>,
        output: Box<dyn Output>,
    ) -> Result<Self, PlayerError> {
        let format = Format::new(config.output_rate, config.output_channels);
        format.validate()?;

        let sender = CommandSender::new();
        let fifo = Arc::new(Fifo::new(config.fifo_chunk_size));
        let watermark = format.size_of_seconds(config.decoder_watermark_secs) / std::mem::size_of::<f32>();

        let decoder = {
            let sender = sender.clone();
            Decoder::spawn(Arc::clone(&fifo), format, watermark, move || sender.decoder_finished())?
        };

        let callbacks = {
            let finished = sender.clone();
            let failed = sender.clone();
            PlayerCallbacks {
                song_finished: Box::new(move || finished.song_finished()),
                output_failed: Box::new(move || failed.output_failed()),
            }
        };
        let volume = Arc::new(Volume::new(config.volume));
        let player = Player::spawn(fifo, output, format, volume, callbacks)?;

        info!("Pipeline ready: {}, watermark {} samples", format, watermark);
        Ok(Self::new(sender, codecs, Box::new(decoder), Box::new(player)))
    }

    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners.add(listener);
    }

    pub fn queue(&self, item: QueueItem) {
        self.sender.send(Command::Queue(item));
    }

    pub fn remove(&self, path: Vec<usize>) {
        self.sender.send(Command::Remove(path));
    }

    pub fn remove_all(&self) {
        self.sender.send(Command::RemoveAll);
    }

    pub fn play(&self) {
        self.sender.send(Command::Play);
    }

    pub fn pause(&self) {
        self.sender.send(Command::Pause);
    }

    pub fn stop(&self) {
        self.sender.send(Command::Stop);
    }

    pub fn seek(&self, seconds: u64) {
        self.sender.send(Command::Seek(seconds));
    }

    pub fn prev(&self) {
        self.sender.send(Command::Prev);
    }

    pub fn next(&self) {
        self.sender.send(Command::Next);
    }

    pub fn go_to(&self, path: Vec<usize>) {
        self.sender.send(Command::GoTo(path));
    }

    pub fn set_volume(&self, level: u8) {
        self.sender.send(Command::SetVolume(level));
    }

    pub fn status(&self) -> Status {
        let core = self.lock();
        Status {
            file: core.player_queue.file().map(|file| (**file).clone()),
            path: core.player_queue.path(),
            state: core.state,
            position: core.player.position(),
            volume: core.player.volume(),
        }
    }

    /// Copy of the play queue with the player's cursor
    pub fn queue_snapshot(&self) -> Container {
        self.lock().player_queue.clone()
    }

    pub fn volume(&self) -> u8 {
        self.lock().player.volume()
    }

    /// Execute every queued command on the calling thread
    pub fn process_pending(&self) {
        let commands = self.sender.mailbox.take();
        self.process(commands);
    }

    /// Run the command loop until `shutdown`
    pub fn run(&self) {
        while let Some(commands) = self.sender.mailbox.wait(None) {
            self.process(commands);
        }
        debug!("Controller loop finished");
    }

    /// Start the command loop on its own thread
    pub fn spawn(self: &Arc<Self>) -> std::io::Result<()> {
        let controller = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("controller".to_string())
            .spawn(move || controller.run())?;

        if let Ok(mut thread) = self.thread.lock() {
            *thread = Some(handle);
        }
        Ok(())
    }

    /// Stop the command loop and the pipeline threads
    pub fn shutdown(&self) {
        self.sender.mailbox.close();

        let handle = self.thread.lock().ok().and_then(|mut t| t.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Controller thread panicked");
            }
        }

        let mut core = self.lock();
        core.player.shutdown();
        core.decoder.shutdown();
        info!("Controller shut down");
    }

    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn process(&self, commands: Vec<Command>) {
        let count = commands.len();
        for command in commands {
            let events = {
                let mut core = self.lock();
                let mut events = Vec::new();
                core.execute(command, &mut events);
                events
            };

            for event in &events {
                debug!("controller: event {}", event);
                self.listeners.dispatch(event);
            }
        }
        self.sender.mailbox.done(count);
    }
}

impl Core {
    fn execute(&mut self, command: Command, events: &mut Vec<Event>) {
        match command {
            Command::Queue(item) => self.queue(item, events),
            Command::Remove(path) => self.remove(&path, events),
            Command::RemoveAll => self.remove_all(events),
            Command::Play => self.play(events),
            Command::Pause => self.pause(events),
            Command::Stop => self.stop(events),
            Command::Seek(seconds) => self.seek(seconds, events),
            Command::Prev => self.navigate(|queue| queue.prev(), events),
            Command::Next => self.navigate(|queue| queue.next(), events),
            Command::GoTo(path) => {
                debug!("controller: goto {}", format_path(&path));
                self.navigate(|queue| queue.path() != path && queue.set(&path), events)
            }
            Command::SetVolume(level) => {
                if self.player.set_volume(level) {
                    events.push(Event::VolumeChanged(level));
                } else {
                    warn!("controller: ignoring volume level {}", level);
                }
            }
            Command::DecoderFinished { epoch } => {
                if self.is_current(epoch) {
                    self.decoder_finished();
                }
            }
            Command::SongFinished { epoch } => {
                if self.is_current(epoch) {
                    self.song_finished(events);
                }
            }
            Command::OutputFailed { epoch } => {
                if self.is_current(epoch) && self.is_active() {
                    warn!("controller: output failed, stopping");
                    self.halt(events);
                }
            }
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        epoch == self.sender.epoch()
    }

    fn is_active(&self) -> bool {
        matches!(self.state, PlaybackState::Playing | PlaybackState::Paused)
    }

    fn queue(&mut self, item: QueueItem, events: &mut Vec<Event>) {
        debug!("controller: queue {}", item.label());
        if self.decoder_queue.add(item.clone()) && self.player_queue.add(item) {
            events.push(Event::QueueChanged);
        }
    }

    fn play(&mut self, events: &mut Vec<Event>) {
        debug!("controller: play");

        match self.state {
            PlaybackState::Playing => {}
            PlaybackState::Paused => {
                // buffered samples of the paused song are still queued otherwise
                if std::mem::take(&mut self.reprime) && !self.prime_audible(events) {
                    self.state = PlaybackState::Stopped;
                    events.push(Event::Stopped);
                    return;
                }
                self.start_pipeline();
                self.state = PlaybackState::Playing;
                events.push(Event::Started);
            }
            PlaybackState::Stopped => {
                // start over when the previous run left the queue undefined
                if !self.decoder_queue.is_valid() {
                    self.decoder_queue.reset(Position::First);
                    self.player_queue.reset(Position::First);
                }
                if !self.decoder_queue.is_valid() {
                    return;
                }

                events.push(Event::SongChanged(self.player_queue.path()));

                if !self.decoder_initialized && !self.prime_audible(events) {
                    return;
                }
                self.start_pipeline();
                self.state = PlaybackState::Playing;
                events.push(Event::Started);
            }
        }
    }

    fn pause(&mut self, events: &mut Vec<Event>) {
        debug!("controller: pause");
        if self.state != PlaybackState::Playing {
            return;
        }

        self.player.pause();
        self.state = PlaybackState::Paused;
        events.push(Event::Paused);
    }

    fn stop(&mut self, events: &mut Vec<Event>) {
        debug!("controller: stop");
        if !self.is_active() {
            return;
        }
        self.halt(events);
    }

    /// Stop the pipeline and park the decoder on the audible song
    fn halt(&mut self, events: &mut Vec<Event>) {
        self.stop_pipeline();
        self.sync_decoder_queue();
        self.invalidate_decoder();
        self.state = PlaybackState::Stopped;
        events.push(Event::Stopped);
    }

    fn seek(&mut self, seconds: u64, events: &mut Vec<Event>) {
        debug!("controller: seek {}", seconds);
        if !self.is_active() {
            return;
        }

        self.stop_pipeline();
        self.sync_decoder_queue();

        if !self.prime_audible(events) {
            self.state = PlaybackState::Stopped;
            events.push(Event::Stopped);
            return;
        }

        let reached = self.reposition(seconds);
        events.push(Event::PositionChanged(reached));

        if self.state == PlaybackState::Playing {
            self.start_pipeline();
        }
    }

    /// Shared part of prev, next and go_to. `step` moves the player cursor
    /// and tells whether it moved.
    fn navigate<F>(&mut self, step: F, events: &mut Vec<Event>)
    where
        F: FnOnce(&mut Container) -> bool,
    {
        if !step(&mut self.player_queue) {
            events.push(Event::SongChanged(self.player_queue.path()));
            return;
        }

        if self.is_active() {
            self.stop_pipeline();
            self.invalidate_decoder();
            self.reprime = self.state == PlaybackState::Paused;
        }

        self.sync_decoder_queue();
        events.push(Event::SongChanged(self.player_queue.path()));

        if self.state == PlaybackState::Playing {
            if self.prime_audible(events) {
                self.start_pipeline();
            } else {
                self.state = PlaybackState::Stopped;
                events.push(Event::Stopped);
            }
        }
    }

    fn remove(&mut self, path: &[usize], events: &mut Vec<Event>) {
        debug!("controller: remove {}", format_path(path));

        let current = self.player_queue.path();
        let removing_current = !current.is_empty() && is_prefix(path, &current);

        if removing_current {
            let was_playing = self.state == PlaybackState::Playing;
            if self.is_active() {
                self.stop_pipeline();
                self.invalidate_decoder();
                self.state = PlaybackState::Stopped;
                events.push(Event::Stopped);
            }

            self.player_queue.remove(path);
            self.decoder_queue.remove(path);
            events.push(Event::QueueChanged);

            self.sync_decoder_queue();
            events.push(Event::SongChanged(self.player_queue.path()));

            if was_playing && self.player_queue.is_valid() && self.prime_audible(events) {
                self.start_pipeline();
                self.state = PlaybackState::Playing;
                events.push(Event::Started);
            }
            return;
        }

        // tracks already primed behind the audible one
        let decoder_path = self.decoder_queue.path();
        let primed_ahead = self.decoder_initialized && decoder_path != current;
        let hits_buffered = self.upcoming.iter().any(|p| is_prefix(path, p))
            || (primed_ahead && is_prefix(path, &decoder_path));

        let before = self.player_queue.clone();
        self.player_queue.remove(path);
        self.decoder_queue.remove(path);
        events.push(Event::QueueChanged);

        if hits_buffered && self.is_active() {
            self.resync_at_position(events);
        } else {
            self.upcoming = self
                .upcoming
                .drain(..)
                .filter_map(|p| shift_path(&before, &p, path))
                .collect();
        }
    }

    /// Restart decoding from the audible song at the current position
    fn resync_at_position(&mut self, events: &mut Vec<Event>) {
        let position = self.player.position();
        info!("controller: buffered tracks changed, restarting at {}s", position);

        self.stop_pipeline();
        self.sync_decoder_queue();

        if !self.prime_audible(events) {
            self.state = PlaybackState::Stopped;
            events.push(Event::Stopped);
            return;
        }

        self.reposition(position);
        if self.state == PlaybackState::Playing {
            self.start_pipeline();
        }
    }

    fn remove_all(&mut self, events: &mut Vec<Event>) {
        debug!("controller: remove all");

        if self.is_active() {
            self.stop_pipeline();
            self.invalidate_decoder();
            self.state = PlaybackState::Stopped;
            events.push(Event::Stopped);
        }

        self.decoder_queue.clear();
        self.player_queue.clear();

        events.push(Event::QueueChanged);
        events.push(Event::SongChanged(Vec::new()));
    }

    fn decoder_finished(&mut self) {
        debug!("controller: decoder finished");
        if !self.is_active() {
            return;
        }

        if !self.decoder_queue.next() {
            self.invalidate_decoder();
            return;
        }

        if self.prime_decoder() {
            self.upcoming.push_back(self.decoder_queue.path());
            self.decoder.start();
        }
    }

    fn song_finished(&mut self, events: &mut Vec<Event>) {
        debug!("controller: song finished");
        if !self.is_active() {
            return;
        }

        match self.upcoming.pop_front() {
            Some(path) if self.player_queue.set(&path) => {
                events.push(Event::SongChanged(path));
            }
            Some(_) => self.halt(events),
            None => {
                // the decoder is idle, songs may have been queued since it ran out
                let finished = self.player_queue.clone();
                if self.player_queue.next() {
                    // a late completion report of the finished input must not skip this one
                    self.sender.advance_epoch();
                    self.sync_decoder_queue();
                    if self.prime_decoder() {
                        self.player_queue = self.decoder_queue.clone();
                        self.decoder.start();
                        events.push(Event::SongChanged(self.player_queue.path()));
                        return;
                    }
                    self.player_queue = finished;
                }
                info!("controller: end of queue");
                self.halt(events);
            }
        }
    }

    /// Seek decoder and player, returns the position actually reached.
    /// A freshly opened input that refuses to seek plays from its start.
    fn reposition(&mut self, seconds: u64) -> u64 {
        let reached = if self.decoder.seek(seconds) {
            seconds
        } else {
            warn!("controller: unable to seek to {}s, playing from the start", seconds);
            0
        };
        self.player.seek(reached);
        reached
    }

    fn start_pipeline(&mut self) {
        self.decoder.start();
        self.player.start();
    }

    /// The player goes first, it would keep waking the decoder otherwise
    fn stop_pipeline(&mut self) {
        self.player.stop();
        self.decoder.stop();
        self.upcoming.clear();
        self.reprime = false;
        self.sender.advance_epoch();
    }

    fn invalidate_decoder(&mut self) {
        if self.decoder_initialized {
            self.decoder.set_input(None);
        }
        self.decoder_initialized = false;
    }

    fn sync_decoder_queue(&mut self) {
        self.decoder_queue = self.player_queue.clone();
    }

    /// Prime the decoder for the song that should be audible. When unplayable
    /// songs were skipped the player cursor follows the decoder.
    fn prime_audible(&mut self, events: &mut Vec<Event>) -> bool {
        if !self.prime_decoder() {
            return false;
        }

        if self.decoder_queue.path() != self.player_queue.path() {
            self.player_queue = self.decoder_queue.clone();
            events.push(Event::SongChanged(self.player_queue.path()));
        }
        true
    }

    /// Open the file under the decoder cursor, skipping files that cannot be opened
    fn prime_decoder(&mut self) -> bool {
        while let Some(file) = self.decoder_queue.file().cloned() {
            let path = file.full_path();

            match self.open(&path) {
                Ok(codec) => {
                    info!("controller: playing {}", path.display());
                    self.decoder.set_input(Some(codec));
                    self.decoder_initialized = true;
                    return true;
                }
                Err(e) => {
                    warn!("controller: skipping {}: {}", path.display(), e);
                    if !self.decoder_queue.next() {
                        break;
                    }
                }
            }
        }

        self.invalidate_decoder();
        false
    }

    fn open(&self, path: &std::path::Path) -> Result<Box<dyn Codec>, CodecError> {
        let mut codec = self.codecs.create(path).ok_or_else(|| CodecError::UnsupportedFormat {
            format: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("none")
                .to_string(),
        })?;
        codec.open()?;
        Ok(codec)
    }
}

fn is_prefix(prefix: &[usize], path: &[usize]) -> bool {
    !prefix.is_empty() && path.starts_with(prefix)
}

/// Where `path` of `tree` ends up after removing `removed`, `None` if it was removed
fn shift_path(tree: &Container, path: &[usize], removed: &[usize]) -> Option<Vec<usize>> {
    if is_prefix(removed, path) {
        return None;
    }
    let mut tree = tree.clone();
    if !tree.set(path) {
        return None;
    }
    tree.remove(removed);
    Some(tree.path())
}
