use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::audio::{Codec, Fifo, Filter, Format, Resample};
use crate::player::mailbox::Mailbox;

/// Directives the controller gives the decoder thread
pub trait DecoderControl: Send {
    /// Replace the codec to decode from, `None` drops the current one
    fn set_input(&mut self, input: Option<Box<dyn Codec>>);

    /// Start pulling samples from the input
    fn start(&mut self);

    /// Stop decoding and drop buffered samples. Returns once the decoder
    /// thread has processed the request.
    fn stop(&mut self);

    /// Reposition the input to `seconds`. Returns once the decoder thread
    /// has tried, false when the input could not be repositioned.
    fn seek(&mut self, seconds: u64) -> bool;

    /// Terminate the decoder thread
    fn shutdown(&mut self) {}
}

enum DecoderCommand {
    Input(Option<Box<dyn Codec>>),
    Start,
    Stop,
    Seek(u64),
}

/// Handle of the decoder thread
pub struct Decoder {
    mailbox: Arc<Mailbox<DecoderCommand>>,
    seeked: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Decoder {
    /// Start the decoder thread.
    ///
    /// Decoded samples are converted to `output` and queued into `fifo` until
    /// it holds more than `watermark` samples. `on_finished` runs on the
    /// decoder thread once per track when its input is exhausted, before the
    /// track's end marker is queued.
    pub fn spawn<F>(fifo: Arc<Fifo>, output: Format, watermark: usize, on_finished: F) -> std::io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let mailbox = Arc::new(Mailbox::new());
        let seeked = Arc::new(AtomicBool::new(false));

        let waker = Arc::clone(&mailbox);
        fifo.set_notify_callback(watermark, move || waker.wake());

        let worker = Worker {
            mailbox: Arc::clone(&mailbox),
            seeked: Arc::clone(&seeked),
            fifo,
            watermark,
            input: None,
            working: false,
            resample: Resample::new(output),
            on_finished: Box::new(on_finished),
        };

        let handle = thread::Builder::new()
            .name("decoder".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            mailbox,
            seeked,
            handle: Some(handle),
        })
    }
}

impl DecoderControl for Decoder {
    fn set_input(&mut self, input: Option<Box<dyn Codec>>) {
        self.mailbox.send(DecoderCommand::Input(input));
    }

    fn start(&mut self) {
        self.mailbox.send(DecoderCommand::Start);
    }

    fn stop(&mut self) {
        self.mailbox.send_and_wait(DecoderCommand::Stop);
    }

    fn seek(&mut self, seconds: u64) -> bool {
        self.seeked.store(false, Ordering::SeqCst);
        self.mailbox.send_and_wait(DecoderCommand::Seek(seconds));
        self.seeked.load(Ordering::SeqCst)
    }

    fn shutdown(&mut self) {
        self.mailbox.close();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Decoder thread panicked");
            }
        }
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    mailbox: Arc<Mailbox<DecoderCommand>>,
    seeked: Arc<AtomicBool>,
    fifo: Arc<Fifo>,
    watermark: usize,
    input: Option<Box<dyn Codec>>,
    working: bool,
    resample: Resample,
    on_finished: Box<dyn Fn() + Send>,
}

impl Worker {
    fn run(mut self) {
        debug!("Decoder thread started");

        loop {
            let commands = if self.wants_samples() {
                self.mailbox.take()
            } else {
                match self.mailbox.wait(None) {
                    Some(commands) => commands,
                    None => break,
                }
            };

            let count = commands.len();
            for command in commands {
                self.handle(command);
            }
            self.mailbox.done(count);

            if self.wants_samples() {
                self.decode_block();
            }
        }

        debug!("Decoder thread finished");
    }

    fn wants_samples(&self) -> bool {
        self.working && self.input.is_some() && self.fifo.len() <= self.watermark
    }

    fn handle(&mut self, command: DecoderCommand) {
        match command {
            DecoderCommand::Input(input) => {
                debug!("decoder: input {}", if input.is_some() { "file" } else { "null" });
                self.input = input;
                self.resample.reset();
            }
            DecoderCommand::Start => {
                if self.input.is_none() {
                    warn!("decoder: unable to start working without input");
                }
                self.working = true;
            }
            DecoderCommand::Stop => {
                debug!("decoder: stop");
                self.fifo.reset();
                self.working = false;
            }
            DecoderCommand::Seek(seconds) => {
                let seeked = match self.input.as_mut() {
                    Some(input) => {
                        let frame = input.format().frames_of_seconds(seconds);
                        match input.seek(frame) {
                            Ok(()) => true,
                            Err(e) => {
                                warn!("decoder: seek to {}s failed: {}", seconds, e);
                                false
                            }
                        }
                    }
                    None => false,
                };
                self.resample.reset();
                self.seeked.store(seeked, Ordering::SeqCst);
            }
        }
    }

    fn decode_block(&mut self) {
        let Some(input) = self.input.as_mut() else {
            return;
        };

        match input.decode() {
            Ok(Some(block)) => {
                let format = Format::new(block.sample_rate, block.channels);
                let mut samples = block.samples;
                self.resample.run(&mut samples, format);
                self.fifo.add_samples(&samples);
            }
            Ok(None) => self.end_of_stream(),
            Err(e) => {
                error!("decoder: {}", e);
                self.end_of_stream();
            }
        }
    }

    fn end_of_stream(&mut self) {
        info!("decoder: end of stream");
        self.input = None;
        self.resample.reset();
        // the completion report must be queued before the player can see the marker
        (self.on_finished)();
        self.fifo.add_marker();
    }
}
