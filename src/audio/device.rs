use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use log::{debug, error, info, warn};

use crate::audio::{Format, Output, RingBuffer};
use crate::error::OutputError;

/// State shared between the writer side and the device callback
struct Shared {
    ring: Arc<RingBuffer<f32>>,
    failed: AtomicBool,
    failure: Mutex<Option<String>>,
}

struct Running {
    format: Format,
    shared: Arc<Shared>,
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

/// Output through the system audio device.
///
/// The cpal stream lives on its own "audio-output" thread and pulls samples
/// from a ring buffer that `write` fills.
pub struct CpalOutput {
    preferred_device: Option<String>,
    buffer_size: usize,
    running: Option<Running>,
}

impl CpalOutput {
    /// `buffer_size` is the ring capacity in frames
    pub fn new(preferred_device: Option<String>, buffer_size: usize) -> Self {
        Self {
            preferred_device,
            buffer_size: buffer_size.max(256),
            running: None,
        }
    }

    /// Names of all output devices of the default host
    pub fn list_devices() -> Result<Vec<String>, OutputError> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| OutputError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    /// Select the preferred device, falling back to the default one
    fn select_device(&self) -> Result<Device, OutputError> {
        let host = cpal::default_host();

        if let Some(name) = &self.preferred_device {
            let found = host
                .output_devices()
                .map_err(|e| OutputError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false));

            match found {
                Some(device) => return Ok(device),
                None => warn!("Output device '{}' not found, using the default device", name),
            }
        }

        host.default_output_device()
            .ok_or_else(|| OutputError::DeviceNotFound {
                device: "default".to_string(),
            })
    }

    fn shutdown(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(());
            if running.handle.join().is_err() {
                error!("Audio output thread panicked");
            }
        }
    }
}

impl Output for CpalOutput {
    fn setup(&mut self, format: Format) -> Result<(), OutputError> {
        if self.running.as_ref().map(|r| r.format) == Some(format) {
            return Ok(());
        }
        self.shutdown();

        format
            .validate()
            .map_err(|_| OutputError::UnsupportedFormat {
                rate: format.rate,
                channels: format.channels,
            })?;

        let device = self.select_device()?;
        let shared = Arc::new(Shared {
            ring: Arc::new(RingBuffer::new(self.buffer_size * format.channels as usize)),
            failed: AtomicBool::new(false),
            failure: Mutex::new(None),
        });

        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_shared = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || run_stream(device, format, thread_shared, ready_tx, shutdown_rx))
            .map_err(|e| OutputError::InitializationFailed(format!("Failed to create audio thread: {}", e)))?;

        // Stream is !Send, so the result of building it comes back over a channel
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(OutputError::InitializationFailed(
                    "Audio output thread exited during setup".to_string(),
                ));
            }
        }

        info!("Audio output running at {}", format);
        self.running = Some(Running {
            format,
            shared,
            shutdown: shutdown_tx,
            handle,
        });
        Ok(())
    }

    fn format(&self) -> Option<Format> {
        self.running.as_ref().map(|r| r.format)
    }

    fn free_size(&self) -> usize {
        self.running
            .as_ref()
            .map(|r| r.shared.ring.free_size())
            .unwrap_or(0)
    }

    fn write(&mut self, samples: &[f32]) -> Result<usize, OutputError> {
        let running = self.running.as_ref().ok_or(OutputError::NotConfigured)?;

        if running.shared.failed.load(Ordering::Acquire) {
            let message = running
                .shared
                .failure
                .lock()
                .ok()
                .and_then(|m| m.clone())
                .unwrap_or_else(|| "unknown stream error".to_string());
            return Err(OutputError::StreamError(message));
        }

        Ok(running.shared.ring.write(samples))
    }

    fn drop_buffer(&mut self) {
        if let Some(running) = &self.running {
            running.shared.ring.clear();
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_stream(
    device: Device,
    format: Format,
    shared: Arc<Shared>,
    ready: Sender<Result<(), OutputError>>,
    shutdown: Receiver<()>,
) {
    // Set high priority for audio thread (platform-specific)
    #[cfg(target_os = "macos")]
    {
        unsafe {
            let thread = libc::pthread_self();
            let mut policy: libc::c_int = 0;
            let mut param: libc::sched_param = std::mem::zeroed();

            if libc::pthread_getschedparam(thread, &mut policy, &mut param) == 0 {
                param.sched_priority = 63;
                let _ = libc::pthread_setschedparam(thread, libc::SCHED_FIFO, &param);
            }
        }
    }

    let stream = match build_stream(&device, format, &shared) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(OutputError::StreamError(format!("Failed to start audio stream: {}", e))));
        return;
    }
    let _ = ready.send(Ok(()));

    // Park until the owner shuts us down or goes away
    let _ = shutdown.recv();
    let _ = stream.pause();
    debug!("Audio output thread finished");
}

fn build_stream(device: &Device, format: Format, shared: &Arc<Shared>) -> Result<Stream, OutputError> {
    let config = StreamConfig {
        channels: format.channels,
        sample_rate: SampleRate(format.rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let sample_format = device
        .default_output_config()
        .map_err(|e| OutputError::InitializationFailed(format!("Failed to get default config: {}", e)))?
        .sample_format();

    match sample_format {
        SampleFormat::F32 => create_typed_stream::<f32>(device, &config, shared),
        SampleFormat::I16 => create_typed_stream::<i16>(device, &config, shared),
        SampleFormat::U16 => create_typed_stream::<u16>(device, &config, shared),
        other => Err(OutputError::InitializationFailed(format!(
            "Unsupported sample format: {:?}",
            other
        ))),
    }
}

fn create_typed_stream<T>(device: &Device, config: &StreamConfig, shared: &Arc<Shared>) -> Result<Stream, OutputError>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let ring = Arc::clone(&shared.ring);
    let error_shared = Arc::clone(shared);
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                let read = ring.read(&mut scratch);

                // Silence if not enough data
                for (i, sample) in data.iter_mut().enumerate() {
                    let value = if i < read { scratch[i] } else { 0.0 };
                    *sample = T::from_sample(value);
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
                if let Ok(mut failure) = error_shared.failure.lock() {
                    *failure = Some(err.to_string());
                }
                error_shared.failed.store(true, Ordering::Release);
            },
            None,
        )
        .map_err(|e| OutputError::StreamError(format!("Failed to build output stream: {}", e)))
}
