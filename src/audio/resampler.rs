/*!
Streaming linear resampler for interleaved f32 audio, plus the `Resample`
filter that converts decoded blocks to the output format.

The resampler keeps the last frame of each block so interpolation stays
continuous across successive `process()` calls.
*/

use crate::audio::{Filter, Format};

#[derive(Debug, Clone)]
pub struct LinearResampler {
    src_rate: u32,
    dst_rate: u32,
    channels: usize,

    // source frames per output frame (src/dst)
    step: f64,

    // position relative to the start of `prev_frame`
    pos: f64,
    prev_frame: Vec<f32>,
}

impl LinearResampler {
    pub fn new(src_rate: u32, dst_rate: u32, channels: usize) -> Self {
        let mut resampler = Self {
            src_rate,
            dst_rate,
            channels,
            step: 0.0,
            pos: 0.0,
            prev_frame: Vec::new(),
        };
        resampler.set_rates(src_rate, dst_rate);
        resampler
    }

    /// Forget the streaming phase and history
    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.prev_frame.clear();
    }

    /// Change rates, keeping the streaming phase
    pub fn set_rates(&mut self, src_rate: u32, dst_rate: u32) {
        self.src_rate = src_rate;
        self.dst_rate = dst_rate;
        self.step = if dst_rate == 0 {
            0.0
        } else {
            src_rate as f64 / dst_rate as f64
        };
    }

    pub fn config(&self) -> (u32, u32, usize) {
        (self.src_rate, self.dst_rate, self.channels)
    }

    /// Resample one block of interleaved frames
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.channels == 0 || self.dst_rate == 0 || self.src_rate == 0 {
            return Vec::new();
        }

        let ch = self.channels;
        let in_frames = input.len() / ch;
        if in_frames == 0 {
            return Vec::new();
        }

        // [prev_frame, input...], a silent frame stands in before the first block
        let mut work = Vec::with_capacity((in_frames + 1) * ch);
        if self.prev_frame.len() == ch {
            work.extend_from_slice(&self.prev_frame);
        } else {
            work.resize(ch, 0.0);
        }
        work.extend_from_slice(&input[..in_frames * ch]);

        let total_frames = work.len() / ch;
        let expected =
            (in_frames as f64 * self.dst_rate as f64 / self.src_rate as f64).ceil() as usize + 4;
        let mut out = Vec::with_capacity(expected * ch);

        while self.pos < (total_frames - 1) as f64 {
            let i = self.pos.floor() as usize;
            let frac = (self.pos - i as f64) as f32;
            let (base0, base1) = (i * ch, (i + 1) * ch);

            out.extend((0..ch).map(|c| {
                let s0 = work[base0 + c];
                let s1 = work[base1 + c];
                s0 + (s1 - s0) * frac
            }));

            self.pos += self.step;
        }

        // The last frame becomes index 0 of the next call, the phase carries over
        let last = (total_frames - 1) * ch;
        self.prev_frame.clear();
        self.prev_frame.extend_from_slice(&work[last..last + ch]);
        self.pos -= (total_frames - 1) as f64;

        out
    }
}

/// Truncate or pad each frame from `from` to `to` channels
pub fn remap_channels(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 {
        return samples.to_vec();
    }

    let frames = samples.len() / from;
    let mut remapped = Vec::with_capacity(frames * to);
    for frame in samples.chunks_exact(from) {
        if to <= from {
            remapped.extend_from_slice(&frame[..to]);
        } else {
            remapped.extend_from_slice(frame);
            remapped.resize(remapped.len() + (to - from), 0.0);
        }
    }
    remapped
}

/// Converts blocks of any format to a fixed output format
#[derive(Debug, Clone)]
pub struct Resample {
    output: Format,
    resampler: Option<LinearResampler>,
}

impl Resample {
    pub fn new(output: Format) -> Self {
        Self {
            output,
            resampler: None,
        }
    }

    pub fn output(&self) -> Format {
        self.output
    }

    /// Drop interpolation history, used between tracks and after seeks
    pub fn reset(&mut self) {
        self.resampler = None;
    }
}

impl Filter for Resample {
    fn run(&mut self, samples: &mut Vec<f32>, format: Format) {
        let channels = self.output.channels as usize;

        if format.channels as usize != channels {
            *samples = remap_channels(samples, format.channels as usize, channels);
        }

        if format.rate == self.output.rate {
            return;
        }

        let output_rate = self.output.rate;
        let resampler = self
            .resampler
            .get_or_insert_with(|| LinearResampler::new(format.rate, output_rate, channels));
        if resampler.config().0 != format.rate {
            resampler.set_rates(format.rate, output_rate);
        }

        *samples = resampler.process(samples);
    }
}
