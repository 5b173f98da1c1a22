use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::audio::{Filter, Format};

/// Shared volume control, written by the controller and read per block by the
/// player thread
#[derive(Debug)]
pub struct Volume {
    level: AtomicU8,
    // f32 bits of the gain for `level`
    gain: AtomicU32,
}

impl Volume {
    pub const MAX: u8 = 100;

    pub fn new(level: u8) -> Self {
        let volume = Self {
            level: AtomicU8::new(0),
            gain: AtomicU32::new(0f32.to_bits()),
        };
        volume.set_level(level.min(Self::MAX));
        volume
    }

    pub fn level(&self) -> u8 {
        self.level.load(Ordering::Relaxed)
    }

    /// Returns false and changes nothing when `level` is above 100
    pub fn set_level(&self, level: u8) -> bool {
        if level > Self::MAX {
            return false;
        }
        self.gain.store(gain_for(level).to_bits(), Ordering::Relaxed);
        self.level.store(level, Ordering::Relaxed);
        true
    }

    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    /// Scale `samples` by the current gain
    pub fn apply(&self, samples: &mut [f32]) {
        let gain = self.gain();
        if gain == 1.0 {
            return;
        }
        for sample in samples.iter_mut() {
            *sample *= gain;
        }
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(Self::MAX)
    }
}

impl Filter for &Volume {
    fn run(&mut self, samples: &mut Vec<f32>, _format: Format) {
        self.apply(samples);
    }
}

/// Exponential curve mapping 0..=100 onto 0.0..=1.0
fn gain_for(level: u8) -> f32 {
    let e = std::f64::consts::E;
    let x = level as f64 / Volume::MAX as f64;
    ((x.exp() - 1.0) / (e - 1.0)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_curve_endpoints() {
        assert_eq!(gain_for(0), 0.0);
        assert!((gain_for(100) - 1.0).abs() < 1e-6);

        // the curve sits below the straight line
        let half = gain_for(50);
        assert!(half > 0.3 && half < 0.5, "gain at 50 was {}", half);
    }

    #[test]
    fn test_out_of_range_level_is_ignored() {
        let volume = Volume::new(40);
        assert!(!volume.set_level(101));
        assert_eq!(volume.level(), 40);

        assert!(volume.set_level(0));
        assert_eq!(volume.level(), 0);
        assert_eq!(volume.gain(), 0.0);
    }

    #[test]
    fn test_filter_scales_samples() {
        let volume = Volume::new(0);
        let mut samples = vec![0.5, -0.5];
        (&volume).run(&mut samples, Format::new(44100, 2));
        assert_eq!(samples, vec![0.0, 0.0]);

        volume.set_level(100);
        let mut samples = vec![0.5, -0.5];
        volume.apply(&mut samples);
        assert_eq!(samples, vec![0.5, -0.5]);
    }
}
