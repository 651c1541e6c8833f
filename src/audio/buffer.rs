use serde::{Deserialize, Serialize};

/// Mono audio at a fixed sample rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn silence(duration_secs: f64, sample_rate: u32) -> Self {
        let len = secs_to_samples(duration_secs, sample_rate);
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> f64 {
        samples_to_secs(self.samples.len(), self.sample_rate)
    }

    /// Copy `len` samples starting at `start`, zero-filling past the end
    pub fn slice_padded(&self, start: usize, len: usize) -> Vec<f32> {
        let mut out = vec![0.0; len];
        if start < self.samples.len() {
            let available = (self.samples.len() - start).min(len);
            out[..available].copy_from_slice(&self.samples[start..start + available]);
        }
        out
    }

    /// Force the buffer to exactly `len` samples by truncating or zero-padding
    pub fn conform_len(&mut self, len: usize) {
        self.samples.resize(len, 0.0);
    }

    pub fn peak(&self) -> f32 {
        super::dsp::peak(&self.samples)
    }
}

/// Position in seconds to the nearest sample index
pub fn secs_to_samples(secs: f64, sample_rate: u32) -> usize {
    (secs.max(0.0) * sample_rate as f64).round() as usize
}

pub fn samples_to_secs(samples: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    samples as f64 / sample_rate as f64
}
