//! Spectral frame builder: bounded-latency sample buffer + windowed FFT

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Default FFT block length
pub const DEFAULT_FFT_SIZE: usize = 512;

/// Latency cap: the sample buffer never holds more than this many blocks
pub const MAX_LATENCY_BLOCKS: usize = 2;

/// Gain applied to every magnitude bin except DC, compensating for
/// attenuation introduced upstream of the capture tap
const NON_DC_GAIN: f32 = 10.0;

/// Accumulates mono samples and turns fixed-size blocks into magnitude
/// spectra. The newest samples win: when enough are buffered, the most
/// recent block is transformed and the buffer advances by half a block
/// (50% overlap).
pub struct SpectralFrameBuilder {
    fft: Arc<dyn Fft<f32>>,
    /// FFT input scratch
    input: Vec<Complex<f32>>,
    /// Hann window coefficients (symmetric)
    window: Vec<f32>,
    /// Pending mono samples, oldest first
    samples: Vec<f32>,
    sample_rate: u32,
    fft_size: usize,
}

impl SpectralFrameBuilder {
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let denom = (fft_size - 1) as f32;
        let window: Vec<f32> = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos()))
            .collect();

        Self {
            fft,
            input: vec![Complex::new(0.0, 0.0); fft_size],
            window,
            samples: Vec::with_capacity(MAX_LATENCY_BLOCKS * fft_size),
            sample_rate,
            fft_size,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Hop length between consecutive blocks (50% overlap)
    pub fn hop_size(&self) -> usize {
        self.fft_size / 2
    }

    /// Number of buffered samples
    pub fn buffered(&self) -> usize {
        self.samples.len()
    }

    /// Center frequency of a full-resolution bin
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.fft_size as f32
    }

    /// Append mono samples, discarding the oldest once the latency cap
    /// is exceeded
    pub fn push(&mut self, mono: &[f32]) {
        self.samples.extend_from_slice(mono);

        let cap = MAX_LATENCY_BLOCKS * self.fft_size;
        if self.samples.len() > cap {
            let overflow = self.samples.len() - cap;
            self.samples.drain(..overflow);
        }
    }

    /// Whether a full block is available
    pub fn ready(&self) -> bool {
        self.samples.len() >= self.fft_size
    }

    /// Transform the most recent block into a half-spectrum of
    /// magnitudes, then advance the buffer by one hop. Returns None
    /// until a full block is buffered.
    pub fn next_spectrum(&mut self) -> Option<Vec<f32>> {
        if !self.ready() {
            return None;
        }

        let start = self.samples.len() - self.fft_size;
        for (i, &sample) in self.samples[start..].iter().enumerate() {
            self.input[i] = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.input);

        let half = self.fft_size / 2;
        let norm = half as f32;
        let magnitudes: Vec<f32> = self.input[..half]
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let m = c.norm() / norm;
                if i == 0 {
                    m
                } else {
                    m * NON_DC_GAIN
                }
            })
            .collect();

        self.samples.drain(..self.hop_size());

        Some(magnitudes)
    }

    /// Drop all buffered samples (source change)
    pub fn reset(&mut self) {
        self.samples.clear();
    }
}
