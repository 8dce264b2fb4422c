//! Frequency bin reduction for network transport

use serde::{Deserialize, Serialize};

/// Bins averaged per reduced pair
pub const BIN_STEP: usize = 2;

/// Reduced frames stop above this frequency
pub const FREQUENCY_CEILING_HZ: f32 = 100_000.0;

/// One reduced spectrum point as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralBin {
    /// Frequency in Hz
    pub f: f32,
    /// Averaged magnitude
    pub m: f32,
}

/// Ordered reduced spectrum; at most one "latest" frame is ever held
/// downstream
pub type SpectralFrame = Vec<SpectralBin>;

/// Compress a full-resolution magnitude spectrum by averaging groups of
/// `bin_step` adjacent bins, stopping once the implied frequency
/// exceeds `ceiling_hz`. Pure function; empty input yields an empty
/// frame which callers must not broadcast.
pub fn reduce_spectrum(
    magnitudes: &[f32],
    sample_rate: u32,
    fft_size: usize,
    bin_step: usize,
    ceiling_hz: f32,
) -> SpectralFrame {
    let bin_width = sample_rate as f32 / fft_size as f32;
    let mut frame = Vec::with_capacity(magnitudes.len() / bin_step.max(1) + 1);

    let mut i = 0;
    while i < magnitudes.len() {
        let freq = i as f32 * bin_width;
        if freq > ceiling_hz {
            break;
        }

        let group = &magnitudes[i..(i + bin_step).min(magnitudes.len())];
        let avg = group.iter().sum::<f32>() / group.len() as f32;
        frame.push(SpectralBin { f: freq, m: avg });

        i += bin_step;
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_empty_frame() {
        let frame = reduce_spectrum(&[], 192000, 512, BIN_STEP, FREQUENCY_CEILING_HZ);
        assert!(frame.is_empty());
    }

    #[test]
    fn test_averages_groups() {
        // 48 kHz / 8 bins = 6 kHz bin width
        let mags = [1.0, 3.0, 5.0, 7.0];
        let frame = reduce_spectrum(&mags, 48000, 8, 2, FREQUENCY_CEILING_HZ);

        assert_eq!(frame.len(), 2);
        assert_eq!(frame[0], SpectralBin { f: 0.0, m: 2.0 });
        assert_eq!(frame[1], SpectralBin { f: 12000.0, m: 6.0 });
    }

    #[test]
    fn test_trailing_partial_group() {
        let mags = [2.0, 4.0, 6.0];
        let frame = reduce_spectrum(&mags, 48000, 8, 2, FREQUENCY_CEILING_HZ);

        assert_eq!(frame.len(), 2);
        assert_eq!(frame[1], SpectralBin { f: 12000.0, m: 6.0 });
    }

    #[test]
    fn test_frequency_ceiling() {
        // 192 kHz / 512 = 375 Hz per bin; 256 bins reach 95.6 kHz so all
        // survive a 100 kHz ceiling, but a 50 kHz ceiling cuts the tail
        let mags = vec![1.0; 256];
        let full = reduce_spectrum(&mags, 192000, 512, 2, FREQUENCY_CEILING_HZ);
        assert_eq!(full.len(), 128);

        let cut = reduce_spectrum(&mags, 192000, 512, 2, 50_000.0);
        assert!(cut.last().unwrap().f <= 50_000.0);
        assert!(cut.len() < full.len());
    }

    #[test]
    fn test_frequencies_are_ordered() {
        let mags = vec![0.5; 64];
        let frame = reduce_spectrum(&mags, 96000, 128, 2, FREQUENCY_CEILING_HZ);
        for pair in frame.windows(2) {
            assert!(pair[0].f < pair[1].f);
        }
    }
}
