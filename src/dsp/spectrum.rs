//! Smoothed dB spectrum and the band-power primitive shared by every
//! detector

use super::reducer::SpectralBin;

/// Display floor for received magnitudes; bins at or below it carry no
/// usable power
pub const DB_FLOOR: f32 = -70.0;

/// Display ceiling
pub const DB_CEILING: f32 = 0.0;

/// Guard against log10(0)
pub const AMP_EPSILON: f32 = 1e-15;

/// Amplitude to dB with the epsilon floor
pub fn amp_to_db(amp: f32) -> f32 {
    20.0 * (amp + AMP_EPSILON).log10()
}

/// Power to dB with the epsilon floor
pub fn power_to_db(power: f32) -> f32 {
    10.0 * (power + AMP_EPSILON).log10()
}

/// dB to linear amplitude
pub fn db_to_amp(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// A frame's magnitudes converted to dB, averaged across frames
#[derive(Debug, Clone, Default)]
pub struct DbSpectrum {
    /// Per-bin levels in dB, clamped to [DB_FLOOR, DB_CEILING]
    pub values: Vec<f32>,
    /// Frequency of the last representable bin (Nyquist)
    pub max_freq_hz: f32,
}

impl DbSpectrum {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Total power (amplitude squared) inside the band
    /// `[center - bw/2, center + bw/2]`. Returns 0 for an empty
    /// spectrum or a window that spans no bins.
    pub fn band_power(&self, center_hz: f32, band_hz: f32) -> f32 {
        if self.values.is_empty() || self.max_freq_hz <= 0.0 {
            return 0.0;
        }

        let n = self.values.len();
        let f_min = center_hz - band_hz / 2.0;
        let f_max = center_hz + band_hz / 2.0;

        let idx_min = ((f_min / self.max_freq_hz) * (n - 1) as f32).floor().max(0.0) as usize;
        let idx_max =
            (((f_max / self.max_freq_hz) * (n - 1) as f32).ceil() as usize).min(n - 1);
        if idx_max <= idx_min {
            return 0.0;
        }

        let mut power = 0.0;
        for &db in &self.values[idx_min..=idx_max] {
            if !db.is_finite() || db <= DB_FLOOR {
                continue;
            }
            let amp = db_to_amp(db);
            power += amp * amp;
        }
        power
    }

    /// Average level in dB over `[0, limit_hz]`, skipping bins below
    /// -140 dB. None when no bin qualifies.
    pub fn average_db(&self, limit_hz: f32) -> Option<f32> {
        if self.values.is_empty() || self.max_freq_hz <= 0.0 {
            return None;
        }

        let n = self.values.len();
        let mut sum = 0.0;
        let mut count = 0usize;

        for (i, &db) in self.values.iter().enumerate() {
            let freq = (i as f32 / (n - 1) as f32) * self.max_freq_hz;
            if freq > limit_hz {
                break;
            }
            if !db.is_finite() || db < -140.0 {
                continue;
            }
            sum += db;
            count += 1;
        }

        if count == 0 {
            None
        } else {
            Some(sum / count as f32)
        }
    }
}

/// Rolling average over incoming frames, in dB space.
///
/// `depth` trades responsiveness for stability:
/// `smooth = (smooth * (depth - 1) + new) / depth`.
pub struct SpectrumSmoother {
    depth: f32,
    spectrum: DbSpectrum,
}

impl SpectrumSmoother {
    pub fn new(depth: u32, max_freq_hz: f32) -> Self {
        Self {
            depth: depth.max(1) as f32,
            spectrum: DbSpectrum {
                values: Vec::new(),
                max_freq_hz,
            },
        }
    }

    /// Fold one received frame into the smoothed spectrum
    pub fn update(&mut self, frame: &[SpectralBin]) {
        if frame.is_empty() {
            return;
        }

        let incoming: Vec<f32> = frame
            .iter()
            .map(|bin| amp_to_db(bin.m).clamp(DB_FLOOR, DB_CEILING))
            .collect();

        if self.spectrum.values.is_empty() {
            self.spectrum.values = incoming;
            return;
        }

        let len = incoming.len().min(self.spectrum.values.len());
        for i in 0..len {
            self.spectrum.values[i] =
                (self.spectrum.values[i] * (self.depth - 1.0) + incoming[i]) / self.depth;
        }
        // A longer frame extends the tail verbatim
        if incoming.len() > len {
            self.spectrum.values.extend_from_slice(&incoming[len..]);
        }
    }

    pub fn spectrum(&self) -> &DbSpectrum {
        &self.spectrum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat spectrum at `noise_db` with one tone bin at `tone_db`
    pub(crate) fn tone_spectrum(
        n: usize,
        max_freq_hz: f32,
        tone_hz: f32,
        tone_db: f32,
        noise_db: f32,
    ) -> DbSpectrum {
        let mut values = vec![noise_db; n];
        let idx = ((tone_hz / max_freq_hz) * (n - 1) as f32).round() as usize;
        values[idx.min(n - 1)] = tone_db;
        DbSpectrum {
            values,
            max_freq_hz,
        }
    }

    #[test]
    fn test_db_round_trip() {
        let amp = 0.05;
        assert!((db_to_amp(amp_to_db(amp)) - amp).abs() < 1e-4);
    }

    #[test]
    fn test_band_power_empty() {
        let spectrum = DbSpectrum::default();
        assert_eq!(spectrum.band_power(19000.0, 1600.0), 0.0);
    }

    #[test]
    fn test_band_power_finds_tone() {
        let spectrum = tone_spectrum(256, 96000.0, 19000.0, -10.0, DB_FLOOR);
        let in_band = spectrum.band_power(19000.0, 1600.0);
        let off_band = spectrum.band_power(40000.0, 1600.0);
        assert!(in_band > 0.0);
        assert_eq!(off_band, 0.0, "floor bins carry no power");
    }

    #[test]
    fn test_band_power_window_spanning_no_bins() {
        let spectrum = tone_spectrum(8, 96000.0, 19000.0, -10.0, -30.0);
        // Sub-bin-width window collapses to idx_max <= idx_min
        assert!(spectrum.band_power(19000.0, 1600.0) >= 0.0);
        assert_eq!(spectrum.band_power(-50000.0, 10.0), 0.0);
    }

    #[test]
    fn test_smoother_first_frame_adopted() {
        let mut smoother = SpectrumSmoother::new(6, 96000.0);
        smoother.update(&[SpectralBin { f: 0.0, m: 0.1 }]);
        let expected = amp_to_db(0.1).clamp(DB_FLOOR, DB_CEILING);
        assert!((smoother.spectrum().values[0] - expected).abs() < 1e-4);
    }

    #[test]
    fn test_smoother_converges() {
        let mut smoother = SpectrumSmoother::new(4, 96000.0);
        smoother.update(&[SpectralBin { f: 0.0, m: 1e-9 }]); // near floor

        let target = amp_to_db(0.5);
        for _ in 0..200 {
            smoother.update(&[SpectralBin { f: 0.0, m: 0.5 }]);
        }
        assert!((smoother.spectrum().values[0] - target).abs() < 0.1);
    }

    #[test]
    fn test_smoother_extends_longer_frames() {
        let mut smoother = SpectrumSmoother::new(6, 96000.0);
        smoother.update(&[SpectralBin { f: 0.0, m: 0.1 }]);
        smoother.update(&[
            SpectralBin { f: 0.0, m: 0.1 },
            SpectralBin { f: 375.0, m: 0.2 },
        ]);
        assert_eq!(smoother.spectrum().values.len(), 2);
    }

    #[test]
    fn test_average_db_limit() {
        let spectrum = DbSpectrum {
            values: vec![-10.0, -20.0, -30.0, -40.0],
            max_freq_hz: 96000.0,
        };
        // Bins sit at 0, 32k, 64k, 96k; a 60 kHz limit keeps the first two
        let avg = spectrum.average_db(60_000.0).unwrap();
        assert!((avg - (-15.0)).abs() < 1e-4);
    }
}
