//! 19 kHz stereo pilot detector
//!
//! Continuous estimator with soft gating: each failing gate fades the
//! published value geometrically instead of zeroing it, so weak/DX
//! signals drop off the meter without visible snapping.

use super::spectrum::{power_to_db, DbSpectrum};

/// Pilot tone center frequency
const PILOT_HZ: f32 = 19_000.0;
/// Pilot measurement bandwidth (±800 Hz)
const PILOT_BAND_HZ: f32 = 1_600.0;
/// Mid-band noise reference center
const NOISE_HZ: f32 = 25_000.0;
/// Noise reference bandwidth
const NOISE_BAND_HZ: f32 = 3_000.0;

/// Signal-strength gate: below this percentage the pilot fades out
const SIGNAL_GATE_PERCENT: f32 = 12.0;
/// Pilot must clear the noise floor by this much
const MIN_SNR_DB: f32 = 1.2;
/// Amplitude-ratio floor against purely flat noise
const MIN_AMP_RATIO: f32 = 1.1;

/// Geometric fade applied per update while any gate fails
const GATE_DECAY: f32 = 0.92;
/// Pilot dB is normalized over this dynamic range (dB up from the floor)
const NORM_RANGE_DB: f32 = 85.0;
/// Typical pilot deviation range
const DEV_MAX_KHZ: f32 = 8.0;
/// Meter full scale
const SCALE_MAX_KHZ: f32 = 15.0;
/// Single-pole smoothing weights (slow attack, same-rate decay)
const SMOOTH_PREV: f32 = 0.88;
const SMOOTH_NEW: f32 = 0.12;

/// Pilot presence and deviation estimator
#[derive(Debug, Default)]
pub struct PilotDetector {
    smoothed: f32,
}

impl PilotDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current published percentage (0..100)
    pub fn level(&self) -> f32 {
        self.smoothed
    }

    /// Feed one smoothed spectrum; `signal_percent` is the externally
    /// supplied RF signal strength (0..100). Returns the published
    /// percentage.
    pub fn update(&mut self, spectrum: &DbSpectrum, signal_percent: f32) -> f32 {
        if spectrum.is_empty() {
            return self.smoothed;
        }

        let pilot_power = spectrum.band_power(PILOT_HZ, PILOT_BAND_HZ);
        let noise_power = spectrum.band_power(NOISE_HZ, NOISE_BAND_HZ);

        let pilot_db = power_to_db(pilot_power);
        let noise_db = power_to_db(noise_power);

        // Gate 1: signal presence
        if signal_percent < SIGNAL_GATE_PERCENT {
            return self.fade();
        }

        // Gate 2: SNR floor
        if pilot_db < noise_db + MIN_SNR_DB {
            return self.fade();
        }

        // Gate 3: amplitude ratio floor
        let ratio = pilot_power.sqrt() / noise_power.sqrt();
        if ratio < MIN_AMP_RATIO {
            return self.fade();
        }

        let norm = ((pilot_db + NORM_RANGE_DB) / NORM_RANGE_DB).clamp(0.0, 1.0);
        let dev_khz = norm * DEV_MAX_KHZ;
        let percent = ((dev_khz / SCALE_MAX_KHZ) * 100.0).clamp(0.0, 100.0);

        self.smoothed = self.smoothed * SMOOTH_PREV + percent * SMOOTH_NEW;
        self.smoothed
    }

    fn fade(&mut self) -> f32 {
        self.smoothed *= GATE_DECAY;
        self.smoothed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::spectrum::DB_FLOOR;

    fn tone_spectrum(tone_hz: f32, tone_db: f32, noise_db: f32) -> DbSpectrum {
        let n = 256;
        let max_freq = 96_000.0;
        let mut values = vec![noise_db; n];
        let idx = ((tone_hz / max_freq) * (n - 1) as f32).round() as usize;
        values[idx] = tone_db;
        DbSpectrum {
            values,
            max_freq_hz: max_freq,
        }
    }

    #[test]
    fn test_weak_signal_decays_monotonically_to_zero() {
        let mut detector = PilotDetector::new();
        let spectrum = tone_spectrum(19_000.0, -20.0, -60.0);

        // Warm up with a strong signal
        for _ in 0..50 {
            detector.update(&spectrum, 80.0);
        }
        let mut prev = detector.level();
        assert!(prev > 0.0);

        // Signal gate fails: geometric fade at 0.92/call
        for _ in 0..120 {
            let level = detector.update(&spectrum, 5.0);
            assert!(level <= prev);
            prev = level;
        }
        assert!(prev < 0.01, "should have faded to ~0, got {}", prev);
    }

    #[test]
    fn test_flat_noise_fails_gates() {
        let mut detector = PilotDetector::new();
        let flat = DbSpectrum {
            values: vec![-50.0; 256],
            max_freq_hz: 96_000.0,
        };

        for _ in 0..10 {
            detector.update(&flat, 80.0);
        }
        assert!(detector.level() < 0.01, "flat noise must not register");
    }

    #[test]
    fn test_clean_pilot_converges() {
        let mut detector = PilotDetector::new();
        let spectrum = tone_spectrum(19_000.0, -20.0, -60.0);

        let first = detector.update(&spectrum, 80.0);
        assert!(first > 0.0, "gates must pass for a clean pilot");

        let mut last = first;
        for _ in 0..300 {
            last = detector.update(&spectrum, 80.0);
        }
        // Converged: one more update barely moves it
        let next = detector.update(&spectrum, 80.0);
        assert!((next - last).abs() < 0.05);
        assert!(last > first);
    }

    #[test]
    fn test_floor_spectrum_keeps_level() {
        let mut detector = PilotDetector::new();
        let empty = DbSpectrum::default();
        assert_eq!(detector.update(&empty, 80.0), 0.0);

        // All-floor bins: noise band has no power, SNR gate decides
        let silent = tone_spectrum(19_000.0, DB_FLOOR, DB_FLOOR);
        let level = detector.update(&silent, 80.0);
        assert!(level.abs() < 1e-6);
    }
}
