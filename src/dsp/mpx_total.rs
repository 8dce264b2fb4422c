//! Total MPX modulation estimator
//!
//! Maps the average baseband level to an estimated deviation through a
//! piecewise-linear curve calibrated against reference captures. Hard
//! gated on RF and pilot: an absent carrier carries no modulation, so
//! the meter resets to zero instead of fading.

use super::spectrum::DbSpectrum;

/// RF gate: below this signal percentage there is no station
const SIGNAL_GATE_PERCENT: f32 = 25.0;
/// Pilot gate: below this pilot percentage there is no pilot lock
const PILOT_GATE_PERCENT: f32 = 5.0;

/// Baseband integration window upper bound
const BASEBAND_LIMIT_HZ: f32 = 60_000.0;

/// Deviation clamp and meter full scale, in kHz
const DEV_CLAMP_KHZ: f32 = 120.0;
/// Scale boost so typical modulation uses more of the meter
const BOOST: f32 = 1.30;

/// Double smoothing: fast stage feeding a slow stage
const SHORT_FACTOR: f32 = 0.75;
const LONG_FACTOR: f32 = 0.93;

/// Average-dB breakpoints and the deviations they map to:
/// -80 -> 0, -60 -> 25, -50 -> 40, -40 -> 60, -30 -> 80, -20 -> 100 kHz
fn db_to_deviation_khz(avg_db: f32) -> f32 {
    let dev = if avg_db < -60.0 {
        (avg_db + 80.0) * (25.0 / 20.0)
    } else if avg_db < -50.0 {
        25.0 + (avg_db + 60.0) * (15.0 / 10.0)
    } else if avg_db < -40.0 {
        40.0 + (avg_db + 50.0) * (20.0 / 10.0)
    } else if avg_db < -30.0 {
        60.0 + (avg_db + 40.0) * (20.0 / 10.0)
    } else {
        80.0 + (avg_db + 30.0) * (20.0 / 10.0)
    };
    dev.clamp(0.0, DEV_CLAMP_KHZ)
}

/// Total-modulation estimator
#[derive(Debug, Default)]
pub struct MpxTotalEstimator {
    short_prev: f32,
    long_prev: f32,
}

impl MpxTotalEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current published percentage (0..100)
    pub fn level(&self) -> f32 {
        self.long_prev
    }

    /// Feed one smoothed spectrum with the externally supplied signal
    /// strength and the pilot detector's output for this tick.
    pub fn update(&mut self, spectrum: &DbSpectrum, signal_percent: f32, pilot_percent: f32) -> f32 {
        if spectrum.is_empty() {
            return self.long_prev;
        }

        // No carrier: reset like professional monitors do on "no signal"
        if signal_percent < SIGNAL_GATE_PERCENT || pilot_percent < PILOT_GATE_PERCENT {
            return self.reset();
        }

        let Some(avg_db) = spectrum.average_db(BASEBAND_LIMIT_HZ) else {
            return self.reset();
        };

        let dev_khz = (db_to_deviation_khz(avg_db) * BOOST).min(DEV_CLAMP_KHZ * BOOST);
        let percent = ((dev_khz / DEV_CLAMP_KHZ) * 100.0).clamp(0.0, 100.0);

        let short = percent * (1.0 - SHORT_FACTOR) + self.short_prev * SHORT_FACTOR;
        self.short_prev = short;

        self.long_prev = self.long_prev * LONG_FACTOR + short * (1.0 - LONG_FACTOR);
        self.long_prev
    }

    fn reset(&mut self) -> f32 {
        self.short_prev = 0.0;
        self.long_prev = 0.0;
        0.0
    }
}
