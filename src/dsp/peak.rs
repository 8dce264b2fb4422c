//! Peak-hold memory for bar meters: instant rise, timed hold, then
//! geometric fall

use std::time::{Duration, Instant};

/// Default hold before decay starts
pub const DEFAULT_HOLD: Duration = Duration::from_secs(5);
/// Decay factor applied per update once the hold has elapsed
pub const DEFAULT_DECAY: f32 = 0.85;
/// Values below this snap to zero
const ZERO_CLAMP: f32 = 0.5;

/// Per-channel peak record
#[derive(Debug, Clone)]
pub struct PeakHold {
    value: f32,
    last_rise: Instant,
    hold: Duration,
    decay: f32,
}

impl Default for PeakHold {
    fn default() -> Self {
        Self::new(DEFAULT_HOLD, DEFAULT_DECAY)
    }
}

impl PeakHold {
    pub fn new(hold: Duration, decay: f32) -> Self {
        Self {
            value: 0.0,
            last_rise: Instant::now(),
            hold,
            decay,
        }
    }

    /// Current held peak (0..100)
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Update with the current instantaneous level (0..100) and return
    /// the held peak.
    pub fn update(&mut self, current: f32) -> f32 {
        if current > self.value {
            self.value = current;
            self.last_rise = Instant::now();
        } else if self.last_rise.elapsed() > self.hold {
            self.value *= self.decay;
            if self.value < ZERO_CLAMP {
                self.value = 0.0;
            }
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_rise() {
        let mut peak = PeakHold::default();
        assert_eq!(peak.update(80.0), 80.0);
        assert_eq!(peak.update(95.0), 95.0);
    }

    #[test]
    fn test_holds_below_peak() {
        let mut peak = PeakHold::default();
        peak.update(80.0);
        // Lower levels inside the hold window leave the peak untouched
        for _ in 0..10 {
            assert_eq!(peak.update(20.0), 80.0);
        }
    }

    #[test]
    fn test_decays_after_hold() {
        let mut peak = PeakHold::new(Duration::from_millis(0), DEFAULT_DECAY);
        peak.update(80.0);
        std::thread::sleep(Duration::from_millis(2));

        let first = peak.update(0.0);
        assert!((first - 80.0 * DEFAULT_DECAY).abs() < 1e-4);

        let mut prev = first;
        loop {
            let v = peak.update(0.0);
            assert!(v <= prev);
            prev = v;
            if v == 0.0 {
                break;
            }
        }
    }

    #[test]
    fn test_clamps_to_zero() {
        let mut peak = PeakHold::new(Duration::from_millis(0), DEFAULT_DECAY);
        peak.update(0.6);
        std::thread::sleep(Duration::from_millis(2));
        // 0.6 * 0.85 = 0.51, next step drops below the 0.5 clamp
        peak.update(0.0);
        assert_eq!(peak.update(0.0), 0.0);
    }

    #[test]
    fn test_rise_resets_hold() {
        let mut peak = PeakHold::new(Duration::from_millis(50), DEFAULT_DECAY);
        peak.update(40.0);
        std::thread::sleep(Duration::from_millis(10));
        peak.update(60.0); // new peak restarts the hold window
        assert_eq!(peak.update(10.0), 60.0);
    }
}
