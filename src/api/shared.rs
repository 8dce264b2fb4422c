//! Shared state between the API server, the metrics engine, and the
//! capture pipeline
//!
//! The level snapshot is written by the metrics engine and read by REST
//! handlers; the signal-strength input arrives from an external tuner
//! via REST and is read by the detector gates.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast;

use crate::dsp::PeakHold;

/// Snapshot of detector outputs for API reads
#[derive(Debug, Clone, Default)]
pub struct LevelSnapshot {
    /// Externally supplied signal strength (0..100)
    pub signal: f32,
    /// Pilot deviation meter (0..100)
    pub pilot: f32,
    /// RDS deviation meter (0..100)
    pub rds: f32,
    /// Whether the RDS detector is lock-driven
    pub rds_locked: bool,
    /// Total MPX modulation meter (0..100)
    pub mpx_total: f32,
    /// Held stereo peaks (0..100)
    pub peak_left: f32,
    pub peak_right: f32,
}

/// Capture/run state for `/api/status`
#[derive(Debug, Clone, Default)]
pub struct RunStatus {
    pub source: String,
    pub sample_rate: u32,
    pub capture_active: bool,
}

/// Shared state accessible by API handlers
pub struct SharedState {
    /// Detector outputs (engine is the single writer)
    levels: RwLock<LevelSnapshot>,
    /// Capture/run state (pipeline writes)
    status: RwLock<RunStatus>,
    /// Signal strength percentage as f32 bits, written by REST
    signal_bits: AtomicU32,
    /// Spectral frames processed by the engine
    frames_processed: AtomicU64,
    /// Hub fan-out: encoded frame text to every hub subscriber
    frame_tx: broadcast::Sender<String>,
    /// Stereo peak-hold records, fed by the capture pipeline
    peaks: Mutex<(PeakHold, PeakHold)>,
}

impl SharedState {
    pub fn new() -> Self {
        let (frame_tx, _) = broadcast::channel(64);
        Self {
            levels: RwLock::new(LevelSnapshot::default()),
            status: RwLock::new(RunStatus::default()),
            signal_bits: AtomicU32::new(0f32.to_bits()),
            frames_processed: AtomicU64::new(0),
            frame_tx,
            peaks: Mutex::new((PeakHold::default(), PeakHold::default())),
        }
    }

    /// Get a clone of the current level snapshot
    pub fn levels(&self) -> LevelSnapshot {
        self.levels.read().map(|g| g.clone()).unwrap_or_default()
    }

    /// Update detector outputs (engine only).
    /// Uses try_write() so a contended REST read never stalls the engine;
    /// the next frame catches up.
    pub fn update_levels(&self, snapshot: LevelSnapshot) {
        if let Ok(mut guard) = self.levels.try_write() {
            *guard = snapshot;
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status.read().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn set_status(&self, status: RunStatus) {
        if let Ok(mut guard) = self.status.write() {
            *guard = status;
        }
    }

    pub fn set_capture_active(&self, active: bool) {
        if let Ok(mut guard) = self.status.write() {
            guard.capture_active = active;
        }
    }

    /// Externally supplied signal strength (0..100)
    pub fn signal_percent(&self) -> f32 {
        f32::from_bits(self.signal_bits.load(Ordering::Relaxed))
    }

    pub fn set_signal_percent(&self, percent: f32) {
        let clamped = percent.clamp(0.0, 100.0);
        self.signal_bits.store(clamped.to_bits(), Ordering::Relaxed);
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn count_frame(&self) -> u64 {
        self.frames_processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Subscribe to hub frame fan-out
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.frame_tx.subscribe()
    }

    /// Relay an encoded frame to every hub subscriber.
    /// No subscribers is fine.
    pub fn broadcast_frame(&self, text: String) {
        let _ = self.frame_tx.send(text);
    }

    /// Feed instantaneous stereo levels (0..100) into the peak records,
    /// returning the held values.
    pub fn update_peaks(&self, left: f32, right: f32) -> (f32, f32) {
        match self.peaks.lock() {
            Ok(mut guard) => (guard.0.update(left), guard.1.update(right)),
            Err(_) => (0.0, 0.0),
        }
    }

    /// Current held peaks without feeding new levels
    pub fn held_peaks(&self) -> (f32, f32) {
        match self.peaks.lock() {
            Ok(guard) => (guard.0.value(), guard.1.value()),
            Err(_) => (0.0, 0.0),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Type alias for the shared state handle used by API handlers
pub type SharedStateHandle = Arc<SharedState>;
