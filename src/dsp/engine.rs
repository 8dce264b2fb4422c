//! Metrics engine: drives every detector from relayed spectral frames
//!
//! The engine subscribes to the hub fan-out, folds each frame into the
//! smoothed dB spectrum, then runs the pilot, RDS, and total-modulation
//! estimators in order. Their outputs land in the shared level snapshot
//! for the REST handlers.

use tokio::sync::{broadcast, watch};

use crate::api::{LevelSnapshot, SharedStateHandle, WireMessage};

use super::pilot::PilotDetector;
use super::rds::RdsDetector;
use super::mpx_total::MpxTotalEstimator;
use super::reducer::SpectralBin;
use super::spectrum::SpectrumSmoother;

pub struct MetricsEngine {
    state: SharedStateHandle,
    smoother: SpectrumSmoother,
    pilot: PilotDetector,
    rds: RdsDetector,
    mpx: MpxTotalEstimator,
}

impl MetricsEngine {
    pub fn new(state: SharedStateHandle, sample_rate: u32, average_level: u32) -> Self {
        let max_freq_hz = sample_rate as f32 / 2.0;
        Self {
            state,
            smoother: SpectrumSmoother::new(average_level, max_freq_hz),
            pilot: PilotDetector::new(),
            rds: RdsDetector::new(),
            mpx: MpxTotalEstimator::new(),
        }
    }

    /// Decode one hub message and, if it carries a frame, process it.
    /// Malformed or unrecognized messages are dropped.
    pub fn process_text(&mut self, text: &str) {
        match serde_json::from_str::<WireMessage>(text) {
            Ok(WireMessage::Spectral { value }) if !value.is_empty() => {
                self.process_frame(&value);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Engine dropping malformed message: {}", e);
            }
        }
    }

    /// Fold a frame into the smoothed spectrum and update every meter
    pub fn process_frame(&mut self, frame: &[SpectralBin]) {
        self.smoother.update(frame);

        let signal = self.state.signal_percent();
        let spectrum = self.smoother.spectrum();

        let pilot = self.pilot.update(spectrum, signal);
        let rds = self.rds.update(spectrum);
        let mpx_total = self.mpx.update(spectrum, signal, pilot);

        let (peak_left, peak_right) = self.state.held_peaks();

        self.state.count_frame();
        self.state.update_levels(LevelSnapshot {
            signal,
            pilot,
            rds,
            rds_locked: self.rds.is_locked(),
            mpx_total,
            peak_left,
            peak_right,
        });
    }

    /// Consume hub frames until shutdown
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let rx = self.state.subscribe();
        self.run_with_receiver(rx, shutdown).await;
    }

    async fn run_with_receiver(
        mut self,
        mut rx: broadcast::Receiver<String>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!("Metrics engine started");

        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Ok(text) => self.process_text(&text),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Meters track current state: jump past the
                        // retained backlog to the newest message
                        tracing::debug!("Metrics engine lagged, skipped {} frames", n);
                        rx = rx.resubscribe();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Metrics engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SharedState;
    use std::sync::Arc;

    fn engine() -> MetricsEngine {
        MetricsEngine::new(Arc::new(SharedState::new()), 192_000, 6)
    }

    #[test]
    fn test_malformed_text_is_dropped() {
        let mut engine = engine();
        engine.process_text("{broken");
        engine.process_text(r#"{"type":"other","value":1}"#);
        assert_eq!(engine.state.frames_processed(), 0);
    }

    #[test]
    fn test_empty_frame_is_dropped() {
        let mut engine = engine();
        engine.process_text(r#"{"type":"MPX","value":[]}"#);
        assert_eq!(engine.state.frames_processed(), 0);
    }

    #[test]
    fn test_frame_updates_counter_and_levels() {
        let mut engine = engine();
        engine.state.set_signal_percent(80.0);

        engine.process_text(r#"{"type":"MPX","value":[{"f":0.0,"m":0.1},{"f":375.0,"m":0.05}]}"#);

        assert_eq!(engine.state.frames_processed(), 1);
        assert_eq!(engine.state.levels().signal, 80.0);
    }

    #[tokio::test]
    async fn test_lagged_receiver_skips_stale_backlog() {
        let state = Arc::new(SharedState::new());
        let rx = state.subscribe();

        // Overflow the 64-slot hub channel before the engine runs: the
        // first recv lags, and the retained backlog must be skipped,
        // not replayed
        for i in 0..80 {
            state.broadcast_frame(format!(
                r#"{{"type":"MPX","value":[{{"f":0.0,"m":0.{:02}}}]}}"#,
                i
            ));
        }

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let engine = MetricsEngine::new(state.clone(), 192_000, 6);
        let task = tokio::spawn(engine.run_with_receiver(rx, shutdown_rx));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let _ = shutdown_tx.send(true);
        let _ = task.await;

        assert_eq!(
            state.frames_processed(),
            0,
            "stale frames behind a lag must not be replayed"
        );
    }

    #[test]
    fn test_pilot_tone_raises_meter() {
        let mut engine = engine();
        engine.state.set_signal_percent(90.0);

        // 256 bins up to 96 kHz with a strong 19 kHz pilot
        let frame: Vec<SpectralBin> = (0..256)
            .map(|i| {
                let f = i as f32 * 375.0;
                let m = if (f - 19_000.0).abs() < 400.0 { 0.2 } else { 1e-6 };
                SpectralBin { f, m }
            })
            .collect();

        for _ in 0..60 {
            engine.process_frame(&frame);
        }
        assert!(engine.state.levels().pilot > 5.0);
    }
}
