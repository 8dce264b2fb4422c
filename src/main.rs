//! MPX monitor entry point: capture, spectral pipeline, hub server,
//! broadcaster, and metrics engine wired together.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use mpx_monitor::api::{
    create_shared_state, run_server, FrameBroadcaster, LatestFrame, RunStatus, SharedStateHandle,
};
use mpx_monitor::audio::{CaptureSource, ProcessCapture, SystemAudioInput};
use mpx_monitor::dsp::{reduce_spectrum, MetricsEngine, SpectralFrameBuilder, BIN_STEP, FREQUENCY_CEILING_HZ};
use mpx_monitor::settings::MonitorSettings;
use mpx_monitor::telemetry::init_logging_default;

/// Poll cadence for draining the capture ring
const CAPTURE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The system input path runs at this rate; any other configured rate
/// spawns the external capture command instead.
const SYSTEM_INPUT_RATE: u32 = 48_000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _log_guard = init_logging_default()?;

    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("monitor.xml"));
    let settings = match MonitorSettings::load_from_file(&settings_path) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings ({}), using defaults", e);
            MonitorSettings::default()
        }
    };
    tracing::info!(
        sample_rate = settings.sample_rate,
        fft_size = settings.fft_size,
        port = settings.server_port,
        "Loaded settings from {}",
        settings_path.display()
    );

    let state = create_shared_state();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // API server with the /data_plugins hub
    let server_state = state.clone();
    let server_shutdown = shutdown_rx.clone();
    let server_port = settings.server_port;
    tokio::spawn(async move {
        if let Err(e) = run_server(server_port, server_state, server_shutdown).await {
            tracing::error!("API server failed: {}", e);
        }
    });

    // Capture source selection
    let source: Arc<dyn CaptureSource> = if settings.sample_rate == SYSTEM_INPUT_RATE {
        Arc::new(SystemAudioInput::with_device(settings.capture_device.as_deref())?)
    } else {
        Arc::new(ProcessCapture::new(
            &settings.capture_command,
            settings.sample_rate,
        ))
    };

    state.set_status(RunStatus {
        source: source.display_name(),
        sample_rate: source.sample_rate(),
        capture_active: false,
    });

    source.start()?;
    tracing::info!("Capture started: {}", source.display_name());

    // Pipeline: capture ring -> frame builder -> reducer -> latest slot
    let latest = LatestFrame::new();
    tokio::spawn(run_pipeline(
        source.clone(),
        state.clone(),
        latest.clone(),
        settings.clone(),
        shutdown_rx.clone(),
    ));

    // Broadcaster feeds the hub from the latest slot
    let broadcaster = FrameBroadcaster::new(
        settings.server_port,
        latest,
        Duration::from_millis(settings.min_send_interval_ms),
    );
    tokio::spawn(broadcaster.run(shutdown_rx.clone()));

    // Metrics engine consumes relayed frames
    let engine = MetricsEngine::new(
        state.clone(),
        settings.sample_rate,
        settings.spectrum_average_level,
    );
    tokio::spawn(engine.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    source.stop();
    let _ = shutdown_tx.send(true);
    // Give tasks a moment to observe the signal
    tokio::time::sleep(Duration::from_millis(100)).await;

    Ok(())
}

/// Drain the capture ring, track stereo peaks, and turn samples into
/// reduced spectral frames for the broadcaster.
async fn run_pipeline(
    source: Arc<dyn CaptureSource>,
    state: SharedStateHandle,
    latest: LatestFrame,
    settings: MonitorSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    let sample_rate = source.sample_rate();
    let mut builder = SpectralFrameBuilder::new(sample_rate, settings.fft_size);
    let boost = settings.stereo_boost;

    let mut ticker = tokio::time::interval(CAPTURE_POLL_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        state.set_capture_active(source.is_active());

        let Some(buffer) = source.take_samples() else {
            continue;
        };

        // Per-channel instantaneous peaks (0..100) feed the hold records
        let (left, right) = stereo_peaks(&buffer.samples, buffer.channels, boost);
        state.update_peaks(left, right);

        let mono: Vec<f32> = buffer.to_mono().iter().map(|s| s * boost).collect();
        builder.push(&mono);

        while let Some(mags) = builder.next_spectrum() {
            let frame = reduce_spectrum(
                &mags,
                sample_rate,
                settings.fft_size,
                BIN_STEP,
                FREQUENCY_CEILING_HZ,
            );
            if !frame.is_empty() {
                latest.publish(frame);
            }
        }
    }

    tracing::info!("Pipeline stopped");
}

/// Peak absolute sample per channel, scaled to percent
fn stereo_peaks(samples: &[f32], channels: u32, boost: f32) -> (f32, f32) {
    let mut left = 0.0f32;
    let mut right = 0.0f32;
    if channels >= 2 {
        for pair in samples.chunks_exact(channels as usize) {
            left = left.max(pair[0].abs());
            right = right.max(pair[1].abs());
        }
    } else {
        for s in samples {
            left = left.max(s.abs());
        }
        right = left;
    }
    (
        (left * boost * 100.0).min(100.0),
        (right * boost * 100.0).min(100.0),
    )
}
