//! FM multiplex (MPX) monitor
//!
//! Captures a wideband composite feed, reduces it to spectral frames
//! over a local WebSocket hub, and derives broadcast-quality meters:
//! 19 kHz pilot deviation, 57 kHz RDS lock and deviation, and total
//! modulation.

pub mod api;
pub mod audio;
pub mod dsp;
pub mod settings;
pub mod telemetry;

pub use api::{create_shared_state, run_server, FrameBroadcaster, LatestFrame, SharedStateHandle};
pub use dsp::{MetricsEngine, SpectralFrameBuilder};
pub use settings::MonitorSettings;
