//! Spectral pipeline and broadcast-quality meters

pub mod engine;
pub mod frame_builder;
pub mod mpx_total;
pub mod peak;
pub mod pilot;
pub mod rds;
pub mod reducer;
pub mod spectrum;

pub use engine::MetricsEngine;
pub use frame_builder::{SpectralFrameBuilder, DEFAULT_FFT_SIZE, MAX_LATENCY_BLOCKS};
pub use mpx_total::MpxTotalEstimator;
pub use peak::PeakHold;
pub use pilot::PilotDetector;
pub use rds::RdsDetector;
pub use reducer::{reduce_spectrum, SpectralBin, SpectralFrame, BIN_STEP, FREQUENCY_CEILING_HZ};
pub use spectrum::{amp_to_db, db_to_amp, DbSpectrum, SpectrumSmoother, DB_CEILING, DB_FLOOR};
