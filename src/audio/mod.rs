//! Raw audio capture module
//!
//! Normalizes the two capture paths (tapped sound-device input and a
//! spawned external capture process) into one mono sample stream.

mod decode;
mod process_capture;
mod source;
mod system_input;
mod types;

// Re-export public API
pub use decode::{consumed_bytes, decode_f32le_stereo, decode_s16le_stereo};
pub use process_capture::ProcessCapture;
pub use source::{CaptureSource, CaptureState, SampleRingBuffer};
pub use system_input::SystemAudioInput;
pub use types::{AudioBuffer, CaptureSourceId};
