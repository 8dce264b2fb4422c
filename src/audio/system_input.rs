//! Tapped sound-device input via cpal

use super::source::{CaptureSource, CaptureState};
use super::types::{AudioBuffer, CaptureSourceId};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::Arc;
use std::sync::Mutex;

/// Ring capacity in samples (~250ms at 48kHz stereo)
const BUFFER_SIZE: usize = 48000 / 2;

/// Full-scale divisor for signed 16-bit samples
const S16_FULL_SCALE: f32 = 32768.0;

/// Wrapper for cpal::Stream that implements Send
/// Safety: the stream handle is only touched from the owning thread;
/// the audio callback uses Arc<CaptureState> which is thread-safe
struct StreamWrapper(cpal::Stream);

unsafe impl Send for StreamWrapper {}
unsafe impl Sync for StreamWrapper {}

/// System audio input source using cpal
pub struct SystemAudioInput {
    id: CaptureSourceId,
    state: Arc<CaptureState>,
    stream: Mutex<Option<StreamWrapper>>,
    device_name: String,
}

impl SystemAudioInput {
    /// Create system input with specific device name (None = default)
    pub fn with_device(device_name: Option<&str>) -> Result<Self, String> {
        let host = cpal::default_host();

        let device = if let Some(name) = device_name {
            host.input_devices()
                .map_err(|e| format!("Failed to enumerate devices: {}", e))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| format!("Device '{}' not found", name))?
        } else {
            host.default_input_device()
                .ok_or_else(|| "No default input device".to_string())?
        };

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let config = device
            .default_input_config()
            .map_err(|e| format!("Failed to get input config: {}", e))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as u32;

        tracing::info!(
            "SystemAudioInput: {} @ {}Hz, {} channels",
            device_name,
            sample_rate,
            channels
        );

        let state = Arc::new(CaptureState::new(BUFFER_SIZE, sample_rate, channels));

        let input = Self {
            id: CaptureSourceId::SystemInput,
            state,
            stream: Mutex::new(None),
            device_name,
        };
        input.build_stream(&device, config)?;
        Ok(input)
    }

    /// List available input devices
    pub fn list_devices() -> Vec<String> {
        let host = cpal::default_host();
        host.input_devices()
            .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
            .unwrap_or_default()
    }

    /// Build the input stream for the device's native sample format
    fn build_stream(
        &self,
        device: &cpal::Device,
        config: cpal::SupportedStreamConfig,
    ) -> Result<(), String> {
        let state = Arc::clone(&self.state);

        {
            let mut buffer = state
                .buffer
                .lock()
                .map_err(|_| "Capture buffer poisoned".to_string())?;
            buffer.set_format(config.sample_rate().0, config.channels() as u32);
        }

        let err_fn = |err| tracing::error!("Audio input error: {}", err);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                let state_clone = Arc::clone(&state);
                device.build_input_stream(
                    &config.into(),
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if state_clone.is_running() {
                            if let Ok(mut buffer) = state_clone.buffer.lock() {
                                buffer.write(data);
                            }
                            state_clone.set_active(true);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::I16 => {
                let state_clone = Arc::clone(&state);
                device.build_input_stream(
                    &config.into(),
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        if state_clone.is_running() {
                            // Normalize by integer full scale
                            let float_data: Vec<f32> =
                                data.iter().map(|&s| s as f32 / S16_FULL_SCALE).collect();
                            if let Ok(mut buffer) = state_clone.buffer.lock() {
                                buffer.write(&float_data);
                            }
                            state_clone.set_active(true);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::U16 => {
                let state_clone = Arc::clone(&state);
                device.build_input_stream(
                    &config.into(),
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        if state_clone.is_running() {
                            // Recenter unsigned samples around zero
                            let float_data: Vec<f32> = data
                                .iter()
                                .map(|&s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0)
                                .collect();
                            if let Ok(mut buffer) = state_clone.buffer.lock() {
                                buffer.write(&float_data);
                            }
                            state_clone.set_active(true);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => return Err(format!("Unsupported sample format: {:?}", other)),
        }
        .map_err(|e| format!("Failed to build stream: {}", e))?;

        if let Ok(mut guard) = self.stream.lock() {
            *guard = Some(StreamWrapper(stream));
        }
        Ok(())
    }
}

impl CaptureSource for SystemAudioInput {
    fn id(&self) -> &CaptureSourceId {
        &self.id
    }

    fn display_name(&self) -> String {
        format!("System: {}", self.device_name)
    }

    fn sample_rate(&self) -> u32 {
        self.state
            .buffer
            .lock()
            .map(|b| b.sample_rate())
            .unwrap_or(48000)
    }

    fn channels(&self) -> u32 {
        self.state
            .buffer
            .lock()
            .map(|b| b.channels())
            .unwrap_or(2)
    }

    fn is_active(&self) -> bool {
        self.state.is_active()
    }

    fn take_samples(&self) -> Option<AudioBuffer> {
        self.state.drain()
    }

    fn start(&self) -> Result<(), String> {
        self.state.set_running(true);

        if let Ok(guard) = self.stream.lock() {
            if let Some(ref wrapper) = *guard {
                wrapper
                    .0
                    .play()
                    .map_err(|e| format!("Failed to start stream: {}", e))?;
            }
        }

        Ok(())
    }

    fn stop(&self) {
        self.state.set_running(false);
        self.state.set_active(false);

        if let Ok(guard) = self.stream.lock() {
            if let Some(ref wrapper) = *guard {
                let _ = wrapper.0.pause();
            }
        }
    }
}

impl Drop for SystemAudioInput {
    fn drop(&mut self) {
        self.stop();
    }
}
