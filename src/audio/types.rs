//! Audio types shared across the capture module

/// Audio sample buffer handed from a capture source to the pipeline
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Interleaved or mono f32 samples
    pub samples: Vec<f32>,
    /// Sample rate (e.g., 48000 or 192000)
    pub sample_rate: u32,
    /// Number of channels (1 after downmix, 2 for raw stereo)
    pub channels: u32,
}

impl AudioBuffer {
    /// Create empty buffer
    pub fn new(sample_rate: u32, channels: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            channels,
        }
    }

    /// Downmix to mono if stereo/multi-channel
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels == 1 {
            return self.samples.clone();
        }

        let channels = self.channels as usize;
        self.samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }

    /// Get duration in seconds
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / (self.sample_rate * self.channels) as f32
    }
}

/// Identifier for the active capture source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CaptureSourceId {
    /// Tapped sound-device input (line-in/loopback)
    SystemInput,
    /// Spawned external capture process by command name
    Process(String),
}

impl std::fmt::Display for CaptureSourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureSourceId::SystemInput => write!(f, "System Input"),
            CaptureSourceId::Process(cmd) => write!(f, "Process: {}", cmd),
        }
    }
}
