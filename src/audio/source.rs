//! Capture source trait and shared source state

use super::types::{AudioBuffer, CaptureSourceId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Trait for raw audio capture sources
pub trait CaptureSource: Send + Sync {
    /// Unique identifier for this source
    fn id(&self) -> &CaptureSourceId;

    /// Human-readable display name
    fn display_name(&self) -> String;

    /// Get the sample rate of this source
    fn sample_rate(&self) -> u32;

    /// Get number of channels delivered by `take_samples`
    fn channels(&self) -> u32;

    /// Check if source is currently active/receiving
    fn is_active(&self) -> bool;

    /// Get available samples (non-blocking).
    /// Returns None if no new samples are available.
    fn take_samples(&self) -> Option<AudioBuffer>;

    /// Start capturing audio
    fn start(&self) -> Result<(), String>;

    /// Stop capturing audio
    fn stop(&self);
}

/// Shared state between a capture source and its reader thread/task
pub struct CaptureState {
    /// Whether the source should keep running
    pub running: AtomicBool,
    /// Whether the source is actively receiving data
    pub active: AtomicBool,
    /// Ring buffer for decoded mono (or raw interleaved) samples
    pub buffer: Mutex<SampleRingBuffer>,
}

impl CaptureState {
    pub fn new(capacity: usize, sample_rate: u32, channels: u32) -> Self {
        Self {
            running: AtomicBool::new(false),
            active: AtomicBool::new(false),
            buffer: Mutex::new(SampleRingBuffer::new(capacity, sample_rate, channels)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Drain whatever is buffered, or None when empty
    pub fn drain(&self) -> Option<AudioBuffer> {
        let mut guard = self.buffer.lock().ok()?;
        if guard.available() == 0 {
            return None;
        }

        let sample_rate = guard.sample_rate();
        let channels = guard.channels();

        let mut samples = Vec::new();
        guard.read(&mut samples);

        Some(AudioBuffer {
            samples,
            sample_rate,
            channels,
        })
    }
}

/// Simple ring buffer for audio samples
pub struct SampleRingBuffer {
    data: Vec<f32>,
    write_pos: usize,
    read_pos: usize,
    capacity: usize,
    sample_rate: u32,
    channels: u32,
    /// Track how many samples are available
    available: usize,
}

impl SampleRingBuffer {
    pub fn new(capacity: usize, sample_rate: u32, channels: u32) -> Self {
        Self {
            data: vec![0.0; capacity],
            write_pos: 0,
            read_pos: 0,
            capacity,
            sample_rate,
            channels,
            available: 0,
        }
    }

    pub fn set_format(&mut self, sample_rate: u32, channels: u32) {
        self.sample_rate = sample_rate;
        self.channels = channels;
    }

    /// Write samples into the buffer, overwriting the oldest on overflow
    pub fn write(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.data[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.capacity;

            if self.available < self.capacity {
                self.available += 1;
            } else {
                // Buffer is full, advance read position
                self.read_pos = (self.read_pos + 1) % self.capacity;
            }
        }
    }

    /// Read all available samples into output vector
    pub fn read(&mut self, output: &mut Vec<f32>) -> usize {
        let count = self.available;
        output.clear();
        output.reserve(count);

        for _ in 0..count {
            output.push(self.data[self.read_pos]);
            self.read_pos = (self.read_pos + 1) % self.capacity;
        }

        self.available = 0;
        count
    }

    /// Number of samples available to read
    pub fn available(&self) -> usize {
        self.available
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.available = 0;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_write_read() {
        let mut buffer = SampleRingBuffer::new(100, 48000, 2);

        buffer.write(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buffer.available(), 5);

        let mut output = Vec::new();
        let count = buffer.read(&mut output);
        assert_eq!(count, 5);
        assert_eq!(output, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buffer.available(), 0);
    }

    #[test]
    fn test_ring_buffer_overflow_keeps_newest() {
        let mut buffer = SampleRingBuffer::new(5, 48000, 1);

        buffer.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(buffer.available(), 5);

        let mut output = Vec::new();
        buffer.read(&mut output);
        assert_eq!(output, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_state_drain_empty() {
        let state = CaptureState::new(64, 192000, 1);
        assert!(state.drain().is_none());
    }

    #[test]
    fn test_state_drain() {
        let state = CaptureState::new(64, 192000, 1);
        state.buffer.lock().unwrap().write(&[0.1, 0.2]);

        let buf = state.drain().unwrap();
        assert_eq!(buf.samples, vec![0.1, 0.2]);
        assert_eq!(buf.sample_rate, 192000);
        assert!(state.drain().is_none());
    }
}
