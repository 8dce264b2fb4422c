//! Settings management
//!
//! Handles loading/saving of the monitor's XML configuration file.

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_sample_rate() -> u32 {
    48_000
}

fn default_fft_size() -> usize {
    512
}

fn default_average_level() -> u32 {
    6
}

fn default_send_interval_ms() -> u64 {
    30
}

fn default_server_port() -> u16 {
    8080
}

fn default_capture_command() -> String {
    "mpx-capture".to_string()
}

fn default_stereo_boost() -> f32 {
    1.0
}

/// Monitor settings stored as an XML document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "MpxMonitor")]
pub struct MonitorSettings {
    /// Capture sample rate. 48000 selects the system input device;
    /// anything else spawns the capture command at that rate.
    #[serde(rename = "sampleRate", default = "default_sample_rate")]
    pub sample_rate: u32,

    /// FFT size (power of two, 128-8192)
    #[serde(rename = "fftSize", default = "default_fft_size")]
    pub fft_size: usize,

    /// Rolling-average depth for the detectors' dB spectrum (1-100)
    #[serde(rename = "spectrumAverageLevel", default = "default_average_level")]
    pub spectrum_average_level: u32,

    /// Minimum milliseconds between broadcast frames (5-1000)
    #[serde(rename = "minSendIntervalMs", default = "default_send_interval_ms")]
    pub min_send_interval_ms: u64,

    /// API/WebSocket server port
    #[serde(rename = "serverPort", default = "default_server_port")]
    pub server_port: u16,

    /// External capture command spawned for non-48k rates
    #[serde(rename = "captureCommand", default = "default_capture_command")]
    pub capture_command: String,

    /// Optional system input device name; None uses the default device
    #[serde(rename = "captureDevice", default)]
    pub capture_device: Option<String>,

    /// Gain applied to captured samples before analysis (0.1-4.0)
    #[serde(rename = "stereoBoost", default = "default_stereo_boost")]
    pub stereo_boost: f32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            fft_size: default_fft_size(),
            spectrum_average_level: default_average_level(),
            min_send_interval_ms: default_send_interval_ms(),
            server_port: default_server_port(),
            capture_command: default_capture_command(),
            capture_device: None,
            stereo_boost: default_stereo_boost(),
        }
    }
}

impl MonitorSettings {
    /// Clamp every field to its valid range
    pub fn clamp(&mut self) {
        if !self.fft_size.is_power_of_two() {
            self.fft_size = self.fft_size.next_power_of_two();
        }
        self.fft_size = self.fft_size.clamp(128, 8192);
        self.spectrum_average_level = self.spectrum_average_level.clamp(1, 100);
        self.min_send_interval_ms = self.min_send_interval_ms.clamp(5, 1000);
        self.stereo_boost = self.stereo_boost.clamp(0.1, 4.0);
    }

    /// Load settings from an XML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::info!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(SettingsError::Io)?;
        let mut settings: Self = from_str(&contents).map_err(SettingsError::XmlParse)?;
        settings.clamp();
        Ok(settings)
    }

    /// Save settings to an XML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        let xml = to_string(self).map_err(SettingsError::XmlWrite)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);
        fs::write(path, formatted).map_err(SettingsError::Io)?;
        Ok(())
    }
}

/// Settings-related errors
#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    XmlParse(quick_xml::DeError),
    XmlWrite(quick_xml::SeError),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::XmlParse(e) => write!(f, "XML parse error: {}", e),
            SettingsError::XmlWrite(e) => write!(f, "XML write error: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = MonitorSettings::default();
        assert_eq!(settings.sample_rate, 48_000);
        assert_eq!(settings.fft_size, 512);
        assert_eq!(settings.spectrum_average_level, 6);
        assert_eq!(settings.min_send_interval_ms, 30);
        assert_eq!(settings.server_port, 8080);
        assert_eq!(settings.capture_command, "mpx-capture");
        assert!(settings.capture_device.is_none());
    }

    #[test]
    fn test_clamping() {
        let mut settings = MonitorSettings::default();
        settings.fft_size = 500; // not a power of two
        settings.spectrum_average_level = 0;
        settings.min_send_interval_ms = 1;
        settings.stereo_boost = 10.0;
        settings.clamp();
        assert_eq!(settings.fft_size, 512);
        assert_eq!(settings.spectrum_average_level, 1);
        assert_eq!(settings.min_send_interval_ms, 5);
        assert_eq!(settings.stereo_boost, 4.0);

        settings.fft_size = 16384;
        settings.clamp();
        assert_eq!(settings.fft_size, 8192);
    }

    #[test]
    fn test_xml_round_trip() {
        let dir = std::env::temp_dir().join("mpx_monitor_settings_test");
        let _ = fs::create_dir_all(&dir);
        let path = dir.join("monitor.xml");

        let mut settings = MonitorSettings::default();
        settings.sample_rate = 192_000;
        settings.capture_device = Some("Loopback".to_string());
        settings.save_to_file(&path).unwrap();

        let loaded = MonitorSettings::load_from_file(&path).unwrap();
        assert_eq!(loaded.sample_rate, 192_000);
        assert_eq!(loaded.capture_device.as_deref(), Some("Loopback"));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = Path::new("/nonexistent/mpx_monitor/monitor.xml");
        let settings = MonitorSettings::load_from_file(path).unwrap();
        assert_eq!(settings.sample_rate, 48_000);
    }
}
