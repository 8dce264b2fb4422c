//! Wire and REST message types

use crate::dsp::SpectralFrame;
use serde::{Deserialize, Serialize};

/// Messages exchanged on the `/data_plugins` hub, decoded once at the
/// transport boundary. Unrecognized type tags land in `Unknown` and are
/// ignored instead of probed field by field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    /// Reduced spectral frame: `{"type":"MPX","value":[{"f":..,"m":..},..]}`
    #[serde(rename = "MPX")]
    Spectral { value: SpectralFrame },
    /// Anything else on the hub
    #[serde(other)]
    Unknown,
}

impl WireMessage {
    pub fn spectral(frame: SpectralFrame) -> Self {
        WireMessage::Spectral { value: frame }
    }
}

/// API identification response for `/`
#[derive(Debug, Clone, Serialize)]
pub struct ApiInfo {
    pub name: &'static str,
    pub version: &'static str,
}

/// Response for `GET /api/status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub source: String,
    pub sample_rate: u32,
    pub capture_active: bool,
    pub frames_processed: u64,
}

/// Response for `GET /api/levels`
#[derive(Debug, Clone, Serialize)]
pub struct LevelsResponse {
    pub signal: f32,
    pub pilot: f32,
    pub rds: f32,
    pub rds_locked: bool,
    pub mpx_total: f32,
    pub peak_left: f32,
    pub peak_right: f32,
}

/// Body for `POST /api/signal`
#[derive(Debug, Clone, Deserialize)]
pub struct SignalRequest {
    /// Signal strength percentage (0..100)
    pub percent: f32,
}

/// Generic acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct AckResponse {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::SpectralBin;

    #[test]
    fn test_spectral_round_trip() {
        let frame: SpectralFrame = (0..5)
            .map(|i| SpectralBin {
                f: i as f32 * 1000.0,
                m: 0.25 * (i + 1) as f32,
            })
            .collect();

        let json = serde_json::to_string(&WireMessage::spectral(frame.clone())).unwrap();
        assert!(json.contains("\"type\":\"MPX\""));

        let decoded: WireMessage = serde_json::from_str(&json).unwrap();
        match decoded {
            WireMessage::Spectral { value } => assert_eq!(value, frame),
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_tag() {
        let decoded: WireMessage =
            serde_json::from_str(r#"{"type":"signal","value":42}"#).unwrap();
        assert!(matches!(decoded, WireMessage::Unknown));
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(serde_json::from_str::<WireMessage>("{not json").is_err());
        assert!(serde_json::from_str::<WireMessage>(r#"{"value":[]}"#).is_err());
    }
}
