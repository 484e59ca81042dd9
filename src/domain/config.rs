use serde::{Deserialize, Serialize};

/// Detection service endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the detection service.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Location provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationProvider {
    /// No provider; the tracker is disabled and submissions go out
    /// without coordinates.
    None,
    /// Coordinates pinned in configuration (a fixed station position).
    Static,
    /// Network lookup against `geoip_url`.
    Geoip,
}

/// Geolocation tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub provider: LocationProvider,
    /// Station coordinates for the static provider.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// JSON endpoint for the geoip provider.
    pub geoip_url: String,
    /// Poll interval in seconds.
    pub refresh_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            provider: LocationProvider::Static,
            latitude: Some(10.7905),
            longitude: Some(78.7047),
            geoip_url: "http://ip-api.com/json".to_string(),
            refresh_secs: 60,
        }
    }
}

/// Microphone capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Target sample rate in Hz; clips are resampled to this.
    pub sample_rate: u32,
    /// Hard cap on clip length; recording auto-stops here.
    pub max_clip_secs: u32,
    /// Preferred input device name, or the system default when unset.
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            max_clip_secs: 60,
            device: None,
        }
    }
}

impl AudioConfig {
    /// Ring buffer capacity in samples for one full clip.
    pub fn buffer_capacity(&self) -> usize {
        self.sample_rate as usize * self.max_clip_secs as usize
    }
}

/// Auto-capture loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Seconds between unattended capture cycles.
    pub auto_interval_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            auto_interval_secs: 5,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub location: LocationConfig,
    pub audio: AudioConfig,
    pub capture: CaptureConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Durable client-side state.
///
/// The only persisted flag in the system: whether the operator dismissed
/// the "no location" advisory. Read at startup, written on dismissal.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientState {
    pub location_notice_dismissed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.location.refresh_secs, 60);
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.audio.max_clip_secs, 60);
        assert_eq!(config.capture.auto_interval_secs, 5);
    }

    #[test]
    fn test_audio_buffer_capacity() {
        let audio = AudioConfig::default();
        assert_eq!(audio.buffer_capacity(), 960_000);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://detect.example.org"

            [location]
            provider = "none"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://detect.example.org");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.location.provider, LocationProvider::None);
        assert_eq!(config.capture.auto_interval_secs, 5);
    }

    #[test]
    fn test_client_state_default_not_dismissed() {
        let state = ClientState::default();
        assert!(!state.location_notice_dismissed);
    }
}
