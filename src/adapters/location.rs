use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::config::{LocationConfig, LocationProvider};
use crate::domain::{DomainError, LocationFix};
use crate::ports::LocationSource;

/// Fixed station coordinates from configuration.
///
/// Field stations usually post a surveyed position; the tracker still polls
/// so a config reload could move the pin, but every poll succeeds.
pub struct StaticLocationSource {
    latitude: f64,
    longitude: f64,
}

impl StaticLocationSource {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[async_trait]
impl LocationSource for StaticLocationSource {
    async fn current_fix(&self) -> Result<LocationFix, DomainError> {
        Ok(LocationFix::new(self.latitude, self.longitude))
    }
}

#[derive(Debug, Deserialize)]
struct GeoIpBody {
    lat: f64,
    lon: f64,
    #[serde(default)]
    accuracy: Option<f64>,
}

/// Network geolocation against a configurable JSON endpoint.
pub struct GeoIpLocationSource {
    client: Client,
    url: String,
}

impl GeoIpLocationSource {
    pub fn new(url: &str) -> Result<Self, DomainError> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent(format!("wildwatch/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DomainError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl LocationSource for GeoIpLocationSource {
    async fn current_fix(&self) -> Result<LocationFix, DomainError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| DomainError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::Transport(format!(
                "HTTP {status} for {}",
                self.url
            )));
        }

        let body: GeoIpBody = response
            .json()
            .await
            .map_err(|e| DomainError::Transport(format!("malformed geoip body: {e}")))?;

        debug!(lat = body.lat, lon = body.lon, "Geoip fix");
        Ok(LocationFix {
            latitude: body.lat,
            longitude: body.lon,
            accuracy: body.accuracy,
            acquired_at: std::time::SystemTime::now(),
        })
    }
}

/// Build the configured provider; `None` means location capability is
/// absent and the tracker stays disabled.
pub fn source_from_config(
    config: &LocationConfig,
) -> Result<Option<Arc<dyn LocationSource>>, DomainError> {
    match config.provider {
        LocationProvider::None => {
            info!("Location provider disabled");
            Ok(None)
        }
        LocationProvider::Static => {
            let (latitude, longitude) = match (config.latitude, config.longitude) {
                (Some(lat), Some(lon)) => (lat, lon),
                _ => {
                    return Err(DomainError::Config(
                        "static location provider requires latitude and longitude".to_string(),
                    ))
                }
            };
            Ok(Some(Arc::new(StaticLocationSource::new(latitude, longitude))))
        }
        LocationProvider::Geoip => Ok(Some(Arc::new(GeoIpLocationSource::new(
            &config.geoip_url,
        )?))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_returns_configured_fix() {
        let source = StaticLocationSource::new(10.7905, 78.7047);
        let fix = source.current_fix().await.unwrap();
        assert_eq!(fix.coordinates(), (10.7905, 78.7047));
        assert_eq!(fix.accuracy, None);
    }

    #[test]
    fn test_provider_none_disables_tracking() {
        let config = LocationConfig {
            provider: LocationProvider::None,
            ..LocationConfig::default()
        };
        assert!(source_from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_static_provider_requires_coordinates() {
        let config = LocationConfig {
            provider: LocationProvider::Static,
            latitude: None,
            longitude: None,
            ..LocationConfig::default()
        };
        assert!(matches!(
            source_from_config(&config),
            Err(DomainError::Config(_))
        ));
    }

    #[test]
    fn test_geoip_body_parses() {
        let body: GeoIpBody =
            serde_json::from_str(r#"{"status":"success","lat":10.79,"lon":78.70}"#).unwrap();
        assert_eq!(body.lat, 10.79);
        assert_eq!(body.accuracy, None);
    }
}
