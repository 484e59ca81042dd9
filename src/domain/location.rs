use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// A cached device location fix.
///
/// Either a whole fix exists or none does; the tracker swaps the cached
/// `Option<LocationFix>` atomically so partial updates are never visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Reported accuracy radius in meters, when the provider knows it.
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(skip, default = "SystemTime::now")]
    pub acquired_at: SystemTime,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            acquired_at: SystemTime::now(),
        }
    }

    /// Coordinate pair formatted for display and map links.
    pub fn coordinates(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// Format a coordinate to the 6 decimal places the report uses.
pub fn format_coordinate(value: f64) -> String {
    format!("{value:.6}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_coordinate_six_decimals() {
        assert_eq!(format_coordinate(10.7905), "10.790500");
        assert_eq!(format_coordinate(-78.70470009), "-78.704700");
        assert_eq!(format_coordinate(0.0), "0.000000");
    }

    #[test]
    fn test_fix_roundtrip() {
        let fix = LocationFix::new(10.7905, 78.7047);
        let json = serde_json::to_string(&fix).unwrap();
        let back: LocationFix = serde_json::from_str(&json).unwrap();
        assert_eq!(back.coordinates(), (10.7905, 78.7047));
    }
}
