use serde::{Deserialize, Serialize};

/// One classified object or sound region within an analyzed media item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    /// Confidence score in [0, 1].
    pub confidence: f64,
    #[serde(default)]
    pub is_threat: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

/// Pixel-space bounding box of an image detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Location attached by the service to a detection result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationData {
    pub latitude: f64,
    pub longitude: f64,
    /// Reverse-geocoded place description, when the service resolved one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Response body of the analyze and capture endpoints.
///
/// `success:false` is a domain-level failure to *display*; transport-level
/// problems never reach this type. Consumed read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub threat_id: Option<String>,
    #[serde(default)]
    pub location: Option<LocationData>,
    /// `None` when the service was not asked to notify.
    #[serde(default)]
    pub notification_sent: Option<bool>,
}

impl DetectionResult {
    /// True when any detection is flagged as a threat.
    pub fn has_threat(&self) -> bool {
        self.detections.iter().any(|d| d.is_threat)
    }
}

/// A stored threat document from the dashboard endpoints.
///
/// The service stores GeoJSON points (`[longitude, latitude]`); unknown
/// fields are tolerated since the document schema is owned server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threat {
    #[serde(rename = "_id")]
    pub id: String,
    pub threat_type: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub notified: Option<bool>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// GeoJSON point as stored by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// `[longitude, latitude]` per GeoJSON.
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }
}

/// Query filters for the threat list endpoint.
///
/// Filters are passed through as real query parameters; the console never
/// drops them client-side.
#[derive(Debug, Clone, Default)]
pub struct ThreatQuery {
    pub limit: Option<u32>,
    pub status: Option<String>,
}

/// Reply shape of the notify and ranger-response endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub response_id: Option<String>,
}

/// A ranger's response to a threat alert, submitted from the field console.
#[derive(Debug, Clone)]
pub struct RangerReport {
    pub threat_id: String,
    pub ranger_name: String,
    pub action_taken: String,
    pub response_details: String,
    /// Optional photo evidence (filename, bytes).
    pub photo: Option<(String, Vec<u8>)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_result_parses_service_body() {
        let body = r#"{
            "success": true,
            "message": "Successfully analyzed image: trap.jpg - THREAT DETECTED: HUMAN",
            "detections": [
                {"class_name": "human", "confidence": 0.91, "is_threat": true,
                 "bounding_box": {"x1": 10.0, "y1": 20.0, "x2": 110.0, "y2": 220.0}},
                {"class_name": "deer", "confidence": 0.55, "is_threat": false}
            ],
            "threat_id": "661f0a",
            "location": {"latitude": 10.7905, "longitude": 78.7047, "description": "Tiruchirappalli"},
            "notification_sent": true
        }"#;

        let result: DetectionResult = serde_json::from_str(body).unwrap();
        assert!(result.success);
        assert!(result.has_threat());
        assert_eq!(result.detections.len(), 2);
        assert_eq!(result.detections[1].bounding_box, None);
        assert_eq!(result.notification_sent, Some(true));
    }

    #[test]
    fn test_detection_result_tolerates_sparse_body() {
        let result: DetectionResult = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(!result.success);
        assert!(result.detections.is_empty());
        assert!(result.message.is_none());
        assert!(result.notification_sent.is_none());
    }

    #[test]
    fn test_geopoint_axis_order() {
        let point: GeoPoint =
            serde_json::from_str(r#"{"type": "Point", "coordinates": [78.7047, 10.7905]}"#).unwrap();
        assert_eq!(point.latitude(), 10.7905);
        assert_eq!(point.longitude(), 78.7047);
    }

    #[test]
    fn test_threat_parses_stored_document() {
        let body = r#"{
            "_id": "661f0a",
            "threat_type": "gunshot",
            "confidence": 0.83,
            "source_type": "audio",
            "timestamp": "2025-04-17T06:12:09",
            "notified": false,
            "location": {"type": "Point", "coordinates": [78.7047, 10.7905]},
            "metadata": {"filename": "clip.wav"}
        }"#;

        let threat: Threat = serde_json::from_str(body).unwrap();
        assert_eq!(threat.id, "661f0a");
        assert_eq!(threat.threat_type, "gunshot");
        assert_eq!(threat.status, None);
    }
}
