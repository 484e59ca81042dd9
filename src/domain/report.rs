use serde::Serialize;

use crate::domain::detection::{BoundingBox, DetectionResult};
use crate::domain::location::format_coordinate;

/// Qualitative banding of a detection confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    /// high iff c >= 0.70, medium iff 0.40 <= c < 0.70, low otherwise.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.70 {
            ConfidenceBand::High
        } else if confidence >= 0.40 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::Low => "low",
        }
    }
}

/// Notification state shown with a successful analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NotificationStatus {
    /// The service already alerted the ranger.
    Notified,
    /// Actionable control: the operator may notify now for this threat.
    NotifyNow { threat_id: String },
}

/// One rendered detection entry.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionBlock {
    pub label: String,
    pub confidence: f64,
    pub band: ConfidenceBand,
    pub is_threat: bool,
    pub bounding_box: Option<BoundingBox>,
}

impl DetectionBlock {
    /// Confidence as a display percentage, one decimal.
    pub fn confidence_percent(&self) -> String {
        format!("{:.1}%", self.confidence * 100.0)
    }
}

/// Location section of a report.
#[derive(Debug, Clone, Serialize)]
pub struct LocationBlock {
    pub latitude: String,
    pub longitude: String,
    pub map_url: String,
    pub description: Option<String>,
}

/// Pure view model of an analysis outcome; the renderer paints this without
/// touching the wire type again.
#[derive(Debug, Clone, Serialize)]
pub enum AnalysisReport {
    /// Exactly one error banner.
    Failure { message: String },
    Success {
        summary: Option<String>,
        threat_detected: bool,
        notification: Option<NotificationStatus>,
        location: Option<LocationBlock>,
        detections: Vec<DetectionBlock>,
    },
}

impl AnalysisReport {
    /// Inline failure record for transport or service errors tied to a
    /// submission the operator is reviewing.
    pub fn failure(message: impl Into<String>) -> Self {
        AnalysisReport::Failure {
            message: message.into(),
        }
    }

    /// Transform a service response into the view model.
    pub fn from_result(result: &DetectionResult) -> Self {
        if !result.success {
            return AnalysisReport::Failure {
                message: result
                    .message
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string()),
            };
        }

        let notification = if result.notification_sent == Some(true) {
            Some(NotificationStatus::Notified)
        } else {
            result
                .threat_id
                .clone()
                .map(|threat_id| NotificationStatus::NotifyNow { threat_id })
        };

        let location = result.location.as_ref().map(|loc| LocationBlock {
            latitude: format_coordinate(loc.latitude),
            longitude: format_coordinate(loc.longitude),
            map_url: format!(
                "https://www.openstreetmap.org/?mlat={}&mlon={}#map=15/{}/{}",
                format_coordinate(loc.latitude),
                format_coordinate(loc.longitude),
                format_coordinate(loc.latitude),
                format_coordinate(loc.longitude),
            ),
            description: loc.description.clone(),
        });

        let detections = result
            .detections
            .iter()
            .map(|d| DetectionBlock {
                label: d.class_name.clone(),
                confidence: d.confidence,
                band: ConfidenceBand::from_confidence(d.confidence),
                is_threat: d.is_threat,
                bounding_box: d.bounding_box,
            })
            .collect();

        AnalysisReport::Success {
            summary: result.message.clone(),
            threat_detected: result.has_threat(),
            notification,
            location,
            detections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::detection::{Detection, LocationData};

    fn detection(class_name: &str, confidence: f64, is_threat: bool) -> Detection {
        Detection {
            class_name: class_name.to_string(),
            confidence,
            is_threat,
            bounding_box: None,
        }
    }

    #[test]
    fn test_banding_boundaries() {
        assert_eq!(ConfidenceBand::from_confidence(1.0), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::from_confidence(0.70), ConfidenceBand::High);
        assert_eq!(
            ConfidenceBand::from_confidence(0.6999),
            ConfidenceBand::Medium
        );
        assert_eq!(ConfidenceBand::from_confidence(0.40), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::from_confidence(0.3999), ConfidenceBand::Low);
        assert_eq!(ConfidenceBand::from_confidence(0.0), ConfidenceBand::Low);
    }

    #[test]
    fn test_failure_uses_provided_message() {
        let result = DetectionResult {
            success: false,
            message: Some("boom".to_string()),
            detections: vec![],
            threat_id: None,
            location: None,
            notification_sent: None,
        };

        match AnalysisReport::from_result(&result) {
            AnalysisReport::Failure { message } => assert_eq!(message, "boom"),
            AnalysisReport::Success { .. } => panic!("must be a failure report"),
        }
    }

    #[test]
    fn test_failure_defaults_message() {
        let result = DetectionResult {
            success: false,
            message: None,
            detections: vec![detection("human", 0.9, true)],
            threat_id: Some("T9".to_string()),
            location: None,
            notification_sent: Some(true),
        };

        // success:false produces the error banner and nothing else.
        match AnalysisReport::from_result(&result) {
            AnalysisReport::Failure { message } => assert_eq!(message, "Unknown error"),
            AnalysisReport::Success { .. } => panic!("must be a failure report"),
        }
    }

    #[test]
    fn test_unnotified_threat_yields_notify_control() {
        let result = DetectionResult {
            success: true,
            message: None,
            detections: vec![detection("human", 0.9, true)],
            threat_id: Some("T1".to_string()),
            location: None,
            notification_sent: Some(false),
        };

        match AnalysisReport::from_result(&result) {
            AnalysisReport::Success {
                threat_detected,
                notification,
                ..
            } => {
                assert!(threat_detected);
                assert_eq!(
                    notification,
                    Some(NotificationStatus::NotifyNow {
                        threat_id: "T1".to_string()
                    })
                );
            }
            AnalysisReport::Failure { .. } => panic!("must be a success report"),
        }
    }

    #[test]
    fn test_notified_wins_over_notify_control() {
        let result = DetectionResult {
            success: true,
            message: None,
            detections: vec![detection("poacher", 0.8, true)],
            threat_id: Some("T2".to_string()),
            location: None,
            notification_sent: Some(true),
        };

        match AnalysisReport::from_result(&result) {
            AnalysisReport::Success { notification, .. } => {
                assert_eq!(notification, Some(NotificationStatus::Notified));
            }
            AnalysisReport::Failure { .. } => panic!("must be a success report"),
        }
    }

    #[test]
    fn test_no_threat_id_and_unsent_yields_no_notification_block() {
        let result = DetectionResult {
            success: true,
            message: None,
            detections: vec![detection("deer", 0.5, false)],
            threat_id: None,
            location: None,
            notification_sent: None,
        };

        match AnalysisReport::from_result(&result) {
            AnalysisReport::Success {
                threat_detected,
                notification,
                ..
            } => {
                assert!(!threat_detected);
                assert_eq!(notification, None);
            }
            AnalysisReport::Failure { .. } => panic!("must be a success report"),
        }
    }

    #[test]
    fn test_location_block_formats_six_decimals_with_map_link() {
        let result = DetectionResult {
            success: true,
            message: None,
            detections: vec![],
            threat_id: None,
            location: Some(LocationData {
                latitude: 10.7905,
                longitude: 78.7047,
                description: Some("Reserve sector 4".to_string()),
            }),
            notification_sent: None,
        };

        match AnalysisReport::from_result(&result) {
            AnalysisReport::Success { location, .. } => {
                let block = location.expect("location block");
                assert_eq!(block.latitude, "10.790500");
                assert_eq!(block.longitude, "78.704700");
                assert!(block.map_url.contains("openstreetmap.org"));
                assert!(block.map_url.contains("mlat=10.790500"));
                assert_eq!(block.description.as_deref(), Some("Reserve sector 4"));
            }
            AnalysisReport::Failure { .. } => panic!("must be a success report"),
        }
    }

    #[test]
    fn test_empty_detections_render_placeholder_path() {
        let result = DetectionResult {
            success: true,
            message: Some("Successfully analyzed image: empty.jpg".to_string()),
            detections: vec![],
            threat_id: None,
            location: None,
            notification_sent: None,
        };

        match AnalysisReport::from_result(&result) {
            AnalysisReport::Success { detections, .. } => assert!(detections.is_empty()),
            AnalysisReport::Failure { .. } => panic!("must be a success report"),
        }
    }

    #[test]
    fn test_confidence_percent_display() {
        let block = DetectionBlock {
            label: "chainsaw".to_string(),
            confidence: 0.874,
            band: ConfidenceBand::from_confidence(0.874),
            is_threat: true,
            bounding_box: None,
        };
        assert_eq!(block.confidence_percent(), "87.4%");
        assert_eq!(block.band, ConfidenceBand::High);
    }
}
