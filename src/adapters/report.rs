use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::info;

use crate::domain::report::{AnalysisReport, DetectionBlock, LocationBlock, NotificationStatus};
use crate::domain::DomainError;
use crate::ports::ReportSink;

/// Minimal HTML escaping for text that came off the wire.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn push_detection(out: &mut String, block: &DetectionBlock) {
    let band = block.band.label();
    let _ = write!(
        out,
        "<div class=\"detection {band}\"><span class=\"label\">{}</span>",
        escape(&block.label)
    );
    if block.is_threat {
        out.push_str("<span class=\"tag threat\">THREAT</span>");
    }
    let _ = write!(
        out,
        "<span class=\"confidence\">{} ({band})</span>",
        block.confidence_percent()
    );
    if let Some(bbox) = &block.bounding_box {
        let _ = write!(
            out,
            "<span class=\"bbox\">box: ({:.0}, {:.0}) - ({:.0}, {:.0})</span>",
            bbox.x1, bbox.y1, bbox.x2, bbox.y2
        );
    }
    out.push_str("</div>\n");
}

fn push_location(out: &mut String, block: &LocationBlock) {
    let _ = write!(
        out,
        "<div class=\"location\">Location: {}, {} <a href=\"{}\">map</a>",
        block.latitude, block.longitude, block.map_url
    );
    if let Some(description) = &block.description {
        let _ = write!(out, "<span class=\"place\">{}</span>", escape(description));
    }
    out.push_str("</div>\n");
}

/// Render a report into a standalone HTML fragment.
///
/// Block order follows the view-model contract; this function is pure so
/// the output can be asserted without touching a filesystem.
pub fn render_html(report: &AnalysisReport) -> String {
    let mut out = String::from("<section class=\"analysis-result\">\n");

    match report {
        AnalysisReport::Failure { message } => {
            let _ = write!(
                out,
                "<div class=\"banner error\">{}</div>\n",
                escape(message)
            );
        }
        AnalysisReport::Success {
            summary,
            threat_detected,
            notification,
            location,
            detections,
        } => {
            if let Some(summary) = summary {
                let _ = write!(out, "<p class=\"summary\">{}</p>\n", escape(summary));
            }
            if *threat_detected {
                out.push_str("<div class=\"banner threat\">&#9888; Threat detected</div>\n");
            }
            match notification {
                Some(NotificationStatus::Notified) => {
                    out.push_str("<div class=\"banner notified\">Ranger has been notified</div>\n");
                }
                Some(NotificationStatus::NotifyNow { threat_id }) => {
                    let _ = write!(
                        out,
                        "<button class=\"notify-now\" data-threat-id=\"{}\">Notify ranger now</button>\n",
                        escape(threat_id)
                    );
                }
                None => {}
            }
            if let Some(block) = location {
                push_location(&mut out, block);
            }
            if detections.is_empty() {
                out.push_str("<p class=\"placeholder\">No detections</p>\n");
            } else {
                for block in detections {
                    push_detection(&mut out, block);
                }
            }
        }
    }

    out.push_str("</section>\n");
    out
}

/// Writes rendered reports under the data directory.
///
/// Presenting a report logs the path at info level so the freshly written
/// file is brought to the operator's attention immediately.
pub struct HtmlReportWriter {
    reports_dir: PathBuf,
}

impl HtmlReportWriter {
    pub fn new(reports_dir: PathBuf) -> Self {
        Self { reports_dir }
    }
}

#[async_trait]
impl ReportSink for HtmlReportWriter {
    async fn present(&self, report: &AnalysisReport) -> Result<PathBuf, DomainError> {
        tokio::fs::create_dir_all(&self.reports_dir)
            .await
            .map_err(|e| DomainError::Io(e.to_string()))?;

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let path = self.reports_dir.join(format!("report-{stamp}.html"));

        tokio::fs::write(&path, render_html(report))
            .await
            .map_err(|e| DomainError::Io(e.to_string()))?;

        info!(path = %path.display(), "Analysis report written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::detection::{Detection, DetectionResult, LocationData};

    fn success_result() -> DetectionResult {
        DetectionResult {
            success: true,
            message: None,
            detections: vec![],
            threat_id: None,
            location: None,
            notification_sent: None,
        }
    }

    #[test]
    fn test_failure_renders_exactly_one_error_banner() {
        let html = render_html(&AnalysisReport::failure("boom"));
        assert_eq!(html.matches("banner error").count(), 1);
        assert!(html.contains("boom"));
        assert!(!html.contains("banner threat"));
    }

    #[test]
    fn test_threat_with_pending_notification_renders_notify_control() {
        let result = DetectionResult {
            detections: vec![Detection {
                class_name: "human".to_string(),
                confidence: 0.9,
                is_threat: true,
                bounding_box: None,
            }],
            threat_id: Some("T1".to_string()),
            notification_sent: Some(false),
            ..success_result()
        };
        let html = render_html(&AnalysisReport::from_result(&result));

        assert!(html.contains("banner threat"));
        assert!(html.contains("data-threat-id=\"T1\""));
        assert!(!html.contains("has been notified"));
    }

    #[test]
    fn test_notified_banner_replaces_control() {
        let result = DetectionResult {
            threat_id: Some("T1".to_string()),
            notification_sent: Some(true),
            ..success_result()
        };
        let html = render_html(&AnalysisReport::from_result(&result));

        assert!(html.contains("has been notified"));
        assert!(!html.contains("notify-now"));
    }

    #[test]
    fn test_empty_detections_render_placeholder() {
        let html = render_html(&AnalysisReport::from_result(&success_result()));
        assert!(html.contains("No detections"));
    }

    #[test]
    fn test_location_and_bounding_box_rendered() {
        let result = DetectionResult {
            detections: vec![Detection {
                class_name: "vehicle".to_string(),
                confidence: 0.45,
                is_threat: false,
                bounding_box: Some(crate::domain::detection::BoundingBox {
                    x1: 1.0,
                    y1: 2.0,
                    x2: 30.0,
                    y2: 40.0,
                }),
            }],
            location: Some(LocationData {
                latitude: 10.7905,
                longitude: 78.7047,
                description: None,
            }),
            ..success_result()
        };
        let html = render_html(&AnalysisReport::from_result(&result));

        assert!(html.contains("10.790500, 78.704700"));
        assert!(html.contains("openstreetmap.org"));
        assert!(html.contains("box: (1, 2) - (30, 40)"));
        assert!(html.contains("45.0% (medium)"));
    }

    #[test]
    fn test_wire_text_is_escaped() {
        let html = render_html(&AnalysisReport::failure("<script>alert(1)</script>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn test_writer_persists_report() {
        let temp = tempfile::tempdir().unwrap();
        let writer = HtmlReportWriter::new(temp.path().join("reports"));

        let path = writer
            .present(&AnalysisReport::failure("offline"))
            .await
            .unwrap();

        let html = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(html.contains("offline"));
    }
}
