use async_trait::async_trait;

use crate::domain::{
    ActionOutcome, DetectionResult, DomainError, RangerReport, Submission, Threat, ThreatQuery,
};

/// Port for the wildlife-threat-detection service.
///
/// Every operation maps to one documented endpoint; the service owns
/// detection, storage, and notification delivery. Calls send exactly once
/// with no automatic retry.
#[async_trait]
pub trait ThreatApi: Send + Sync {
    /// POST /analyze-image/ with a multipart image submission.
    async fn analyze_image(&self, submission: &Submission) -> Result<DetectionResult, DomainError>;

    /// POST /analyze-audio/ with a multipart audio submission (carries the
    /// `source` marker).
    async fn analyze_audio(&self, submission: &Submission) -> Result<DetectionResult, DomainError>;

    /// POST /manual-capture/ — the service grabs a frame from its camera.
    async fn manual_capture(
        &self,
        coordinates: Option<(f64, f64)>,
        notify: bool,
    ) -> Result<DetectionResult, DomainError>;

    /// POST /capture-and-analyze/ — one unattended capture cycle.
    async fn capture_and_analyze(
        &self,
        coordinates: Option<(f64, f64)>,
        notify: bool,
    ) -> Result<DetectionResult, DomainError>;

    /// GET /threats/ with the query filters passed through.
    async fn recent_threats(&self, query: &ThreatQuery) -> Result<Vec<Threat>, DomainError>;

    /// GET /threat-details/{id}.
    async fn threat_details(&self, threat_id: &str) -> Result<Threat, DomainError>;

    /// POST /notify/{id}. Idempotent server-side; safe to retry.
    async fn notify(&self, threat_id: &str) -> Result<ActionOutcome, DomainError>;

    /// POST /ranger-response/ with the multipart ranger report.
    async fn submit_ranger_report(
        &self,
        report: &RangerReport,
    ) -> Result<ActionOutcome, DomainError>;

    /// GET /ranger-response/ — recent ranger responses (server-owned schema).
    async fn ranger_responses(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<serde_json::Value>, DomainError>;

    /// Probe the service root; used when opening a camera session to map
    /// reachability onto the acquisition error taxonomy.
    async fn probe(&self) -> Result<(), DomainError>;
}
