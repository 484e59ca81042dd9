use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::{
    ActionOutcome, DetectionResult, DomainError, MediaKind, RangerReport, Submission, Threat,
    ThreatQuery,
};
use crate::ports::ThreatApi;

/// reqwest-backed implementation of the detection service contract.
///
/// One shared client, one request per operation, no automatic retry.
pub struct HttpThreatApi {
    client: Client,
    base_url: String,
}

impl HttpThreatApi {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, DomainError> {
        // Validate early so a bad config fails at startup, not mid-submission.
        Url::parse(base_url)
            .map_err(|e| DomainError::Config(format!("invalid api base_url: {e}")))?;

        let client = Client::builder()
            .use_rustls_tls()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(format!("wildwatch/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DomainError::Transport(format!("failed to create HTTP client: {e}")))?;

        info!(base_url, "Detection API client initialized");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Decode a 2xx body, mapping non-success statuses and parse failures
    /// onto the transport variant.
    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DomainError> {
        let status = response.status();
        let url = response.url().clone();
        if !status.is_success() {
            return Err(DomainError::Transport(format!("HTTP {status} for {url}")));
        }
        response
            .json()
            .await
            .map_err(|e| DomainError::Transport(format!("malformed response from {url}: {e}")))
    }

    fn multipart_form(submission: &Submission) -> Result<Form, DomainError> {
        let media = &submission.media;
        let part = Part::bytes(media.bytes.clone())
            .file_name(media.filename.clone())
            .mime_str(media.mime)
            .map_err(|e| DomainError::Transport(format!("invalid media type: {e}")))?;

        let mut form = Form::new().part("file", part);

        if let Some(source) = media.audio_source {
            form = form.text("source", source.as_str());
        }
        for (key, value) in location_fields(submission.coordinates) {
            form = form.text(key, value);
        }
        form = form.text("notify", bool_field(submission.notify));

        Ok(form)
    }

    async fn post_capture(
        &self,
        path: &str,
        coordinates: Option<(f64, f64)>,
        notify: bool,
    ) -> Result<DetectionResult, DomainError> {
        let mut query = location_fields(coordinates);
        query.push(("notify", bool_field(notify).to_string()));

        debug!(path, ?coordinates, "Requesting server-side capture");
        let response = self
            .client
            .post(self.endpoint(path))
            .query(&query)
            .send()
            .await
            .map_err(|e| DomainError::Transport(e.to_string()))?;

        Self::decode(response).await
    }
}

/// Location query/form fields; empty when no fix exists so coordinates are
/// absent from the wire, never null.
fn location_fields(coordinates: Option<(f64, f64)>) -> Vec<(&'static str, String)> {
    match coordinates {
        Some((latitude, longitude)) => vec![
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
        ],
        None => Vec::new(),
    }
}

fn bool_field(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Map a camera-session probe outcome onto the acquisition taxonomy.
fn map_probe_failure(status: Option<StatusCode>, detail: String) -> DomainError {
    match status {
        Some(s) if s == StatusCode::UNAUTHORIZED || s == StatusCode::FORBIDDEN => {
            DomainError::PermissionDenied(
                "the detection service refused camera access".to_string(),
            )
        }
        Some(s) => DomainError::AcquisitionFailed(format!(
            "the detection service rejected the camera probe (HTTP {s})"
        )),
        None => DomainError::DeviceNotFound(format!(
            "detection service unreachable, check the camera link: {detail}"
        )),
    }
}

#[async_trait]
impl ThreatApi for HttpThreatApi {
    async fn analyze_image(&self, submission: &Submission) -> Result<DetectionResult, DomainError> {
        debug_assert_eq!(submission.media.kind, MediaKind::Image);
        let form = Self::multipart_form(submission)?;

        let response = self
            .client
            .post(self.endpoint("analyze-image/"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| DomainError::Transport(e.to_string()))?;

        Self::decode(response).await
    }

    async fn analyze_audio(&self, submission: &Submission) -> Result<DetectionResult, DomainError> {
        debug_assert_eq!(submission.media.kind, MediaKind::Audio);
        let form = Self::multipart_form(submission)?;

        let response = self
            .client
            .post(self.endpoint("analyze-audio/"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| DomainError::Transport(e.to_string()))?;

        Self::decode(response).await
    }

    async fn manual_capture(
        &self,
        coordinates: Option<(f64, f64)>,
        notify: bool,
    ) -> Result<DetectionResult, DomainError> {
        self.post_capture("manual-capture/", coordinates, notify)
            .await
    }

    async fn capture_and_analyze(
        &self,
        coordinates: Option<(f64, f64)>,
        notify: bool,
    ) -> Result<DetectionResult, DomainError> {
        self.post_capture("capture-and-analyze/", coordinates, notify)
            .await
    }

    async fn recent_threats(&self, query: &ThreatQuery) -> Result<Vec<Threat>, DomainError> {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(limit) = query.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(status) = &query.status {
            pairs.push(("status", status.clone()));
        }

        let response = self
            .client
            .get(self.endpoint("threats/"))
            .query(&pairs)
            .send()
            .await
            .map_err(|e| DomainError::Transport(e.to_string()))?;

        Self::decode(response).await
    }

    async fn threat_details(&self, threat_id: &str) -> Result<Threat, DomainError> {
        let response = self
            .client
            .get(self.endpoint(&format!("threat-details/{threat_id}")))
            .send()
            .await
            .map_err(|e| DomainError::Transport(e.to_string()))?;

        Self::decode(response).await
    }

    async fn notify(&self, threat_id: &str) -> Result<ActionOutcome, DomainError> {
        let response = self
            .client
            .post(self.endpoint(&format!("notify/{threat_id}")))
            .send()
            .await
            .map_err(|e| DomainError::Transport(e.to_string()))?;

        Self::decode(response).await
    }

    async fn submit_ranger_report(
        &self,
        report: &RangerReport,
    ) -> Result<ActionOutcome, DomainError> {
        let mut form = Form::new()
            .text("threat_id", report.threat_id.clone())
            .text("ranger_name", report.ranger_name.clone())
            .text("action_taken", report.action_taken.clone())
            .text("response_details", report.response_details.clone());

        if let Some((filename, bytes)) = &report.photo {
            let part = Part::bytes(bytes.clone())
                .file_name(filename.clone())
                .mime_str("image/jpeg")
                .map_err(|e| DomainError::Transport(format!("invalid photo type: {e}")))?;
            form = form.part("photo", part);
        }

        let response = self
            .client
            .post(self.endpoint("ranger-response/"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| DomainError::Transport(e.to_string()))?;

        Self::decode(response).await
    }

    async fn ranger_responses(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<serde_json::Value>, DomainError> {
        let pairs: Vec<(&str, String)> = limit
            .map(|l| vec![("limit", l.to_string())])
            .unwrap_or_default();

        let response = self
            .client
            .get(self.endpoint("ranger-response/"))
            .query(&pairs)
            .send()
            .await
            .map_err(|e| DomainError::Transport(e.to_string()))?;

        Self::decode(response).await
    }

    async fn probe(&self) -> Result<(), DomainError> {
        let result = self.client.get(self.endpoint("")).send().await;

        match result {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => {
                let status = response.status();
                warn!(%status, "Camera probe rejected");
                Err(map_probe_failure(Some(status), status.to_string()))
            }
            Err(e) => {
                warn!(error = %e, "Camera probe failed");
                Err(map_probe_failure(None, e.to_string()))
            }
        }
    }
}
