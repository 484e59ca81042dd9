use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::{source_from_config, HtmlReportWriter, HttpThreatApi, TomlConfigStore};
use crate::domain::media::classify_upload;
use crate::domain::{
    build_submission, ActionOutcome, AnalysisReport, AppConfig, AudioClip, AudioSource,
    ClientState, DomainError, LocationFix, MediaKind, MediaPayload, Notice, RangerReport, Threat,
    ThreatQuery,
};
use crate::infrastructure::init_logging;
use crate::ports::{ConfigStore, LocationSource, ReportSink, ThreatApi};

/// Shared busy indicator for the submission pipeline.
///
/// A single boolean with no reentrancy counter; the console exposes one
/// submission affordance at a time, so overlapping guards clearing each
/// other is an accepted non-case.
#[derive(Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn engage(&self) -> BusyGuard {
        self.0.store(true, Ordering::SeqCst);
        BusyGuard(Arc::clone(&self.0))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Clears the flag on drop, so every exit path of a submission, including
/// unwinding, releases the indicator.
pub struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Application controller for the field console.
///
/// Holds the explicit application state (cached location fix, staged media,
/// camera session, busy flag, advisory state) that the original pages kept
/// in page-global mutables, and orchestrates every operation against the
/// detection service.
pub struct FieldConsole {
    config: AppConfig,
    api: Arc<dyn ThreatApi>,
    sink: Arc<dyn ReportSink>,
    store: Arc<dyn ConfigStore>,
    location: Arc<RwLock<Option<LocationFix>>>,
    pending: Mutex<Option<MediaPayload>>,
    camera_active: AtomicBool,
    busy: BusyFlag,
    notice_dismissed: AtomicBool,
    advisory_shown: AtomicBool,
    tracker: Mutex<Option<JoinHandle<()>>>,
    _log_guard: Option<WorkerGuard>,
}

impl FieldConsole {
    /// Full wiring: config store, logging, API client, report writer, and
    /// the geolocation tracker. Must run inside a tokio runtime.
    pub fn new() -> Result<Self, DomainError> {
        let store = Arc::new(TomlConfigStore::new()?);
        let config = store.load()?;
        let state = store.load_state()?;

        let log_guard = init_logging(
            &store.logs_dir(),
            &config.logging.level,
            config.logging.file_logging,
        )?;

        info!("wildwatch field console starting up");

        let api = Arc::new(HttpThreatApi::new(
            &config.api.base_url,
            config.api.timeout_secs,
        )?);
        let sink = Arc::new(HtmlReportWriter::new(store.reports_dir()));
        let location_source = source_from_config(&config.location)?;

        let mut console = Self::with_parts(config, api, sink, store, location_source, state);
        console._log_guard = log_guard;
        Ok(console)
    }

    /// Assemble from explicit parts. Used by the full constructor and by
    /// tests that substitute port stubs.
    pub fn with_parts(
        config: AppConfig,
        api: Arc<dyn ThreatApi>,
        sink: Arc<dyn ReportSink>,
        store: Arc<dyn ConfigStore>,
        location_source: Option<Arc<dyn LocationSource>>,
        state: ClientState,
    ) -> Self {
        let location = Arc::new(RwLock::new(None));
        let tracker = location_source.map(|source| {
            spawn_location_tracker(source, Arc::clone(&location), config.location.refresh_secs)
        });

        Self {
            config,
            api,
            sink,
            store,
            location,
            pending: Mutex::new(None),
            camera_active: AtomicBool::new(false),
            busy: BusyFlag::default(),
            notice_dismissed: AtomicBool::new(state.location_notice_dismissed),
            advisory_shown: AtomicBool::new(false),
            tracker: Mutex::new(tracker),
            _log_guard: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    // ==================== Location ====================

    pub fn location_fix(&self) -> Option<LocationFix> {
        self.location.read().clone()
    }

    /// One-shot "no location" advisory: raised at most once per run, only
    /// while no fix is cached, and never again once dismissed.
    pub fn location_advisory(&self) -> Option<Notice> {
        if self.location.read().is_some() || self.notice_dismissed.load(Ordering::SeqCst) {
            return None;
        }
        if self.advisory_shown.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(Notice {
            title: "No location".to_string(),
            message: "Submissions are sent without coordinates until a fix is acquired. \
                      Dismiss this notice with `wildwatch dismiss-location-notice`."
                .to_string(),
        })
    }

    /// Persist the advisory dismissal; it stays dismissed across sessions.
    pub fn dismiss_location_notice(&self) -> Result<(), DomainError> {
        self.notice_dismissed.store(true, Ordering::SeqCst);
        self.store.save_state(&ClientState {
            location_notice_dismissed: true,
        })
    }

    // ==================== Media acquisition ====================

    /// Stage a file upload as the pending payload.
    ///
    /// Unsupported types are silently ignored: nothing is staged, nothing
    /// is surfaced, and any previously staged payload is left in place.
    pub async fn stage_upload(&self, path: &Path) -> Result<Option<MediaKind>, DomainError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let Some((kind, mime)) = classify_upload(&filename) else {
            tracing::debug!(file = %filename, "Ignoring unsupported upload type");
            return Ok(None);
        };

        let bytes = tokio::fs::read(path).await?;
        let payload = match kind {
            MediaKind::Image => MediaPayload::image(filename, mime, bytes),
            MediaKind::Audio => MediaPayload::audio(filename, mime, bytes, AudioSource::Upload),
        };

        // Replaces any previous payload; payloads are never merged.
        *self.pending.lock() = Some(payload);
        Ok(Some(kind))
    }

    pub fn pending_kind(&self) -> Option<MediaKind> {
        self.pending.lock().as_ref().map(|p| p.kind)
    }

    // ==================== Camera session ====================

    /// Open a session lease over the backend camera.
    ///
    /// Probes the service and maps failures onto the acquisition taxonomy;
    /// captures are refused until a session is open.
    pub async fn open_camera(&self) -> Result<(), DomainError> {
        if self.camera_active.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.api.probe().await?;
        self.camera_active.store(true, Ordering::SeqCst);
        info!("Camera session opened");
        Ok(())
    }

    /// Close the camera session. Idempotent.
    pub fn close_camera(&self) {
        if self.camera_active.swap(false, Ordering::SeqCst) {
            info!("Camera session closed");
        }
    }

    pub fn camera_active(&self) -> bool {
        self.camera_active.load(Ordering::SeqCst)
    }

    // ==================== Submission pipeline ====================

    /// Submit the staged payload; clears it whatever the outcome.
    pub async fn submit_pending(&self) -> Result<AnalysisReport, DomainError> {
        let media = self
            .pending
            .lock()
            .take()
            .ok_or(DomainError::NoPendingMedia)?;
        self.submit_media(media).await
    }

    /// Submit a finalized microphone clip.
    pub async fn submit_clip(&self, clip: AudioClip) -> Result<AnalysisReport, DomainError> {
        let bytes = clip.to_wav_bytes()?;
        let media = MediaPayload::audio(
            "field-recording.wav",
            "audio/wav",
            bytes,
            AudioSource::Microphone,
        );
        self.submit_media(media).await
    }

    async fn submit_media(&self, media: MediaPayload) -> Result<AnalysisReport, DomainError> {
        let submission = build_submission(media, self.location_fix().as_ref());

        let _busy = self.busy.engage();
        let outcome = match submission.media.kind {
            MediaKind::Image => self.api.analyze_image(&submission).await,
            MediaKind::Audio => self.api.analyze_audio(&submission).await,
        };
        self.render_outcome(outcome).await
    }

    /// Manual server-side capture; requires an open camera session.
    pub async fn capture_now(&self) -> Result<AnalysisReport, DomainError> {
        if !self.camera_active() {
            return Err(DomainError::NoActiveStream);
        }
        let coordinates = self.location_fix().map(|f| f.coordinates());

        let _busy = self.busy.engage();
        let outcome = self.api.manual_capture(coordinates, true).await;
        self.render_outcome(outcome).await
    }

    /// One unattended capture cycle, used by the auto-capture loop.
    pub(crate) async fn auto_capture_cycle(&self) -> Result<AnalysisReport, DomainError> {
        let coordinates = self.location_fix().map(|f| f.coordinates());

        let _busy = self.busy.engage();
        let outcome = self.api.capture_and_analyze(coordinates, true).await;
        self.render_outcome(outcome).await
    }

    /// Sends exactly once happened upstream; here every parsed body goes to
    /// the renderer unconditionally, while transport and service failures
    /// become inline failure reports tied to this submission.
    async fn render_outcome(
        &self,
        outcome: Result<crate::domain::DetectionResult, DomainError>,
    ) -> Result<AnalysisReport, DomainError> {
        let report = match outcome {
            Ok(body) => AnalysisReport::from_result(&body),
            Err(err @ (DomainError::Transport(_) | DomainError::Api(_))) => {
                AnalysisReport::failure(err.to_string())
            }
            Err(other) => return Err(other),
        };

        if let Err(err) = self.sink.present(&report).await {
            warn!(error = %err, "Failed to persist report");
        }
        Ok(report)
    }

    // ==================== Dashboard / ranger console ====================

    pub async fn recent_threats(&self, query: &ThreatQuery) -> Result<Vec<Threat>, DomainError> {
        self.api.recent_threats(query).await
    }

    pub async fn threat_details(&self, threat_id: &str) -> Result<Threat, DomainError> {
        self.api.threat_details(threat_id).await
    }

    /// Idempotent ranger notification; a failed attempt leaves the operator
    /// free to retry, never latched off.
    pub async fn notify_threat(&self, threat_id: &str) -> Result<ActionOutcome, DomainError> {
        let outcome = self.api.notify(threat_id).await?;
        if outcome.success {
            info!(threat_id, "Ranger notified");
        } else {
            warn!(threat_id, message = ?outcome.message, "Notification attempt failed");
        }
        Ok(outcome)
    }

    pub async fn submit_ranger_report(
        &self,
        report: &RangerReport,
    ) -> Result<ActionOutcome, DomainError> {
        let outcome = self.api.submit_ranger_report(report).await?;
        if !outcome.success {
            return Err(DomainError::Api(
                outcome
                    .message
                    .unwrap_or_else(|| "ranger response rejected".to_string()),
            ));
        }
        Ok(outcome)
    }

    pub async fn ranger_responses(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<serde_json::Value>, DomainError> {
        self.api.ranger_responses(limit).await
    }
}

impl Drop for FieldConsole {
    fn drop(&mut self) {
        if let Some(handle) = self.tracker.lock().take() {
            handle.abort();
        }
    }
}

/// Poll the location source immediately and then on the refresh interval
/// for the process lifetime. A successful poll swaps the cached fix whole;
/// a failure logs a warning and leaves the previous fix untouched.
fn spawn_location_tracker(
    source: Arc<dyn LocationSource>,
    cache: Arc<RwLock<Option<LocationFix>>>,
    refresh_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(refresh_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match source.current_fix().await {
                Ok(fix) => {
                    *cache.write() = Some(fix);
                }
                Err(err) => {
                    warn!(error = %err, "Location poll failed, keeping previous fix");
                }
            }
        }
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::domain::{
        ActionOutcome, AnalysisReport, AppConfig, ClientState, DetectionResult, DomainError,
        RangerReport, Submission, Threat, ThreatQuery,
    };
    use crate::ports::{ConfigStore, ReportSink, ThreatApi};

    /// Scripted API stub; counts calls and replays canned outcomes.
    #[derive(Default)]
    pub struct StubApi {
        pub image_calls: AtomicUsize,
        pub audio_calls: AtomicUsize,
        pub capture_calls: AtomicUsize,
        pub auto_capture_calls: AtomicUsize,
        pub probe_ok: Mutex<Option<DomainError>>,
        pub next_result: Mutex<Option<Result<DetectionResult, DomainError>>>,
        pub last_submission: Mutex<Option<Submission>>,
    }

    impl StubApi {
        pub fn ok_result() -> DetectionResult {
            DetectionResult {
                success: true,
                message: Some("ok".to_string()),
                detections: vec![],
                threat_id: None,
                location: None,
                notification_sent: None,
            }
        }

        fn take_result(&self) -> Result<DetectionResult, DomainError> {
            self.next_result
                .lock()
                .take()
                .unwrap_or_else(|| Ok(Self::ok_result()))
        }
    }

    #[async_trait]
    impl ThreatApi for StubApi {
        async fn analyze_image(
            &self,
            submission: &Submission,
        ) -> Result<DetectionResult, DomainError> {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_submission.lock() = Some(submission.clone());
            self.take_result()
        }

        async fn analyze_audio(
            &self,
            submission: &Submission,
        ) -> Result<DetectionResult, DomainError> {
            self.audio_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_submission.lock() = Some(submission.clone());
            self.take_result()
        }

        async fn manual_capture(
            &self,
            _coordinates: Option<(f64, f64)>,
            _notify: bool,
        ) -> Result<DetectionResult, DomainError> {
            self.capture_calls.fetch_add(1, Ordering::SeqCst);
            self.take_result()
        }

        async fn capture_and_analyze(
            &self,
            _coordinates: Option<(f64, f64)>,
            _notify: bool,
        ) -> Result<DetectionResult, DomainError> {
            self.auto_capture_calls.fetch_add(1, Ordering::SeqCst);
            self.take_result()
        }

        async fn recent_threats(&self, _query: &ThreatQuery) -> Result<Vec<Threat>, DomainError> {
            Ok(vec![])
        }

        async fn threat_details(&self, threat_id: &str) -> Result<Threat, DomainError> {
            Err(DomainError::Transport(format!("no threat {threat_id}")))
        }

        async fn notify(&self, _threat_id: &str) -> Result<ActionOutcome, DomainError> {
            Ok(ActionOutcome {
                success: true,
                message: None,
                response_id: None,
            })
        }

        async fn submit_ranger_report(
            &self,
            _report: &RangerReport,
        ) -> Result<ActionOutcome, DomainError> {
            Ok(ActionOutcome {
                success: true,
                message: None,
                response_id: None,
            })
        }

        async fn ranger_responses(
            &self,
            _limit: Option<u32>,
        ) -> Result<Vec<serde_json::Value>, DomainError> {
            Ok(vec![])
        }

        async fn probe(&self) -> Result<(), DomainError> {
            match self.probe_ok.lock().take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    /// Collects presented reports in memory.
    #[derive(Default)]
    pub struct StubSink {
        pub presented: Mutex<Vec<AnalysisReport>>,
    }

    #[async_trait]
    impl ReportSink for StubSink {
        async fn present(&self, report: &AnalysisReport) -> Result<PathBuf, DomainError> {
            self.presented.lock().push(report.clone());
            Ok(PathBuf::from("/dev/null"))
        }
    }

    /// In-memory config store.
    #[derive(Default)]
    pub struct StubStore {
        pub state: Mutex<ClientState>,
    }

    impl ConfigStore for StubStore {
        fn load(&self) -> Result<AppConfig, DomainError> {
            Ok(AppConfig::default())
        }

        fn save(&self, _config: &AppConfig) -> Result<(), DomainError> {
            Ok(())
        }

        fn load_state(&self) -> Result<ClientState, DomainError> {
            Ok(self.state.lock().clone())
        }

        fn save_state(&self, state: &ClientState) -> Result<(), DomainError> {
            *self.state.lock() = state.clone();
            Ok(())
        }

        fn config_path(&self) -> PathBuf {
            PathBuf::new()
        }

        fn data_dir(&self) -> PathBuf {
            PathBuf::new()
        }

        fn logs_dir(&self) -> PathBuf {
            PathBuf::new()
        }

        fn reports_dir(&self) -> PathBuf {
            PathBuf::new()
        }
    }

    pub fn console_with(api: Arc<StubApi>, sink: Arc<StubSink>) -> super::FieldConsole {
        super::FieldConsole::with_parts(
            AppConfig::default(),
            api,
            sink,
            Arc::new(StubStore::default()),
            None,
            ClientState::default(),
        )
    }
}
