pub mod config;
pub mod detection;
pub mod error;
pub mod location;
pub mod media;
pub mod recording;
pub mod report;
pub mod submission;

pub use config::{AppConfig, AudioConfig, ClientState, LocationProvider};
pub use detection::{ActionOutcome, Detection, DetectionResult, RangerReport, Threat, ThreatQuery};
pub use error::{DomainError, Notice};
pub use location::LocationFix;
pub use media::{AudioSource, MediaKind, MediaPayload};
pub use recording::{
    AudioClip, MeterFrame, RecorderEvent, RecorderPhase, RecorderStep, RecordingSession,
};
pub use report::AnalysisReport;
pub use submission::{build_submission, Submission};
