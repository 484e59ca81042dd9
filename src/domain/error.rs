use thiserror::Error;

use crate::domain::recording::RecorderPhase;

/// Domain-level errors for wildwatch.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    /// Access to a capture device was refused.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The requested capture device does not exist or is unreachable.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Device exists but the stream could not be opened.
    #[error("Acquisition failed: {0}")]
    AcquisitionFailed(String),

    /// A capture was requested without an open stream/session.
    #[error("No active stream")]
    NoActiveStream,

    /// Submission was requested with nothing staged.
    #[error("No media staged for submission")]
    NoPendingMedia,

    /// Network failure, non-2xx status, or an unparseable response body.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered an operation endpoint with success:false.
    #[error("Service reported failure: {0}")]
    Api(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Invalid recorder transition from {from:?}")]
    RecorderTransition { from: RecorderPhase },

    #[error("Not currently recording")]
    NotRecording,

    #[error("Already recording")]
    AlreadyRecording,
}

/// A titled, user-facing notice derived from an error.
///
/// Acquisition failures surface as transient notices (auto-expiring in the
/// console after [`Notice::TTL_SECS`]) while transport and service failures
/// render inline with the report they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    /// How long a transient notice stays visible.
    pub const TTL_SECS: u64 = 10;
}

impl DomainError {
    /// Map acquisition-class errors to a titled notice.
    ///
    /// Returns `None` for errors that belong inline in the report area.
    pub fn notice(&self) -> Option<Notice> {
        let (title, message) = match self {
            DomainError::PermissionDenied(m) => ("Permission denied", m.clone()),
            DomainError::DeviceNotFound(m) => ("Device not found", m.clone()),
            DomainError::AcquisitionFailed(m) => ("Could not start capture", m.clone()),
            DomainError::NoActiveStream => (
                "No active stream",
                "Open a camera session or start the microphone first.".to_string(),
            ),
            _ => return None,
        };
        Some(Notice {
            title: title.to_string(),
            message,
        })
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquisition_errors_carry_distinct_notices() {
        let denied = DomainError::PermissionDenied("microphone access refused".into());
        let missing = DomainError::DeviceNotFound("no input device".into());
        let failed = DomainError::AcquisitionFailed("stream config rejected".into());

        let titles: Vec<String> = [denied, missing, failed]
            .iter()
            .map(|e| e.notice().unwrap().title)
            .collect();

        assert_eq!(
            titles,
            vec!["Permission denied", "Device not found", "Could not start capture"]
        );
    }

    #[test]
    fn test_transport_errors_have_no_transient_notice() {
        assert!(DomainError::Transport("HTTP 500".into()).notice().is_none());
        assert!(DomainError::Api("boom".into()).notice().is_none());
    }

    #[test]
    fn test_no_active_stream_notice() {
        let notice = DomainError::NoActiveStream.notice().unwrap();
        assert_eq!(notice.title, "No active stream");
    }
}
