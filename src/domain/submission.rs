use crate::domain::location::LocationFix;
use crate::domain::media::MediaPayload;

/// A fully assembled analysis submission.
///
/// Built fresh for every send; carries no retry or caching state. When no
/// location fix is cached the coordinate fields are absent from the wire
/// form entirely, never null or placeholder values.
#[derive(Debug, Clone)]
pub struct Submission {
    pub media: MediaPayload,
    pub coordinates: Option<(f64, f64)>,
    /// Always true: this console offers no opt-out of ranger notification.
    pub notify: bool,
}

/// Assemble a submission from the staged payload and the cached fix.
pub fn build_submission(media: MediaPayload, fix: Option<&LocationFix>) -> Submission {
    Submission {
        media,
        coordinates: fix.map(LocationFix::coordinates),
        notify: true,
    }
}
