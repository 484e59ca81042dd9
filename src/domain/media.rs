use serde::{Deserialize, Serialize};

/// Which analysis pipeline a payload is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Audio,
}

/// Origin marker for audio submissions, carried on the wire as `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioSource {
    Microphone,
    Upload,
}

impl AudioSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioSource::Microphone => "microphone",
            AudioSource::Upload => "upload",
        }
    }
}

/// The single staged media payload awaiting submission.
///
/// Exactly one payload is active at a time; staging a new one replaces the
/// previous, payloads are never merged.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub kind: MediaKind,
    pub filename: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
    /// Present only for audio payloads.
    pub audio_source: Option<AudioSource>,
}

impl MediaPayload {
    pub fn image(filename: impl Into<String>, mime: &'static str, bytes: Vec<u8>) -> Self {
        Self {
            kind: MediaKind::Image,
            filename: filename.into(),
            mime,
            bytes,
            audio_source: None,
        }
    }

    pub fn audio(
        filename: impl Into<String>,
        mime: &'static str,
        bytes: Vec<u8>,
        source: AudioSource,
    ) -> Self {
        Self {
            kind: MediaKind::Audio,
            filename: filename.into(),
            mime,
            bytes,
            audio_source: Some(source),
        }
    }
}

/// Classify an upload by filename.
///
/// Accepted: jpeg/jpg/png images; wav/x-wav/mp3/mpeg audio, plus anything
/// ending in `.mp3` regardless of reported type. Anything else returns
/// `None` and the upload is ignored without surfacing an error.
pub fn classify_upload(filename: &str) -> Option<(MediaKind, &'static str)> {
    let lowered = filename.to_ascii_lowercase();

    if lowered.ends_with(".mp3") {
        return Some((MediaKind::Audio, "audio/mpeg"));
    }

    let ext = lowered.rsplit_once('.').map(|(_, ext)| ext)?;
    match ext {
        "jpg" | "jpeg" => Some((MediaKind::Image, "image/jpeg")),
        "png" => Some((MediaKind::Image, "image/png")),
        "wav" => Some((MediaKind::Audio, "audio/wav")),
        "mpeg" | "mpga" => Some((MediaKind::Audio, "audio/mpeg")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_uploads_accepted() {
        assert_eq!(
            classify_upload("trail-cam.JPG"),
            Some((MediaKind::Image, "image/jpeg"))
        );
        assert_eq!(
            classify_upload("still.png"),
            Some((MediaKind::Image, "image/png"))
        );
    }

    #[test]
    fn test_audio_uploads_accepted() {
        assert_eq!(
            classify_upload("clip.wav"),
            Some((MediaKind::Audio, "audio/wav"))
        );
        assert_eq!(
            classify_upload("chainsaw.MP3"),
            Some((MediaKind::Audio, "audio/mpeg"))
        );
    }

    #[test]
    fn test_unsupported_uploads_silently_ignored() {
        assert_eq!(classify_upload("notes.txt"), None);
        assert_eq!(classify_upload("archive.zip"), None);
        assert_eq!(classify_upload("no_extension"), None);
        assert_eq!(classify_upload("movie.mp4"), None);
    }

    #[test]
    fn test_staged_payload_carries_source_marker() {
        let clip = MediaPayload::audio("mic.wav", "audio/wav", vec![0u8; 4], AudioSource::Microphone);
        assert_eq!(clip.audio_source, Some(AudioSource::Microphone));

        let image = MediaPayload::image("cam.jpg", "image/jpeg", vec![0u8; 4]);
        assert_eq!(image.audio_source, None);
    }
}
