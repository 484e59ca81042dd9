use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// Microphone recording state machine.
///
/// Transitions:
/// - Idle -> Recording (start)
/// - Recording -> Finalizing (stop requested, or 60 s of audio elapsed)
/// - Finalizing -> Idle (clip handed to submission)
///
/// Elapsed time derives from the accumulated sample count, not wall clock,
/// so the cap fires at exactly `max_clip_secs` of captured audio and never
/// earlier. Finalizing auto-transitions into submission of the clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderPhase {
    Idle,
    Recording,
    Finalizing,
}

/// Typed transition inputs for the recorder.
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// A chunk of mono PCM samples arrived from the capture stream.
    ChunkReceived(Vec<i16>),
    /// The operator asked to stop.
    StopRequested,
    /// The supervisor's wall-clock guard fired.
    TimeoutFired,
}

/// Result of applying one event to the session.
#[derive(Debug)]
pub enum RecorderStep {
    Continue,
    /// The session finished and produced a clip; the session is spent.
    Finalized(AudioClip),
}

/// A finalized single-clip recording, ready for WAV encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioClip {
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Encode the clip as a mono 16-bit WAV file in memory.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, DomainError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| DomainError::Audio(format!("WAV header: {e}")))?;
            for &sample in &self.samples {
                writer
                    .write_sample(sample)
                    .map_err(|e| DomainError::Audio(format!("WAV sample: {e}")))?;
            }
            writer
                .finalize()
                .map_err(|e| DomainError::Audio(format!("WAV finalize: {e}")))?;
        }
        Ok(cursor.into_inner())
    }
}

/// One cosmetic meter frame published by the capture stream.
///
/// Level is RMS normalized to 0..1; bins are frequency-domain magnitudes
/// over the most recent window. The visualizer consumes these at its own
/// cadence; the recording state machine never reads them.
#[derive(Debug, Clone, Serialize)]
pub struct MeterFrame {
    pub level: f32,
    pub bins: Vec<f32>,
}

/// One microphone recording in progress.
///
/// Created on start, fed chunks via [`RecordingSession::apply`], finalized
/// into a single clip on stop or cap, then discarded.
#[derive(Debug)]
pub struct RecordingSession {
    samples: Vec<i16>,
    sample_rate: u32,
    max_samples: usize,
    phase: RecorderPhase,
}

impl RecordingSession {
    pub fn start(sample_rate: u32, max_clip_secs: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            max_samples: sample_rate as usize * max_clip_secs as usize,
            phase: RecorderPhase::Recording,
        }
    }

    pub fn phase(&self) -> RecorderPhase {
        self.phase
    }

    /// Seconds of audio accumulated so far.
    pub fn elapsed_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Apply one typed event.
    ///
    /// Chunk arrival past the cap truncates to exactly the cap and
    /// finalizes. Events against a non-recording session are rejected.
    pub fn apply(&mut self, event: RecorderEvent) -> Result<RecorderStep, DomainError> {
        if self.phase != RecorderPhase::Recording {
            return Err(DomainError::RecorderTransition { from: self.phase });
        }

        match event {
            RecorderEvent::ChunkReceived(chunk) => {
                self.samples.extend_from_slice(&chunk);
                if self.samples.len() >= self.max_samples {
                    self.samples.truncate(self.max_samples);
                    Ok(RecorderStep::Finalized(self.finalize()))
                } else {
                    Ok(RecorderStep::Continue)
                }
            }
            RecorderEvent::StopRequested | RecorderEvent::TimeoutFired => {
                Ok(RecorderStep::Finalized(self.finalize()))
            }
        }
    }

    fn finalize(&mut self) -> AudioClip {
        self.phase = RecorderPhase::Finalizing;
        AudioClip {
            samples: std::mem::take(&mut self.samples),
            sample_rate: self.sample_rate,
        }
    }
}
