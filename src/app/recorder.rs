use std::time::Duration;

use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::FieldConsole;
use crate::domain::{
    AnalysisReport, AudioClip, DomainError, MeterFrame, RecorderEvent, RecorderStep,
    RecordingSession,
};
use crate::ports::AudioCapture;

/// Extra wall-clock slack past the sample-count cap before the stall guard
/// fires; only a stalled stream ever reaches it.
const STALL_GRACE_SECS: u64 = 5;

/// Run one recording session to completion.
///
/// Acquires the stream, feeds the typed state machine from the chunk flow,
/// and finalizes on the first of: operator stop, the 60 s sample-count cap,
/// a closed stream, or the wall-clock stall guard. The stream is released
/// on every exit path.
pub async fn record_until(
    capture: &dyn AudioCapture,
    max_clip_secs: u32,
    stop: oneshot::Receiver<()>,
) -> Result<AudioClip, DomainError> {
    let chunk_rx = capture.start().await?;
    info!(max_clip_secs, "Recording started");

    let result = drive_session(capture.sample_rate(), max_clip_secs, chunk_rx, stop).await;

    if let Err(err) = capture.stop().await {
        warn!(error = %err, "Failed to release microphone stream");
    }

    match &result {
        Ok(clip) => info!(duration_secs = clip.duration_secs(), "Recording finalized"),
        Err(err) => warn!(error = %err, "Recording aborted"),
    }
    result
}

async fn drive_session(
    sample_rate: u32,
    max_clip_secs: u32,
    mut chunk_rx: tokio::sync::mpsc::Receiver<Vec<i16>>,
    mut stop: oneshot::Receiver<()>,
) -> Result<AudioClip, DomainError> {
    let mut session = RecordingSession::start(sample_rate, max_clip_secs);

    let stall = tokio::time::sleep(Duration::from_secs(max_clip_secs as u64 + STALL_GRACE_SECS));
    tokio::pin!(stall);

    loop {
        let step = tokio::select! {
            maybe_chunk = chunk_rx.recv() => match maybe_chunk {
                Some(chunk) => session.apply(RecorderEvent::ChunkReceived(chunk))?,
                None => {
                    // Stream went away underneath us; salvage what arrived.
                    warn!("Capture stream closed mid-recording");
                    session.apply(RecorderEvent::StopRequested)?
                }
            },
            _ = &mut stop => {
                debug!("Stop requested by operator");
                session.apply(RecorderEvent::StopRequested)?
            }
            _ = &mut stall => {
                warn!("Recording stalled past the clip cap");
                session.apply(RecorderEvent::TimeoutFired)?
            }
        };

        if let RecorderStep::Finalized(clip) = step {
            return Ok(clip);
        }
    }
}

/// Record one clip and submit it; finalizing flows straight into the
/// submission pipeline without operator interaction.
pub async fn record_and_submit(
    console: &FieldConsole,
    capture: &dyn AudioCapture,
    stop: oneshot::Receiver<()>,
) -> Result<AnalysisReport, DomainError> {
    let max_clip_secs = console.config().audio.max_clip_secs;
    let clip = record_until(capture, max_clip_secs, stop).await?;
    console.submit_clip(clip).await
}

/// Render a meter frame as a console bar.
///
/// Cosmetic only; low-frequency energy drives the bar so voices and engine
/// noise both register.
pub fn level_bar(frame: &MeterFrame, width: usize) -> String {
    let spectral_weight = if frame.bins.is_empty() {
        0.0
    } else {
        let low = &frame.bins[..frame.bins.len().min(32)];
        (low.iter().sum::<f32>() / low.len() as f32).min(1.0)
    };
    let level = (frame.level.max(spectral_weight)).clamp(0.0, 1.0);
    let filled = (level * width as f32).round() as usize;
    format!("{}{}", "#".repeat(filled), "-".repeat(width - filled.min(width)))
}

/// Print live meter frames until the channel closes. Runs at the capture
/// adapter's publish cadence, independent of the recording state machine.
pub fn spawn_meter_printer(mut rx: broadcast::Receiver<MeterFrame>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(frame) => {
                    eprint!("\r  [{}]", level_bar(&frame, 40));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
