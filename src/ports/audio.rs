use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::domain::{DomainError, MeterFrame};

/// Port for exclusive microphone capture.
///
/// Implementations own the platform stream and deliver mono PCM chunks at
/// the configured sample rate. Chunks travel over a lossless channel to the
/// single recording supervisor; meter frames travel over a lossy broadcast
/// for the cosmetic visualizer.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Acquire the input stream and start streaming chunks.
    ///
    /// Fails with the acquisition taxonomy (`PermissionDenied`,
    /// `DeviceNotFound`, `AcquisitionFailed`) or `AlreadyRecording`.
    async fn start(&self) -> Result<mpsc::Receiver<Vec<i16>>, DomainError>;

    /// Release the stream. Idempotent; stopping an idle capture is a no-op.
    async fn stop(&self) -> Result<(), DomainError>;

    /// Whether a stream is currently open.
    fn is_active(&self) -> bool;

    /// Subscribe to cosmetic level/spectrum frames.
    fn subscribe_meter(&self) -> broadcast::Receiver<MeterFrame>;

    /// Sample rate of delivered chunks in Hz.
    fn sample_rate(&self) -> u32;
}
