use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::domain::{AudioConfig, DomainError, MeterFrame};
use crate::ports::AudioCapture;

/// Number of samples per cosmetic spectrum frame.
const FFT_SIZE: usize = 512;

/// Commands sent to the audio thread.
enum AudioCommand {
    Start {
        chunk_tx: mpsc::Sender<Vec<i16>>,
        reply: oneshot::Sender<Result<(), DomainError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Audio processing utilities.
mod audio_processing {
    use super::*;

    pub fn get_device(selected_device: Option<&str>) -> Result<Device, DomainError> {
        let host = cpal::default_host();

        if let Some(wanted) = selected_device {
            let devices = host.input_devices().map_err(map_host_error)?;
            for device in devices {
                if let Ok(name) = device.name() {
                    if name == wanted {
                        return Ok(device);
                    }
                }
            }
            warn!(device = %wanted, "Configured device not found, falling back to default");
        }

        host.default_input_device().ok_or_else(|| {
            DomainError::DeviceNotFound("no microphone input device available".to_string())
        })
    }

    pub fn build_stream_config(device: &Device) -> Result<StreamConfig, DomainError> {
        let supported = device.default_input_config().map_err(|e| {
            map_acquisition_message(format!("failed to get default config: {e}"))
        })?;

        debug!(
            sample_rate = ?supported.sample_rate(),
            channels = supported.channels(),
            format = ?supported.sample_format(),
            "Device default config"
        );

        Ok(StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        })
    }

    /// Map a cpal host/enumeration error onto the acquisition taxonomy.
    pub fn map_host_error(err: cpal::DevicesError) -> DomainError {
        map_acquisition_message(format!("failed to enumerate devices: {err}"))
    }

    /// Permission refusals hide inside backend-specific messages on most
    /// hosts, so classify by message content before falling back.
    pub fn map_acquisition_message(message: String) -> DomainError {
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("permission") || lowered.contains("denied") {
            DomainError::PermissionDenied(message)
        } else if lowered.contains("no such device") || lowered.contains("not available") {
            DomainError::DeviceNotFound(message)
        } else {
            DomainError::AcquisitionFailed(message)
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn build_stream(
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        target_sample_rate: u32,
        chunk_tx: mpsc::Sender<Vec<i16>>,
        meter_tx: broadcast::Sender<MeterFrame>,
        fft: Arc<dyn Fft<f32>>,
        window: Vec<f32>,
    ) -> Result<Stream, DomainError> {
        let channels = config.channels as usize;
        let device_sample_rate = config.sample_rate.0;

        // Meter cadence is ~10 Hz of resampled audio, independent of the
        // chunk flow feeding the recorder.
        let samples_per_frame = (target_sample_rate / 10) as usize;
        let mut meter_samples: Vec<i16> = Vec::with_capacity(samples_per_frame);

        let err_fn = |err| {
            error!(?err, "Audio stream error");
        };

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    process_samples(
                        data,
                        channels,
                        device_sample_rate,
                        target_sample_rate,
                        &chunk_tx,
                        &meter_tx,
                        &mut meter_samples,
                        samples_per_frame,
                        &fft,
                        &window,
                    );
                },
                err_fn,
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let i16_data: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                        .collect();
                    process_samples(
                        &i16_data,
                        channels,
                        device_sample_rate,
                        target_sample_rate,
                        &chunk_tx,
                        &meter_tx,
                        &mut meter_samples,
                        samples_per_frame,
                        &fft,
                        &window,
                    );
                },
                err_fn,
                None,
            ),
            _ => {
                return Err(DomainError::AcquisitionFailed(format!(
                    "unsupported sample format: {sample_format:?}"
                )));
            }
        }
        .map_err(|e| map_acquisition_message(format!("failed to build stream: {e}")))?;

        Ok(stream)
    }

    #[allow(clippy::too_many_arguments)]
    fn process_samples(
        data: &[i16],
        channels: usize,
        device_sample_rate: u32,
        target_sample_rate: u32,
        chunk_tx: &mpsc::Sender<Vec<i16>>,
        meter_tx: &broadcast::Sender<MeterFrame>,
        meter_samples: &mut Vec<i16>,
        samples_per_frame: usize,
        fft: &Arc<dyn Fft<f32>>,
        window: &[f32],
    ) {
        // Convert stereo to mono
        let mono_samples: Vec<i16> = if channels > 1 {
            data.chunks(channels)
                .map(|chunk| {
                    let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                    (sum / channels as i32) as i16
                })
                .collect()
        } else {
            data.to_vec()
        };

        // Resample if needed
        let resampled = if device_sample_rate != target_sample_rate {
            resample(&mono_samples, device_sample_rate, target_sample_rate)
        } else {
            mono_samples
        };

        meter_samples.extend_from_slice(&resampled);

        // Lossless chunk flow to the recording supervisor.
        if chunk_tx.try_send(resampled).is_err() {
            warn!("Recorder chunk channel full, dropping audio chunk");
        }

        // Cosmetic meter frame at its own cadence; receivers may lag or
        // be absent, both are fine.
        if meter_samples.len() >= samples_per_frame {
            let frame = MeterFrame {
                level: calculate_rms(meter_samples),
                bins: spectrum_bins(meter_samples, fft, window),
            };
            let _ = meter_tx.send(frame);
            meter_samples.clear();
        }
    }

    pub fn calculate_rms(samples: &[i16]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
        let rms = (sum_squares / samples.len() as f64).sqrt();
        (rms / 32767.0).min(1.0) as f32
    }

    pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
        if from_rate == to_rate || samples.is_empty() {
            return samples.to_vec();
        }

        let ratio = from_rate as f64 / to_rate as f64;
        let output_len = (samples.len() as f64 / ratio).ceil() as usize;
        let mut output = Vec::with_capacity(output_len);

        for i in 0..output_len {
            let src_pos = i as f64 * ratio;
            let src_idx = src_pos.floor() as usize;
            let frac = src_pos.fract();

            let sample = if src_idx + 1 < samples.len() {
                let s0 = samples[src_idx] as f64;
                let s1 = samples[src_idx + 1] as f64;
                (s0 + (s1 - s0) * frac) as i16
            } else if src_idx < samples.len() {
                samples[src_idx]
            } else {
                0
            };
            output.push(sample);
        }
        output
    }

    /// Hann window for the spectrum frames.
    pub fn hann_window(size: usize) -> Vec<f32> {
        (0..size)
            .map(|i| {
                let phase = (i as f32) / (size as f32 - 1.0);
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * phase).cos())
            })
            .collect()
    }

    /// Magnitudes of the positive-frequency bins over the window tail.
    pub fn spectrum_bins(samples: &[i16], fft: &Arc<dyn Fft<f32>>, window: &[f32]) -> Vec<f32> {
        let size = window.len();
        let tail = if samples.len() >= size {
            &samples[samples.len() - size..]
        } else {
            samples
        };

        let mut buffer: Vec<Complex<f32>> = (0..size)
            .map(|i| {
                let sample = tail.get(i).copied().unwrap_or(0) as f32 / 32768.0;
                Complex::new(sample * window[i], 0.0)
            })
            .collect();

        fft.process(&mut buffer);

        buffer
            .iter()
            .take(size / 2)
            .map(|c| c.norm() / size as f32)
            .collect()
    }
}

/// Audio thread runner - creates the Stream on the audio thread because the
/// cpal stream type is not Send.
fn audio_thread_main(
    config: AudioConfig,
    meter_tx: broadcast::Sender<MeterFrame>,
    active: Arc<AtomicBool>,
    mut cmd_rx: mpsc::Receiver<AudioCommand>,
) {
    let mut stream: Option<Stream> = None;

    let mut planner = FftPlanner::new();
    let fft: Arc<dyn Fft<f32>> = planner.plan_fft_forward(FFT_SIZE);
    let window = audio_processing::hann_window(FFT_SIZE);

    while let Some(cmd) = cmd_rx.blocking_recv() {
        match cmd {
            AudioCommand::Start { chunk_tx, reply } => {
                let result = (|| -> Result<(), DomainError> {
                    if stream.is_some() {
                        return Err(DomainError::AlreadyRecording);
                    }

                    let device = audio_processing::get_device(config.device.as_deref())?;
                    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
                    let stream_config = audio_processing::build_stream_config(&device)?;

                    let sample_format = device
                        .default_input_config()
                        .map_err(|e| {
                            audio_processing::map_acquisition_message(format!(
                                "failed to get config: {e}"
                            ))
                        })?
                        .sample_format();

                    let new_stream = audio_processing::build_stream(
                        &device,
                        &stream_config,
                        sample_format,
                        config.sample_rate,
                        chunk_tx,
                        meter_tx.clone(),
                        Arc::clone(&fft),
                        window.clone(),
                    )?;

                    new_stream.play().map_err(|e| {
                        audio_processing::map_acquisition_message(format!(
                            "failed to start stream: {e}"
                        ))
                    })?;

                    stream = Some(new_stream);
                    active.store(true, Ordering::Release);
                    info!(device = %device_name, "Microphone stream opened");
                    Ok(())
                })();
                let _ = reply.send(result);
            }
            AudioCommand::Stop { reply } => {
                if stream.take().is_some() {
                    info!("Microphone stream released");
                }
                active.store(false, Ordering::Release);
                let _ = reply.send(());
            }
            AudioCommand::Shutdown => {
                break;
            }
        }
    }
    debug!("Audio thread shutting down");
}

/// cpal-based microphone capture.
///
/// A dedicated audio thread owns the stream; chunks flow to the recording
/// supervisor over a bounded channel and meter frames over a broadcast.
pub struct CpalRecorder {
    config: AudioConfig,
    active: Arc<AtomicBool>,
    meter_tx: broadcast::Sender<MeterFrame>,
    cmd_tx: mpsc::Sender<AudioCommand>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl CpalRecorder {
    pub fn new(config: AudioConfig) -> Result<Self, DomainError> {
        let active = Arc::new(AtomicBool::new(false));
        let (meter_tx, _) = broadcast::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);

        let thread_config = config.clone();
        let thread_meter = meter_tx.clone();
        let thread_active = Arc::clone(&active);

        let thread_handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || audio_thread_main(thread_config, thread_meter, thread_active, cmd_rx))
            .map_err(|e| DomainError::Audio(format!("failed to spawn audio thread: {e}")))?;

        info!(
            sample_rate = config.sample_rate,
            max_clip_secs = config.max_clip_secs,
            "CpalRecorder initialized"
        );

        Ok(Self {
            config,
            active,
            meter_tx,
            cmd_tx,
            thread_handle: Mutex::new(Some(thread_handle)),
        })
    }
}

impl Drop for CpalRecorder {
    fn drop(&mut self) {
        // try_send: Drop may run on a runtime thread where blocking is not
        // allowed; the command channel is never near capacity.
        let _ = self.cmd_tx.try_send(AudioCommand::Shutdown);
        if let Some(handle) = self.thread_handle.lock().take() {
            let _ = handle.join();
        }
    }
}

#[async_trait]
impl AudioCapture for CpalRecorder {
    async fn start(&self) -> Result<mpsc::Receiver<Vec<i16>>, DomainError> {
        // A clip is capped at max_clip_secs, so the channel never needs to
        // buffer more than one clip's worth of ~100ms callbacks.
        let (chunk_tx, chunk_rx) = mpsc::channel(1024);
        let (reply_tx, reply_rx) = oneshot::channel();

        self.cmd_tx
            .send(AudioCommand::Start {
                chunk_tx,
                reply: reply_tx,
            })
            .await
            .map_err(|_| DomainError::Audio("audio thread not running".to_string()))?;

        reply_rx
            .await
            .map_err(|_| DomainError::Audio("audio thread did not respond".to_string()))??;

        Ok(chunk_rx)
    }

    async fn stop(&self) -> Result<(), DomainError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.cmd_tx
            .send(AudioCommand::Stop { reply: reply_tx })
            .await
            .map_err(|_| DomainError::Audio("audio thread not running".to_string()))?;

        reply_rx
            .await
            .map_err(|_| DomainError::Audio("audio thread did not respond".to_string()))?;

        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn subscribe_meter(&self) -> broadcast::Receiver<MeterFrame> {
        self.meter_tx.subscribe()
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_rms() {
        assert_eq!(audio_processing::calculate_rms(&[]), 0.0);
        assert_eq!(audio_processing::calculate_rms(&[0, 0, 0]), 0.0);

        let max_rms = audio_processing::calculate_rms(&[32767, 32767, 32767]);
        assert!((max_rms - 1.0).abs() < 0.001);

        let half_rms = audio_processing::calculate_rms(&[16384, -16384, 16384, -16384]);
        assert!(half_rms > 0.4 && half_rms < 0.6);
    }

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![100, 200, 300, 400];
        let result = audio_processing::resample(&samples, 48000, 48000);
        assert_eq!(result, samples);
    }

    #[test]
    fn test_resample_downsample() {
        let samples: Vec<i16> = (0..48).map(|i| i * 100).collect();
        let result = audio_processing::resample(&samples, 48000, 16000);
        assert!(result.len() >= 15 && result.len() <= 17);
    }

    #[test]
    fn test_resample_upsample() {
        let samples = vec![0, 1000, 2000, 3000];
        let result = audio_processing::resample(&samples, 8000, 16000);
        assert!(result.len() >= 7 && result.len() <= 9);
    }

    #[test]
    fn test_hann_window_shape() {
        let window = audio_processing::hann_window(FFT_SIZE);
        assert_eq!(window.len(), FFT_SIZE);
        assert!(window[0].abs() < 1e-6);
        assert!((window[FFT_SIZE / 2] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_spectrum_bins_half_size_and_short_input() {
        let mut planner = FftPlanner::new();
        let fft: Arc<dyn Fft<f32>> = planner.plan_fft_forward(FFT_SIZE);
        let window = audio_processing::hann_window(FFT_SIZE);

        let bins = audio_processing::spectrum_bins(&vec![1000i16; FFT_SIZE * 2], &fft, &window);
        assert_eq!(bins.len(), FFT_SIZE / 2);

        // Shorter-than-window input is zero-padded, not an error.
        let bins = audio_processing::spectrum_bins(&[500i16; 32], &fft, &window);
        assert_eq!(bins.len(), FFT_SIZE / 2);
    }

    #[test]
    fn test_acquisition_message_classification() {
        assert!(matches!(
            audio_processing::map_acquisition_message("Permission denied by host".to_string()),
            DomainError::PermissionDenied(_)
        ));
        assert!(matches!(
            audio_processing::map_acquisition_message("ALSA: no such device".to_string()),
            DomainError::DeviceNotFound(_)
        ));
        assert!(matches!(
            audio_processing::map_acquisition_message("stream config rejected".to_string()),
            DomainError::AcquisitionFailed(_)
        ));
    }
}
