use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::FieldConsole;
use crate::domain::{AnalysisReport, DomainError};

/// Unattended capture loop.
///
/// One cycle runs immediately on start, then every `auto_interval_secs`
/// until stopped. Cycles are independent: a failing cycle is logged and
/// surfaced but never halts the loop. The same control toggles the loop,
/// starting while running is a no-op and stop is idempotent.
pub struct AutoCapture {
    console: Arc<FieldConsole>,
    period: Duration,
    task: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl AutoCapture {
    pub fn new(console: Arc<FieldConsole>) -> Self {
        let period = Duration::from_secs(console.config().capture.auto_interval_secs.max(1));
        Self {
            console,
            period,
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Start the loop. No-op when already running; fails fast with
    /// `NoActiveStream` (and schedules nothing) without a camera session.
    pub fn start(&self) -> Result<(), DomainError> {
        let mut guard = self.task.lock();
        if guard.is_some() {
            debug!("Auto-capture already running");
            return Ok(());
        }
        if !self.console.camera_active() {
            return Err(DomainError::NoActiveStream);
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let console = Arc::clone(&self.console);
        let period = self.period;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_cycle(&console).await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Auto-capture loop stopped");
        });

        *guard = Some((stop_tx, handle));
        info!(period_secs = self.period.as_secs(), "Auto-capture started");
        Ok(())
    }

    /// Stop the loop and wait for the in-flight cycle to finish.
    /// Idempotent: stopping an idle loop does nothing.
    pub async fn stop(&self) {
        let taken = self.task.lock().take();
        if let Some((stop_tx, handle)) = taken {
            let _ = stop_tx.send(true);
            let _ = handle.await;
            info!("Auto-capture stopped");
        }
    }

    /// Toggle semantics for the single start/stop control.
    /// Returns whether the loop is running afterwards.
    pub async fn toggle(&self) -> Result<bool, DomainError> {
        if self.is_running() {
            self.stop().await;
            Ok(false)
        } else {
            self.start()?;
            Ok(true)
        }
    }
}

/// One independent cycle; failure is reported as transient and swallowed.
async fn run_cycle(console: &FieldConsole) {
    match console.auto_capture_cycle().await {
        Ok(AnalysisReport::Failure { message }) => {
            warn!(%message, "Auto-capture cycle reported a failure, loop continues");
        }
        Ok(AnalysisReport::Success {
            threat_detected, ..
        }) => {
            debug!(threat_detected, "Auto-capture cycle complete");
        }
        Err(err) => {
            warn!(error = %err, "Auto-capture cycle failed, loop continues");
        }
    }
}
