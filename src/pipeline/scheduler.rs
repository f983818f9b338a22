//! Periodic driver for the capture pipeline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::capture::FrameSource;
use crate::pipeline::CapturePipeline;
use crate::publish::Transport;
use crate::PipelineConfig;

/// Fixed-cadence timer that runs one pipeline cycle per tick.
///
/// The tick period is `1000 / frame_rate` milliseconds with integer
/// truncation, so 24 fps runs at 41 ms, not 41.67. Ticks fire whether or
/// not the pipeline is armed; a disarmed tick is a no-op, which keeps the
/// cadence drift-bounded instead of restarting the timer on every toggle.
pub struct CaptureScheduler {
    period: Duration,
    warmup: Duration,
    handle: Option<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
}

impl CaptureScheduler {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            period: Self::period_from_rate(config.frame_rate),
            warmup: Duration::from_millis(config.warmup_delay_ms),
            handle: None,
            shutdown: None,
        }
    }

    /// Tick period for a frame rate, truncating to whole milliseconds.
    ///
    /// Rates above 1000 fps clamp to a 1 ms period rather than a zero-length
    /// interval.
    pub fn period_from_rate(frame_rate: u32) -> Duration {
        Duration::from_millis((1000 / u64::from(frame_rate.max(1))).max(1))
    }

    /// Spawn the timer task. Starting a running scheduler is a no-op.
    ///
    /// The first tick fires after the warmup delay; later ticks follow at
    /// the fixed period, skipping (not bursting) any that were missed.
    pub fn start<S, T>(&mut self, pipeline: Arc<CapturePipeline<S, T>>)
    where
        S: FrameSource,
        T: Transport,
    {
        if self.handle.is_some() {
            return;
        }

        let (tx, mut rx) = watch::channel(false);
        let period = self.period;
        let warmup = self.warmup;

        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + warmup, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(period_ms = period.as_millis() as u64, "scheduler started");
            loop {
                tokio::select! {
                    biased;
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                    _ = ticks.tick() => {
                        // Cycle runs to completion before the next tick is
                        // polled and before a stop request is honored.
                        pipeline.run_cycle().await;
                    }
                }
            }
            debug!("scheduler stopped");
        });

        self.handle = Some(handle);
        self.shutdown = Some(tx);
    }

    /// Ask the timer task to exit. Stopping a stopped scheduler is a no-op.
    ///
    /// No new cycle starts after this returns; a cycle already in flight
    /// finishes naturally.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        self.handle.take();
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for CaptureScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
