//! Capture-and-publish pipeline.
//!
//! One [`CapturePipeline`] wires a frame source and a transport together and
//! exposes the runtime knobs (arm/disarm, format, quality, scale, topic).
//! The periodic driver lives in [`scheduler`].

pub mod scheduler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use tokio::sync::Mutex;
use tracing::{trace, warn};

use crate::capture::FrameSource;
use crate::encode::{encode, EncodeError, ImageFormat};
use crate::message::Message;
use crate::publish::{effective_topic, PublishError, TopicPublisher, Transport};
use crate::stamp::Timestamp;
use crate::PipelineConfig;

pub use scheduler::CaptureScheduler;

/// Per-cycle parameters, swapped atomically on updates
#[derive(Debug, Clone)]
struct CycleSettings {
    format: ImageFormat,
    quality: u8,
    scale: f32,
    frame_id: String,
    stamp_delta_ms: u64,
}

impl CycleSettings {
    fn from_config(config: &PipelineConfig) -> Self {
        Self {
            format: config.format,
            quality: config.quality,
            scale: config.scale,
            frame_id: config.frame_id.clone(),
            stamp_delta_ms: config.stamp_delta_ms,
        }
    }
}

/// Frame source + encoder + publisher behind one runtime-tunable front.
///
/// All setters take `&self`; the pipeline is meant to be shared as an
/// `Arc` between the scheduler task and whoever owns the controls.
pub struct CapturePipeline<S, T: Transport> {
    source: Mutex<S>,
    publisher: TopicPublisher<T>,
    settings: ArcSwap<CycleSettings>,
    armed: AtomicBool,
    namespace: Option<String>,
}

impl<S: FrameSource, T: Transport> CapturePipeline<S, T> {
    /// Build the pipeline and bind the publisher to the configured topic.
    ///
    /// Starts disarmed; ticks do nothing until [`arm`](Self::arm) is called.
    pub fn new(source: S, transport: T, config: &PipelineConfig) -> Result<Arc<Self>> {
        if !config.scale.is_finite() || config.scale < 1.0 {
            return Err(eyre!("configured scale {} is below 1.0", config.scale));
        }
        if config.frame_rate == 0 {
            return Err(eyre!("frame_rate must be positive"));
        }

        let publisher = TopicPublisher::new(transport);
        publisher.bind(&effective_topic(
            config.namespace.as_deref(),
            &config.topic,
        ))?;

        Ok(Arc::new(Self {
            source: Mutex::new(source),
            publisher,
            settings: ArcSwap::from_pointee(CycleSettings::from_config(config)),
            armed: AtomicBool::new(false),
            namespace: config.namespace.clone(),
        }))
    }

    /// Run one capture→encode→stamp→publish cycle.
    ///
    /// Every failure here is non-fatal: the cycle is skipped with a warning
    /// and the caller's schedule keeps running. Disarmed cycles return
    /// immediately.
    pub async fn run_cycle(&self) {
        if !self.armed.load(Ordering::SeqCst) {
            return;
        }

        let frame = {
            let mut source = self.source.lock().await;
            match source.next_frame().await {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("skipping cycle: {e}");
                    return;
                }
            }
        };

        let settings = self.settings.load();
        let sequence = frame.sequence;
        let payload = match encode(frame, settings.format, settings.quality, settings.scale) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(sequence, "skipping cycle, encode failed: {e}");
                return;
            }
        };

        let stamp = Timestamp::now(settings.stamp_delta_ms);
        let message = Message::build(&settings.frame_id, stamp, &payload);

        match self.publisher.publish(&message) {
            Ok(()) => {
                trace!(sequence, stamp = %stamp, bytes = message.data.len(), "published");
            }
            Err(e) => warn!(sequence, "publish failed: {e}"),
        }
    }

    /// Let scheduler ticks do capture+publish work.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Ticks keep firing but become cheap no-ops.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn set_format(&self, format: ImageFormat) {
        self.update(|s| s.format = format);
    }

    pub fn set_quality(&self, quality: u8) {
        self.update(|s| s.quality = quality.min(100));
    }

    /// Update the downscale factor; values below 1.0 are rejected up front
    /// so the encoder never sees them.
    pub fn set_scale(&self, scale: f32) -> Result<(), EncodeError> {
        if !scale.is_finite() || scale < 1.0 {
            return Err(EncodeError::InvalidScale(scale));
        }
        self.update(|s| s.scale = scale);
        Ok(())
    }

    pub fn set_frame_id(&self, frame_id: &str) {
        let frame_id = frame_id.to_owned();
        self.update(move |s| s.frame_id = frame_id.clone());
    }

    pub fn set_stamp_delta(&self, delta_ms: u64) {
        self.update(|s| s.stamp_delta_ms = delta_ms);
    }

    /// Rebind the publisher to a new topic under the configured namespace.
    pub fn set_topic(&self, topic: &str) -> Result<(), PublishError> {
        self.publisher
            .rebind(&effective_topic(self.namespace.as_deref(), topic))
    }

    pub fn publisher(&self) -> &TopicPublisher<T> {
        &self.publisher
    }

    fn update(&self, f: impl Fn(&mut CycleSettings)) {
        self.settings.rcu(|current| {
            let mut next = (**current).clone();
            f(&mut next);
            next
        });
    }
}
