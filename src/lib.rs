//! Capture → encode → stamp → publish pipeline.
//!
//! Frames come from an external [`capture::FrameSource`], get compressed by
//! the [`encode`] module, stamped, assembled into a [`message::Message`] and
//! handed to a [`publish::TopicPublisher`] bound to a single rebindable
//! topic. The camera and the pub/sub transport are collaborators supplied by
//! the embedding application; this crate owns only the pipeline between
//! them.

pub mod capture;
pub mod encode;
pub mod message;
pub mod pipeline;
pub mod publish;
pub mod stamp;

use serde::{Deserialize, Serialize};

pub use crate::capture::{Frame, FrameSource, FrameUnavailableError, PixelFormat};
pub use crate::encode::{EncodeError, EncodedPayload, ImageFormat};
pub use crate::message::Message;
pub use crate::pipeline::{CapturePipeline, CaptureScheduler};
pub use crate::publish::{PublishError, TopicPublisher, Transport, TransportError};
pub use crate::stamp::Timestamp;

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Target capture rate in frames per second (must be positive)
    pub frame_rate: u32,
    pub format: ImageFormat,
    /// Codec quality 0-100; see [`ImageFormat`] for per-codec semantics
    pub quality: u8,
    /// Downscale factor, >= 1.0; 2.0 halves both dimensions before encoding
    pub scale: f32,
    /// Identifier stamped into every outbound message
    pub frame_id: String,
    pub topic: String,
    /// Optional prefix; the effective topic becomes `namespace/topic`
    pub namespace: Option<String>,
    /// Backdate applied to every stamp, in milliseconds
    pub stamp_delta_ms: u64,
    /// Delay before the scheduler's first tick
    pub warmup_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_rate: 24,
            format: ImageFormat::Jpeg,
            quality: 30,
            scale: 1.0,
            frame_id: "camera".into(),
            topic: "compressed".into(),
            namespace: None,
            stamp_delta_ms: 0,
            warmup_delay_ms: 100,
        }
    }
}
