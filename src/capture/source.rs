//! Frame source collaborator interface.
//!
//! The camera (or any other producer of raw frames) lives outside this crate.
//! It only has to hand over one [`Frame`] per request; delivery may complete
//! on whatever execution context the source uses internally.

use std::future::Future;

use thiserror::Error;

use crate::capture::frame::Frame;

/// A single frame request failed or timed out.
///
/// The pipeline treats this as a skipped cycle, never as a fatal condition.
#[derive(Debug, Error)]
#[error("frame unavailable: {0}")]
pub struct FrameUnavailableError(pub color_eyre::Report);

impl FrameUnavailableError {
    pub fn msg(msg: impl std::fmt::Display) -> Self {
        Self(color_eyre::eyre::eyre!(msg.to_string()))
    }
}

/// Asynchronous producer of raw frames.
///
/// `next_frame` is requested once per scheduler tick while the pipeline is
/// armed. Implementations own their device handles and backpressure policy.
pub trait FrameSource: Send + 'static {
    fn next_frame(
        &mut self,
    ) -> impl Future<Output = Result<Frame, FrameUnavailableError>> + Send;
}
