//! Transport collaborator interface.
//!
//! The pub/sub layer (sockets, discovery, QoS) lives outside this crate; the
//! publisher only ever opens one channel, sends bytes through it, and closes
//! it again.

use thiserror::Error;

/// A transport operation failed.
///
/// Carries the collaborator's own report; the core adds no retry or masking.
#[derive(Debug, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub color_eyre::Report);

impl TransportError {
    pub fn msg(msg: impl std::fmt::Display) -> Self {
        Self(color_eyre::eyre::eyre!(msg.to_string()))
    }
}

/// Outbound pub/sub transport.
///
/// Implementations own connection state; `Channel` is whatever handle the
/// transport needs to route a send to one topic.
pub trait Transport: Send + Sync + 'static {
    type Channel: Send;

    fn open_channel(&self, topic: &str) -> Result<Self::Channel, TransportError>;

    fn close_channel(&self, channel: Self::Channel) -> Result<(), TransportError>;

    fn send(&self, channel: &mut Self::Channel, bytes: &[u8]) -> Result<(), TransportError>;
}
