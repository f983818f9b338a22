use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Raw frame with zero-copy semantics
#[derive(Clone)]
pub struct Frame {
    /// Immutable pixel data - can be handed across threads without copying
    pub data: Bytes,

    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,

    /// Monotonic per-source frame counter
    pub sequence: u64,
}

impl Frame {
    pub fn new(data: Bytes, width: u32, height: u32, format: PixelFormat, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            format,
            sequence,
        }
    }

    /// Expected buffer length for the declared geometry.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("sequence", &self.sequence)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Pixel formats we accept from frame sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Rgba32,
    Yuyv,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
            PixelFormat::Rgba32 => 4,
            PixelFormat::Yuyv => 2,
        }
    }
}
