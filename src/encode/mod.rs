//! Frame encoding: raw pixels in, compressed image payload out.
//!
//! Encoding is a pure function of the frame and the requested parameters.
//! JPEG and PNG go through the `image` crate; both WebP modes go through
//! `libwebp` via the `webp` crate, since `image` 0.25 only encodes lossless
//! WebP.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::frame::{Frame, PixelFormat};

/// Target codec for an encode pass.
///
/// The quality parameter is not uniform across codecs:
/// - `Jpeg`: quality 0-100 drives the quantization tables.
/// - `Png`: always lossless; quality is ignored.
/// - `WebpLossy`: quality 0-100 maps to libwebp's quality factor.
/// - `WebpLossless`: always lossless; libwebp is invoked in lossless mode
///   and the numeric quality is ignored outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebpLossy,
    WebpLossless,
}

impl ImageFormat {
    /// Short format tag carried in outbound messages.
    ///
    /// Both WebP modes share the `"webp"` tag; the lossy/lossless split is
    /// an encoder concern, not a wire concern.
    pub fn tag(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::WebpLossy | ImageFormat::WebpLossless => "webp",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageFormat::Jpeg => write!(f, "jpeg"),
            ImageFormat::Png => write!(f, "png"),
            ImageFormat::WebpLossy => write!(f, "webp-lossy"),
            ImageFormat::WebpLossless => write!(f, "webp-lossless"),
        }
    }
}

/// Compressed image plus the parameters that produced it
#[derive(Debug, Clone)]
pub struct EncodedPayload {
    pub data: Bytes,
    pub format: ImageFormat,
    pub quality: u8,
    pub scale: f32,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("scale factor {0} is invalid, must be >= 1.0")]
    InvalidScale(f32),

    #[error("pixel format {0:?} is not supported by the encoder")]
    UnsupportedPixelFormat(PixelFormat),

    #[error("frame buffer is {actual} bytes, expected {expected} for {width}x{height}")]
    BufferMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("image codec failed: {0}")]
    Codec(#[from] image::ImageError),

    #[error("webp codec failed: {0}")]
    WebP(String),

    #[error("codec produced an empty payload")]
    EmptyPayload,
}

/// Encode a frame into a compressed payload.
///
/// `scale == 1.0` encodes at native resolution; `scale > 1.0` first resizes
/// to `(width/scale, height/scale)` with a Lanczos3 filter. Scales below 1.0
/// (and non-finite values) fail before any codec work. Quality above 100 is
/// clamped. The frame is consumed and dropped when encoding finishes.
pub fn encode(
    frame: Frame,
    format: ImageFormat,
    quality: u8,
    scale: f32,
) -> Result<EncodedPayload, EncodeError> {
    if !scale.is_finite() || scale < 1.0 {
        return Err(EncodeError::InvalidScale(scale));
    }
    let quality = quality.min(100);

    let expected = frame.expected_len();
    if frame.width == 0 || frame.height == 0 || frame.data.len() != expected {
        return Err(EncodeError::BufferMismatch {
            width: frame.width,
            height: frame.height,
            expected,
            actual: frame.data.len(),
        });
    }

    let mut rgb = frame_to_rgb(&frame)?;
    drop(frame);

    if scale > 1.0 {
        // Truncating division, matching the configured geometry contract
        let new_w = ((rgb.width() as f32 / scale) as u32).max(1);
        let new_h = ((rgb.height() as f32 / scale) as u32).max(1);
        rgb = image::imageops::resize(&rgb, new_w, new_h, FilterType::Lanczos3);
    }

    let (w, h) = (rgb.width(), rgb.height());
    let data = match format {
        ImageFormat::Jpeg => {
            let mut out = Vec::new();
            JpegEncoder::new_with_quality(&mut out, quality).write_image(
                rgb.as_raw(),
                w,
                h,
                ExtendedColorType::Rgb8,
            )?;
            out
        }
        ImageFormat::Png => {
            // Lossless; the quality knob has no effect here
            let mut out = Vec::new();
            PngEncoder::new(&mut out).write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)?;
            out
        }
        ImageFormat::WebpLossy => webp::Encoder::from_rgb(rgb.as_raw(), w, h)
            .encode_simple(false, quality as f32)
            .map_err(|e| EncodeError::WebP(format!("{e:?}")))?
            .to_vec(),
        ImageFormat::WebpLossless => webp::Encoder::from_rgb(rgb.as_raw(), w, h)
            .encode_simple(true, 100.0)
            .map_err(|e| EncodeError::WebP(format!("{e:?}")))?
            .to_vec(),
    };

    if data.is_empty() {
        return Err(EncodeError::EmptyPayload);
    }

    Ok(EncodedPayload {
        data: Bytes::from(data),
        format,
        quality,
        scale,
    })
}

/// Normalize the frame into packed RGB8 for the codecs.
fn frame_to_rgb(frame: &Frame) -> Result<RgbImage, EncodeError> {
    let (w, h) = (frame.width, frame.height);
    let buf = match frame.format {
        PixelFormat::Rgb24 => frame.data.to_vec(),
        PixelFormat::Bgr24 => {
            let mut buf = frame.data.to_vec();
            for px in buf.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            buf
        }
        PixelFormat::Rgba32 => {
            let mut buf = Vec::with_capacity(w as usize * h as usize * 3);
            for px in frame.data.chunks_exact(4) {
                buf.extend_from_slice(&px[..3]);
            }
            buf
        }
        PixelFormat::Yuyv => {
            return Err(EncodeError::UnsupportedPixelFormat(frame.format));
        }
    };

    // Length was validated against the geometry above
    RgbImage::from_raw(w, h, buf).ok_or(EncodeError::BufferMismatch {
        width: w,
        height: h,
        expected: w as usize * h as usize * 3,
        actual: 0,
    })
}
