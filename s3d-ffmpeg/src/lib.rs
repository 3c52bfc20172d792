//! S3D FFmpeg Library
//!
//! This library provides media objects backed by FFmpeg: demuxing, decoding
//! and conversion of video and audio streams into the values consumed by the
//! stereoscopic input layer.

pub mod media_object;
pub mod samples;

pub use media_object::FfmpegMediaObject;

/// Result type for s3d-ffmpeg operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for s3d-ffmpeg operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("S3D core error: {0}")]
    Core(#[from] s3d_core::Error),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    #[error("Cannot open {url}: {source}")]
    Open {
        url: String,
        source: ffmpeg_next::Error,
    },

    #[error("Seek to {pos} failed: {source}")]
    Seek { pos: i64, source: ffmpeg_next::Error },

    #[error("Unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("Decoded data does not match the stream format: {0}")]
    FormatChanged(String),
}

impl From<Error> for s3d_core::Error {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::Core(e) => e,
            Error::Open { url, source } => s3d_core::Error::Open {
                url,
                reason: source.to_string(),
            },
            Error::Seek { .. } => s3d_core::Error::Seek(message),
            Error::UnsupportedPixelFormat(_) | Error::UnsupportedSampleFormat(_) => {
                s3d_core::Error::UnsupportedFormat(message)
            }
            Error::Ffmpeg(_) | Error::FormatChanged(_) => s3d_core::Error::Decode(message),
        }
    }
}

/// Decoder configuration
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Number of decoding threads per video stream
    pub threads: usize,
    /// Convert all video to BGRA instead of passing planar YUV through
    pub force_bgra: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            force_bgra: false,
        }
    }
}
