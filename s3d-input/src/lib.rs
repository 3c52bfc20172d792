//! S3D Input Library
//!
//! This library combines one or more media objects (for example separate left
//! and right eye files, or one file holding both views) into a single seekable
//! stereoscopic video and audio input with asynchronous reads.

pub mod media_input;
mod reader;
pub mod views;

pub use media_input::MediaInput;
pub use s3d_core::{AudioBlob, InputConfig, MediaObject, StereoLayout, VideoFrame};

/// Result type for s3d-input operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for s3d-input operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("S3D core error: {0}")]
    Core(#[from] s3d_core::Error),

    #[error("No URLs given")]
    NoUrls,

    #[error("No video or audio streams found in {0}")]
    NoStreams(String),

    #[error("Input has no video stream")]
    NoVideo,

    #[error("Stereo layout {0} is not supported by this input")]
    UnsupportedStereoLayout(StereoLayout),

    #[error("Cannot start read worker: {0}")]
    WorkerSpawn(std::io::Error),

    #[error("Read worker {0} terminated unexpectedly")]
    WorkerLost(&'static str),
}
