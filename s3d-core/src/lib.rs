//! S3D Core Library
//!
//! This library provides the data structures shared by the stereoscopic input
//! layer: video frame and audio blob values, stereo layouts, the media object
//! interface, and the bookkeeping used to combine several media objects.

pub mod config;
pub mod frame;
pub mod media;
pub mod stereo;
pub mod streams;
pub mod tags;
pub mod timeline;

pub use config::InputConfig;
pub use frame::{
    AudioBlob, ChromaLocation, ColorSpace, PixelFormat, Plane, SampleFormat, ValueRange, VideoFrame,
};
pub use media::MediaObject;
pub use stereo::StereoLayout;
pub use streams::StreamIndexMap;
pub use tags::TagList;
pub use timeline::{reconcile, ObjectTimeline};

/// Result type for s3d-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors a media object can report
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot open {url}: {reason}")]
    Open { url: String, reason: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Seek error: {0}")]
    Seek(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}
