//! The media object interface consumed by the input layer

use crate::{AudioBlob, ObjectTimeline, Result, VideoFrame};

/// One opened source URL with its own demuxer and decoders.
///
/// A media object is exclusively owned by one input and is read by at most one
/// thread at a time. Reads block until data is available.
pub trait MediaObject: Send + 'static {
    /// Opens the given URL
    fn open(url: &str) -> Result<Self>
    where
        Self: Sized;

    /// URL this object was opened from
    fn url(&self) -> &str;

    /// Container level metadata, in the order the source reports it
    fn tags(&self) -> &[(String, String)];

    fn video_streams(&self) -> usize;

    fn audio_streams(&self) -> usize;

    /// Format of a video stream, including its default stereo layout
    fn video_frame_template(&self, stream: usize) -> &VideoFrame;

    /// Frame rate of a video stream as `(numerator, denominator)`
    fn video_frame_rate(&self, stream: usize) -> (i32, i32);

    /// Format of an audio stream
    fn audio_blob_template(&self, stream: usize) -> &AudioBlob;

    /// Initial skip and duration in microseconds
    fn timeline(&self) -> ObjectTimeline;

    /// Marks a video stream as (in)active, so inactive ones need not be decoded
    fn set_video_stream_active(&mut self, _stream: usize, _active: bool) {}

    fn set_audio_stream_active(&mut self, _stream: usize, _active: bool) {}

    /// Decodes the next frame of a video stream; `None` at end of stream
    fn read_video_frame(&mut self, stream: usize) -> Result<Option<VideoFrame>>;

    /// Decodes up to `samples` sample frames of an audio stream; `None` at end of stream
    fn read_audio_blob(&mut self, stream: usize, samples: usize) -> Result<Option<AudioBlob>>;

    /// Seeks every stream to the nearest reachable point at or before `pos` microseconds
    fn seek(&mut self, pos: i64) -> Result<()>;

    /// Releases decoder resources
    fn close(&mut self) {}
}
