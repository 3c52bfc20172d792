//! Video frame and audio blob values
//!
//! The same types serve as templates (format information, no payload) and as
//! carriers of decoded data.

use crate::StereoLayout;

/// Memory layout of decoded video data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PixelFormat {
    /// Packed 8-bit BGRA
    #[default]
    Bgra32,
    /// Planar 8-bit YUV without chroma subsampling
    Yuv444p,
    /// Planar 8-bit YUV with horizontal chroma subsampling
    Yuv422p,
    /// Planar 8-bit YUV with horizontal and vertical chroma subsampling
    Yuv420p,
}

impl PixelFormat {
    /// Number of planes per view
    pub fn planes(&self) -> usize {
        match self {
            PixelFormat::Bgra32 => 1,
            _ => 3,
        }
    }

    /// Size in pixels of the given plane for a frame of `width` x `height`
    pub fn plane_size(&self, plane: usize, width: u32, height: u32) -> (u32, u32) {
        match (self, plane) {
            (PixelFormat::Yuv422p, 1 | 2) => (width.div_ceil(2), height),
            (PixelFormat::Yuv420p, 1 | 2) => (width.div_ceil(2), height.div_ceil(2)),
            _ => (width, height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ColorSpace {
    #[default]
    Srgb,
    Yuv601,
    Yuv709,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ValueRange {
    /// 0-255
    #[default]
    Full,
    /// 16-235 (luma) and 16-240 (chroma)
    Mpeg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ChromaLocation {
    #[default]
    Center,
    Left,
    TopLeft,
}

/// One plane of pixel data
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Plane {
    pub data: Vec<u8>,
    /// Bytes per row, including padding
    pub line_size: usize,
}

impl Plane {
    pub fn new(data: Vec<u8>, line_size: usize) -> Self {
        Self { data, line_size }
    }
}

/// A video frame, or a template describing the frames of a stream
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoFrame {
    /// Width of the decoded frame in pixels
    pub raw_width: u32,
    /// Height of the decoded frame in pixels
    pub raw_height: u32,
    /// Display aspect ratio of the decoded frame
    pub raw_aspect_ratio: f32,
    /// Width of one view, derived from the stereo layout
    pub width: u32,
    /// Height of one view, derived from the stereo layout
    pub height: u32,
    /// Display aspect ratio of one view
    pub aspect_ratio: f32,
    pub pixel_format: PixelFormat,
    pub color_space: ColorSpace,
    pub value_range: ValueRange,
    pub chroma_location: ChromaLocation,
    pub stereo_layout: StereoLayout,
    /// Whether left and right are exchanged
    pub stereo_layout_swap: bool,
    /// Planes of the first and (for separate streams) second view
    #[cfg_attr(feature = "serde", serde(skip))]
    pub data: [Vec<Plane>; 2],
    /// Presentation time in microseconds
    pub presentation_time: i64,
}

impl VideoFrame {
    /// Creates a payload-less mono template
    pub fn template(raw_width: u32, raw_height: u32, raw_aspect_ratio: f32, pixel_format: PixelFormat) -> Self {
        let mut frame = Self {
            raw_width,
            raw_height,
            raw_aspect_ratio,
            pixel_format,
            ..Self::default()
        };
        frame.set_view_dimensions();
        frame
    }

    /// Recomputes the per-view size from the raw size and the stereo layout
    pub fn set_view_dimensions(&mut self) {
        let (width, height, aspect_ratio) =
            self.stereo_layout
                .view_geometry(self.raw_width, self.raw_height, self.raw_aspect_ratio);
        self.width = width;
        self.height = height;
        self.aspect_ratio = aspect_ratio;
    }

    /// A frame is valid when it has a size and carries data for its first view
    pub fn is_valid(&self) -> bool {
        self.raw_width > 0 && self.raw_height > 0 && !self.data[0].is_empty()
    }

    /// Returns a copy of this frame without payload
    pub fn to_template(&self) -> Self {
        Self {
            data: Default::default(),
            ..self.clone()
        }
    }

    /// Planes holding the given view (0 = left, 1 = right), honouring the swap flag.
    ///
    /// For single-stream layouts both views live in the same planes.
    pub fn view_planes(&self, view: usize) -> &[Plane] {
        let view = if self.stereo_layout_swap { 1 - view.min(1) } else { view.min(1) };
        if !self.stereo_layout.is_single_stream() {
            &self.data[view]
        } else {
            &self.data[0]
        }
    }
}

/// Sample representation of audio data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SampleFormat {
    U8,
    #[default]
    S16,
    F32,
    D64,
}

impl SampleFormat {
    /// Size of one sample of one channel in bytes
    pub fn bytes(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::F32 => 4,
            SampleFormat::D64 => 8,
        }
    }
}

/// A chunk of interleaved audio, or a template describing an audio stream
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AudioBlob {
    /// Language tag of the stream, empty if unknown
    pub language: String,
    pub channels: u16,
    /// Samples per second
    pub rate: u32,
    pub sample_format: SampleFormat,
    /// Interleaved sample data
    #[cfg_attr(feature = "serde", serde(skip))]
    pub data: Vec<u8>,
    /// Presentation time in microseconds
    pub presentation_time: i64,
}

impl AudioBlob {
    /// Creates a payload-less template
    pub fn template(channels: u16, rate: u32, sample_format: SampleFormat) -> Self {
        Self {
            channels,
            rate,
            sample_format,
            ..Self::default()
        }
    }

    /// Size of one sample frame (one sample for every channel) in bytes
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * self.sample_format.bytes()
    }

    /// Number of sample frames in the payload
    pub fn samples(&self) -> usize {
        match self.frame_bytes() {
            0 => 0,
            frame_bytes => self.data.len() / frame_bytes,
        }
    }

    /// Duration of the payload in microseconds
    pub fn duration(&self) -> i64 {
        if self.rate == 0 {
            return 0;
        }
        self.samples() as i64 * 1_000_000 / self.rate as i64
    }

    pub fn is_valid(&self) -> bool {
        self.channels > 0 && self.rate > 0 && !self.data.is_empty()
    }

    /// Returns a copy of this blob without payload
    pub fn to_template(&self) -> Self {
        Self {
            data: Vec::new(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_has_mono_view_geometry() {
        let frame = VideoFrame::template(1920, 1080, 16.0 / 9.0, PixelFormat::Yuv420p);
        assert_eq!(frame.width, 1920);
        assert_eq!(frame.height, 1080);
        assert_eq!(frame.stereo_layout, StereoLayout::Mono);
        assert!(!frame.is_valid());
    }

    #[test]
    fn test_set_view_dimensions() {
        let mut frame = VideoFrame::template(3840, 1080, 32.0 / 9.0, PixelFormat::Bgra32);
        frame.stereo_layout = StereoLayout::SideBySide;
        frame.set_view_dimensions();
        assert_eq!((frame.width, frame.height), (1920, 1080));

        frame.stereo_layout = StereoLayout::Mono;
        frame.set_view_dimensions();
        assert_eq!((frame.width, frame.height), (3840, 1080));
    }

    #[test]
    fn test_view_planes_honour_swap() {
        let mut frame = VideoFrame::template(2, 2, 1.0, PixelFormat::Bgra32);
        frame.stereo_layout = StereoLayout::SeparateStreams;
        frame.data = [vec![Plane::new(vec![1; 16], 8)], vec![Plane::new(vec![2; 16], 8)]];
        assert_eq!(frame.view_planes(0)[0].data[0], 1);
        frame.stereo_layout_swap = true;
        assert_eq!(frame.view_planes(0)[0].data[0], 2);
        assert_eq!(frame.view_planes(1)[0].data[0], 1);
        assert!(frame.is_valid());
        assert!(!frame.to_template().is_valid());
    }

    #[test]
    fn test_plane_sizes() {
        assert_eq!(PixelFormat::Yuv420p.plane_size(0, 1921, 1081), (1921, 1081));
        assert_eq!(PixelFormat::Yuv420p.plane_size(1, 1921, 1081), (961, 541));
        assert_eq!(PixelFormat::Yuv422p.plane_size(2, 1920, 1080), (960, 1080));
        assert_eq!(PixelFormat::Bgra32.planes(), 1);
    }

    #[test]
    fn test_audio_blob_sizes() {
        let mut blob = AudioBlob::template(2, 48000, SampleFormat::S16);
        assert_eq!(blob.frame_bytes(), 4);
        blob.data = vec![0; 4 * 4800];
        assert_eq!(blob.samples(), 4800);
        assert_eq!(blob.duration(), 100_000);
        assert!(blob.is_valid());
        assert!(!blob.to_template().is_valid());
    }
}
