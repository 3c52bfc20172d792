//! Media objects decoded with FFmpeg

use crate::samples::{interleave, s32_to_f32};
use crate::{DecoderConfig, Error, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg::codec::threading;
use ffmpeg::format::{stream::Disposition, Pixel, Sample};
use ffmpeg::software::scaling;
use ffmpeg::{chroma, color, decoder, frame, media, Packet, Rational, Rescale};
use s3d_core::{
    AudioBlob, ChromaLocation, ColorSpace, MediaObject, ObjectTimeline, PixelFormat, Plane,
    SampleFormat, StereoLayout, ValueRange, VideoFrame,
};
use std::collections::VecDeque;
use std::sync::OnceLock;
use tracing::{debug, warn};

static FFMPEG_INIT: OnceLock<std::result::Result<(), ffmpeg::Error>> = OnceLock::new();

/// Initialize FFmpeg (once per process)
fn init_ffmpeg() -> Result<()> {
    FFMPEG_INIT.get_or_init(ffmpeg::init).clone().map_err(Error::from)
}

/// Packets kept per stream before the oldest are discarded.
///
/// Bounds memory for an active stream that is never read while another one is.
const MAX_QUEUED_PACKETS: usize = 1024;

/// Appends `item`, dropping the oldest entry when `queue` is full.
/// Returns whether an entry was dropped.
fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, capacity: usize) -> bool {
    let full = queue.len() >= capacity;
    if full {
        queue.pop_front();
    }
    queue.push_back(item);
    full
}

/// Outcome of driving a decoder with the packets queued for it
enum Pump {
    Frame,
    NeedPacket,
    End,
}

struct Track {
    /// Index of the stream in the container
    index: usize,
    time_base: Rational,
    packets: VecDeque<Packet>,
    active: bool,
    /// End of stream was sent to the decoder
    draining: bool,
}

impl Track {
    fn new(index: usize, time_base: Rational) -> Self {
        Self {
            index,
            time_base,
            packets: VecDeque::new(),
            active: false,
            draining: false,
        }
    }

    fn reset(&mut self) {
        self.packets.clear();
        self.draining = false;
    }

    /// Presentation time of a decoded frame in microseconds
    fn timestamp(&self, frame: &frame::Frame) -> Option<i64> {
        frame
            .timestamp()
            .or_else(|| frame.pts())
            .map(|ts| ts.rescale(self.time_base, ffmpeg::rescale::TIME_BASE))
    }

    /// Receives the next frame from `decoder`, feeding it queued packets as needed
    fn pump(&mut self, decoder: &mut decoder::Opened, frame: &mut frame::Frame, demux_eof: bool) -> Result<Pump> {
        loop {
            match decoder.receive_frame(frame) {
                Ok(()) => return Ok(Pump::Frame),
                Err(ffmpeg::Error::Eof) => return Ok(Pump::End),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {}
                Err(e) => return Err(e.into()),
            }

            if let Some(packet) = self.packets.pop_front() {
                decoder.send_packet(&packet)?;
            } else if !demux_eof {
                return Ok(Pump::NeedPacket);
            } else if self.draining {
                return Ok(Pump::End);
            } else {
                decoder.send_eof()?;
                self.draining = true;
            }
        }
    }
}

struct VideoTrack {
    track: Track,
    decoder: decoder::Video,
    template: VideoFrame,
    frame_rate: (i32, i32),
    /// Conversion to BGRA for formats that are not passed through
    scaler: Option<scaling::Context>,
    next_pts: i64,
}

impl VideoTrack {
    fn frame_duration(&self) -> i64 {
        let (num, den) = self.frame_rate;
        if num > 0 && den > 0 {
            1_000_000 * den as i64 / num as i64
        } else {
            0
        }
    }

    fn convert(&mut self, decoded: &frame::Video) -> Result<VideoFrame> {
        if decoded.width() != self.template.raw_width || decoded.height() != self.template.raw_height {
            return Err(Error::FormatChanged(format!(
                "frame is {}x{}, stream is {}x{}",
                decoded.width(),
                decoded.height(),
                self.template.raw_width,
                self.template.raw_height
            )));
        }

        let mut frame = self.template.clone();
        frame.presentation_time = self.track.timestamp(decoded).unwrap_or(self.next_pts);
        self.next_pts = frame.presentation_time + self.frame_duration();

        frame.data[0] = match &mut self.scaler {
            Some(scaler) => {
                let mut converted = frame::Video::empty();
                scaler.run(decoded, &mut converted)?;
                vec![copy_plane(&converted, 0, self.template.raw_height)?]
            }
            None => {
                if pixel_format(decoded.format()) != Some(self.template.pixel_format) {
                    return Err(Error::FormatChanged(format!("{:?}", decoded.format())));
                }
                (0..self.template.pixel_format.planes())
                    .map(|plane| {
                        let (_, height) = self.template.pixel_format.plane_size(
                            plane,
                            self.template.raw_width,
                            self.template.raw_height,
                        );
                        copy_plane(decoded, plane, height)
                    })
                    .collect::<Result<_>>()?
            }
        };
        Ok(frame)
    }
}

struct AudioTrack {
    track: Track,
    decoder: decoder::Audio,
    template: AudioBlob,
    /// Decoded interleaved samples not yet handed out
    buffer: Vec<u8>,
    /// Presentation time of the first sample in `buffer`
    buffer_pts: i64,
}

impl AudioTrack {
    fn append(&mut self, decoded: &frame::Audio) -> Result<()> {
        if sample_format(decoded.format())? != self.template.sample_format {
            return Err(Error::FormatChanged(format!("{:?}", decoded.format())));
        }
        if self.buffer.is_empty() {
            if let Some(pts) = self.track.timestamp(decoded) {
                self.buffer_pts = pts;
            }
        }

        let channels = self.template.channels as usize;
        let samples = decoded.samples();
        let sample_bytes = decoded.format().bytes();
        let mut packed = Vec::new();
        if decoded.is_planar() {
            let planes = (0..channels)
                .map(|c| decoded.data(c).get(..samples * sample_bytes))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| Error::FormatChanged("short audio plane".to_string()))?;
            interleave(&planes, samples, sample_bytes, &mut packed);
        } else {
            let data = decoded
                .data(0)
                .get(..samples * channels * sample_bytes)
                .ok_or_else(|| Error::FormatChanged("short audio buffer".to_string()))?;
            packed.extend_from_slice(data);
        }

        if matches!(decoded.format(), Sample::I32(_)) {
            s32_to_f32(&packed, &mut self.buffer);
        } else {
            self.buffer.extend_from_slice(&packed);
        }
        Ok(())
    }

    /// Takes up to `samples` sample frames from the buffer
    fn take(&mut self, samples: usize) -> Option<AudioBlob> {
        let frame_bytes = self.template.frame_bytes();
        let available = self.buffer.len() / frame_bytes * frame_bytes;
        let take = (samples * frame_bytes).min(available);
        if take == 0 {
            self.buffer.clear();
            return None;
        }

        let mut blob = self.template.clone();
        blob.data = self.buffer.drain(..take).collect();
        blob.presentation_time = self.buffer_pts;
        self.buffer_pts += blob.duration();
        Some(blob)
    }
}

/// A media object reading one URL through libavformat and libavcodec.
///
/// Packets are demultiplexed on demand and queued per active stream, so one
/// stream can be read ahead of the others. Packets of inactive streams are
/// dropped. Video in planar 8-bit YUV is passed through, everything else is
/// converted to BGRA.
pub struct FfmpegMediaObject {
    url: String,
    input: ffmpeg::format::context::Input,
    tags: Vec<(String, String)>,
    video: Vec<VideoTrack>,
    audio: Vec<AudioTrack>,
    timeline: ObjectTimeline,
    demux_eof: bool,
}

// SAFETY: the FFmpeg contexts are owned exclusively by this object and are
// only used through `&mut self`, so they are never accessed from two threads
// at once.
unsafe impl Send for FfmpegMediaObject {}

impl FfmpegMediaObject {
    /// Opens `url` with the given decoder configuration
    pub fn open_with_config(url: &str, config: &DecoderConfig) -> Result<Self> {
        init_ffmpeg()?;

        let input = ffmpeg::format::input(&url).map_err(|source| Error::Open {
            url: url.to_string(),
            source,
        })?;
        let tags: Vec<(String, String)> = input
            .metadata()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let mut video = Vec::new();
        let mut audio = Vec::new();
        for stream in input.streams() {
            if stream.disposition().contains(Disposition::ATTACHED_PIC) {
                continue;
            }
            match stream.parameters().medium() {
                media::Type::Video => match open_video(url, &tags, &stream, config) {
                    Ok(track) => video.push(track),
                    Err(e) => warn!(url, stream = stream.index(), error = %e, "skipping video stream"),
                },
                media::Type::Audio => match open_audio(&stream) {
                    Ok(track) => audio.push(track),
                    Err(e) => warn!(url, stream = stream.index(), error = %e, "skipping audio stream"),
                },
                _ => {}
            }
        }

        // SAFETY: the context is valid for the lifetime of `input`
        let start_time = unsafe { (*input.as_ptr()).start_time };
        let initial_skip = if start_time == ffmpeg::ffi::AV_NOPTS_VALUE {
            0
        } else {
            start_time
        };
        let timeline = ObjectTimeline::new(initial_skip, input.duration().max(0));
        for track in &mut audio {
            track.buffer_pts = initial_skip;
        }

        debug!(
            url,
            video_streams = video.len(),
            audio_streams = audio.len(),
            initial_skip = timeline.initial_skip,
            duration = timeline.duration,
            "opened media object"
        );
        Ok(Self {
            url: url.to_string(),
            input,
            tags,
            video,
            audio,
            timeline,
            demux_eof: false,
        })
    }

    /// Reads one packet and queues it for the active stream it belongs to
    fn demux(&mut self) -> Result<()> {
        let mut packet = Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => {
                debug!(url = %self.url, "demuxer reached end of file");
                self.demux_eof = true;
                return Ok(());
            }
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        let index = packet.stream();
        let track = self
            .video
            .iter_mut()
            .map(|t| &mut t.track)
            .chain(self.audio.iter_mut().map(|t| &mut t.track))
            .find(|t| t.active && t.index == index);
        if let Some(track) = track {
            if push_bounded(&mut track.packets, packet, MAX_QUEUED_PACKETS) {
                debug!(url = %self.url, stream = index, "packet queue full, dropped oldest packet");
            }
        }
        Ok(())
    }

    fn next_video_frame(&mut self, stream: usize) -> Result<Option<VideoFrame>> {
        let mut decoded = frame::Video::empty();
        loop {
            let track = &mut self.video[stream];
            match track.track.pump(&mut track.decoder, &mut decoded, self.demux_eof)? {
                Pump::Frame => return track.convert(&decoded).map(Some),
                Pump::End => return Ok(None),
                Pump::NeedPacket => self.demux()?,
            }
        }
    }

    fn next_audio_blob(&mut self, stream: usize, samples: usize) -> Result<Option<AudioBlob>> {
        let wanted = samples * self.audio[stream].template.frame_bytes();
        let mut decoded = frame::Audio::empty();
        while self.audio[stream].buffer.len() < wanted {
            let track = &mut self.audio[stream];
            match track.track.pump(&mut track.decoder, &mut decoded, self.demux_eof)? {
                Pump::Frame => track.append(&decoded)?,
                Pump::End => break,
                Pump::NeedPacket => self.demux()?,
            }
        }
        Ok(self.audio[stream].take(samples))
    }

    fn seek_to(&mut self, pos: i64) -> Result<()> {
        self.input
            .seek(pos, ..pos)
            .map_err(|source| Error::Seek { pos, source })?;
        self.demux_eof = false;
        for track in &mut self.video {
            track.decoder.flush();
            track.track.reset();
            track.next_pts = pos;
        }
        for track in &mut self.audio {
            track.decoder.flush();
            track.track.reset();
            track.buffer.clear();
            track.buffer_pts = pos;
        }
        debug!(url = %self.url, pos, "seeked");
        Ok(())
    }
}

impl MediaObject for FfmpegMediaObject {
    fn open(url: &str) -> s3d_core::Result<Self> {
        Ok(Self::open_with_config(url, &DecoderConfig::default())?)
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    fn video_streams(&self) -> usize {
        self.video.len()
    }

    fn audio_streams(&self) -> usize {
        self.audio.len()
    }

    fn video_frame_template(&self, stream: usize) -> &VideoFrame {
        &self.video[stream].template
    }

    fn video_frame_rate(&self, stream: usize) -> (i32, i32) {
        self.video[stream].frame_rate
    }

    fn audio_blob_template(&self, stream: usize) -> &AudioBlob {
        &self.audio[stream].template
    }

    fn timeline(&self) -> ObjectTimeline {
        self.timeline
    }

    fn set_video_stream_active(&mut self, stream: usize, active: bool) {
        let track = &mut self.video[stream].track;
        track.active = active;
        if !active {
            track.packets.clear();
        }
    }

    fn set_audio_stream_active(&mut self, stream: usize, active: bool) {
        let track = &mut self.audio[stream].track;
        track.active = active;
        if !active {
            track.packets.clear();
        }
    }

    fn read_video_frame(&mut self, stream: usize) -> s3d_core::Result<Option<VideoFrame>> {
        Ok(self.next_video_frame(stream)?)
    }

    fn read_audio_blob(&mut self, stream: usize, samples: usize) -> s3d_core::Result<Option<AudioBlob>> {
        Ok(self.next_audio_blob(stream, samples)?)
    }

    fn seek(&mut self, pos: i64) -> s3d_core::Result<()> {
        Ok(self.seek_to(pos)?)
    }

    fn close(&mut self) {
        for track in &mut self.video {
            track.track.reset();
        }
        for track in &mut self.audio {
            track.track.reset();
            track.buffer.clear();
        }
        debug!(url = %self.url, "closed media object");
    }
}

fn open_video(
    url: &str,
    tags: &[(String, String)],
    stream: &ffmpeg::format::stream::Stream,
    config: &DecoderConfig,
) -> Result<VideoTrack> {
    let mut context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
    context.set_threading(threading::Config {
        kind: threading::Type::Frame,
        count: config.threads,
        ..Default::default()
    });
    let decoder = context.decoder().video()?;

    let (width, height) = (decoder.width(), decoder.height());
    if width == 0 || height == 0 {
        return Err(Error::UnsupportedPixelFormat(format!("{width}x{height} video")));
    }

    let native = pixel_format(decoder.format()).filter(|_| !config.force_bgra);
    let scaler = match native {
        Some(_) => None,
        None => Some(scaling::Context::get(
            decoder.format(),
            width,
            height,
            Pixel::BGRA,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?),
    };

    let sar = decoder.aspect_ratio();
    let mut aspect_ratio = width as f32 / height as f32;
    if sar.numerator() > 0 && sar.denominator() > 0 {
        aspect_ratio *= sar.numerator() as f32 / sar.denominator() as f32;
    }

    let mut template = VideoFrame::template(width, height, aspect_ratio, native.unwrap_or(PixelFormat::Bgra32));
    if native.is_some() {
        template.value_range = if decoder.color_range() == color::Range::JPEG
            || matches!(decoder.format(), Pixel::YUVJ420P | Pixel::YUVJ422P | Pixel::YUVJ444P)
        {
            ValueRange::Full
        } else {
            ValueRange::Mpeg
        };
        template.color_space = match decoder.color_space() {
            color::Space::BT709 => ColorSpace::Yuv709,
            color::Space::Unspecified if height >= 720 => ColorSpace::Yuv709,
            _ => ColorSpace::Yuv601,
        };
        template.chroma_location = match decoder.chroma_location() {
            chroma::Location::Left => ChromaLocation::Left,
            chroma::Location::TopLeft => ChromaLocation::TopLeft,
            _ => ChromaLocation::Center,
        };
    }

    let stream_tags: Vec<(String, String)> = stream
        .metadata()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let (layout, swap) = StereoLayout::detect(
        url,
        stream_tags.iter().chain(tags).map(|(k, v)| (k.as_str(), v.as_str())),
        width,
        height,
    );
    template.stereo_layout = layout;
    template.stereo_layout_swap = swap;
    template.set_view_dimensions();

    let rate = match stream.avg_frame_rate() {
        r if r.numerator() > 0 && r.denominator() > 0 => r,
        _ => stream.rate(),
    };
    debug!(
        url,
        stream = stream.index(),
        width,
        height,
        format = ?decoder.format(),
        stereo_layout = %layout,
        "video stream"
    );

    Ok(VideoTrack {
        track: Track::new(stream.index(), stream.time_base()),
        decoder,
        template,
        frame_rate: (rate.numerator(), rate.denominator()),
        scaler,
        next_pts: 0,
    })
}

fn open_audio(stream: &ffmpeg::format::stream::Stream) -> Result<AudioTrack> {
    let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
    let decoder = context.decoder().audio()?;

    let mut template = AudioBlob::template(
        decoder.ch_layout().channels() as u16,
        decoder.rate(),
        sample_format(decoder.format())?,
    );
    if template.channels == 0 || template.rate == 0 {
        return Err(Error::UnsupportedSampleFormat(format!(
            "{} channels at {} Hz",
            template.channels, template.rate
        )));
    }
    template.language = stream
        .metadata()
        .get("language")
        .filter(|lang| *lang != "und")
        .unwrap_or_default()
        .to_string();

    Ok(AudioTrack {
        track: Track::new(stream.index(), stream.time_base()),
        decoder,
        template,
        buffer: Vec::new(),
        buffer_pts: 0,
    })
}

/// Formats passed through without conversion
fn pixel_format(format: Pixel) -> Option<PixelFormat> {
    match format {
        Pixel::YUV420P | Pixel::YUVJ420P => Some(PixelFormat::Yuv420p),
        Pixel::YUV422P | Pixel::YUVJ422P => Some(PixelFormat::Yuv422p),
        Pixel::YUV444P | Pixel::YUVJ444P => Some(PixelFormat::Yuv444p),
        _ => None,
    }
}

/// Format of the interleaved samples produced for a decoder format
fn sample_format(format: Sample) -> Result<SampleFormat> {
    match format {
        Sample::U8(_) => Ok(SampleFormat::U8),
        Sample::I16(_) => Ok(SampleFormat::S16),
        Sample::I32(_) | Sample::F32(_) => Ok(SampleFormat::F32),
        Sample::F64(_) => Ok(SampleFormat::D64),
        other => Err(Error::UnsupportedSampleFormat(format!("{other:?}"))),
    }
}

fn copy_plane(frame: &frame::Video, plane: usize, height: u32) -> Result<Plane> {
    let line_size = frame.stride(plane);
    let data = frame
        .data(plane)
        .get(..line_size * height as usize)
        .ok_or_else(|| Error::FormatChanged(format!("plane {plane} is too short")))?;
    Ok(Plane::new(data.to_vec(), line_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg::format::sample::Type;

    #[test]
    fn test_packet_queue_drops_oldest_when_full() {
        let mut queue = VecDeque::new();
        for packet in 0..3 {
            assert!(!push_bounded(&mut queue, packet, 3));
        }
        assert!(push_bounded(&mut queue, 3, 3));
        assert!(push_bounded(&mut queue, 4, 3));
        assert_eq!(queue, VecDeque::from([2, 3, 4]));
    }

    #[test]
    fn test_planar_yuv_passes_through() {
        assert_eq!(pixel_format(Pixel::YUV420P), Some(PixelFormat::Yuv420p));
        assert_eq!(pixel_format(Pixel::YUVJ444P), Some(PixelFormat::Yuv444p));
        assert_eq!(pixel_format(Pixel::NV12), None);
        assert_eq!(pixel_format(Pixel::YUV420P10LE), None);
    }

    #[test]
    fn test_sample_formats() {
        assert_eq!(sample_format(Sample::I16(Type::Planar)).unwrap(), SampleFormat::S16);
        assert_eq!(sample_format(Sample::I32(Type::Packed)).unwrap(), SampleFormat::F32);
        assert_eq!(sample_format(Sample::F64(Type::Planar)).unwrap(), SampleFormat::D64);
        assert!(matches!(
            sample_format(Sample::None),
            Err(Error::UnsupportedSampleFormat(_))
        ));
    }

    #[test]
    fn test_open_missing_file_fails() {
        let result = FfmpegMediaObject::open_with_config("/nonexistent/movie.mkv", &DecoderConfig::default());
        assert!(matches!(result, Err(Error::Open { .. })));
    }
}
