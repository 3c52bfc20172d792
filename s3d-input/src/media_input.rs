//! A seekable stereoscopic video and audio input made of one or more media objects

use crate::reader::{lazy_worker, ReadWorker};
use crate::views::compose_frame;
use crate::{Error, Result};
use parking_lot::Mutex;
use s3d_core::{
    reconcile, AudioBlob, InputConfig, MediaObject, ObjectTimeline, StereoLayout, StreamIndexMap,
    TagList, VideoFrame,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

const VIDEO_WORKERS: [&str; 2] = ["s3d-video-left", "s3d-video-right"];
const AUDIO_WORKER: &str = "s3d-audio";

type VideoRead = s3d_core::Result<Option<VideoFrame>>;
type AudioRead = s3d_core::Result<Option<AudioBlob>>;

/// Format information of one media object, captured when it is opened
struct ObjectInfo {
    video_templates: Vec<VideoFrame>,
    video_frame_rates: Vec<(i32, i32)>,
    audio_templates: Vec<AudioBlob>,
    timeline: ObjectTimeline,
}

impl ObjectInfo {
    fn capture<M: MediaObject>(object: &M) -> Self {
        let video = 0..object.video_streams();
        Self {
            video_templates: video
                .clone()
                .map(|s| object.video_frame_template(s).to_template())
                .collect(),
            video_frame_rates: video.map(|s| object.video_frame_rate(s)).collect(),
            audio_templates: (0..object.audio_streams())
                .map(|s| object.audio_blob_template(s).to_template())
                .collect(),
            timeline: object.timeline(),
        }
    }
}

enum PendingVideo {
    /// Nothing to read; finishing yields end of stream
    Exhausted,
    Reading {
        /// Number of eye reads that were queued
        submitted: usize,
        /// Failure while queueing, reported once the queued reads are collected
        error: Option<Error>,
        /// Video frame template at the time the read was started
        template: VideoFrame,
    },
}

enum PendingAudio {
    Exhausted,
    Failed(Error),
    Reading { samples: usize },
}

#[derive(Default)]
struct VideoReads {
    workers: [Option<ReadWorker<VideoRead>>; 2],
    pending: Option<PendingVideo>,
    eof: bool,
}

#[derive(Default)]
struct AudioReads {
    worker: Option<ReadWorker<AudioRead>>,
    pending: Option<PendingAudio>,
    eof: bool,
}

/// One logical input combining the media objects opened from a list of URLs.
///
/// Exactly one video and one audio stream are active at a time. Reads are split
/// into `start_*` and `finish_*` calls so decoding overlaps with the caller's
/// work; within a category starts and finishes must alternate.
pub struct MediaInput<M: MediaObject> {
    config: InputConfig,
    id: String,
    objects: Vec<Arc<Mutex<M>>>,
    infos: Vec<ObjectInfo>,
    tags: TagList,
    video_streams: StreamIndexMap,
    audio_streams: StreamIndexMap,
    supports_stereo_layout_separate: bool,
    active_video_stream: Option<usize>,
    active_audio_stream: Option<usize>,
    initial_skip: i64,
    duration: i64,
    video_frame: VideoFrame,
    audio_blob: AudioBlob,
    video: VideoReads,
    audio: AudioReads,
}

impl<M: MediaObject> MediaInput<M> {
    /// Creates an empty input with the default configuration
    pub fn new() -> Self {
        Self::with_config(InputConfig::default())
    }

    /// Creates an empty input that applies `config` whenever it is opened
    pub fn with_config(config: InputConfig) -> Self {
        Self {
            config,
            id: String::new(),
            objects: Vec::new(),
            infos: Vec::new(),
            tags: TagList::new(),
            video_streams: StreamIndexMap::new(),
            audio_streams: StreamIndexMap::new(),
            supports_stereo_layout_separate: false,
            active_video_stream: None,
            active_audio_stream: None,
            initial_skip: 0,
            duration: 0,
            video_frame: VideoFrame::default(),
            audio_blob: AudioBlob::default(),
            video: VideoReads::default(),
            audio: AudioReads::default(),
        }
    }

    /// Opens the input by combining the media objects at the given URLs
    pub fn open<S: AsRef<str>>(&mut self, urls: &[S]) -> Result<()> {
        self.open_with(urls, M::open)
    }

    /// Like [`open`](Self::open), but media objects are created by `opener`
    pub fn open_with<S, F>(&mut self, urls: &[S], mut opener: F) -> Result<()>
    where
        S: AsRef<str>,
        F: FnMut(&str) -> s3d_core::Result<M>,
    {
        self.close();
        if urls.is_empty() {
            return Err(Error::NoUrls);
        }
        let id = urls.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("/");

        let mut objects = Vec::with_capacity(urls.len());
        for url in urls.iter().map(AsRef::as_ref) {
            match opener(url) {
                Ok(object) => objects.push(object),
                Err(e) => {
                    warn!(url, error = %e, "cannot open media object");
                    objects.iter_mut().for_each(MediaObject::close);
                    return Err(e.into());
                }
            }
        }

        let mut tags = TagList::new();
        let mut video_streams = StreamIndexMap::new();
        let mut audio_streams = StreamIndexMap::new();
        let mut infos = Vec::with_capacity(objects.len());
        for object in &objects {
            let info = ObjectInfo::capture(object);
            let url = object.url();
            let videos = info.video_templates.len();
            let audios = info.audio_templates.len();

            tags.extend_from(object.tags());
            video_streams.push_object((0..videos).map(|s| stream_name(url, s, videos)));
            audio_streams.push_object(info.audio_templates.iter().enumerate().map(|(s, t)| {
                let name = stream_name(url, s, audios);
                if t.language.is_empty() {
                    name
                } else {
                    format!("{name} - {}", t.language)
                }
            }));
            infos.push(info);
        }

        if video_streams.is_empty() && audio_streams.is_empty() {
            objects.iter_mut().for_each(MediaObject::close);
            return Err(Error::NoStreams(id));
        }

        self.id = id;
        self.objects = objects.into_iter().map(|o| Arc::new(Mutex::new(o))).collect();
        self.infos = infos;
        self.tags = tags;
        self.video_streams = video_streams;
        self.audio_streams = audio_streams;
        self.supports_stereo_layout_separate = self.separate_streams_compatible();

        if !self.video_streams.is_empty() {
            self.select_video_stream(0);
            let separate = (self.supports_stereo_layout_separate && self.config.prefer_separate_streams)
                .then_some((StereoLayout::SeparateStreams, false));
            let configured = self.config.stereo_layout.map(|layout| (layout, self.config.swap_eyes));
            for (layout, swap) in separate.into_iter().chain(configured) {
                if let Err(e) = self.set_stereo_layout(layout, swap) {
                    warn!(layout = %layout, error = %e, "keeping previous stereo layout");
                }
            }
        }
        if !self.audio_streams.is_empty() {
            self.select_audio_stream(0);
        }

        let timeline = reconcile(&self.contributing_timelines());
        self.initial_skip = timeline.initial_skip;
        self.duration = timeline.duration;

        info!(
            id = %self.id,
            video_streams = self.video_streams.len(),
            audio_streams = self.audio_streams.len(),
            stereo_layout = %self.video_frame.stereo_layout,
            initial_skip = self.initial_skip,
            duration = self.duration,
            "opened input"
        );
        Ok(())
    }

    /// Whether the input is currently open
    pub fn is_open(&self) -> bool {
        !self.objects.is_empty()
    }

    /// Identifier of this input: the URLs joined with `/`
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tags(&self) -> &TagList {
        &self.tags
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn tag_name(&self, i: usize) -> &str {
        self.tags.name(i)
    }

    pub fn tag_value(&self, i: usize) -> &str {
        self.tags.value(i)
    }

    /// Value of the first tag named `name`
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name)
    }

    /// Number of video streams in this input
    pub fn video_streams(&self) -> usize {
        self.video_streams.len()
    }

    /// Number of audio streams in this input
    pub fn audio_streams(&self) -> usize {
        self.audio_streams.len()
    }

    pub fn video_stream_name(&self, video_stream: usize) -> &str {
        self.video_streams.name(video_stream)
    }

    pub fn audio_stream_name(&self, audio_stream: usize) -> &str {
        self.audio_streams.name(audio_stream)
    }

    pub fn active_video_stream(&self) -> Option<usize> {
        self.active_video_stream
    }

    pub fn active_audio_stream(&self) -> Option<usize> {
        self.active_audio_stream
    }

    /// Initial portion of the input to skip, in microseconds
    pub fn initial_skip(&self) -> i64 {
        self.initial_skip
    }

    /// Total combined duration in microseconds
    pub fn duration(&self) -> i64 {
        self.duration
    }

    /// Format of the active video stream under the current stereo layout
    pub fn video_frame_template(&self) -> &VideoFrame {
        &self.video_frame
    }

    /// Format of the active audio stream
    pub fn audio_blob_template(&self) -> &AudioBlob {
        &self.audio_blob
    }

    // Frame rates are informational only; frames carry their own presentation time.
    fn video_frame_rate(&self) -> (i32, i32) {
        match self.active_video_stream {
            Some(stream) => {
                let (object, local) = self.video_streams.resolve(stream);
                self.infos[object].video_frame_rates[local]
            }
            None => (0, 1),
        }
    }

    pub fn video_frame_rate_numerator(&self) -> i32 {
        self.video_frame_rate().0
    }

    pub fn video_frame_rate_denominator(&self) -> i32 {
        self.video_frame_rate().1
    }

    /// Duration of one frame in microseconds, 0 if the rate is unknown
    pub fn video_frame_duration(&self) -> i64 {
        let (num, den) = self.video_frame_rate();
        if num <= 0 || den <= 0 {
            return 0;
        }
        1_000_000 * den as i64 / num as i64
    }

    /// Makes `video_stream` the active video stream.
    ///
    /// The stereo layout falls back to the default reported by the source.
    ///
    /// # Panics
    ///
    /// Panics if the stream is out of range or a video read is outstanding.
    pub fn select_video_stream(&mut self, video_stream: usize) {
        assert!(
            video_stream < self.video_streams.len(),
            "video stream {video_stream} out of range ({} video streams)",
            self.video_streams.len()
        );
        self.assert_video_idle("select_video_stream");

        self.video_frame = self.native_video_template(video_stream).clone();
        self.active_video_stream = Some(video_stream);
        self.video.eof = false;
        self.activate_streams();
        debug!(
            stream = video_stream,
            stereo_layout = %self.video_frame.stereo_layout,
            "selected video stream"
        );
    }

    /// Makes `audio_stream` the active audio stream.
    ///
    /// # Panics
    ///
    /// Panics if the stream is out of range or an audio read is outstanding.
    pub fn select_audio_stream(&mut self, audio_stream: usize) {
        assert!(
            audio_stream < self.audio_streams.len(),
            "audio stream {audio_stream} out of range ({} audio streams)",
            self.audio_streams.len()
        );
        assert!(
            self.audio.pending.is_none(),
            "select_audio_stream called while an audio blob read is outstanding"
        );

        let (object, local) = self.audio_streams.resolve(audio_stream);
        self.audio_blob = self.infos[object].audio_templates[local].clone();
        self.active_audio_stream = Some(audio_stream);
        self.audio.eof = false;
        self.activate_streams();
        debug!(stream = audio_stream, "selected audio stream");
    }

    /// Whether `set_stereo_layout(layout, _)` would succeed
    pub fn supports_stereo_layout(&self, layout: StereoLayout) -> bool {
        let Some(active) = self.active_video_stream else {
            return false;
        };
        if layout == StereoLayout::SeparateStreams {
            return self.supports_stereo_layout_separate;
        }
        let native = self.native_video_template(active);
        layout.fits(native.raw_width, native.raw_height)
    }

    /// Reinterprets the active video as `layout`, optionally with swapped eyes.
    ///
    /// On failure nothing changes.
    ///
    /// # Panics
    ///
    /// Panics if a video read is outstanding.
    pub fn set_stereo_layout(&mut self, layout: StereoLayout, swap: bool) -> Result<()> {
        let Some(active) = self.active_video_stream else {
            return Err(Error::NoVideo);
        };
        self.assert_video_idle("set_stereo_layout");
        if !self.supports_stereo_layout(layout) {
            return Err(Error::UnsupportedStereoLayout(layout));
        }

        let previous_sources = self.video_sources();
        // Separate streams always pair the first two video streams
        let source = if layout == StereoLayout::SeparateStreams { 0 } else { active };
        let mut frame = self.native_video_template(source).clone();
        frame.stereo_layout = layout;
        frame.stereo_layout_swap = swap;
        frame.set_view_dimensions();

        self.video_frame = frame;
        self.active_video_stream = Some(source);
        // End of stream only sticks while the same streams are read
        if self.video_sources() != previous_sources {
            self.video.eof = false;
        }
        self.activate_streams();
        debug!(stereo_layout = %layout, swap, "changed stereo layout");
        Ok(())
    }

    /// Starts reading the next video frame in the background.
    ///
    /// # Panics
    ///
    /// Panics if a video read is already outstanding.
    pub fn start_video_frame_read(&mut self) {
        assert!(
            self.video.pending.is_none(),
            "start_video_frame_read called while a video frame read is outstanding"
        );
        let sources = self.video_sources();
        if sources.is_empty() || self.video.eof {
            self.video.pending = Some(PendingVideo::Exhausted);
            return;
        }

        let mut submitted = 0;
        let mut error = None;
        for (eye, &(object, stream)) in sources.iter().enumerate() {
            let object = Arc::clone(&self.objects[object]);
            let queued = lazy_worker(&mut self.video.workers[eye], VIDEO_WORKERS[eye])
                .and_then(|worker| worker.submit(move || object.lock().read_video_frame(stream)));
            match queued {
                Ok(()) => submitted += 1,
                Err(e) => {
                    error = Some(e);
                    break;
                }
            }
        }

        self.video.pending = Some(PendingVideo::Reading {
            submitted,
            error,
            template: self.video_frame.clone(),
        });
    }

    /// Waits for the read started by [`start_video_frame_read`](Self::start_video_frame_read).
    ///
    /// Returns `None` once the end of the stream is reached.
    ///
    /// # Panics
    ///
    /// Panics if no video read was started.
    pub fn finish_video_frame_read(&mut self) -> Result<Option<VideoFrame>> {
        let Some(pending) = self.video.pending.take() else {
            panic!("finish_video_frame_read called without a matching start_video_frame_read");
        };
        let PendingVideo::Reading {
            submitted,
            mut error,
            template,
        } = pending
        else {
            return Ok(None);
        };

        let mut views = Vec::with_capacity(submitted);
        for (eye, worker) in self.video.workers.iter().enumerate().take(submitted) {
            let read = match worker {
                Some(worker) => worker.wait(),
                None => Err(Error::WorkerLost(VIDEO_WORKERS[eye])),
            };
            match read {
                Ok(Ok(view)) => views.push(view),
                Ok(Err(e)) => {
                    error.get_or_insert(e.into());
                }
                Err(e) => {
                    error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = error {
            return Err(e);
        }

        let frame = compose_frame(&template, views);
        if frame.is_none() {
            self.video.eof = true;
            debug!(id = %self.id, "video end of stream");
        }
        Ok(frame)
    }

    /// Starts reading `samples` sample frames of audio in the background.
    ///
    /// # Panics
    ///
    /// Panics if an audio read is already outstanding or `samples` is zero.
    pub fn start_audio_blob_read(&mut self, samples: usize) {
        assert!(
            self.audio.pending.is_none(),
            "start_audio_blob_read called while an audio blob read is outstanding"
        );
        assert!(samples > 0, "start_audio_blob_read needs a non-zero sample count");

        let source = self.active_audio_stream.map(|s| self.audio_streams.resolve(s));
        let pending = match source {
            Some((object, stream)) if !self.audio.eof => {
                let object = Arc::clone(&self.objects[object]);
                let queued = lazy_worker(&mut self.audio.worker, AUDIO_WORKER).and_then(|worker| {
                    worker.submit(move || object.lock().read_audio_blob(stream, samples))
                });
                match queued {
                    Ok(()) => PendingAudio::Reading { samples },
                    Err(e) => PendingAudio::Failed(e),
                }
            }
            _ => PendingAudio::Exhausted,
        };
        self.audio.pending = Some(pending);
    }

    /// Waits for the read started by [`start_audio_blob_read`](Self::start_audio_blob_read).
    ///
    /// A blob shorter than requested is the last one; the next read returns `None`.
    ///
    /// # Panics
    ///
    /// Panics if no audio read was started.
    pub fn finish_audio_blob_read(&mut self) -> Result<Option<AudioBlob>> {
        let Some(pending) = self.audio.pending.take() else {
            panic!("finish_audio_blob_read called without a matching start_audio_blob_read");
        };
        let samples = match pending {
            PendingAudio::Exhausted => return Ok(None),
            PendingAudio::Failed(e) => return Err(e),
            PendingAudio::Reading { samples } => samples,
        };

        let worker = self
            .audio
            .worker
            .as_ref()
            .ok_or(Error::WorkerLost(AUDIO_WORKER))?;
        match worker.wait()?? {
            Some(blob) if !blob.data.is_empty() => {
                if blob.samples() < samples {
                    self.audio.eof = true;
                    debug!(id = %self.id, samples = blob.samples(), "short audio read, end of stream");
                }
                Ok(Some(blob))
            }
            _ => {
                self.audio.eof = true;
                debug!(id = %self.id, "audio end of stream");
                Ok(None)
            }
        }
    }

    /// Seeks all media objects to `pos` microseconds.
    ///
    /// The position actually reached is only known from the next frame or blob.
    ///
    /// # Panics
    ///
    /// Panics if a video or audio read is outstanding.
    pub fn seek(&mut self, pos: i64) -> Result<()> {
        assert!(
            self.video.pending.is_none() && self.audio.pending.is_none(),
            "seek called while a read is outstanding"
        );
        debug!(id = %self.id, pos, "seeking");
        self.video.eof = false;
        self.audio.eof = false;
        for object in &self.objects {
            object.lock().seek(pos)?;
        }
        Ok(())
    }

    /// Waits for outstanding reads, releases all media objects and resets the input
    pub fn close(&mut self) {
        if self.video.pending.is_some() {
            if let Err(e) = self.finish_video_frame_read() {
                debug!(error = %e, "discarding video read on close");
            }
        }
        if self.audio.pending.is_some() {
            if let Err(e) = self.finish_audio_blob_read() {
                debug!(error = %e, "discarding audio read on close");
            }
        }
        // Dropping the readers joins their threads
        self.video = VideoReads::default();
        self.audio = AudioReads::default();

        for object in self.objects.drain(..) {
            object.lock().close();
        }
        if !self.id.is_empty() {
            info!(id = %self.id, "closed input");
        }

        self.id.clear();
        self.infos.clear();
        self.tags = TagList::new();
        self.video_streams = StreamIndexMap::new();
        self.audio_streams = StreamIndexMap::new();
        self.supports_stereo_layout_separate = false;
        self.active_video_stream = None;
        self.active_audio_stream = None;
        self.initial_skip = 0;
        self.duration = 0;
        self.video_frame = VideoFrame::default();
        self.audio_blob = AudioBlob::default();
    }

    fn native_video_template(&self, video_stream: usize) -> &VideoFrame {
        let (object, local) = self.video_streams.resolve(video_stream);
        &self.infos[object].video_templates[local]
    }

    /// Two video streams can serve as left and right view if their formats agree
    fn separate_streams_compatible(&self) -> bool {
        if self.video_streams.len() != 2 {
            return false;
        }
        let left = self.native_video_template(0);
        let right = self.native_video_template(1);
        left.raw_width == right.raw_width
            && left.raw_height == right.raw_height
            && left.raw_aspect_ratio == right.raw_aspect_ratio
            && left.pixel_format == right.pixel_format
            && left.color_space == right.color_space
            && left.value_range == right.value_range
            && left.chroma_location == right.chroma_location
    }

    /// `(media object, local stream)` for every eye that a video read touches
    fn video_sources(&self) -> Vec<(usize, usize)> {
        match self.active_video_stream {
            None => Vec::new(),
            Some(_) if !self.video_frame.stereo_layout.is_single_stream() => {
                vec![self.video_streams.resolve(0), self.video_streams.resolve(1)]
            }
            Some(stream) => vec![self.video_streams.resolve(stream)],
        }
    }

    fn contributing_timelines(&self) -> Vec<ObjectTimeline> {
        let mut contributors: Vec<usize> = self
            .video_sources()
            .into_iter()
            .map(|(object, _)| object)
            .chain(
                self.active_audio_stream
                    .map(|s| self.audio_streams.resolve(s).0),
            )
            .collect();
        contributors.sort_unstable();
        contributors.dedup();
        contributors
            .into_iter()
            .map(|object| self.infos[object].timeline)
            .collect()
    }

    /// Tells every media object which of its streams will be read
    fn activate_streams(&self) {
        let video = self.video_sources();
        let audio = self.active_audio_stream.map(|s| self.audio_streams.resolve(s));
        for (index, object) in self.objects.iter().enumerate() {
            let mut object = object.lock();
            for stream in 0..self.video_streams.streams_of(index).len() {
                object.set_video_stream_active(stream, video.contains(&(index, stream)));
            }
            for stream in 0..self.audio_streams.streams_of(index).len() {
                object.set_audio_stream_active(stream, audio == Some((index, stream)));
            }
        }
    }

    fn assert_video_idle(&self, operation: &str) {
        assert!(
            self.video.pending.is_none(),
            "{operation} called while a video frame read is outstanding"
        );
    }
}

impl<M: MediaObject> Default for MediaInput<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MediaObject> Drop for MediaInput<M> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Display name of a stream: the URL, numbered if the object has several
fn stream_name(url: &str, stream: usize, streams: usize) -> String {
    if streams > 1 {
        format!("{url} #{}", stream + 1)
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_names() {
        assert_eq!(stream_name("left.mkv", 0, 1), "left.mkv");
        assert_eq!(stream_name("multi.mkv", 1, 3), "multi.mkv #2");
    }
}
