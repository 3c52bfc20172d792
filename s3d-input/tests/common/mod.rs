//! Scripted media objects for driving `MediaInput` without real files

#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use s3d_core::{
    AudioBlob, Error, InputConfig, MediaObject, ObjectTimeline, PixelFormat, Plane, Result,
    SampleFormat, StereoLayout, VideoFrame,
};
use s3d_input::MediaInput;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What the input did to a mock object
#[derive(Debug, Default)]
pub struct Activity {
    pub video_active: Vec<bool>,
    pub audio_active: Vec<bool>,
    pub seeks: Vec<i64>,
    pub concurrent_reads: usize,
    pub closed: bool,
}

/// Meeting point that tells whether two reads were running at the same time
#[derive(Default)]
pub struct Rendezvous {
    arrived: Mutex<usize>,
    cond: Condvar,
}

impl Rendezvous {
    pub fn meet(&self, parties: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut arrived = self.arrived.lock();
        *arrived += 1;
        self.cond.notify_all();
        while *arrived < parties {
            if self.cond.wait_until(&mut arrived, deadline).timed_out() {
                return false;
            }
        }
        true
    }
}

struct MockVideo {
    template: VideoFrame,
    frame_rate: (i32, i32),
    frames: usize,
    keyframe_interval: usize,
    fail_at: Option<usize>,
    fill: u8,
    position: usize,
}

impl MockVideo {
    fn frame_duration(&self) -> i64 {
        1_000_000 * self.frame_rate.1 as i64 / self.frame_rate.0 as i64
    }
}

struct MockAudio {
    template: AudioBlob,
    total: usize,
    position: usize,
}

pub struct MockObject {
    url: String,
    tags: Vec<(String, String)>,
    video: Vec<MockVideo>,
    audio: Vec<MockAudio>,
    timeline: ObjectTimeline,
    activity: Arc<Mutex<Activity>>,
    rendezvous: Option<Arc<Rendezvous>>,
}

impl MockObject {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            tags: Vec::new(),
            video: Vec::new(),
            audio: Vec::new(),
            timeline: ObjectTimeline::new(0, 10_000_000),
            activity: Arc::default(),
            rendezvous: None,
        }
    }

    pub fn timeline(mut self, initial_skip: i64, duration: i64) -> Self {
        self.timeline = ObjectTimeline::new(initial_skip, duration);
        self
    }

    pub fn tag(mut self, name: &str, value: &str) -> Self {
        self.tags.push((name.to_string(), value.to_string()));
        self
    }

    /// Adds a 25 fps video stream with a keyframe every 12 frames
    pub fn video(mut self, width: u32, height: u32, layout: StereoLayout, frames: usize) -> Self {
        let mut template = VideoFrame::template(width, height, width as f32 / height as f32, PixelFormat::Bgra32);
        template.stereo_layout = layout;
        template.set_view_dimensions();
        self.video.push(MockVideo {
            template,
            frame_rate: (25, 1),
            frames,
            keyframe_interval: 12,
            fail_at: None,
            fill: 0,
            position: 0,
        });
        self
    }

    /// Byte that the payload of the last video stream is filled with
    pub fn fill(mut self, fill: u8) -> Self {
        if let Some(video) = self.video.last_mut() {
            video.fill = fill;
        }
        self
    }

    pub fn pixel_format(mut self, pixel_format: PixelFormat) -> Self {
        if let Some(video) = self.video.last_mut() {
            video.template.pixel_format = pixel_format;
        }
        self
    }

    /// Makes the last video stream fail when decoding the given frame
    pub fn fail_video_at(mut self, frame: usize) -> Self {
        if let Some(video) = self.video.last_mut() {
            video.fail_at = Some(frame);
        }
        self
    }

    pub fn audio(mut self, rate: u32, channels: u16, samples: usize, language: &str) -> Self {
        let mut template = AudioBlob::template(channels, rate, SampleFormat::S16);
        template.language = language.to_string();
        self.audio.push(MockAudio {
            template,
            total: samples,
            position: 0,
        });
        self
    }

    pub fn rendezvous(mut self, rendezvous: Arc<Rendezvous>) -> Self {
        self.rendezvous = Some(rendezvous);
        self
    }

    /// Records a concurrent read when another reader arrives at the shared rendezvous
    fn meet(&self) {
        if let Some(rendezvous) = &self.rendezvous {
            if rendezvous.meet(2) {
                self.activity.lock().concurrent_reads += 1;
            }
        }
    }

    pub fn activity(&self) -> Arc<Mutex<Activity>> {
        Arc::clone(&self.activity)
    }
}

impl MediaObject for MockObject {
    fn open(url: &str) -> Result<Self> {
        Err(Error::Open {
            url: url.to_string(),
            reason: "mock objects are built by the test".to_string(),
        })
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
        let mut activity = self.activity.lock();
        activity.video_active.resize(self.video.len(), false);
        activity.video_active[stream] = active;
    }

    fn set_audio_stream_active(&mut self, stream: usize, active: bool) {
        let mut activity = self.activity.lock();
        activity.audio_active.resize(self.audio.len(), false);
        activity.audio_active[stream] = active;
    }

    fn read_video_frame(&mut self, stream: usize) -> Result<Option<VideoFrame>> {
        self.meet();

        let initial_skip = self.timeline.initial_skip;
        let video = &mut self.video[stream];
        if video.fail_at == Some(video.position) {
            return Err(Error::Decode(format!("corrupt frame {}", video.position)));
        }
        if video.position >= video.frames {
            return Ok(None);
        }

        let mut frame = video.template.clone();
        frame.data[0] = vec![Plane::new(vec![video.fill; 16], 16)];
        frame.presentation_time = initial_skip + video.position as i64 * video.frame_duration();
        video.position += 1;
        Ok(Some(frame))
    }

    fn read_audio_blob(&mut self, stream: usize, samples: usize) -> Result<Option<AudioBlob>> {
        self.meet();
        let initial_skip = self.timeline.initial_skip;
        let audio = &mut self.audio[stream];
        let remaining = audio.total - audio.position;
        if remaining == 0 {
            return Ok(None);
        }

        let count = samples.min(remaining);
        let mut blob = audio.template.clone();
        blob.data = vec![0; count * blob.frame_bytes()];
        blob.presentation_time =
            initial_skip + audio.position as i64 * 1_000_000 / audio.template.rate as i64;
        audio.position += count;
        Ok(Some(blob))
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        self.activity.lock().seeks.push(pos);
        let offset = (pos - self.timeline.initial_skip).max(0);
        for video in &mut self.video {
            let target = (offset / video.frame_duration()) as usize;
            let keyframe = target - target % video.keyframe_interval;
            video.position = keyframe.min(video.frames);
        }
        for audio in &mut self.audio {
            let target = (offset * audio.template.rate as i64 / 1_000_000) as usize;
            audio.position = target.min(audio.total);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.activity.lock().closed = true;
    }
}

/// Opens an input over prebuilt mock objects with the default configuration
pub fn open_input(objects: Vec<MockObject>) -> MediaInput<MockObject> {
    open_input_with(InputConfig::default(), objects)
}

pub fn open_input_with(config: InputConfig, objects: Vec<MockObject>) -> MediaInput<MockObject> {
    let mut input = MediaInput::with_config(config);
    try_open(&mut input, objects).expect("mock input opens");
    input
}

pub fn try_open(input: &mut MediaInput<MockObject>, objects: Vec<MockObject>) -> s3d_input::Result<()> {
    let urls: Vec<String> = objects.iter().map(|o| o.url.clone()).collect();
    let mut objects = objects.into_iter();
    input.open_with(&urls, |url| {
        objects.next().ok_or_else(|| Error::Open {
            url: url.to_string(),
            reason: "no mock object left".to_string(),
        })
    })
}
