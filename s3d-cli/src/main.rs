//! S3D CLI Tool
//!
//! Command-line interface for inspecting stereoscopic media inputs and
//! reading frames and audio from them.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use s3d_core::{AudioBlob, InputConfig, PixelFormat, Plane, StereoLayout, VideoFrame};
use s3d_ffmpeg::{DecoderConfig, FfmpegMediaObject};
use s3d_input::MediaInput;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "s3d")]
#[command(about = "Inspect and read stereoscopic 3D media inputs")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show streams, tags, timing and stereo layouts of an input
    Info {
        /// One or more URLs combined into a single input
        #[arg(required = true)]
        urls: Vec<String>,

        /// Print machine readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Read video frames and audio from an input
    Read {
        /// One or more URLs combined into a single input
        #[arg(required = true)]
        urls: Vec<String>,

        /// Number of video frames to read
        #[arg(long, default_value = "25")]
        frames: usize,

        /// Seek to this position (seconds after the initial skip) first
        #[arg(long)]
        seek: Option<f64>,

        /// Stereo layout to apply, e.g. side-by-side or separate-streams
        #[arg(long)]
        layout: Option<StereoLayout>,

        /// Exchange left and right view
        #[arg(long)]
        swap: bool,

        /// Sample frames to read per audio blob
        #[arg(long, default_value = "4096")]
        audio_samples: usize,

        /// Directory to write every view as PNG
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Convert all video to BGRA
        #[arg(long)]
        bgra: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "s3d=debug,s3d_input=debug,s3d_ffmpeg=debug,s3d_core=debug".to_string()
        } else {
            "info".to_string()
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info { urls, json } => show_info(&urls, json),
        Commands::Read {
            urls,
            frames,
            seek,
            layout,
            swap,
            audio_samples,
            output,
            bgra,
        } => {
            let config = InputConfig {
                stereo_layout: layout,
                swap_eyes: swap,
                ..InputConfig::default()
            };
            let decoder = DecoderConfig {
                force_bgra: bgra,
                ..DecoderConfig::default()
            };
            read_input(&urls, config, &decoder, frames, seek, audio_samples, output.as_deref())
        }
    }
}

fn open_input(urls: &[String], config: InputConfig, decoder: &DecoderConfig) -> Result<MediaInput<FfmpegMediaObject>> {
    let mut input = MediaInput::with_config(config);
    input
        .open_with(urls, |url| Ok(FfmpegMediaObject::open_with_config(url, decoder)?))
        .with_context(|| format!("Failed to open {}", urls.join(", ")))?;
    Ok(input)
}

#[derive(Serialize)]
struct InputInfo<'a> {
    id: &'a str,
    video_streams: Vec<&'a str>,
    audio_streams: Vec<&'a str>,
    tags: Vec<(&'a str, &'a str)>,
    initial_skip: i64,
    duration: i64,
    frame_rate: (i32, i32),
    video: Option<&'a VideoFrame>,
    audio: Option<&'a AudioBlob>,
    supported_layouts: Vec<StereoLayout>,
}

fn show_info(urls: &[String], json: bool) -> Result<()> {
    let input = open_input(urls, InputConfig::default(), &DecoderConfig::default())?;

    let summary = InputInfo {
        id: input.id(),
        video_streams: (0..input.video_streams()).map(|s| input.video_stream_name(s)).collect(),
        audio_streams: (0..input.audio_streams()).map(|s| input.audio_stream_name(s)).collect(),
        tags: input.tags().iter().collect(),
        initial_skip: input.initial_skip(),
        duration: input.duration(),
        frame_rate: (input.video_frame_rate_numerator(), input.video_frame_rate_denominator()),
        video: input.active_video_stream().map(|_| input.video_frame_template()),
        audio: input.active_audio_stream().map(|_| input.audio_blob_template()),
        supported_layouts: StereoLayout::ALL
            .into_iter()
            .filter(|layout| input.supports_stereo_layout(*layout))
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("\n=== Input Information ===");
    println!("ID: {}", summary.id);
    println!(
        "Initial skip: {} us, duration: {} us ({:.2} seconds)",
        summary.initial_skip,
        summary.duration,
        summary.duration as f64 / 1_000_000.0
    );

    println!("\n=== Video Streams ===");
    for (i, name) in summary.video_streams.iter().enumerate() {
        println!("  [{i}] {name}");
    }
    if let Some(video) = summary.video {
        println!(
            "Active: {}x{} ({}x{} per view), {:?}, {} layout{}, {}/{} fps",
            video.raw_width,
            video.raw_height,
            video.width,
            video.height,
            video.pixel_format,
            video.stereo_layout,
            if video.stereo_layout_swap { " (swapped)" } else { "" },
            summary.frame_rate.0,
            summary.frame_rate.1
        );
        let layouts: Vec<&str> = summary.supported_layouts.iter().map(|l| l.name()).collect();
        println!("Supported layouts: {}", layouts.join(", "));
    }

    println!("\n=== Audio Streams ===");
    for (i, name) in summary.audio_streams.iter().enumerate() {
        println!("  [{i}] {name}");
    }
    if let Some(audio) = summary.audio {
        println!(
            "Active: {} channels, {} Hz, {:?}",
            audio.channels, audio.rate, audio.sample_format
        );
    }

    println!("\n=== Tags ===");
    for (name, value) in &summary.tags {
        println!("  {name}: {value}");
    }

    Ok(())
}

fn read_input(
    urls: &[String],
    config: InputConfig,
    decoder: &DecoderConfig,
    frames: usize,
    seek: Option<f64>,
    audio_samples: usize,
    output: Option<&Path>,
) -> Result<()> {
    if audio_samples == 0 {
        bail!("--audio-samples must be greater than zero");
    }
    let requested_layout = config.stereo_layout;
    let mut input = open_input(urls, config, decoder)?;
    if let Some(layout) = requested_layout {
        if input.video_frame_template().stereo_layout != layout {
            bail!("Stereo layout {layout} is not supported by this input");
        }
    }

    if let Some(seconds) = seek {
        let pos = input.initial_skip() + (seconds * 1_000_000.0) as i64;
        input.seek(pos).context("Failed to seek")?;
    }
    if let Some(dir) = output {
        std::fs::create_dir_all(dir).context("Failed to create output directory")?;
    }

    let has_audio = input.audio_streams() > 0;
    let mut video_frames = 0;
    let mut audio_samples_read = 0;
    let mut audio_done = !has_audio;

    while video_frames < frames {
        input.start_video_frame_read();
        if !audio_done {
            input.start_audio_blob_read(audio_samples);
        }

        if !audio_done {
            match input.finish_audio_blob_read().context("Failed to read audio")? {
                Some(blob) => audio_samples_read += blob.samples(),
                None => audio_done = true,
            }
        }
        let Some(frame) = input.finish_video_frame_read().context("Failed to read video")? else {
            break;
        };

        println!(
            "Frame {}: {} us, {}x{} per view, {} layout",
            video_frames, frame.presentation_time, frame.width, frame.height, frame.stereo_layout
        );
        if let Some(dir) = output {
            save_views(&frame, dir, video_frames)?;
        }
        video_frames += 1;
    }

    info!(video_frames, audio_samples = audio_samples_read, "read finished");
    println!(
        "Read {} video frames and {} audio sample frames",
        video_frames, audio_samples_read
    );
    Ok(())
}

/// Writes the views of `frame` as PNG.
///
/// Separate streams produce one image per eye; other layouts are written as
/// the full decoded frame. Planar YUV frames are written as their luma plane.
fn save_views(frame: &VideoFrame, dir: &Path, index: usize) -> Result<()> {
    let views: &[(usize, &str)] = if frame.stereo_layout == StereoLayout::SeparateStreams {
        &[(0, "left"), (1, "right")]
    } else {
        &[(0, "frame")]
    };

    for &(view, name) in views {
        let planes = frame.view_planes(view);
        let Some(plane) = planes.first() else {
            bail!("Frame {index} has no data for the {name} view");
        };
        let path = dir.join(format!("{name}_{index:06}.png"));
        let (width, height) = (frame.raw_width, frame.raw_height);

        let saved = match frame.pixel_format {
            PixelFormat::Bgra32 => {
                let rgba = image::RgbaImage::from_raw(width, height, bgra_to_rgba(plane, width, height))
                    .context("Invalid BGRA frame size")?;
                rgba.save(&path)
            }
            _ => {
                let luma = image::GrayImage::from_raw(width, height, packed_rows(plane, width as usize, height))
                    .context("Invalid luma plane size")?;
                luma.save(&path)
            }
        };
        saved.with_context(|| format!("Failed to save {}", path.display()))?;
    }
    Ok(())
}

/// Copies `height` rows of `row_bytes` bytes, dropping line padding
fn packed_rows(plane: &Plane, row_bytes: usize, height: u32) -> Vec<u8> {
    plane
        .data
        .chunks(plane.line_size.max(1))
        .take(height as usize)
        .flat_map(|row| &row[..row_bytes.min(row.len())])
        .copied()
        .collect()
}

fn bgra_to_rgba(plane: &Plane, width: u32, height: u32) -> Vec<u8> {
    let mut data = packed_rows(plane, width as usize * 4, height);
    for pixel in data.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
    data
}
