//! Turning decoded frames into frames of the combined input

use s3d_core::VideoFrame;
use tracing::warn;

/// Applies the negotiated interpretation to freshly decoded frames.
///
/// `views` holds one decoded frame per eye source: one for single-stream
/// layouts, two for separate streams. Any missing view means the end of the
/// combined stream.
pub fn compose_frame(template: &VideoFrame, views: Vec<Option<VideoFrame>>) -> Option<VideoFrame> {
    let mut views = views.into_iter();
    let mut frame = views.next()??;

    if !template.stereo_layout.is_single_stream() {
        let right = views.next()??;
        if right.raw_width != frame.raw_width || right.raw_height != frame.raw_height {
            warn!(
                left_width = frame.raw_width,
                left_height = frame.raw_height,
                right_width = right.raw_width,
                right_height = right.raw_height,
                "left and right frames differ in size"
            );
        }
        let [right_view, _] = right.data;
        frame.data[1] = right_view;
    }

    frame.stereo_layout = template.stereo_layout;
    frame.stereo_layout_swap = template.stereo_layout_swap;
    frame.set_view_dimensions();
    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use s3d_core::{PixelFormat, Plane, StereoLayout};

    fn decoded(fill: u8, pts: i64, layout: StereoLayout) -> VideoFrame {
        let mut frame = VideoFrame::template(4, 2, 2.0, PixelFormat::Bgra32);
        frame.stereo_layout = layout;
        frame.set_view_dimensions();
        frame.data[0] = vec![Plane::new(vec![fill; 32], 16)];
        frame.presentation_time = pts;
        frame
    }

    #[test]
    fn test_single_stream_takes_template_layout() {
        let mut template = VideoFrame::template(4, 2, 2.0, PixelFormat::Bgra32);
        template.stereo_layout = StereoLayout::SideBySide;
        template.stereo_layout_swap = true;
        template.set_view_dimensions();

        let frame = compose_frame(&template, vec![Some(decoded(1, 40, StereoLayout::Mono))]).unwrap();
        assert_eq!(frame.stereo_layout, StereoLayout::SideBySide);
        assert!(frame.stereo_layout_swap);
        assert_eq!(frame.width, 2);
        assert_eq!(frame.presentation_time, 40);
        assert!(frame.data[1].is_empty());
    }

    #[test]
    fn test_separate_streams_are_merged() {
        let mut template = VideoFrame::template(4, 2, 2.0, PixelFormat::Bgra32);
        template.stereo_layout = StereoLayout::SeparateStreams;

        let frame = compose_frame(
            &template,
            vec![
                Some(decoded(1, 80, StereoLayout::Mono)),
                Some(decoded(2, 81, StereoLayout::Mono)),
            ],
        )
        .unwrap();
        assert_eq!(frame.stereo_layout, StereoLayout::SeparateStreams);
        assert_eq!(frame.width, 4);
        assert_eq!(frame.presentation_time, 80);
        assert_eq!(frame.view_planes(0)[0].data[0], 1);
        assert_eq!(frame.view_planes(1)[0].data[0], 2);
    }

    #[test]
    fn test_missing_view_ends_stream() {
        let mut template = VideoFrame::template(4, 2, 2.0, PixelFormat::Bgra32);
        template.stereo_layout = StereoLayout::SeparateStreams;

        assert!(compose_frame(&template, vec![Some(decoded(1, 0, StereoLayout::Mono)), None]).is_none());
        assert!(compose_frame(&template, vec![None, Some(decoded(1, 0, StereoLayout::Mono))]).is_none());
        assert!(compose_frame(&template, vec![]).is_none());
    }
}
