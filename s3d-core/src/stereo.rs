//! Stereo layouts and their per-view geometry

use std::fmt;
use std::str::FromStr;

/// How the left and right views are arranged in the decoded video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StereoLayout {
    /// One view only (2D)
    #[default]
    Mono,
    /// Left and right views come from two independent video streams
    SeparateStreams,
    /// Frame-sequential: left and right views alternate frame by frame
    Alternating,
    /// Full-resolution views stacked vertically
    TopBottom,
    /// Half-height views stacked vertically
    TopBottomHalf,
    /// Full-resolution views next to each other
    SideBySide,
    /// Half-width views next to each other
    SideBySideHalf,
    /// Even rows hold the left view, odd rows the right view
    InterleavedRows,
    /// Even columns hold the left view, odd columns the right view
    InterleavedColumns,
    /// Views alternate pixel by pixel in a checkerboard pattern
    Checkerboard,
    AnaglyphRedCyan,
    AnaglyphGreenMagenta,
    AnaglyphAmberBlue,
}

impl StereoLayout {
    /// Every layout, in declaration order
    pub const ALL: [StereoLayout; 13] = [
        StereoLayout::Mono,
        StereoLayout::SeparateStreams,
        StereoLayout::Alternating,
        StereoLayout::TopBottom,
        StereoLayout::TopBottomHalf,
        StereoLayout::SideBySide,
        StereoLayout::SideBySideHalf,
        StereoLayout::InterleavedRows,
        StereoLayout::InterleavedColumns,
        StereoLayout::Checkerboard,
        StereoLayout::AnaglyphRedCyan,
        StereoLayout::AnaglyphGreenMagenta,
        StereoLayout::AnaglyphAmberBlue,
    ];

    /// Canonical name, as accepted by `FromStr`
    pub fn name(&self) -> &'static str {
        match self {
            StereoLayout::Mono => "mono",
            StereoLayout::SeparateStreams => "separate-streams",
            StereoLayout::Alternating => "alternating",
            StereoLayout::TopBottom => "top-bottom",
            StereoLayout::TopBottomHalf => "top-bottom-half",
            StereoLayout::SideBySide => "side-by-side",
            StereoLayout::SideBySideHalf => "side-by-side-half",
            StereoLayout::InterleavedRows => "interleaved-rows",
            StereoLayout::InterleavedColumns => "interleaved-columns",
            StereoLayout::Checkerboard => "checkerboard",
            StereoLayout::AnaglyphRedCyan => "anaglyph-red-cyan",
            StereoLayout::AnaglyphGreenMagenta => "anaglyph-green-magenta",
            StereoLayout::AnaglyphAmberBlue => "anaglyph-amber-blue",
        }
    }

    /// Whether both views are packed into a single decoded frame
    pub fn is_single_stream(&self) -> bool {
        !matches!(self, StereoLayout::SeparateStreams)
    }

    /// Checks whether a frame of the given raw size can be split according to this layout.
    ///
    /// `SeparateStreams` is always geometrically fine here; whether an input can
    /// actually provide two streams is decided by the input itself.
    pub fn fits(&self, raw_width: u32, raw_height: u32) -> bool {
        if raw_width == 0 || raw_height == 0 {
            return false;
        }
        match self {
            StereoLayout::SideBySide
            | StereoLayout::SideBySideHalf
            | StereoLayout::InterleavedColumns => raw_width % 2 == 0,
            StereoLayout::TopBottom | StereoLayout::TopBottomHalf | StereoLayout::InterleavedRows => {
                raw_height % 2 == 0
            }
            StereoLayout::Checkerboard => raw_width % 2 == 0 && raw_height % 2 == 0,
            StereoLayout::Mono
            | StereoLayout::SeparateStreams
            | StereoLayout::Alternating
            | StereoLayout::AnaglyphRedCyan
            | StereoLayout::AnaglyphGreenMagenta
            | StereoLayout::AnaglyphAmberBlue => true,
        }
    }

    /// Computes the size and display aspect ratio of one view.
    ///
    /// Returns `(width, height, aspect_ratio)`.
    pub fn view_geometry(&self, raw_width: u32, raw_height: u32, raw_aspect_ratio: f32) -> (u32, u32, f32) {
        match self {
            StereoLayout::SideBySide => (raw_width / 2, raw_height, raw_aspect_ratio / 2.0),
            StereoLayout::SideBySideHalf => (raw_width / 2, raw_height, raw_aspect_ratio),
            StereoLayout::TopBottom => (raw_width, raw_height / 2, raw_aspect_ratio * 2.0),
            StereoLayout::TopBottomHalf | StereoLayout::InterleavedRows => {
                (raw_width, raw_height / 2, raw_aspect_ratio)
            }
            StereoLayout::InterleavedColumns | StereoLayout::Checkerboard => {
                (raw_width / 2, raw_height, raw_aspect_ratio)
            }
            StereoLayout::Mono
            | StereoLayout::SeparateStreams
            | StereoLayout::Alternating
            | StereoLayout::AnaglyphRedCyan
            | StereoLayout::AnaglyphGreenMagenta
            | StereoLayout::AnaglyphAmberBlue => (raw_width, raw_height, raw_aspect_ratio),
        }
    }

    /// Guesses a layout from the frame size alone
    pub fn guess_from_geometry(raw_width: u32, raw_height: u32) -> StereoLayout {
        if raw_width / 2 > raw_height {
            StereoLayout::SideBySide
        } else if raw_height > raw_width {
            StereoLayout::TopBottom
        } else {
            StereoLayout::Mono
        }
    }

    /// Interprets a file name marker such as `movie-lr.mkv`.
    ///
    /// Returns the layout and whether the eyes are swapped.
    pub fn from_file_name(url: &str) -> Option<(StereoLayout, bool)> {
        let file_name = url.rsplit(['/', '\\']).next().unwrap_or(url);
        let stem = match file_name.rfind('.') {
            Some(dot) if dot > 0 => &file_name[..dot],
            _ => file_name,
        };
        let (_, marker) = stem.rsplit_once('-')?;
        let hint = match marker.to_ascii_lowercase().as_str() {
            "2d" => (StereoLayout::Mono, false),
            "lr" => (StereoLayout::SideBySide, false),
            "rl" => (StereoLayout::SideBySide, true),
            "lrh" | "lrq" => (StereoLayout::SideBySideHalf, false),
            "rlh" | "rlq" => (StereoLayout::SideBySideHalf, true),
            "tb" | "ab" => (StereoLayout::TopBottom, false),
            "bt" | "ba" => (StereoLayout::TopBottom, true),
            "tbh" | "abh" | "tbq" | "abq" => (StereoLayout::TopBottomHalf, false),
            "bth" | "bah" | "btq" | "baq" => (StereoLayout::TopBottomHalf, true),
            "eo" => (StereoLayout::InterleavedRows, false),
            "oe" => (StereoLayout::InterleavedRows, true),
            _ => return None,
        };
        Some(hint)
    }

    /// Interprets a Matroska `StereoMode` value as exported by demuxers
    pub fn from_stereo_mode(value: &str) -> Option<(StereoLayout, bool)> {
        let hint = match value.trim().to_ascii_lowercase().as_str() {
            "mono" => (StereoLayout::Mono, false),
            "left_right" => (StereoLayout::SideBySide, false),
            "right_left" => (StereoLayout::SideBySide, true),
            "top_bottom" => (StereoLayout::TopBottom, false),
            "bottom_top" => (StereoLayout::TopBottom, true),
            "row_interleaved_lr" => (StereoLayout::InterleavedRows, false),
            "row_interleaved_rl" => (StereoLayout::InterleavedRows, true),
            "col_interleaved_lr" => (StereoLayout::InterleavedColumns, false),
            "col_interleaved_rl" => (StereoLayout::InterleavedColumns, true),
            "checkerboard_lr" => (StereoLayout::Checkerboard, false),
            "checkerboard_rl" => (StereoLayout::Checkerboard, true),
            "block_lr" => (StereoLayout::Alternating, false),
            "block_rl" => (StereoLayout::Alternating, true),
            "anaglyph_cyan_red" => (StereoLayout::AnaglyphRedCyan, false),
            "anaglyph_green_magenta" => (StereoLayout::AnaglyphGreenMagenta, false),
            _ => return None,
        };
        Some(hint)
    }

    /// Determines the default layout a source should report.
    ///
    /// Geometry gives the first guess, a file name marker overrides it, and a
    /// `stereo_mode`/`StereoMode` tag overrides both. Hints that do not fit the
    /// frame size are ignored.
    pub fn detect<'a, I>(url: &str, tags: I, raw_width: u32, raw_height: u32) -> (StereoLayout, bool)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut detected = (Self::guess_from_geometry(raw_width, raw_height), false);
        if !detected.0.fits(raw_width, raw_height) {
            detected = (StereoLayout::Mono, false);
        }

        let tag_hint = tags
            .into_iter()
            .find(|(name, _)| name.replace('_', "").eq_ignore_ascii_case("stereomode"))
            .and_then(|(_, value)| Self::from_stereo_mode(value));

        for hint in [Self::from_file_name(url), tag_hint].into_iter().flatten() {
            if hint.0.fits(raw_width, raw_height) {
                detected = hint;
            }
        }
        detected
    }
}

impl fmt::Display for StereoLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StereoLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|layout| layout.name() == wanted)
            .ok_or_else(|| format!("unknown stereo layout '{s}'"))
    }
}
