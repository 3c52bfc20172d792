//! Input configuration

use crate::StereoLayout;

/// Options applied when an input is opened
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct InputConfig {
    /// Open inputs with two compatible video streams as separate left/right streams
    pub prefer_separate_streams: bool,
    /// Stereo layout to apply after opening instead of the source default
    pub stereo_layout: Option<StereoLayout>,
    /// Exchange left and right when `stereo_layout` is applied
    pub swap_eyes: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            prefer_separate_streams: true,
            stereo_layout: None,
            swap_eyes: false,
        }
    }
}
