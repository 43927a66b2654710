//! Spline playback settings.

use serde::{Deserialize, Serialize};

/// How a driver plays a spline back: where to start in spline-local x, how
/// fast to advance, whether to wrap at the end, and how long to blend from
/// the previous state when (re)targeting.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SplinePlayback {
    /// Starting playhead position in spline-local x.
    pub start_x: f32,
    /// Playhead advance per caller time unit. 0 freezes playback.
    pub playback_rate: f32,
    /// Wrap the playhead back to the spline start when it passes the end.
    pub repeat: bool,
    /// Cross-fade window (in spline-local x) when blending from a previous
    /// drive state. 0 snaps.
    pub blend_x: f32,
}

impl Default for SplinePlayback {
    fn default() -> Self {
        Self {
            start_x: 0.0,
            playback_rate: 1.0,
            repeat: false,
            blend_x: 0.0,
        }
    }
}

impl SplinePlayback {
    pub fn looping(rate: f32) -> Self {
        Self {
            playback_rate: rate,
            repeat: true,
            ..Self::default()
        }
    }
}
