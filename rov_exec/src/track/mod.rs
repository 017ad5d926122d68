//! # Tracking module
//!
//! Turns the noisy per-frame detections into at most one trusted target per cycle, and keeps
//! track of how long the target has been lost for.
//!
//! The tracking state machine has three states:
//!
//! - `Seeking`: there is no valid track, the next detection will be accepted as a bootstrap.
//! - `Tracking`: a valid track exists and the target has not been lost for long.
//! - `Backoff`: the target has been lost for more than the profile's failure threshold and the
//!   rover has been halted. Only a new trusted acquisition leaves this state.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod ctrl_state;
mod filter;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

pub use ctrl_state::*;
pub use filter::*;

use nalgebra::Point2;
use serde::Serialize;

use crate::per::BoundingBox;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Geometry of the last trusted box.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Track {
    /// Centroid of the box in pixels
    pub center: Point2<f64>,

    /// Area of the box in square pixels
    pub area: f64,

    /// `false` once the track has been cleared on backoff
    pub valid: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, Serialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    Seeking,
    Tracking,
    Backoff,
}

/// Outcome of updating the state machine for one cycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TrackEvent {
    /// A trusted box was found while not already tracking.
    Acquired,

    /// A trusted box was found while tracking.
    Held,

    /// No trusted box this cycle, the value being the consecutive failure count.
    Missed(u32),

    /// The failure threshold has just been exceeded, the rover must be halted.
    Halt,

    /// Still lost after the halt.
    BackedOff,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Track {
    /// A valid track following the given box.
    pub fn from_bbox(bbox: &BoundingBox) -> Self {
        Self {
            center: bbox.centroid(),
            area: bbox.area(),
            valid: true,
        }
    }
}
