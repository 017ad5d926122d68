//! # Camera Equipment Communications Module

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use image::RgbImage;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single frame acquired from the rover's camera.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Sequence number of the frame, incremented by the source for every acquisition
    pub seq: u64,

    /// UTC timestamp at which the frame was acquired
    pub timestamp: DateTime<Utc>,

    /// The image itself
    pub image: RgbImage
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Frame {
    /// Build a frame stamped with the current time.
    pub fn now(seq: u64, image: RgbImage) -> Self {
        Self {
            seq,
            timestamp: Utc::now(),
            image
        }
    }

    /// Width of the frame in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height of the frame in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Age of the frame in seconds relative to `now`.
    pub fn age_s(&self, now: DateTime<Utc>) -> f64 {
        now.signed_duration_since(self.timestamp).num_milliseconds() as f64 * 0.001
    }
}
