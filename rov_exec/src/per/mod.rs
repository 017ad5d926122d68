//! # Perception module
//!
//! The perception collaborators of the autonomy core. The camera, the object detector and the
//! appearance similarity oracle are external to the core, which only sees them through the
//! traits defined here.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod bbox;
mod frame_cell;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

pub use bbox::*;
pub use frame_cell::*;

use comms_if::eqpt::cam::Frame;
use image::RgbImage;

use crate::profile::{ReferenceAppearance, SignProfile};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of camera frames.
pub trait FrameSource: Send {
    /// Block until the next frame has been acquired and return it.
    fn next_frame(&mut self) -> Result<Frame, FrameSourceError>;
}

/// Detects candidate sign locations in a frame.
pub trait Detector: Send {
    /// Return the bounding boxes of all candidates for the given profile's sign, possibly none.
    fn detect(&mut self, frame: &Frame, profile: &SignProfile) -> Vec<BoundingBox>;
}

/// Compares an image region against a reference appearance.
pub trait SimilarityOracle: Send {
    /// Distance-like score between the region and the reference, lower is more similar.
    fn score(&self, region: &RgbImage, reference: &ReferenceAppearance) -> f64;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FrameSourceError {
    #[error("The frame source has been closed")]
    Closed,

    #[error("Could not acquire a frame: {0}")]
    AcquisitionFailed(String),
}
