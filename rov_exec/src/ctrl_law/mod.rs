//! # Control law module
//!
//! Maps the geometry of the trusted bounding box onto actuator demands. The same algorithm is used
//! for every sign, only the constants (held in each profile's `ctrl` table) change:
//!
//! - Throttle is driven by the box area, which stands in for range to the sign. Small boxes (far
//!   away) give the most throttle, boxes larger than `max_area` (too close) make the rover back
//!   off.
//! - Steering is driven by the horizontal position of the box centroid relative to a dead band
//!   around the centre of the image.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod calc_steering;
mod calc_throttle;
mod params;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

pub use calc_steering::*;
pub use calc_throttle::*;
pub use params::*;

use comms_if::eqpt::act::{SteeringCommand, ThrottleCommand};
use serde::Serialize;

use crate::per::BoundingBox;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Demands computed from a single trusted box.
#[derive(Debug, Copy, Clone, Serialize, PartialEq)]
pub struct CtrlLawOutput {
    pub steering: SteeringCommand,

    /// Steering value before saturation, kept for the status report
    pub raw_steering: i64,

    pub throttle: ThrottleCommand,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Problems found when checking control law parameters.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CtrlLawError {
    #[error("min_area ({0}) must be non-negative and less than max_area ({1})")]
    InvalidAreaRange(f64, f64),

    #[error("min_throttle ({0}) must not exceed max_throttle ({1}), both being at most 100")]
    InvalidThrottleRange(u8, u8),

    #[error("backward_accel_const must be strictly positive, found {0}")]
    InvalidBackwardConst(f64),

    #[error("Dead band [{0}, {1}] must satisfy 0 < left <= right < 1")]
    InvalidDeadBand(f64, f64),
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Compute the steering and throttle demands for a trusted box in a frame `frame_width` pixels
/// wide.
pub fn apply(bbox: &BoundingBox, frame_width: u32, params: &CtrlLawParams) -> CtrlLawOutput {
    let raw_steering = raw_steering(bbox.centroid().x, frame_width as f64, params);

    CtrlLawOutput {
        steering: saturate_steering(raw_steering),
        raw_steering,
        throttle: calc_throttle(bbox.area(), params),
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use comms_if::eqpt::act::Direction;

    /// Constants used throughout the control law tests, matching a 640 pixel wide camera.
    pub(crate) fn test_params() -> CtrlLawParams {
        CtrlLawParams {
            min_area: 400.0,
            max_area: 7225.0,
            min_throttle: 20,
            max_throttle: 60,
            backward_accel_const: 650.0,
            max_backward_throttle: 30,
            dead_band_left: 0.45,
            dead_band_right: 0.55,
        }
    }

    #[test]
    fn test_apply() {
        let p = test_params();

        // Centred, mid range box
        let out = apply(&BoundingBox::new(300, 200, 40, 40), 640, &p);
        assert_eq!(out.steering, SteeringCommand::STRAIGHT);
        assert_eq!(out.raw_steering, 50);
        assert_eq!(out.throttle.direction, Direction::Forward);

        // Large box well to the left, too close so backing off and steering hard left
        let out = apply(&BoundingBox::new(55, 155, 90, 90), 640, &p);
        assert_eq!(out.raw_steering, 17);
        assert_eq!(out.steering.value(), 0);
        assert_eq!(out.throttle, ThrottleCommand::backward(1));
    }

    #[test]
    fn test_params_check() {
        assert_eq!(test_params().check(), Ok(()));

        let mut p = test_params();
        p.min_area = p.max_area;
        assert_eq!(p.check(), Err(CtrlLawError::InvalidAreaRange(7225.0, 7225.0)));

        let mut p = test_params();
        p.backward_accel_const = 0.0;
        assert_eq!(p.check(), Err(CtrlLawError::InvalidBackwardConst(0.0)));

        let mut p = test_params();
        p.dead_band_left = 0.6;
        assert_eq!(p.check(), Err(CtrlLawError::InvalidDeadBand(0.6, 0.55)));

        let mut p = test_params();
        p.min_throttle = 70;
        assert_eq!(p.check(), Err(CtrlLawError::InvalidThrottleRange(70, 60)));
    }
}
