//! Parameters structure for the control law

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::act::MAX_DEMAND;
use serde::{Deserialize, Serialize};

use super::CtrlLawError;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Control law constants for a single sign profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CtrlLawParams {

    // ---- THROTTLE ----

    /// Box area at or below which the maximum forward throttle is commanded.
    ///
    /// Units: pixels^2
    pub min_area: f64,

    /// Box area above which the rover backs off.
    ///
    /// Units: pixels^2
    pub max_area: f64,

    /// Forward throttle commanded when the box area reaches `max_area`.
    pub min_throttle: u8,

    /// Forward throttle commanded when the box area is at or below `min_area`.
    pub max_throttle: u8,

    /// Area excess per unit of backward throttle.
    ///
    /// Units: pixels^2
    pub backward_accel_const: f64,

    /// Upper limit on the backward throttle.
    pub max_backward_throttle: u8,

    // ---- STEERING ----

    /// Left edge of the straight ahead dead band as a fraction of the image width.
    pub dead_band_left: f64,

    /// Right edge of the straight ahead dead band as a fraction of the image width.
    pub dead_band_right: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl CtrlLawParams {
    /// Check that the constants describe a usable control law.
    pub fn check(&self) -> Result<(), CtrlLawError> {
        if !(self.min_area >= 0.0 && self.min_area < self.max_area) {
            return Err(CtrlLawError::InvalidAreaRange(self.min_area, self.max_area));
        }

        if self.min_throttle > self.max_throttle
            || self.max_throttle > MAX_DEMAND
            || self.max_backward_throttle > MAX_DEMAND
        {
            return Err(CtrlLawError::InvalidThrottleRange(
                self.min_throttle,
                self.max_throttle,
            ));
        }

        if !(self.backward_accel_const > 0.0) {
            return Err(CtrlLawError::InvalidBackwardConst(self.backward_accel_const));
        }

        if !(self.dead_band_left > 0.0
            && self.dead_band_left <= self.dead_band_right
            && self.dead_band_right < 1.0)
        {
            return Err(CtrlLawError::InvalidDeadBand(
                self.dead_band_left,
                self.dead_band_right,
            ));
        }

        Ok(())
    }
}
