//! Steering calculation

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::act::{SteeringCommand, MAX_DEMAND};

use super::CtrlLawParams;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Raw values at or above this are pushed to full right.
const SAT_HIGH: i64 = 80;

/// Raw values at or below this are pushed to full left.
const SAT_LOW: i64 = 20;

/// Offset applied to the right hand side of the steering curve.
const RIGHT_OFFSET: f64 = 12.0;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Calculate the unsaturated steering value for a box centroid at `cx` in an image `width`
/// pixels wide.
pub fn raw_steering(cx: f64, width: f64, params: &CtrlLawParams) -> i64 {
    let straight = SteeringCommand::STRAIGHT.value() as f64;
    let left = params.dead_band_left * width;
    let right = params.dead_band_right * width;

    let raw = if cx < left {
        (straight * cx) / left
    }
    else if cx > right {
        (straight * cx) / (width - right) - RIGHT_OFFSET
    }
    else {
        straight
    };

    raw as i64
}

/// Apply the hard left/right saturation and limit to the demand range.
pub fn saturate_steering(raw: i64) -> SteeringCommand {
    let value = if raw >= SAT_HIGH {
        MAX_DEMAND as i64
    }
    else if raw <= SAT_LOW {
        0
    }
    else {
        raw
    };

    SteeringCommand::new(value.max(0).min(MAX_DEMAND as i64) as u8)
}

/// Calculate the steering demand for a box centroid at `cx` in an image `width` pixels wide.
pub fn calc_steering(cx: f64, width: f64, params: &CtrlLawParams) -> SteeringCommand {
    saturate_steering(raw_steering(cx, width, params))
}
