//! Throttle calculation

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::act::ThrottleCommand;
use util::maths::{clamp, lin_map};

use super::CtrlLawParams;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Calculate the throttle demand for a trusted box of the given area.
///
/// Between `min_area` and `max_area` the forward throttle falls linearly from `max_throttle` to
/// `min_throttle`. Above `max_area` the rover is too close and reverses, with a magnitude of one
/// unit per `backward_accel_const` of excess area, limited to `max_backward_throttle`.
pub fn calc_throttle(area: f64, params: &CtrlLawParams) -> ThrottleCommand {
    if area > params.max_area {
        let excess = ((area - params.max_area) / params.backward_accel_const).floor();
        let mag = excess.min(params.max_backward_throttle as f64);

        ThrottleCommand::backward(mag as u8)
    }
    else {
        let min_t = params.min_throttle as f64;
        let max_t = params.max_throttle as f64;

        let t = clamp(
            lin_map((params.max_area, params.min_area), (min_t, max_t), area),
            min_t,
            max_t,
        );

        // Truncation towards zero, the value being non-negative
        ThrottleCommand::forward(t as u8)
    }
}
