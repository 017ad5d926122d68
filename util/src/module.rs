//! # Cyclic modules
//!
//! Anything the control loop steps once per cycle implements [`State`]: it is initialised once
//! against the session, so it can open its archives, then handed one input per cycle, typically
//! a camera frame and a snapshot of the operator state.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::session::Session;

// ---------------------------------------------------------------------------
// MODULE STATE
// ---------------------------------------------------------------------------

/// A module stepped by the control loop.
pub trait State {
    type InitData;
    type InitError;

    /// What the loop hands the module each cycle
    type InputData;

    /// Demands for the rest of the rover
    type OutputData;

    /// Flat per-cycle record, suitable for a CSV archive row
    type StatusReport;

    type ProcError;

    /// Prepare the module for the session, before the first cycle.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>;

    /// Process one cycle's input.
    ///
    /// A `ProcError` only loses the current cycle, the loop carries on with the next input.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}
