//! # Communications interface crate.
//!
//! Provides the vocabulary shared between the rover core and its boundary: operator commands
//! coming in, and actuator demands and camera frames crossing the equipment interfaces.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Operator command parsing
pub mod cmd;

/// Definitions for equipment (actuators, cameras)
pub mod eqpt;
