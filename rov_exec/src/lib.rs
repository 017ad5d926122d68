//! # Rover library.
//!
//! The autonomy core of the sign following rover, shared between the rover executable and the
//! benchmarks.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuator client - the link to the drive electronics
pub mod act_client;

/// Autonomous controller - detection, tracking and control law for one frame
pub mod auto_ctrl;

/// Autonomous control loop - runs the controller at a fixed rate in its own thread
pub mod auto_loop;

/// Command processor - executes operator command tokens
pub mod cmd_processor;

/// Command sources - stdin and command scripts
pub mod cmd_source;

/// Control law - converts the trusted box geometry into steering and throttle
pub mod ctrl_law;

/// Rover context - state shared between the executable's threads
pub mod ctx;

/// Mode dispatcher - decides who is driving the rover
pub mod dispatch;

pub mod params;

/// Perception - frames, bounding boxes and the vision collaborators
pub mod per;

/// Sign profiles
pub mod profile;

/// Simulated camera and vision collaborators
#[cfg(feature = "sim")]
pub mod sim;

/// Tracking - continuity filter and the track/failure state machine
pub mod track;
