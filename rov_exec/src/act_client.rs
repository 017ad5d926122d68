//! # Actuator client
//!
//! The link to the rover's drive electronics. The control loop and the dispatcher only ever talk
//! to the actuators through the [`ActuatorSink`] trait, shared between them as a
//! [`SharedActuator`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, Mutex};

use comms_if::eqpt::act::{ActDemand, SteeringCommand, ThrottleCommand};
use log::info;

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// An actuator sink shared between threads.
pub type SharedActuator = Arc<Mutex<Box<dyn ActuatorSink>>>;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Something which can drive the rover.
pub trait ActuatorSink: Send {
    /// Command the steering.
    fn turn(&mut self, steering: SteeringCommand) -> Result<(), ActError>;

    /// Command the throttle.
    fn set_speed(&mut self, throttle: ThrottleCommand) -> Result<(), ActError>;

    /// Send a raw token, such as a manual movement or the halt manoeuvre.
    fn direct_command(&mut self, token: &str) -> Result<(), ActError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An actuator sink which logs every token it would transmit.
#[derive(Debug, Default)]
pub struct LogActuator;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ActError {
    #[error("The actuator link is closed")]
    LinkClosed,

    #[error("Could not send {0:?} to the actuators: {1}")]
    SendFailed(String, String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LogActuator {
    pub fn new() -> Self {
        Self
    }

    fn send(&mut self, demand: ActDemand) {
        info!("Sending command: {}", demand);
    }
}

impl ActuatorSink for LogActuator {
    fn turn(&mut self, steering: SteeringCommand) -> Result<(), ActError> {
        self.send(ActDemand::Turn(steering));
        Ok(())
    }

    fn set_speed(&mut self, throttle: ThrottleCommand) -> Result<(), ActError> {
        self.send(ActDemand::SetSpeed(throttle));
        Ok(())
    }

    fn direct_command(&mut self, token: &str) -> Result<(), ActError> {
        self.send(ActDemand::Direct(token.to_string()));
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Wrap a sink so it can be shared between the dispatcher and the control loop.
pub fn share(sink: Box<dyn ActuatorSink>) -> SharedActuator {
    Arc::new(Mutex::new(sink))
}

/// Stop the rover: the halt manoeuvre followed by zero throttle.
///
/// Both demands are attempted even if the first fails.
pub fn hard_stop(sink: &mut dyn ActuatorSink, halt_token: &str) -> Result<(), ActError> {
    let halt = sink.direct_command(halt_token);
    let zero = sink.set_speed(ThrottleCommand::ZERO);
    halt.and(zero)
}

// ------------------------------------------------------------------------------------------------
// TEST SUPPORT
// ------------------------------------------------------------------------------------------------

/// Records every demand so that tests can inspect what reached the actuators.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct RecordingActuator {
    pub demands: Arc<Mutex<Vec<ActDemand>>>,
}

#[cfg(test)]
impl RecordingActuator {
    /// Take all demands recorded so far, as tokens.
    pub fn take_tokens(&self) -> Vec<String> {
        self.demands
            .lock()
            .unwrap()
            .drain(..)
            .map(|d| d.to_token())
            .collect()
    }
}

#[cfg(test)]
impl ActuatorSink for RecordingActuator {
    fn turn(&mut self, steering: SteeringCommand) -> Result<(), ActError> {
        self.demands.lock().unwrap().push(ActDemand::Turn(steering));
        Ok(())
    }

    fn set_speed(&mut self, throttle: ThrottleCommand) -> Result<(), ActError> {
        self.demands.lock().unwrap().push(ActDemand::SetSpeed(throttle));
        Ok(())
    }

    fn direct_command(&mut self, token: &str) -> Result<(), ActError> {
        self.demands
            .lock()
            .unwrap()
            .push(ActDemand::Direct(token.to_string()));
        Ok(())
    }
}
