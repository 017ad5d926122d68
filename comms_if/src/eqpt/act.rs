//! # Actuator Equipment Communications Module
//!
//! Demands sent to the rover's drive electronics. Every demand is encoded as a short text token
//! which the actuator link transmits verbatim:
//!
//! - steering: `S<0..100>A`
//! - throttle: `F<0..100>A` forwards, `B<0..100>A` backwards
//! - direct commands (fixed manoeuvres such as a halt): the token itself

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};
use std::fmt;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum value of a steering or throttle demand.
pub const MAX_DEMAND: u8 = 100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Steering demand in [0, 100], 0 being full left, 50 straight ahead and 100 full right.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SteeringCommand(u8);

/// Throttle demand.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ThrottleCommand {
    /// Direction of travel
    pub direction: Direction,

    /// Magnitude in [0, 100]
    pub magnitude: u8
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Direction of travel.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward
}

/// A single demand to the actuators.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub enum ActDemand {
    Turn(SteeringCommand),
    SetSpeed(ThrottleCommand),
    Direct(String)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SteeringCommand {
    /// Straight ahead.
    pub const STRAIGHT: SteeringCommand = SteeringCommand(50);

    /// Build a steering command, saturating the value at 100.
    pub fn new(value: u8) -> Self {
        SteeringCommand(value.min(MAX_DEMAND))
    }

    /// The demand value in [0, 100].
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl ThrottleCommand {
    /// Zero throttle.
    pub const ZERO: ThrottleCommand = ThrottleCommand {
        direction: Direction::Forward,
        magnitude: 0
    };

    /// Build a throttle command, saturating the magnitude at 100.
    pub fn new(direction: Direction, magnitude: u8) -> Self {
        Self {
            direction,
            magnitude: magnitude.min(MAX_DEMAND)
        }
    }

    /// Forward throttle.
    pub fn forward(magnitude: u8) -> Self {
        Self::new(Direction::Forward, magnitude)
    }

    /// Backward throttle.
    pub fn backward(magnitude: u8) -> Self {
        Self::new(Direction::Backward, magnitude)
    }
}

impl ActDemand {
    /// Encode the demand as the token sent over the actuator link.
    pub fn to_token(&self) -> String {
        match self {
            ActDemand::Turn(s) => format!("S{}A", s.value()),
            ActDemand::SetSpeed(t) => match t.direction {
                Direction::Forward => format!("F{}A", t.magnitude),
                Direction::Backward => format!("B{}A", t.magnitude)
            },
            ActDemand::Direct(token) => token.clone()
        }
    }
}

impl fmt::Display for ActDemand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token())
    }
}
