//! # Command module
//!
//! Operator commands arrive as short text tokens. This module parses them into a tagged
//! [`Command`] so that the rest of the software never inspects raw strings.
//!
//! Token grammar (keywords are case insensitive):
//!
//! | Token         | Command                          |
//! |---------------|----------------------------------|
//! | `HALT`        | `Halt`                           |
//! | `GO`          | `Go`                             |
//! | `MODE`        | `ModeSwitch` (toggle)            |
//! | `MANUAL`      | `SetMode(Mode::Manual)`          |
//! | `AUTO`        | `SetMode(Mode::Auto)`            |
//! | `P:<profile>` | `ProfileSwitch(id)`              |
//! | `S<0..100>A`  | `Steer(value)`                   |
//! | anything else | `ManualMove(token)` if the first character is an allowed movement marker |

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Prefix of a profile switch token
const PROFILE_PREFIX: &str = "P:";

/// Maximum value of a steer token
pub const MAX_STEER: u8 = 100;

// ------------------------------------------------------------------------------------------------
// ENUMERATIONS
// ------------------------------------------------------------------------------------------------

/// Who is driving the rover.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Operator tokens are passed straight through to the actuators.
    Manual,

    /// The autonomous control loop drives the actuators.
    Auto
}

/// Identifiers of the sign profiles the rover knows how to follow.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum ProfileId {
    Stop,
    GiveWay,
    Crosswalk,
    Parking
}

/// A parsed operator command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Command {
    /// Manual steering demand in [0, 100], 50 being straight ahead.
    Steer(u8),

    /// A raw manual movement token, forwarded verbatim to the actuators.
    ManualMove(String),

    /// Toggle between manual and automatic modes.
    ModeSwitch,

    /// Switch to the given mode.
    SetMode(Mode),

    /// Select the active sign profile.
    ProfileSwitch(ProfileId),

    /// Block all actuation and stop the rover.
    Halt,

    /// Unblock actuation.
    Go
}

/// Possible parsing errors.
#[derive(Debug, Error, PartialEq)]
pub enum CmdParseError {
    #[error("The command token is empty")]
    Empty,

    #[error("Steer value {0} is outside of [0, 100]")]
    InvalidSteer(String),

    #[error("{0:?} is not a recognised profile")]
    UnknownProfile(String),

    #[error("Token {0:?} does not start with an allowed movement marker")]
    UnauthorisedMarker(String)
}

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Parses command tokens against a set of allowed manual movement markers.
#[derive(Debug, Clone)]
pub struct CmdParser {
    markers: Vec<char>
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Mode {
    /// Get the other mode.
    pub fn toggled(self) -> Self {
        match self {
            Mode::Manual => Mode::Auto,
            Mode::Auto => Mode::Manual
        }
    }
}

impl ProfileId {
    /// All known profiles.
    pub const ALL: [ProfileId; 4] = [
        ProfileId::Stop,
        ProfileId::GiveWay,
        ProfileId::Crosswalk,
        ProfileId::Parking
    ];

    /// The name of the profile as used in tokens and parameter files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileId::Stop => "stop",
            ProfileId::GiveWay => "give_way",
            ProfileId::Crosswalk => "crosswalk",
            ProfileId::Parking => "parking"
        }
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileId {
    type Err = CmdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProfileId::ALL
            .iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| CmdParseError::UnknownProfile(s.to_string()))
    }
}

impl CmdParser {
    /// Create a new parser accepting manual tokens starting with any of `markers`.
    pub fn new(markers: &[char]) -> Self {
        Self {
            markers: markers.to_vec()
        }
    }

    /// Returns true if the token's first character is an allowed movement marker.
    pub fn is_authorised(&self, token: &str) -> bool {
        token
            .chars()
            .next()
            .map(|c| self.markers.contains(&c))
            .unwrap_or(false)
    }

    /// Parse a raw token into a command.
    pub fn parse(&self, token: &str) -> Result<Command, CmdParseError> {
        let token = token.trim();

        if token.is_empty() {
            return Err(CmdParseError::Empty)
        }

        // Keywords first
        for (kw, cmd) in [
            ("HALT", Command::Halt),
            ("GO", Command::Go),
            ("MODE", Command::ModeSwitch),
            ("MANUAL", Command::SetMode(Mode::Manual)),
            ("AUTO", Command::SetMode(Mode::Auto))
        ].iter() {
            if token.eq_ignore_ascii_case(kw) {
                return Ok(cmd.clone())
            }
        }

        if let Some(name) = token.strip_prefix(PROFILE_PREFIX) {
            return Ok(Command::ProfileSwitch(name.parse()?))
        }

        if let Some(value) = parse_steer(token) {
            return value.map(Command::Steer)
        }

        if self.is_authorised(token) {
            Ok(Command::ManualMove(token.to_string()))
        }
        else {
            Err(CmdParseError::UnauthorisedMarker(token.to_string()))
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse a steer token of the form `S<digits>A`.
///
/// Returns `None` if the token doesn't have the steer shape, so that it may still be treated as
/// a manual move.
fn parse_steer(token: &str) -> Option<Result<u8, CmdParseError>> {
    let digits = token.strip_prefix('S')?.strip_suffix('A')?;

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None
    }

    Some(match digits.parse::<u16>() {
        Ok(v) if v <= MAX_STEER as u16 => Ok(v as u8),
        _ => Err(CmdParseError::InvalidSteer(digits.to_string()))
    })
}
