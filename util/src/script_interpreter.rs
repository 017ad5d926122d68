//! # Rover command script interpreter module
//!
//! This module provides an interpreter for rover command scripts, allowing operator commands to
//! be replayed at fixed times instead of being typed in live.
//!
//! A script is a list of entries of the form `<time_s>: <TOKEN>;`, one per line, for example:
//!
//! ```text
//! 0.5: P:stop;
//! 1.0: AUTO;
//! 20.0: HALT;
//! ```
//!
//! Tokens are not validated here, they're handed as-is to the command parser so that scripted
//! tokens are subject to exactly the same rules as live ones.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use std::path::Path;
use std::fs;
use regex::RegexBuilder;
use thiserror::Error;

// Internal
use crate::session::get_elapsed_seconds;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command token which is scripted to occur at a specific time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptEntry {
    /// The time the command is supposed to execute at
    pub exec_time_s: f64,

    /// The raw command token
    pub token: String
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use `.get_pending_tokens` to
/// acquire a list of command tokens that need executing.
#[derive(Debug)]
pub struct ScriptInterpreter {
    entries: VecDeque<ScriptEntry>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0}")]
    ScriptNotFound(String),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error(
        "Script contains an invalid timestamp: {0}. \
        Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script entries must be in time order, {0} s follows {1} s")]
    OutOfOrder(f64, f64)
}

/// Tokens which are due for execution.
#[derive(Debug, PartialEq)]
pub enum PendingTokens {
    None,
    Some(Vec<String>),
    EndOfScript
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {

    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {

        let path = script_path.as_ref();

        if !path.exists() {
            return Err(
                ScriptError::ScriptNotFound(path.to_string_lossy().to_string()));
        }

        let script = fs::read_to_string(path)
            .map_err(ScriptError::ScriptLoadError)?;

        Self::from_script_str(&script)
    }

    /// Create a new interpreter from the contents of a script.
    pub fn from_script_str(script: &str) -> Result<Self, ScriptError> {

        let mut entries: VecDeque<ScriptEntry> = VecDeque::new();

        // Go through the script executing __the magic regex__.
        let re = RegexBuilder::new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
            .multi_line(true)
            .build()
            .expect("Script regex is invalid");

        for cap in re.captures_iter(script) {
            let time_str = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
            let exec_time_s: f64 = time_str
                .parse()
                .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

            if let Some(prev) = entries.back() {
                if exec_time_s < prev.exec_time_s {
                    return Err(ScriptError::OutOfOrder(exec_time_s, prev.exec_time_s))
                }
            }

            let token = cap.get(3).map(|m| m.as_str().trim()).unwrap_or_default();

            entries.push_back(ScriptEntry {
                exec_time_s,
                token: token.to_string()
            });
        }

        if entries.is_empty() {
            return Err(ScriptError::ScriptEmpty)
        }

        Ok(ScriptInterpreter { entries })
    }

    /// Return the tokens which are due at the current session time.
    pub fn get_pending_tokens(&mut self) -> PendingTokens {
        self.get_pending_tokens_at(get_elapsed_seconds())
    }

    /// Return the tokens which are due at the given time.
    ///
    /// If the queue is empty the script is over and `EndOfScript` is returned.
    pub fn get_pending_tokens_at(&mut self, current_time_s: f64) -> PendingTokens {

        if self.entries.is_empty() {
            return PendingTokens::EndOfScript
        }

        let mut tokens: Vec<String> = vec![];

        while let Some(front) = self.entries.front() {
            if front.exec_time_s >= current_time_s {
                break
            }

            if let Some(entry) = self.entries.pop_front() {
                tokens.push(entry.token);
            }
        }

        if tokens.is_empty() {
            PendingTokens::None
        }
        else {
            PendingTokens::Some(tokens)
        }
    }

    /// Get the number of tokens remaining in the script
    pub fn get_num_tokens(&self) -> usize {
        self.entries.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.entries.back() {
            Some(c) => c.exec_time_s,
            None => 0f64
        }
    }
}
