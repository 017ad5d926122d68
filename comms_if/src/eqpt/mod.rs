//! # Equipment Communications Module

/// Actuator demands and their wire tokens
pub mod act;

/// Camera frames
pub mod cam;
