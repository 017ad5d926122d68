//! # Rover Executable Parameters
//!
//! This module provide parameters for the rover executable, loaded from `rov_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RovExecParams {
    /// Target period of one control loop cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Name of the profile table file in the params directory
    #[serde(default = "default_profiles_file")]
    pub profiles_file: String,

    /// Write the autonomous controller's status reports to the session archive
    #[serde(default)]
    pub archive: bool,

    /// Number of consecutive cycle overruns after which a warning is escalated to an error
    #[serde(default = "default_overrun_limit")]
    pub max_consec_overruns: u64,

    pub dispatch: DispatchParams,

    /// Settings of the simulated camera, only used with the `sim` feature
    #[serde(default)]
    pub sim: SimParams,
}

/// Settings of the simulated camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Frame size.
    ///
    /// Units: pixels
    pub width: u32,
    pub height: u32,

    /// Period between frames.
    ///
    /// Units: seconds
    pub frame_period_s: f64,

    /// Colour of the target sign
    pub target_rgb: [u8; 3],

    /// Smallest and largest side length of the target as it approaches and recedes.
    ///
    /// Units: pixels
    pub target_size_range_px: [u32; 2],

    /// Amplitude of the target's side to side motion.
    ///
    /// Units: pixels
    pub sway_amplitude_px: f64,

    /// Period of the target's side to side and approach motion.
    ///
    /// Units: seconds
    pub motion_period_s: f64,

    /// Every `occlusion_period_frames` frames the target is hidden for `occlusion_frames`
    /// frames. Zero disables occlusions.
    pub occlusion_period_frames: u64,
    pub occlusion_frames: u64,

    /// Spatial scale of the Perlin noise background
    pub noise_scale: f64,

    /// Number of frames after which the camera fails, simulating a disconnection. `None` means
    /// the camera never fails.
    pub fail_after_frames: Option<u64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_period_s: 0.05,
            target_rgb: [220, 30, 30],
            target_size_range_px: [24, 96],
            sway_amplitude_px: 160.0,
            motion_period_s: 20.0,
            occlusion_period_frames: 0,
            occlusion_frames: 0,
            noise_scale: 0.02,
            fail_after_frames: None,
        }
    }
}

fn default_profiles_file() -> String {
    "profiles.toml".into()
}

fn default_overrun_limit() -> u64 {
    50
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::cmd::{Mode, ProfileId};

    #[test]
    fn test_parse() {
        let p: RovExecParams = util::params::from_str(
            r#"
            cycle_period_s = 0.1

            [dispatch]
            manual_markers = ["F", "B", "L", "R"]
            halt_token = "H"
            initial_mode = "manual"
            initial_profile = "give_way"

            [sim]
            occlusion_period_frames = 100
            occlusion_frames = 10
            "#,
        )
        .unwrap();

        assert_eq!(p.cycle_period_s, 0.1);
        assert_eq!(p.profiles_file, "profiles.toml");
        assert!(!p.archive);
        assert_eq!(p.dispatch.manual_markers, vec!['F', 'B', 'L', 'R']);
        assert_eq!(p.dispatch.initial_mode, Mode::Manual);
        assert_eq!(p.dispatch.initial_profile, ProfileId::GiveWay);
        assert!(p.dispatch.block_gates_manual);
        assert!(!p.dispatch.initially_blocked);
        assert_eq!(p.sim.occlusion_frames, 10);
        assert_eq!(p.sim.width, 640);
    }
}
