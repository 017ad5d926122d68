//! # Autonomous controller
//!
//! One cycle of sign following: detection, continuity filtering, the track/failure state machine
//! and the control law. The controller only computes demands, sending them is left to the
//! control loop so that the dispatcher can gate them.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use chrono::Utc;
use comms_if::{
    cmd::{Mode, ProfileId},
    eqpt::{act::Direction, cam::Frame},
};
use log::{debug, trace};
use serde::Serialize;

use crate::{
    ctrl_law::{self, CtrlLawOutput},
    dispatch::ModeSnapshot,
    per::{Detector, SimilarityOracle},
    profile::ProfileTable,
    track::{ContinuityFilter, ControlState, TrackEvent, TrackState},
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Path of the status report archive, relative to the session archive root.
const REPORT_ARCH_PATH: &str = "auto_ctrl/report.csv";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Autonomous controller state.
pub struct AutoCtrl {
    detector: Box<dyn Detector>,
    filter: ContinuityFilter,
    profiles: Arc<ProfileTable>,

    state: ControlState,

    /// Epoch of the current tracking session, `None` before the first cycle
    epoch: Option<u64>,

    num_cycles: u64,

    report: Option<StatusReport>,
    arch_report: Archiver,
}

/// Initialisation data for the controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct InitData {
    /// Archive the status reports
    pub archive: bool,
}

/// Input to one cycle of the controller.
pub struct InputData {
    /// The frame to process
    pub frame: Frame,

    /// Dispatcher state at the start of the cycle
    pub mode: ModeSnapshot,
}

/// Output of one cycle of the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OutputData {
    /// Demands computed from this cycle's trusted box, if there was one
    pub demands: Option<CtrlLawOutput>,

    /// The target has just been declared lost and the rover must be stopped
    pub halt: bool,
}

/// Status report for one cycle, archived as one CSV row.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct StatusReport {
    pub cycle: u64,
    pub frame_seq: u64,
    pub frame_age_s: f64,
    pub mode: Mode,
    pub blocked: bool,
    pub profile: ProfileId,
    pub epoch: u64,
    pub track_state: TrackState,
    pub failure_count: u32,
    pub num_candidates: usize,
    pub num_geom_passed: usize,
    pub num_appearance_passed: usize,
    pub bootstrap: bool,
    pub trusted_cx: Option<f64>,
    pub trusted_cy: Option<f64>,
    pub trusted_area: Option<f64>,
    pub raw_steering: Option<i64>,
    pub steering: Option<u8>,
    pub throttle_dir: Option<Direction>,
    pub throttle_mag: Option<u8>,
    pub halt: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AutoCtrlError {
    #[error("The active profile ({0}) is not in the profile table")]
    UnknownProfile(ProfileId),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl AutoCtrl {
    pub fn new(
        detector: Box<dyn Detector>,
        oracle: Box<dyn SimilarityOracle>,
        profiles: Arc<ProfileTable>,
        initial: ModeSnapshot,
    ) -> Self {
        Self {
            detector,
            filter: ContinuityFilter::new(oracle),
            profiles,
            state: ControlState::new(initial.mode, initial.blocked, initial.profile),
            epoch: None,
            num_cycles: 0,
            report: None,
            arch_report: Archiver::default(),
        }
    }

    /// The controller's state.
    pub fn state(&self) -> &ControlState {
        &self.state
    }

    /// Number of cycles processed.
    pub fn num_cycles(&self) -> u64 {
        self.num_cycles
    }
}

impl State for AutoCtrl {
    type InitData = InitData;
    type InitError = ArchiveError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = AutoCtrlError;

    /// Initialise the controller, opening the status report archive if requested.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        if init_data.archive {
            self.arch_report = Archiver::from_path(session, REPORT_ARCH_PATH)?;
            debug!("AutoCtrl archiving to {}", REPORT_ARCH_PATH);
        }

        Ok(())
    }

    /// Process one frame.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let snap = input_data.mode;
        let frame = &input_data.frame;

        // A new epoch means a new tracking session
        if self.epoch != Some(snap.epoch) {
            self.state.reset(snap.profile);
            self.epoch = Some(snap.epoch);
        }
        self.state.mode = snap.mode;
        self.state.blocked = snap.blocked;
        self.state.active_profile = snap.profile;

        let profile = self
            .profiles
            .get(snap.profile)
            .ok_or(AutoCtrlError::UnknownProfile(snap.profile))?;

        let candidates = self.detector.detect(frame, profile);
        let outcome = self.filter.select(&candidates, frame, &self.state, profile);

        let mut output = OutputData::default();

        match outcome.trusted {
            Some(bbox) => {
                self.state.record_trusted(&bbox);
                output.demands = Some(ctrl_law::apply(&bbox, frame.width(), &profile.ctrl));
            }
            None => {
                if self.state.record_failure(&profile.failure) == TrackEvent::Halt {
                    output.halt = true;
                }
            }
        }

        trace!(
            "AutoCtrl cycle {}: {} candidates, trusted {:?}, output {:?}",
            self.num_cycles,
            candidates.len(),
            outcome.trusted,
            output
        );

        let report = StatusReport {
            cycle: self.num_cycles,
            frame_seq: frame.seq,
            frame_age_s: frame.age_s(Utc::now()),
            mode: snap.mode,
            blocked: snap.blocked,
            profile: snap.profile,
            epoch: snap.epoch,
            track_state: self.state.state(),
            failure_count: self.state.failure_count,
            num_candidates: outcome.num_candidates,
            num_geom_passed: outcome.num_geom_passed,
            num_appearance_passed: outcome.num_appearance_passed,
            bootstrap: outcome.bootstrap,
            trusted_cx: outcome.trusted.map(|b| b.centroid().x),
            trusted_cy: outcome.trusted.map(|b| b.centroid().y),
            trusted_area: outcome.trusted.map(|b| b.area()),
            raw_steering: output.demands.map(|d| d.raw_steering),
            steering: output.demands.map(|d| d.steering.value()),
            throttle_dir: output.demands.map(|d| d.throttle.direction),
            throttle_mag: output.demands.map(|d| d.throttle.magnitude),
            halt: output.halt,
        };

        self.report = Some(report);
        self.num_cycles += 1;

        Ok((output, report))
    }
}

impl Archived for AutoCtrl {
    /// Write the last status report. Does nothing if archiving is disabled.
    fn write(&mut self) -> Result<(), ArchiveError> {
        match self.report {
            Some(r) => match self.arch_report.serialise(r) {
                Err(ArchiveError::NotInitialised) => Ok(()),
                res => res,
            },
            None => Ok(()),
        }
    }
}
