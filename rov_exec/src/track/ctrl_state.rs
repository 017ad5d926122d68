//! Control state and the track/failure state machine

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::cmd::{Mode, ProfileId};
use log::{debug, info, warn};

use super::{Track, TrackEvent, TrackState};
use crate::per::BoundingBox;
use crate::profile::FailurePolicy;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// State of the autonomous controller, owned by the control loop.
///
/// `mode`, `blocked` and `active_profile` are copies of the dispatcher's shared state, refreshed
/// at the start of every cycle.
#[derive(Debug, Clone)]
pub struct ControlState {
    pub mode: Mode,
    pub blocked: bool,
    pub active_profile: ProfileId,

    /// Number of consecutive cycles without a trusted box
    pub failure_count: u32,

    /// The last trusted geometry, `None` until the first acquisition
    pub track: Option<Track>,

    /// If true the next detection is accepted without gating
    pub first_acquisition: bool,

    state: TrackState,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl ControlState {
    pub fn new(mode: Mode, blocked: bool, active_profile: ProfileId) -> Self {
        Self {
            mode,
            blocked,
            active_profile,
            failure_count: 0,
            track: None,
            first_acquisition: true,
            state: TrackState::Seeking,
        }
    }

    /// Current state of the tracking state machine.
    pub fn state(&self) -> TrackState {
        self.state
    }

    /// Returns true if there is a track that candidates can be gated against.
    pub fn has_valid_track(&self) -> bool {
        self.track.map(|t| t.valid).unwrap_or(false)
    }

    /// Start a new tracking session for the given profile, forgetting the track.
    pub fn reset(&mut self, profile: ProfileId) {
        debug!("Tracking session reset for profile {}", profile);

        self.active_profile = profile;
        self.failure_count = 0;
        self.track = None;
        self.first_acquisition = true;
        self.state = TrackState::Seeking;
    }

    /// Record a trusted box, superseding the track.
    pub fn record_trusted(&mut self, bbox: &BoundingBox) -> TrackEvent {
        self.track = Some(Track::from_bbox(bbox));
        self.first_acquisition = false;
        self.failure_count = 0;

        match self.state {
            TrackState::Tracking => TrackEvent::Held,
            prev => {
                if prev == TrackState::Backoff {
                    info!("Target reacquired");
                }
                else {
                    info!("Target acquired");
                }
                self.state = TrackState::Tracking;
                TrackEvent::Acquired
            }
        }
    }

    /// Record a cycle without a trusted box.
    ///
    /// Returns `TrackEvent::Halt` exactly once, on the cycle where the failure count first exceeds
    /// the policy's threshold.
    pub fn record_failure(&mut self, policy: &FailurePolicy) -> TrackEvent {
        self.failure_count = self.failure_count.saturating_add(1);

        if self.state == TrackState::Backoff {
            return TrackEvent::BackedOff;
        }

        if self.failure_count > policy.threshold {
            warn!(
                "Target lost for {} cycles (threshold {}), halting",
                self.failure_count, policy.threshold
            );

            self.state = TrackState::Backoff;

            if policy.clear_track_on_backoff {
                if let Some(t) = self.track.as_mut() {
                    t.valid = false;
                }
                self.first_acquisition = true;
            }

            return TrackEvent::Halt;
        }

        TrackEvent::Missed(self.failure_count)
    }
}
