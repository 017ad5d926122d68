//! # Mode dispatcher
//!
//! Owns the operator facing state of the rover (who is driving, whether actuation is blocked and
//! which sign profile is active) and decides which demands reach the actuators.
//!
//! The state is held behind a mutex shared with the control loop, which takes a
//! [`ModeSnapshot`] at the start of each cycle. Whenever the mutex and the actuator are both
//! needed the state is locked first.
//!
//! Demands from the control loop, including the halt issued when the target is lost, only reach
//! the actuators while the rover is in automatic mode, unblocked, in the tracking session they
//! were computed for, and not shut down. Stops caused by the operator or by shutdown are always
//! sent.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard,
};

use comms_if::{
    cmd::{CmdParser, Command, Mode, ProfileId},
    eqpt::act::{SteeringCommand, ThrottleCommand},
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::act_client::{self, ActError, ActuatorSink, SharedActuator};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Dispatcher parameters, the `[dispatch]` table of `rov_exec.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchParams {
    /// First characters a manual movement token may start with
    pub manual_markers: Vec<char>,

    /// Direct command sent to stop the rover
    pub halt_token: String,

    /// If true a blocked rover also ignores manual movements
    #[serde(default = "default_true")]
    pub block_gates_manual: bool,

    pub initial_mode: Mode,

    pub initial_profile: ProfileId,

    #[serde(default)]
    pub initially_blocked: bool,
}

/// A consistent copy of the dispatcher state.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ModeSnapshot {
    pub mode: Mode,
    pub blocked: bool,
    pub profile: ProfileId,

    /// Incremented every time a new tracking session begins, that is on every profile switch and
    /// every entry into automatic mode
    pub epoch: u64,
}

pub struct ModeDispatcher {
    state: Mutex<ModeSnapshot>,
    actuator: SharedActuator,
    parser: CmdParser,
    halt_token: String,
    block_gates_manual: bool,
    known_profiles: Vec<ProfileId>,

    /// Latched under the state lock by `shutdown`, after which the control loop can no longer
    /// actuate
    shut_down: AtomicBool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// What happened to a manual command.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ManualOutcome {
    Forwarded,
    DroppedUnauthorised,
    DroppedAutoMode,
    DroppedBlocked,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("There is no {0} profile in the profile table")]
    UnknownProfile(ProfileId),

    #[error("Actuator error: {0}")]
    ActError(#[from] ActError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ModeDispatcher {
    pub fn new(
        params: DispatchParams,
        known_profiles: Vec<ProfileId>,
        actuator: SharedActuator,
    ) -> Result<Self, DispatchError> {
        if !known_profiles.contains(&params.initial_profile) {
            return Err(DispatchError::UnknownProfile(params.initial_profile));
        }

        Ok(Self {
            state: Mutex::new(ModeSnapshot {
                mode: params.initial_mode,
                blocked: params.initially_blocked,
                profile: params.initial_profile,
                epoch: 0,
            }),
            actuator,
            parser: CmdParser::new(&params.manual_markers),
            halt_token: params.halt_token,
            block_gates_manual: params.block_gates_manual,
            known_profiles,
            shut_down: AtomicBool::new(false),
        })
    }

    /// The parser for inbound command tokens, configured with the manual movement markers.
    pub fn parser(&self) -> &CmdParser {
        &self.parser
    }

    /// Get a consistent copy of the mode, blocked flag and profile.
    pub fn snapshot(&self) -> ModeSnapshot {
        *self.lock_state()
    }

    /// Switch to the given mode, stopping the rover first. Does nothing if already in `mode`.
    pub fn set_mode(&self, mode: Mode) -> Result<(), DispatchError> {
        let mut state = self.lock_state();

        if state.mode == mode {
            debug!("Already in {:?} mode", mode);
            return Ok(());
        }

        self.change_mode(&mut state, mode)
    }

    /// Switch to the other mode, stopping the rover first.
    pub fn toggle_mode(&self) -> Result<(), DispatchError> {
        let mut state = self.lock_state();
        let mode = state.mode.toggled();
        self.change_mode(&mut state, mode)
    }

    /// Block or unblock actuation.
    pub fn set_blocked(&self, blocked: bool) {
        let mut state = self.lock_state();

        if state.blocked != blocked {
            info!("Actuation {}", if blocked { "blocked" } else { "unblocked" });
        }
        state.blocked = blocked;
    }

    /// Select the active profile, stopping the rover and starting a new tracking session.
    pub fn set_profile(&self, profile: ProfileId) -> Result<(), DispatchError> {
        if !self.known_profiles.contains(&profile) {
            return Err(DispatchError::UnknownProfile(profile));
        }

        let mut state = self.lock_state();

        info!("Profile changed from {} to {}", state.profile, profile);
        state.profile = profile;
        state.epoch += 1;

        Ok(self.stop_locked()?)
    }

    /// Forward a manual movement token to the actuators if the current state allows it.
    pub fn submit_manual_command(&self, token: &str) -> Result<ManualOutcome, DispatchError> {
        if !self.parser.is_authorised(token) {
            debug!("Dropping unauthorised manual command {:?}", token);
            return Ok(ManualOutcome::DroppedUnauthorised);
        }

        let state = self.lock_state();

        if let Some(reason) = self.manual_gate(&state) {
            debug!("Dropping manual command {:?} ({:?})", token, reason);
            return Ok(reason);
        }

        self.lock_actuator().direct_command(token)?;
        Ok(ManualOutcome::Forwarded)
    }

    /// Forward a manual steering demand if the current state allows it.
    pub fn submit_manual_steer(&self, value: u8) -> Result<ManualOutcome, DispatchError> {
        let state = self.lock_state();

        if let Some(reason) = self.manual_gate(&state) {
            debug!("Dropping manual steer {} ({:?})", value, reason);
            return Ok(reason);
        }

        self.lock_actuator().turn(SteeringCommand::new(value))?;
        Ok(ManualOutcome::Forwarded)
    }

    /// Execute a parsed operator command.
    pub fn handle(&self, cmd: Command) -> Result<(), DispatchError> {
        match cmd {
            Command::Steer(v) => self.submit_manual_steer(v).map(|_| ()),
            Command::ManualMove(t) => self.submit_manual_command(&t).map(|_| ()),
            Command::ModeSwitch => self.toggle_mode(),
            Command::SetMode(m) => self.set_mode(m),
            Command::ProfileSwitch(p) => self.set_profile(p),
            Command::Halt => {
                let mut state = self.lock_state();
                state.blocked = true;
                info!("Halt commanded, actuation blocked");
                Ok(self.stop_locked()?)
            }
            Command::Go => {
                self.set_blocked(false);
                Ok(())
            }
        }
    }

    /// Send the autonomous controller's demands, provided the rover is still in automatic mode,
    /// unblocked, and in the tracking session the demands were computed for.
    ///
    /// Returns `true` if the demands were sent.
    pub fn actuate_auto(
        &self,
        epoch: u64,
        steering: SteeringCommand,
        throttle: ThrottleCommand,
    ) -> Result<bool, ActError> {
        let state = self.lock_state();

        if !self.auto_may_actuate(&state, epoch) {
            return Ok(false);
        }

        let mut act = self.lock_actuator();
        act.turn(steering)?;
        act.set_speed(throttle)?;

        Ok(true)
    }

    /// Stop the rover on behalf of the autonomous controller, under the same conditions as
    /// [`ModeDispatcher::actuate_auto`].
    ///
    /// Returns `true` if the stop was sent.
    pub fn actuate_halt(&self, epoch: u64) -> Result<bool, ActError> {
        let state = self.lock_state();

        if !self.auto_may_actuate(&state, epoch) {
            return Ok(false);
        }

        self.stop_locked()?;
        Ok(true)
    }

    /// Stop the rover regardless of mode and blocking.
    pub fn hard_stop(&self) -> Result<(), ActError> {
        let _state = self.lock_state();
        self.stop_locked()
    }

    /// Stop the rover for the last time. Demands from the control loop arriving afterwards are
    /// dropped.
    pub fn shutdown(&self) -> Result<(), ActError> {
        let _state = self.lock_state();
        self.shut_down.store(true, Ordering::SeqCst);
        info!("Dispatcher shut down, autonomous actuation disabled");
        self.stop_locked()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn change_mode(&self, state: &mut ModeSnapshot, mode: Mode) -> Result<(), DispatchError> {
        info!("Mode changed from {:?} to {:?}", state.mode, mode);

        state.mode = mode;
        if mode == Mode::Auto {
            state.epoch += 1;
        }

        Ok(self.stop_locked()?)
    }

    /// Whether the control loop may drive the actuators, the state lock being held by the caller.
    fn auto_may_actuate(&self, state: &ModeSnapshot, epoch: u64) -> bool {
        state.mode == Mode::Auto
            && !state.blocked
            && state.epoch == epoch
            && !self.shut_down.load(Ordering::SeqCst)
    }

    /// Reason to drop a manual demand in the given state, if any.
    fn manual_gate(&self, state: &ModeSnapshot) -> Option<ManualOutcome> {
        if state.mode == Mode::Auto {
            Some(ManualOutcome::DroppedAutoMode)
        }
        else if state.blocked && self.block_gates_manual {
            Some(ManualOutcome::DroppedBlocked)
        }
        else {
            None
        }
    }

    /// Stop the rover, the state lock being held by the caller.
    fn stop_locked(&self) -> Result<(), ActError> {
        let mut act = self.lock_actuator();
        act_client::hard_stop(&mut **act, &self.halt_token).map_err(|e| {
            warn!("Could not stop the rover: {}", e);
            e
        })
    }

    fn lock_state(&self) -> MutexGuard<ModeSnapshot> {
        self.state.lock().expect("Dispatcher state mutex poisoned")
    }

    fn lock_actuator(&self) -> MutexGuard<Box<dyn ActuatorSink>> {
        self.actuator.lock().expect("Actuator mutex poisoned")
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::act_client::RecordingActuator;

    pub(crate) fn test_dispatch_params() -> DispatchParams {
        DispatchParams {
            manual_markers: vec!['F', 'B', 'L', 'R'],
            halt_token: "H".into(),
            block_gates_manual: true,
            initial_mode: Mode::Manual,
            initial_profile: ProfileId::Stop,
            initially_blocked: false,
        }
    }

    pub(crate) fn dispatcher(params: DispatchParams) -> (ModeDispatcher, RecordingActuator) {
        let rec = RecordingActuator::default();
        let d = ModeDispatcher::new(
            params,
            vec![ProfileId::Stop, ProfileId::GiveWay],
            act_client::share(Box::new(rec.clone())),
        )
        .unwrap();
        (d, rec)
    }

    #[test]
    fn test_unknown_initial_profile() {
        let mut p = test_dispatch_params();
        p.initial_profile = ProfileId::Parking;

        let r = ModeDispatcher::new(
            p,
            vec![ProfileId::Stop],
            act_client::share(Box::new(RecordingActuator::default())),
        );
        match r {
            Err(DispatchError::UnknownProfile(ProfileId::Parking)) => (),
            _ => panic!("Expected UnknownProfile"),
        }
    }

    #[test]
    fn test_manual_passthrough() {
        let (d, rec) = dispatcher(test_dispatch_params());

        assert_eq!(d.submit_manual_command("F40A").unwrap(), ManualOutcome::Forwarded);
        assert_eq!(
            d.submit_manual_command("X1").unwrap(),
            ManualOutcome::DroppedUnauthorised
        );
        assert_eq!(d.submit_manual_steer(30).unwrap(), ManualOutcome::Forwarded);

        assert_eq!(rec.take_tokens(), vec!["F40A", "S30A"]);
    }

    #[test]
    fn test_blocking() {
        let (d, rec) = dispatcher(test_dispatch_params());

        d.handle(Command::Halt).unwrap();
        assert!(d.snapshot().blocked);
        assert_eq!(rec.take_tokens(), vec!["H", "F0A"]);

        assert_eq!(d.submit_manual_command("F40A").unwrap(), ManualOutcome::DroppedBlocked);
        assert!(rec.take_tokens().is_empty());

        d.handle(Command::Go).unwrap();
        assert!(!d.snapshot().blocked);
        assert_eq!(d.submit_manual_command("F40A").unwrap(), ManualOutcome::Forwarded);

        // Blocking can be configured to leave manual control alone
        let mut p = test_dispatch_params();
        p.block_gates_manual = false;
        let (d, rec) = dispatcher(p);
        d.set_blocked(true);
        assert_eq!(d.submit_manual_command("L").unwrap(), ManualOutcome::Forwarded);
        assert_eq!(rec.take_tokens(), vec!["L"]);
    }

    #[test]
    fn test_mode_transitions() {
        let (d, rec) = dispatcher(test_dispatch_params());
        let epoch = d.snapshot().epoch;

        // Setting the current mode changes nothing
        d.set_mode(Mode::Manual).unwrap();
        assert!(rec.take_tokens().is_empty());

        d.handle(Command::ModeSwitch).unwrap();
        let s = d.snapshot();
        assert_eq!(s.mode, Mode::Auto);
        assert_eq!(s.epoch, epoch + 1);
        assert_eq!(rec.take_tokens(), vec!["H", "F0A"]);

        // Manual moves are ignored in auto
        assert_eq!(
            d.submit_manual_command("F40A").unwrap(),
            ManualOutcome::DroppedAutoMode
        );

        d.handle(Command::SetMode(Mode::Manual)).unwrap();
        assert_eq!(d.snapshot().mode, Mode::Manual);
        assert_eq!(d.snapshot().epoch, epoch + 1);
        assert_eq!(rec.take_tokens(), vec!["H", "F0A"]);
    }

    #[test]
    fn test_profile_switch() {
        let (d, rec) = dispatcher(test_dispatch_params());

        d.handle(Command::ProfileSwitch(ProfileId::GiveWay)).unwrap();
        let s = d.snapshot();
        assert_eq!(s.profile, ProfileId::GiveWay);
        assert_eq!(s.epoch, 1);
        assert_eq!(rec.take_tokens(), vec!["H", "F0A"]);

        match d.set_profile(ProfileId::Crosswalk) {
            Err(DispatchError::UnknownProfile(ProfileId::Crosswalk)) => (),
            r => panic!("Expected UnknownProfile, got {:?}", r),
        }
        assert_eq!(d.snapshot().profile, ProfileId::GiveWay);
        assert!(rec.take_tokens().is_empty());
    }

    #[test]
    fn test_actuate_auto() {
        let (d, rec) = dispatcher(test_dispatch_params());
        let s = SteeringCommand::new(40);
        let t = ThrottleCommand::forward(30);

        // Manual mode
        assert!(!d.actuate_auto(d.snapshot().epoch, s, t).unwrap());

        d.set_mode(Mode::Auto).unwrap();
        rec.take_tokens();
        let epoch = d.snapshot().epoch;

        assert!(d.actuate_auto(epoch, s, t).unwrap());
        assert_eq!(rec.take_tokens(), vec!["S40A", "F30A"]);

        // Stale session
        assert!(!d.actuate_auto(epoch - 1, s, t).unwrap());

        // Blocked
        d.set_blocked(true);
        assert!(!d.actuate_auto(epoch, s, t).unwrap());
        assert!(rec.take_tokens().is_empty());

        // Safety stops are sent even when blocked
        d.hard_stop().unwrap();
        assert_eq!(rec.take_tokens(), vec!["H", "F0A"]);
    }

    #[test]
    fn test_actuate_halt_gating() {
        let mut p = test_dispatch_params();
        p.initial_mode = Mode::Auto;
        let (d, rec) = dispatcher(p);
        let epoch = d.snapshot().epoch;

        assert!(d.actuate_halt(epoch).unwrap());
        assert_eq!(rec.take_tokens(), vec!["H", "F0A"]);

        // Blocked
        d.set_blocked(true);
        assert!(!d.actuate_halt(epoch).unwrap());
        d.set_blocked(false);

        // From a previous session
        d.set_profile(ProfileId::GiveWay).unwrap();
        rec.take_tokens();
        assert!(!d.actuate_halt(epoch).unwrap());

        // In manual mode
        let epoch = d.snapshot().epoch;
        d.set_mode(Mode::Manual).unwrap();
        rec.take_tokens();
        assert!(!d.actuate_halt(epoch).unwrap());

        assert!(rec.take_tokens().is_empty());
    }

    #[test]
    fn test_shutdown_latch() {
        let mut p = test_dispatch_params();
        p.initial_mode = Mode::Auto;
        let (d, rec) = dispatcher(p);
        let epoch = d.snapshot().epoch;

        assert!(!d.is_shut_down());
        d.shutdown().unwrap();
        assert!(d.is_shut_down());
        assert_eq!(rec.take_tokens(), vec!["H", "F0A"]);

        let s = SteeringCommand::STRAIGHT;
        let t = ThrottleCommand::forward(52);
        assert!(!d.actuate_auto(epoch, s, t).unwrap());
        assert!(!d.actuate_halt(epoch).unwrap());
        assert!(rec.take_tokens().is_empty());
    }
}
