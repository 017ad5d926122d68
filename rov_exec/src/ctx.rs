//! # Rover context
//!
//! Everything shared between the threads of the executable, built once at startup and torn down
//! at shutdown.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::info;

use crate::{
    act_client::{self, ActuatorSink},
    dispatch::{DispatchError, ModeDispatcher},
    params::RovExecParams,
    per::FrameCell,
    profile::ProfileTable,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Cooperative cancellation flag, checked once per cycle by every background thread.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

/// Shared context of the executable.
pub struct RoverCtx {
    pub params: RovExecParams,
    pub profiles: Arc<ProfileTable>,
    pub dispatcher: Arc<ModeDispatcher>,
    pub frame_cell: Arc<FrameCell>,
    pub stop: StopFlag,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request all holders of the flag to stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl RoverCtx {
    /// Build the context, with the dispatcher starting in the configured mode and profile.
    pub fn new(
        params: RovExecParams,
        profiles: ProfileTable,
        actuator: Box<dyn ActuatorSink>,
    ) -> Result<Self, DispatchError> {
        let dispatcher = ModeDispatcher::new(
            params.dispatch.clone(),
            profiles.ids(),
            act_client::share(actuator),
        )?;

        Ok(Self {
            params,
            profiles: Arc::new(profiles),
            dispatcher: Arc::new(dispatcher),
            frame_cell: Arc::new(FrameCell::new()),
            stop: StopFlag::new(),
        })
    }

    /// Ask all threads to stop and leave the rover stationary.
    ///
    /// The dispatcher is latched before the final stop, so a control cycle still in flight cannot
    /// drive the rover afterwards.
    pub fn shutdown(&self) {
        info!("Shutting down");
        self.stop.stop();

        if let Err(e) = self.dispatcher.shutdown() {
            log::error!("Could not stop the rover on shutdown: {}", e);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stop_flag() {
        let a = StopFlag::new();
        let b = a.clone();
        assert!(!b.is_stopped());
        a.stop();
        assert!(b.is_stopped());
    }

    #[test]
    fn test_shutdown() {
        let params = RovExecParams {
            cycle_period_s: 0.1,
            profiles_file: "profiles.toml".into(),
            archive: false,
            max_consec_overruns: 10,
            dispatch: crate::dispatch::test::test_dispatch_params(),
            sim: Default::default(),
        };
        let profiles = ProfileTable::from_profiles(vec![
            crate::profile::test::test_profile(comms_if::cmd::ProfileId::Stop),
        ])
        .unwrap();

        let rec = act_client::RecordingActuator::default();
        let ctx = RoverCtx::new(params, profiles, Box::new(rec.clone())).unwrap();

        ctx.shutdown();
        assert!(ctx.stop.is_stopped());
        assert!(ctx.dispatcher.is_shut_down());
        assert_eq!(rec.take_tokens(), vec!["H", "F0A"]);
    }
}
