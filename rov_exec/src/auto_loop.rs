//! # Autonomous control loop
//!
//! The control loop thread. Once per cycle it:
//!
//! 1. Takes a snapshot of the dispatcher state.
//! 2. Takes the freshest frame out of the frame cell, idling if there is none.
//! 3. Runs the autonomous controller on the frame if the rover is in automatic mode.
//! 4. Sends the demands, or the halt issued when the target is lost, through the dispatcher, which
//!    drops them if the rover has been blocked, switched out of automatic mode, moved to a new
//!    tracking session or shut down in the meantime.
//!
//! A frame source failure ends the loop, after a final stop. Manual control is unaffected.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use comms_if::cmd::Mode;
use log::{debug, error, info, warn};

use crate::{
    auto_ctrl::{AutoCtrl, InputData},
    ctx::StopFlag,
    dispatch::ModeDispatcher,
    per::{FrameCell, FrameCellError},
};
use util::{archive::Archived, module::State};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct AutoLoop {
    ctrl: AutoCtrl,
    dispatcher: Arc<ModeDispatcher>,
    frame_cell: Arc<FrameCell>,
    stop: StopFlag,

    cycle_period: Duration,
    max_consec_overruns: u64,

    num_cycles: u64,
    num_consec_cycle_overruns: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// What happened during one cycle.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CycleOutcome {
    /// No new frame
    Idle,

    /// A frame was taken but the rover is in manual mode
    Skipped,

    /// The frame was processed
    Processed {
        /// Demands reached the actuators
        actuated: bool,

        /// The halt issued after losing the target reached the actuators
        halted: bool,
    },
}

/// Why the loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AutoLoopExit {
    Stopped,
    SourceFailed(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl AutoLoop {
    pub fn new(
        ctrl: AutoCtrl,
        dispatcher: Arc<ModeDispatcher>,
        frame_cell: Arc<FrameCell>,
        stop: StopFlag,
        cycle_period_s: f64,
        max_consec_overruns: u64,
    ) -> Self {
        Self {
            ctrl,
            dispatcher,
            frame_cell,
            stop,
            cycle_period: util::time::seconds_to_std(cycle_period_s),
            max_consec_overruns,
            num_cycles: 0,
            num_consec_cycle_overruns: 0,
        }
    }

    /// Run the loop in its own thread.
    pub fn spawn(self) -> std::io::Result<JoinHandle<AutoLoopExit>> {
        thread::Builder::new()
            .name("auto_loop".into())
            .spawn(move || self.run())
    }

    /// Run the loop until stopped or the frame source fails.
    pub fn run(mut self) -> AutoLoopExit {
        info!("Beginning control loop");

        let exit = loop {
            if self.stop.is_stopped() {
                break AutoLoopExit::Stopped;
            }

            let cycle_start_instant = Instant::now();

            if let Err(FrameCellError::SourceFailed(reason)) = self.cycle() {
                error!("Frame source failed ({}), autonomous control ended", reason);

                if let Err(e) = self.dispatcher.hard_stop() {
                    error!("Could not stop the rover: {}", e);
                }

                break AutoLoopExit::SourceFailed(reason);
            }

            // ---- CYCLE MANAGEMENT ----

            let cycle_dur = Instant::now() - cycle_start_instant;

            match self.cycle_period.checked_sub(cycle_dur) {
                Some(d) => {
                    self.num_consec_cycle_overruns = 0;
                    thread::sleep(d);
                }
                None => {
                    self.num_consec_cycle_overruns += 1;

                    let overrun_s =
                        cycle_dur.as_secs_f64() - self.cycle_period.as_secs_f64();

                    if self.num_consec_cycle_overruns > self.max_consec_overruns {
                        error!(
                            "Cycle overran by {:.06} s ({} consecutive overruns)",
                            overrun_s, self.num_consec_cycle_overruns
                        );
                    }
                    else {
                        warn!("Cycle overran by {:.06} s", overrun_s);
                    }
                }
            }

            self.num_cycles += 1;
        };

        info!(
            "Control loop ended after {} cycles ({} frames processed)",
            self.num_cycles,
            self.ctrl.num_cycles()
        );

        exit
    }

    /// Execute a single cycle.
    pub fn cycle(&mut self) -> Result<CycleOutcome, FrameCellError> {
        let snap = self.dispatcher.snapshot();

        let frame = match self.frame_cell.latest()? {
            Some(f) => f,
            None => return Ok(CycleOutcome::Idle),
        };

        if snap.mode != Mode::Auto {
            return Ok(CycleOutcome::Skipped);
        }

        let (output, _) = match self.ctrl.proc(&InputData { frame, mode: snap }) {
            Ok(o) => o,
            Err(e) => {
                warn!("Error during AutoCtrl processing: {}", e);
                return Ok(CycleOutcome::Processed {
                    actuated: false,
                    halted: false,
                });
            }
        };

        let mut actuated = false;
        let mut halted = false;

        if output.halt {
            match self.dispatcher.actuate_halt(snap.epoch) {
                Ok(h) => halted = h,
                Err(e) => error!("Could not halt the rover after losing the target: {}", e),
            }

            if !halted {
                debug!("Halt not sent, actuation gated");
            }
        }
        else if let Some(d) = output.demands {
            match self.dispatcher.actuate_auto(snap.epoch, d.steering, d.throttle) {
                Ok(a) => actuated = a,
                Err(e) => warn!("Could not send autonomous demands: {}", e),
            }

            if !actuated {
                debug!("Autonomous demands not sent, actuation gated");
            }
        }

        if let Err(e) = self.ctrl.write() {
            warn!("Could not archive AutoCtrl status: {}", e);
        }

        Ok(CycleOutcome::Processed { actuated, halted })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        auto_ctrl::test::test_ctrl,
        dispatch::test::{dispatcher, test_dispatch_params},
        per::BoundingBox,
    };
    use comms_if::{cmd::Command, eqpt::cam::Frame};
    use image::RgbImage;

    fn frame(seq: u64) -> Frame {
        Frame::now(seq, RgbImage::new(640, 480))
    }

    fn auto_loop(cycles: Vec<Vec<BoundingBox>>) -> (AutoLoop, crate::act_client::RecordingActuator) {
        let mut params = test_dispatch_params();
        params.initial_mode = Mode::Auto;
        let (d, rec) = dispatcher(params);

        let l = AutoLoop::new(
            test_ctrl(cycles),
            Arc::new(d),
            Arc::new(FrameCell::new()),
            StopFlag::new(),
            0.01,
            10,
        );
        (l, rec)
    }

    #[test]
    fn test_idle_without_frames() {
        let (mut l, rec) = auto_loop(vec![]);
        assert_eq!(l.cycle().unwrap(), CycleOutcome::Idle);
        assert!(rec.take_tokens().is_empty());
    }

    #[test]
    fn test_six_empty_cycles_halt_once() {
        let (mut l, rec) = auto_loop(vec![]);

        for i in 0..8 {
            l.frame_cell.put(frame(i));
            let out = l.cycle().unwrap();

            let expect_halt = i == 5;
            assert_eq!(
                out,
                CycleOutcome::Processed {
                    actuated: false,
                    halted: expect_halt
                }
            );

            if expect_halt {
                assert_eq!(rec.take_tokens(), vec!["H", "F0A"]);
            }
            else {
                assert!(rec.take_tokens().is_empty());
            }
        }
    }

    #[test]
    fn test_blocked_halt_not_sent() {
        let (mut l, rec) = auto_loop(vec![]);
        l.dispatcher.set_blocked(true);

        for i in 0..8 {
            l.frame_cell.put(frame(i));
            assert_eq!(
                l.cycle().unwrap(),
                CycleOutcome::Processed {
                    actuated: false,
                    halted: false
                }
            );
        }

        assert!(rec.take_tokens().is_empty());
    }

    #[test]
    fn test_no_actuation_after_shutdown() {
        let b = BoundingBox::new(300, 200, 40, 40);
        let (mut l, rec) = auto_loop(vec![vec![b]]);

        // Shutdown lands while a cycle is already under way
        l.frame_cell.put(frame(0));
        l.stop.stop();
        l.dispatcher.shutdown().unwrap();

        assert_eq!(
            l.cycle().unwrap(),
            CycleOutcome::Processed {
                actuated: false,
                halted: false
            }
        );
        assert_eq!(rec.take_tokens(), vec!["H", "F0A"]);
    }

    #[test]
    fn test_actuation_and_gating() {
        let b = BoundingBox::new(300, 200, 40, 40);
        let (mut l, rec) = auto_loop(vec![vec![b], vec![b], vec![b], vec![b]]);

        l.frame_cell.put(frame(0));
        assert_eq!(
            l.cycle().unwrap(),
            CycleOutcome::Processed {
                actuated: true,
                halted: false
            }
        );
        let tokens = rec.take_tokens();
        assert_eq!(tokens[0], "S50A");
        assert!(tokens[1].starts_with('F'));

        // Blocked, tracking continues without actuation
        l.dispatcher.handle(Command::Halt).unwrap();
        rec.take_tokens();
        l.frame_cell.put(frame(1));
        assert_eq!(
            l.cycle().unwrap(),
            CycleOutcome::Processed {
                actuated: false,
                halted: false
            }
        );
        assert!(rec.take_tokens().is_empty());

        // Manual mode, frames are not processed
        l.dispatcher.handle(Command::Go).unwrap();
        l.dispatcher.handle(Command::SetMode(Mode::Manual)).unwrap();
        rec.take_tokens();
        l.frame_cell.put(frame(2));
        assert_eq!(l.cycle().unwrap(), CycleOutcome::Skipped);
        assert!(rec.take_tokens().is_empty());
    }

    #[test]
    fn test_source_failure_ends_loop() {
        let (l, rec) = auto_loop(vec![]);
        let dispatcher = l.dispatcher.clone();

        l.frame_cell.fail("camera unplugged".into());
        assert_eq!(l.run(), AutoLoopExit::SourceFailed("camera unplugged".into()));
        assert_eq!(rec.take_tokens(), vec!["H", "F0A"]);

        // Manual control still works after the loop has gone
        dispatcher.handle(Command::SetMode(Mode::Manual)).unwrap();
        rec.take_tokens();
        assert_eq!(
            dispatcher.submit_manual_command("F20A").unwrap(),
            crate::dispatch::ManualOutcome::Forwarded
        );
        assert_eq!(rec.take_tokens(), vec!["F20A"]);
    }

    #[test]
    fn test_stop_flag() {
        let (l, _) = auto_loop(vec![]);
        let stop = l.stop.clone();
        stop.stop();

        let jh = l.spawn().unwrap();
        assert_eq!(jh.join().unwrap(), AutoLoopExit::Stopped);
    }
}
