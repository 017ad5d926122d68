//! # Frame cell
//!
//! A single slot holding the freshest camera frame. The drain thread overwrites the slot every
//! time the camera produces a frame, whether or not the control loop has taken the previous one.
//! Stale frames are therefore dropped rather than queued, so the control loop always works on
//! the newest image and never on a backlog.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use comms_if::eqpt::cam::Frame;
use log::{debug, error, info, trace};

use super::FrameSource;
use crate::ctx::StopFlag;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Single slot frame holding cell, shared between the drain thread and the control loop.
#[derive(Default)]
pub struct FrameCell {
    slot: Mutex<Slot>,
    num_dropped: AtomicU64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

enum Slot {
    Empty,
    Fresh(Frame),
    Failed(String),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FrameCellError {
    #[error("The frame source failed: {0}")]
    SourceFailed(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for Slot {
    fn default() -> Self {
        Slot::Empty
    }
}

impl FrameCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a new frame in the cell.
    ///
    /// Returns `true` if an undrained frame was overwritten. Once the cell has been marked as
    /// failed new frames are ignored.
    pub fn put(&self, frame: Frame) -> bool {
        let mut slot = self.slot.lock().expect("FrameCell mutex poisoned");

        match *slot {
            Slot::Failed(_) => false,
            Slot::Fresh(_) => {
                *slot = Slot::Fresh(frame);
                self.num_dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Slot::Empty => {
                *slot = Slot::Fresh(frame);
                false
            }
        }
    }

    /// Mark the source as failed, dropping any undrained frame.
    pub fn fail(&self, reason: String) {
        *self.slot.lock().expect("FrameCell mutex poisoned") = Slot::Failed(reason);
    }

    /// Take the freshest frame out of the cell.
    ///
    /// Returns `Ok(None)` if no new frame has arrived since the last call. The lock is only held
    /// while the frame is moved out.
    pub fn latest(&self) -> Result<Option<Frame>, FrameCellError> {
        let mut slot = self.slot.lock().expect("FrameCell mutex poisoned");

        match std::mem::take(&mut *slot) {
            Slot::Empty => Ok(None),
            Slot::Fresh(f) => Ok(Some(f)),
            Slot::Failed(reason) => {
                *slot = Slot::Failed(reason.clone());
                Err(FrameCellError::SourceFailed(reason))
            }
        }
    }

    /// Number of frames which were overwritten before the control loop took them.
    pub fn num_dropped(&self) -> u64 {
        self.num_dropped.load(Ordering::Relaxed)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Start the background thread draining `source` into `cell` until `stop` is raised or the
/// source fails.
pub fn spawn_frame_drain(
    mut source: Box<dyn FrameSource>,
    cell: Arc<FrameCell>,
    stop: StopFlag,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("frame_drain".into())
        .spawn(move || {
            info!("Frame drain started");

            while !stop.is_stopped() {
                match source.next_frame() {
                    Ok(frame) => {
                        let seq = frame.seq;
                        if cell.put(frame) {
                            trace!("Frame {} replaced an undrained frame", seq);
                        }
                    }
                    Err(e) => {
                        error!("Frame source failure: {}", e);
                        cell.fail(e.to_string());
                        break;
                    }
                }
            }

            debug!("{} stale frames were dropped", cell.num_dropped());
            info!("Frame drain stopped");
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::per::FrameSourceError;
    use image::RgbImage;

    fn frame(seq: u64) -> Frame {
        Frame::now(seq, RgbImage::new(4, 4))
    }

    /// Produces a fixed number of frames then closes.
    struct FiniteSource {
        next: u64,
        count: u64,
    }

    impl FrameSource for FiniteSource {
        fn next_frame(&mut self) -> Result<Frame, FrameSourceError> {
            if self.next >= self.count {
                return Err(FrameSourceError::Closed);
            }
            self.next += 1;
            Ok(frame(self.next))
        }
    }

    #[test]
    fn test_drop_stale() {
        let cell = FrameCell::new();
        assert_eq!(cell.latest().unwrap().map(|f| f.seq), None);

        assert!(!cell.put(frame(1)));
        assert!(cell.put(frame(2)));
        assert!(cell.put(frame(3)));
        assert_eq!(cell.num_dropped(), 2);

        // Only the newest frame is handed out, and only once
        assert_eq!(cell.latest().unwrap().map(|f| f.seq), Some(3));
        assert_eq!(cell.latest().unwrap().map(|f| f.seq), None);
    }

    #[test]
    fn test_failure_is_sticky() {
        let cell = FrameCell::new();
        cell.put(frame(1));
        cell.fail("unplugged".into());

        assert!(!cell.put(frame(2)));
        assert_eq!(
            cell.latest().map(|f| f.map(|f| f.seq)),
            Err(FrameCellError::SourceFailed("unplugged".into()))
        );
        assert!(cell.latest().is_err());
    }

    #[test]
    fn test_drain_thread() {
        let cell = Arc::new(FrameCell::new());
        let stop = StopFlag::new();

        let jh = spawn_frame_drain(
            Box::new(FiniteSource { next: 0, count: 5 }),
            cell.clone(),
            stop.clone(),
        )
        .unwrap();

        jh.join().unwrap();

        // The source closed so the cell must report the failure, the frames it produced before
        // closing having been dropped along the way.
        match cell.latest() {
            Err(FrameCellError::SourceFailed(_)) => (),
            r => panic!("Expected a source failure, got {:?}", r.map(|f| f.map(|f| f.seq))),
        }
        assert_eq!(cell.num_dropped(), 4);
    }
}
