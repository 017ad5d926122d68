//! # Continuity filter
//!
//! Reduces the raw detector candidates to at most one trusted box.
//!
//! On the first acquisition of a tracking session the largest candidate is accepted without any
//! checks. After that a candidate has to pass two gates:
//!
//! 1. Geometric gate: its centroid must be closer than `max_distance_diff` to the track centre
//!    and its area within `max_area_diff` of the track area.
//! 2. Appearance gate: the similarity oracle's score against the profile's reference appearance
//!    must lie strictly inside `(min_similarity, max_similarity)`.
//!
//! The oracle is only consulted for candidates which passed the geometric gate. When several
//! candidates survive the largest one wins, ties going to the earliest in detector order.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::cam::Frame;
use log::trace;
use nalgebra::distance;
use ordered_float::OrderedFloat;
use serde::Serialize;

use super::{ControlState, Track};
use crate::per::{BoundingBox, SimilarityOracle};
use crate::profile::{GateParams, SignProfile};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct ContinuityFilter {
    oracle: Box<dyn SimilarityOracle>,
}

/// Result of filtering one cycle's candidates.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct FilterOutcome {
    /// The trusted box, if any
    pub trusted: Option<BoundingBox>,

    /// `true` if the trusted box was accepted as a bootstrap
    pub bootstrap: bool,

    pub num_candidates: usize,
    pub num_geom_passed: usize,
    pub num_appearance_passed: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ContinuityFilter {
    pub fn new(oracle: Box<dyn SimilarityOracle>) -> Self {
        Self { oracle }
    }

    /// Select the trusted box among `candidates`.
    ///
    /// The control state is not modified, the caller records the outcome in the state machine.
    pub fn select(
        &self,
        candidates: &[BoundingBox],
        frame: &Frame,
        state: &ControlState,
        profile: &SignProfile,
    ) -> FilterOutcome {
        let mut outcome = FilterOutcome {
            num_candidates: candidates.len(),
            ..Default::default()
        };

        if candidates.is_empty() {
            return outcome;
        }

        let track = match state.track {
            Some(t) if t.valid && !state.first_acquisition => t,
            _ => {
                outcome.bootstrap = true;
                outcome.trusted = largest(candidates.iter().copied());
                return outcome;
            }
        };

        let geom_passed: Vec<BoundingBox> = candidates
            .iter()
            .filter(|c| passes_geometry(c, &track, &profile.gate))
            .copied()
            .collect();
        outcome.num_geom_passed = geom_passed.len();

        let appearance_passed: Vec<BoundingBox> = geom_passed
            .into_iter()
            .filter(|c| self.passes_appearance(c, frame, profile))
            .collect();
        outcome.num_appearance_passed = appearance_passed.len();

        outcome.trusted = largest(appearance_passed.into_iter());
        outcome
    }

    fn passes_appearance(&self, bbox: &BoundingBox, frame: &Frame, profile: &SignProfile) -> bool {
        let region = match bbox.region(&frame.image) {
            Some(r) => r,
            None => return false,
        };

        let score = self.oracle.score(&region, &profile.reference);
        trace!("Candidate {:?} similarity score {:.3}", bbox, score);

        profile.gate.min_similarity < score && score < profile.gate.max_similarity
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn passes_geometry(bbox: &BoundingBox, track: &Track, gate: &GateParams) -> bool {
    distance(&bbox.centroid(), &track.center) < gate.max_distance_diff
        && (bbox.area() - track.area).abs() < gate.max_area_diff
}

/// Largest box by area, the first in iteration order on a tie.
fn largest<I>(boxes: I) -> Option<BoundingBox>
where
    I: DoubleEndedIterator<Item = BoundingBox>,
{
    // max_by_key keeps the last of equal maxima, so iterate backwards
    boxes.rev().max_by_key(|b| OrderedFloat(b.area()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::profile::{test::test_profile, ReferenceAppearance};
    use comms_if::cmd::{Mode, ProfileId};
    use image::{Rgb, RgbImage};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    /// Scores regions by their top left pixel's red channel and counts calls.
    struct RedOracle {
        calls: Arc<AtomicUsize>,
    }

    impl SimilarityOracle for RedOracle {
        fn score(&self, region: &RgbImage, _: &ReferenceAppearance) -> f64 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            region.get_pixel(0, 0)[0] as f64
        }
    }

    fn filter() -> (ContinuityFilter, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            ContinuityFilter::new(Box::new(RedOracle {
                calls: calls.clone(),
            })),
            calls,
        )
    }

    /// A 640x480 frame with a red value of 10 everywhere except the given patches.
    fn frame(patches: &[(BoundingBox, u8)]) -> Frame {
        let mut img = RgbImage::from_pixel(640, 480, Rgb([10, 10, 10]));
        for (b, red) in patches {
            for x in b.x..(b.x + b.width) {
                for y in b.y..(b.y + b.height) {
                    img.put_pixel(x, y, Rgb([*red, 0, 0]));
                }
            }
        }
        Frame::now(0, img)
    }

    fn tracking_state(center: BoundingBox) -> ControlState {
        let mut s = ControlState::new(Mode::Auto, false, ProfileId::Stop);
        s.record_trusted(&center);
        s
    }

    #[test]
    fn test_bootstrap_max_area() {
        let (f, calls) = filter();
        let s = ControlState::new(Mode::Auto, false, ProfileId::Stop);
        let p = test_profile(ProfileId::Stop);

        let cands = [
            BoundingBox::new(0, 0, 10, 10),
            BoundingBox::new(100, 100, 20, 20),
            BoundingBox::new(300, 300, 15, 15),
        ];

        let out = f.select(&cands, &frame(&[]), &s, &p);
        assert_eq!(out.trusted, Some(cands[1]));
        assert!(out.bootstrap);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_input() {
        let (f, calls) = filter();
        let p = test_profile(ProfileId::Stop);

        for s in [
            ControlState::new(Mode::Auto, false, ProfileId::Stop),
            tracking_state(BoundingBox::new(100, 100, 20, 20)),
        ]
        .iter()
        {
            let out = f.select(&[], &frame(&[]), s, &p);
            assert_eq!(out.trusted, None);
            assert_eq!(out.num_candidates, 0);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_geometric_gate() {
        let (f, calls) = filter();
        let p = test_profile(ProfileId::Stop);
        let s = tracking_state(BoundingBox::new(100, 100, 20, 20));

        // Too far away, then too big, then good
        let far = BoundingBox::new(200, 100, 20, 20);
        let big = BoundingBox::new(90, 90, 40, 40);
        let near = BoundingBox::new(110, 105, 20, 20);

        let fr = frame(&[(far, 20), (big, 20), (near, 20)]);
        let out = f.select(&[far, big, near], &fr, &s, &p);

        assert_eq!(out.trusted, Some(near));
        assert_eq!(out.num_geom_passed, 1);

        // Only the geometric survivor was scored
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_appearance_band() {
        let (f, _) = filter();
        let p = test_profile(ProfileId::Stop);
        let s = tracking_state(BoundingBox::new(100, 100, 20, 20));

        let b = BoundingBox::new(105, 100, 20, 20);

        // The band is (0, 40), both ends excluded
        for (red, accepted) in [(0u8, false), (1, true), (39, true), (40, false), (200, false)].iter() {
            let out = f.select(&[b], &frame(&[(b, *red)]), &s, &p);
            assert_eq!(out.trusted.is_some(), *accepted, "red = {}", red);
        }
    }

    #[test]
    fn test_largest_survivor() {
        let (f, _) = filter();
        let p = test_profile(ProfileId::Stop);
        let s = tracking_state(BoundingBox::new(100, 100, 20, 20));

        let a = BoundingBox::new(100, 100, 20, 20);
        let b = BoundingBox::new(95, 95, 24, 24);
        let c = BoundingBox::new(105, 105, 24, 24);

        let fr = frame(&[(a, 20), (b, 20), (c, 20)]);
        let out = f.select(&[a, b, c], &fr, &s, &p);

        // b and c are the same size, b comes first
        assert_eq!(out.trusted, Some(b));
        assert_eq!(out.num_appearance_passed, 3);
    }

    #[test]
    fn test_cleared_track_bootstraps() {
        let (f, calls) = filter();
        let p = test_profile(ProfileId::Stop);
        let mut s = tracking_state(BoundingBox::new(100, 100, 20, 20));

        let policy = crate::profile::FailurePolicy {
            threshold: 0,
            clear_track_on_backoff: true,
        };
        s.record_failure(&policy);

        // Far from the old track but accepted as a new bootstrap
        let far = BoundingBox::new(500, 400, 30, 30);
        let out = f.select(&[far], &frame(&[]), &s, &p);
        assert_eq!(out.trusted, Some(far));
        assert!(out.bootstrap);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_trusted_boxes_satisfy_gates() {
        let (f, _) = filter();
        let p = test_profile(ProfileId::Stop);
        let track_box = BoundingBox::new(300, 200, 30, 30);
        let s = tracking_state(track_box);
        let track = s.track.unwrap();

        // Pseudo random candidate sets from a linear congruential generator
        let mut seed: u64 = 12345;
        let mut next = |m: u64| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) % m
        };

        for _ in 0..200 {
            let cands: Vec<(BoundingBox, u8)> = (0..next(5))
                .map(|_| {
                    let size = 10 + next(40) as u32;
                    let b = BoundingBox::new(
                        240 + next(120) as u32,
                        140 + next(120) as u32,
                        size,
                        size,
                    );
                    (b, next(60) as u8)
                })
                .collect();

            let fr = frame(&cands);
            let boxes: Vec<BoundingBox> = cands.iter().map(|(b, _)| *b).collect();

            let out = f.select(&boxes, &fr, &s, &p);
            let again = f.select(&boxes, &fr, &s, &p);
            assert_eq!(out, again);

            if let Some(t) = out.trusted {
                assert!(boxes.contains(&t));
                assert!(passes_geometry(&t, &track, &p.gate));
                let score = t.region(&fr.image).unwrap().get_pixel(0, 0)[0] as f64;
                assert!(score > p.gate.min_similarity && score < p.gate.max_similarity);
            }
        }
    }
}
