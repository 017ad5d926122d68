//! # Simulation stack
//!
//! Stand-ins for the rover's camera and vision collaborators, so that the executable can run end
//! to end on a desk:
//!
//! - [`SimCamera`] renders a Perlin noise textured background with a coloured square target which
//!   sways from side to side while approaching and receding.
//! - [`ColourDetector`] finds connected blobs of the profile's sign colour.
//! - [`MeanAbsDiffOracle`] scores a region by its mean absolute difference from the reference
//!   appearance.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    f64::consts::PI,
    thread,
    time::Instant,
};

use comms_if::eqpt::cam::Frame;
use image::{imageops, Rgb, RgbImage};
use log::{debug, trace};
use noise::{NoiseFn, Perlin};

use crate::{
    params::SimParams,
    per::{BoundingBox, Detector, FrameSource, FrameSourceError, SimilarityOracle},
    profile::{ReferenceAppearance, SignProfile},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Offset applied to the noise coordinates of the target texture, so it doesn't repeat the
/// background.
const TARGET_NOISE_OFFSET: f64 = 1000.0;

/// Amplitude of the texture on the target.
const TARGET_TEXTURE_AMPLITUDE: f64 = 12.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A simulated camera.
pub struct SimCamera {
    params: SimParams,
    perlin: Perlin,
    background: RgbImage,
    seq: u64,
    start: Instant,
    next_frame_at: Instant,
}

/// Detects blobs of a single colour.
#[derive(Debug, Default)]
pub struct ColourDetector;

/// Scores regions by mean absolute pixel difference from the reference, in [0, 255].
#[derive(Debug, Default)]
pub struct MeanAbsDiffOracle;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimCamera {
    pub fn new(params: SimParams) -> Self {
        let perlin = Perlin::new();

        let background = RgbImage::from_fn(params.width, params.height, |x, y| {
            let n = perlin.get([
                x as f64 * params.noise_scale,
                y as f64 * params.noise_scale,
            ]);
            let v = (90.0 + 50.0 * n) as u8;
            Rgb([v, v.saturating_add(20), v])
        });

        debug!(
            "Simulated camera created ({}x{} px, {:.03} s period)",
            params.width, params.height, params.frame_period_s
        );

        let now = Instant::now();

        Self {
            params,
            perlin,
            background,
            seq: 0,
            start: now,
            next_frame_at: now,
        }
    }

    /// Where the target is in frame `seq` at time `t_s`, `None` if it is occluded.
    pub fn target_at(&self, seq: u64, t_s: f64) -> Option<BoundingBox> {
        let p = &self.params;

        if p.occlusion_period_frames > 0 && seq % p.occlusion_period_frames < p.occlusion_frames {
            return None;
        }

        let phase = 2.0 * PI * t_s / p.motion_period_s;

        let [min_size, max_size] = p.target_size_range_px;
        let size = min_size as f64
            + (max_size.saturating_sub(min_size)) as f64 * (0.5 - 0.5 * phase.cos());
        let cx = p.width as f64 / 2.0 + p.sway_amplitude_px * phase.sin();
        let cy = p.height as f64 / 2.0;

        let x = (cx - size / 2.0).max(0.0) as u32;
        let y = (cy - size / 2.0).max(0.0) as u32;
        let size = size as u32;

        if x >= p.width || y >= p.height || size == 0 {
            return None;
        }

        Some(BoundingBox::new(
            x,
            y,
            size.min(p.width - x),
            size.min(p.height - y),
        ))
    }

    /// Render frame `seq` at time `t_s`.
    pub fn render(&self, seq: u64, t_s: f64) -> RgbImage {
        let mut img = self.background.clone();

        if let Some(b) = self.target_at(seq, t_s) {
            let [r, g, bl] = self.params.target_rgb;

            for x in b.x..(b.x + b.width) {
                for y in b.y..(b.y + b.height) {
                    let n = TARGET_TEXTURE_AMPLITUDE
                        * self.perlin.get([
                            (x - b.x) as f64 * 0.2 + TARGET_NOISE_OFFSET,
                            (y - b.y) as f64 * 0.2 + TARGET_NOISE_OFFSET,
                        ]);
                    img.put_pixel(x, y, Rgb([shade(r, n), shade(g, n), shade(bl, n)]));
                }
            }
        }

        img
    }
}

impl FrameSource for SimCamera {
    fn next_frame(&mut self) -> Result<Frame, FrameSourceError> {
        if let Some(n) = self.params.fail_after_frames {
            if self.seq >= n {
                return Err(FrameSourceError::AcquisitionFailed(format!(
                    "simulated camera disconnected after {} frames",
                    n
                )));
            }
        }

        // Pace the frames like a real camera
        let now = Instant::now();
        if self.next_frame_at > now {
            thread::sleep(self.next_frame_at - now);
        }
        self.next_frame_at += util::time::seconds_to_std(self.params.frame_period_s);

        let t_s = self.start.elapsed().as_secs_f64();
        let frame = Frame::now(self.seq, self.render(self.seq, t_s));
        trace!("Simulated frame {} at {:.03} s", self.seq, t_s);

        self.seq += 1;

        Ok(frame)
    }
}

impl Detector for ColourDetector {
    fn detect(&mut self, frame: &Frame, profile: &SignProfile) -> Vec<BoundingBox> {
        let params = &profile.detector;
        let img = &frame.image;
        let (w, h) = img.dimensions();

        let matches = |x: u32, y: u32| {
            let px = img.get_pixel(x, y);
            (0..3).all(|c| {
                (px[c] as i16 - params.colour_rgb[c] as i16).abs() <= params.colour_tol as i16
            })
        };

        let mut visited = vec![false; (w * h) as usize];
        let mut boxes = vec![];
        let mut stack: Vec<(u32, u32)> = vec![];

        // Scan order gives a deterministic output order
        for y0 in 0..h {
            for x0 in 0..w {
                let idx = (y0 * w + x0) as usize;
                if visited[idx] || !matches(x0, y0) {
                    visited[idx] = true;
                    continue;
                }

                let (mut min_x, mut min_y, mut max_x, mut max_y) = (x0, y0, x0, y0);
                visited[idx] = true;
                stack.push((x0, y0));

                while let Some((x, y)) = stack.pop() {
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);

                    let mut neighbours = Vec::with_capacity(4);
                    if x > 0 {
                        neighbours.push((x - 1, y));
                    }
                    if x + 1 < w {
                        neighbours.push((x + 1, y));
                    }
                    if y > 0 {
                        neighbours.push((x, y - 1));
                    }
                    if y + 1 < h {
                        neighbours.push((x, y + 1));
                    }

                    for (nx, ny) in neighbours {
                        let n_idx = (ny * w + nx) as usize;
                        if !visited[n_idx] && matches(nx, ny) {
                            visited[n_idx] = true;
                            stack.push((nx, ny));
                        }
                    }
                }

                let b = BoundingBox::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1);
                if b.width >= params.min_size_px && b.height >= params.min_size_px {
                    boxes.push(b);
                }
            }
        }

        boxes
    }
}

impl SimilarityOracle for MeanAbsDiffOracle {
    fn score(&self, region: &RgbImage, reference: &ReferenceAppearance) -> f64 {
        let (w, h) = reference.image.dimensions();
        if w == 0 || h == 0 || region.width() == 0 || region.height() == 0 {
            return f64::MAX;
        }

        let resized;
        let region = if region.dimensions() == (w, h) {
            region
        }
        else {
            resized = imageops::resize(region, w, h, imageops::FilterType::Triangle);
            &resized
        };

        let total: u64 = region
            .pixels()
            .zip(reference.image.pixels())
            .map(|(a, b)| {
                (0..3)
                    .map(|c| (a[c] as i16 - b[c] as i16).abs() as u64)
                    .sum::<u64>()
            })
            .sum();

        total as f64 / (w as f64 * h as f64 * 3.0)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn shade(channel: u8, n: f64) -> u8 {
    (channel as f64 + n).max(0.0).min(255.0) as u8
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::profile::test::test_profile;
    use comms_if::cmd::ProfileId;

    fn sim_params() -> SimParams {
        SimParams {
            frame_period_s: 0.0,
            ..SimParams::default()
        }
    }

    #[test]
    fn test_target_motion() {
        let cam = SimCamera::new(sim_params());

        // At t = 0 the target is centred and at its smallest
        let b = cam.target_at(0, 0.0).unwrap();
        assert_eq!((b.width, b.height), (24, 24));
        assert!((b.centroid().x - 320.0).abs() <= 1.0);

        // A quarter period later it has swayed right, half way through its approach
        let b = cam.target_at(0, 5.0).unwrap();
        assert!((b.centroid().x - 480.0).abs() <= 1.0);
        assert!(b.width == 59 || b.width == 60);

        // Half a period in it is back in the centre at its largest
        let b = cam.target_at(0, 10.0).unwrap();
        assert!((b.centroid().x - 320.0).abs() <= 1.0);
        assert_eq!((b.width, b.height), (96, 96));
    }

    #[test]
    fn test_occlusion() {
        let mut p = sim_params();
        p.occlusion_period_frames = 10;
        p.occlusion_frames = 3;
        let cam = SimCamera::new(p);

        assert!(cam.target_at(0, 0.0).is_none());
        assert!(cam.target_at(12, 0.0).is_none());
        assert!(cam.target_at(13, 0.0).is_some());
    }

    #[test]
    fn test_detect_rendered_target() {
        let cam = SimCamera::new(sim_params());
        let profile = test_profile(ProfileId::Stop);
        let mut det = ColourDetector;

        let frame = Frame::now(0, cam.render(0, 0.0));
        let boxes = det.detect(&frame, &profile);
        let expected = cam.target_at(0, 0.0).unwrap();

        assert_eq!(boxes, vec![expected]);

        // The rendered target is close to, but not exactly, the reference
        let score = MeanAbsDiffOracle.score(&expected.region(&frame.image).unwrap(), &profile.reference);
        assert!(score > 0.0 && score < profile.gate.max_similarity, "score = {}", score);
    }

    #[test]
    fn test_detector_blobs() {
        let profile = test_profile(ProfileId::Stop);
        let mut img = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));

        let red = Rgb([220, 30, 30]);
        for x in 2..10 {
            for y in 2..10 {
                img.put_pixel(x, y, red);
            }
        }
        for x in 30..50 {
            for y in 40..44 {
                img.put_pixel(x, y, red);
            }
        }
        // Too small
        img.put_pixel(60, 60, red);

        let boxes = ColourDetector.detect(&Frame::now(0, img), &profile);
        assert_eq!(
            boxes,
            vec![BoundingBox::new(2, 2, 8, 8), BoundingBox::new(30, 40, 20, 4)]
        );
    }

    #[test]
    fn test_oracle() {
        let reference = ReferenceAppearance::solid([100, 100, 100]);

        let same = RgbImage::from_pixel(32, 32, Rgb([100, 100, 100]));
        assert_eq!(MeanAbsDiffOracle.score(&same, &reference), 0.0);

        let other = RgbImage::from_pixel(32, 32, Rgb([110, 90, 100]));
        let s = MeanAbsDiffOracle.score(&other, &reference);
        assert!((s - 20.0 / 3.0).abs() < 1e-9);

        // Regions of other sizes are resampled first
        let small = RgbImage::from_pixel(10, 20, Rgb([110, 90, 100]));
        let s = MeanAbsDiffOracle.score(&small, &reference);
        assert!((s - 20.0 / 3.0).abs() < 1.0, "score = {}", s);
    }

    #[test]
    fn test_camera_failure() {
        let mut p = sim_params();
        p.fail_after_frames = Some(2);
        let mut cam = SimCamera::new(p);

        assert_eq!(cam.next_frame().unwrap().seq, 0);
        assert_eq!(cam.next_frame().unwrap().seq, 1);
        assert!(cam.next_frame().is_err());
    }
}
