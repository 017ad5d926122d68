//! # Continuity Filter Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use comms_if::{
    cmd::{Mode, ProfileId},
    eqpt::cam::Frame,
};
use image::{Rgb, RgbImage};
use rov_lib::{
    ctrl_law::{self, CtrlLawParams},
    per::{BoundingBox, SimilarityOracle},
    profile::{DetectorParams, FailurePolicy, GateParams, ReferenceAppearance, SignProfile},
    track::{ContinuityFilter, ControlState},
};

/// Mean absolute difference of the red channel, enough work to stand in for a real oracle.
struct RedDiffOracle;

impl SimilarityOracle for RedDiffOracle {
    fn score(&self, region: &RgbImage, reference: &ReferenceAppearance) -> f64 {
        let r = reference.image.get_pixel(0, 0)[0] as f64;
        let sum: f64 = region.pixels().map(|p| (p[0] as f64 - r).abs()).sum();
        sum / (region.width() * region.height()) as f64
    }
}

fn profile() -> SignProfile {
    SignProfile {
        id: ProfileId::Stop,
        gate: GateParams {
            max_distance_diff: 80.0,
            max_area_diff: 2000.0,
            min_similarity: -1.0,
            max_similarity: 40.0,
        },
        ctrl: CtrlLawParams {
            min_area: 400.0,
            max_area: 7225.0,
            min_throttle: 20,
            max_throttle: 60,
            backward_accel_const: 650.0,
            max_backward_throttle: 30,
            dead_band_left: 0.45,
            dead_band_right: 0.55,
        },
        failure: FailurePolicy {
            threshold: 5,
            clear_track_on_backoff: false,
        },
        detector: DetectorParams {
            colour_rgb: [220, 30, 30],
            colour_tol: 40,
            min_size_px: 6,
        },
        reference: ReferenceAppearance::solid([220, 30, 30]),
    }
}

fn filter_benchmark(c: &mut Criterion) {
    // ---- Build a frame with a grid of candidate targets ----

    let mut img = RgbImage::from_pixel(640, 480, Rgb([90, 110, 90]));
    let mut candidates = vec![];

    for i in 0..5 {
        for j in 0..4 {
            let b = BoundingBox::new(240 + i * 30, 180 + j * 30, 24, 24);
            for x in b.x..(b.x + b.width) {
                for y in b.y..(b.y + b.height) {
                    img.put_pixel(x, y, Rgb([200 + (i * 4) as u8, 30, 30]));
                }
            }
            candidates.push(b);
        }
    }

    let frame = Frame::now(0, img);
    let profile = profile();
    let filter = ContinuityFilter::new(Box::new(RedDiffOracle));

    let mut tracking = ControlState::new(Mode::Auto, false, ProfileId::Stop);
    tracking.record_trusted(&candidates[7]);

    let seeking = ControlState::new(Mode::Auto, false, ProfileId::Stop);

    // ---- Benchmarks ----

    c.bench_function("filter_bootstrap_20", |b| {
        b.iter(|| filter.select(black_box(&candidates), &frame, &seeking, &profile))
    });

    c.bench_function("filter_tracking_20", |b| {
        b.iter(|| filter.select(black_box(&candidates), &frame, &tracking, &profile))
    });

    c.bench_function("ctrl_law_apply", |b| {
        b.iter(|| ctrl_law::apply(black_box(&candidates[7]), 640, &profile.ctrl))
    });
}

criterion_group!(benches, filter_benchmark);
criterion_main!(benches);
