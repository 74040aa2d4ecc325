#![allow(dead_code)]
use karstolution::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn sample_config() -> Config {
    Config::load("data/config.toml").unwrap()
}

/// Seasonal monthly forcing with random rain, including dry and frozen months.
pub fn synthetic_forcing(seed: u64, steps: usize) -> ForcingSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let records = (1..=steps)
        .map(|tt| {
            let mm = ((tt - 1) % 12 + 1) as u32;
            let season = (2.0 * std::f64::consts::PI * (mm as f64 - 1.0) / 12.0).cos();
            let dry = rng.gen_bool(0.15);
            ForcingRecord {
                tt,
                mm,
                evpt: (50.0 - 40.0 * season + rng.gen_range(-5.0..5.0)).max(0.0),
                prp: if dry { 0.0 } else { rng.gen_range(0.0..220.0) },
                tempp: 10.0 - 12.0 * season + rng.gen_range(-3.0..3.0),
                d18o: -7.0 - 2.0 * season + rng.gen_range(-1.5..1.5),
            }
        })
        .collect();
    ForcingSeries::new(records).unwrap()
}

pub fn assert_approx(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol * expected.abs().max(1.0),
        "expected {expected}, got {actual}"
    );
}
