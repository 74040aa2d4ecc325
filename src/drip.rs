//! Drip Generator: turns karst discharge into drip water reaching the cave.
use crate::config::Config;
use crate::forcing::{CaveClimate, ForcingRecord};
use crate::reservoir::ReservoirState;
use crate::weibull;
use serde::Serialize;

/// Drip water feeding the primary stalagmite for one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Drip {
    /// Mean drip interval (s).
    pub interval: f64,
    /// Discharge per second of drip interval (mm/s).
    pub flux: f64,
    /// Drip-water δ18O (permille VSMOW).
    pub d18o: f64,
}

/// Converts discharge into drips, mixing with the previous drip by `phi`.
///
/// Drip intervals are Weibull distributed around the monthly drip-interval parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DripGenerator {
    phi: f64,
    weibull_mean: f64,
}

impl DripGenerator {
    /// Generator with mixing weight `phi` and Weibull scale `lambda`, shape `k`.
    pub fn new(phi: f64, lambda: f64, k: f64) -> Self {
        DripGenerator {
            phi,
            weibull_mean: weibull::mean(lambda, k),
        }
    }

    /// Expected drip interval for a monthly drip-interval parameter.
    pub fn mean_interval(&self, drip_interval: f64) -> f64 {
        drip_interval * self.weibull_mean
    }

    /// Drip for this step's discharge. `previous` is the last drip δ18O, if any.
    pub fn drip(
        &self,
        discharge: f64,
        discharge_d18o: f64,
        drip_interval: f64,
        previous: Option<f64>,
    ) -> Drip {
        let interval = self.mean_interval(drip_interval);
        let flux = if interval > 0.0 { discharge / interval } else { 0.0 };
        Drip {
            interval,
            flux,
            d18o: mix_with_previous(self.phi, discharge_d18o, previous),
        }
    }
}

/// Linear interpolation `phi·current + (1 − phi)·previous`.
///
/// Returns `current` unchanged when there is no previous drip or `phi` is one.
pub fn mix_with_previous(phi: f64, current: f64, previous: Option<f64>) -> f64 {
    match previous {
        Some(prev) if phi < 1.0 => phi * current + (1.0 - phi) * prev,
        _ => current,
    }
}

/// Drip interval (s) of a store filled to `level` out of `capacity`.
///
/// The drip rate is interpolated linearly between the empty and full rates. A
/// non-positive or non-finite rate means the drip has stopped.
pub fn store_drip_interval(full: f64, empty: f64, level: f64, capacity: f64) -> Option<f64> {
    let rate = empty + (full - empty) * level / capacity;
    if rate > 0.0 && rate.is_finite() {
        Some(1.0 / rate)
    } else {
        None
    }
}

/// Secondary drip sources, each feeding its own stalagmite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Flowpath {
    /// Water drained from KS2.
    Ks2,
    /// KS1 water mixed with this and last month's rain.
    BypassA,
    /// KS1 water mixed with this month's rain.
    BypassB,
    /// Water drained from the epikarst.
    Epikarst,
    /// Water drained from KS1.
    Ks1,
}

impl Flowpath {
    /// Every flowpath, in output column order.
    pub const ALL: [Flowpath; 5] = [
        Flowpath::Ks2,
        Flowpath::BypassA,
        Flowpath::BypassB,
        Flowpath::Epikarst,
        Flowpath::Ks1,
    ];

    /// Short name used in output column headers.
    pub fn name(&self) -> &'static str {
        match self {
            Flowpath::Ks2 => "ks2",
            Flowpath::BypassA => "bypass_a",
            Flowpath::BypassB => "bypass_b",
            Flowpath::Epikarst => "epikarst",
            Flowpath::Ks1 => "ks1",
        }
    }
}

/// Drip water of one flowpath.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowpathDrip {
    /// Source of the drip.
    pub flowpath: Flowpath,
    /// Drip-water δ18O (permille VSMOW).
    pub d18o: f64,
    /// Drip interval (s).
    pub interval: f64,
}

/// Rain-dominated bypass waters mixed with KS1 water.
///
/// `bypass_a` also carries last month's rain; returns `(bypass_a, bypass_b)`.
pub fn bypass_d18o(
    config: &Config,
    ks1_d18o: f64,
    rain_d18o: f64,
    prev_rain_d18o: f64,
) -> (f64, f64) {
    let a = config.i * ks1_d18o + config.j * rain_d18o + config.k * prev_rain_d18o;
    let b = config.m * ks1_d18o + config.n * rain_d18o;
    (a, b)
}

/// Drip waters of the five flowpaths after a hydrology step.
///
/// Entries are `None` when the feeding store has stopped dripping.
pub fn flowpath_drips(
    state: &ReservoirState,
    config: &Config,
    climate: &CaveClimate,
    forcing: &ForcingRecord,
    prev_rain_d18o: f64,
    prev_prp: f64,
) -> [Option<FlowpathDrip>; 5] {
    let (bypass_a, bypass_b) = bypass_d18o(config, state.ks1.d18o, forcing.d18o, prev_rain_d18o);
    let rates = (climate.drip_rate_full, climate.drip_rate_empty);
    let interval = |level: f64, capacity: f64| match rates {
        (Some(full), Some(empty)) => store_drip_interval(full, empty, level, capacity),
        _ if climate.drip_interval > 0.0 => Some(climate.drip_interval),
        _ => None,
    };
    Flowpath::ALL.map(|flowpath| {
        let (d18o, level, capacity) = match flowpath {
            Flowpath::Ks2 => (state.ks2.d18o, state.ks2.content, config.ks2),
            Flowpath::BypassA => (
                bypass_a,
                state.ks1.content + forcing.prp + prev_prp,
                config.ks1,
            ),
            Flowpath::BypassB => (bypass_b, state.ks1.content + forcing.prp, config.ks1),
            Flowpath::Epikarst => (state.epikarst.d18o, state.epikarst.content, config.epikarst),
            Flowpath::Ks1 => (state.ks1.d18o, state.ks1.content, config.ks1),
        };
        interval(level, capacity).map(|interval| FlowpathDrip {
            flowpath,
            d18o,
            interval,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservoir::Store;

    fn config() -> Config {
        Config::from_toml_str(include_str!("../data/config.toml")).unwrap()
    }

    fn forcing() -> ForcingRecord {
        ForcingRecord {
            tt: 1,
            mm: 1,
            evpt: 10.0,
            prp: 60.0,
            tempp: 8.0,
            d18o: -7.0,
        }
    }

    #[test]
    fn phi_one_ignores_previous_drip() {
        let c = config();
        let generator = DripGenerator::new(1.0, c.lambda_weibull, c.k_weibull);
        let a = generator.drip(5.0, -6.3, 100.0, Some(-2.0));
        let b = generator.drip(5.0, -6.3, 100.0, Some(-11.0));
        let first = generator.drip(5.0, -6.3, 100.0, None);
        assert_eq!(a.d18o, -6.3);
        assert_eq!(a, b);
        assert_eq!(a, first);
    }

    #[test]
    fn phi_interpolates() {
        assert!((mix_with_previous(0.25, -4.0, Some(-8.0)) - -7.0).abs() < 1e-12);
        assert_eq!(mix_with_previous(0.0, -4.0, Some(-8.0)), -8.0);
        assert_eq!(mix_with_previous(0.3, -4.0, None), -4.0);
    }

    #[test]
    fn interval_scales_with_weibull_mean() {
        // λ = 5, k = 2: mean 5·Γ(1.5) = 4.4311
        let generator = DripGenerator::new(0.5, 5.0, 2.0);
        let d = generator.drip(10.0, -6.0, 200.0, None);
        assert!((d.interval - 200.0 * 4.431_134_627_263_79).abs() < 1e-9);
        assert!((d.flux * d.interval - 10.0).abs() < 1e-12);
        // shape 1: the mean equals the scale
        let exponential = DripGenerator::new(0.5, 3.0, 1.0);
        assert!((exponential.mean_interval(100.0) - 300.0).abs() < 1e-9);
    }

    #[test]
    fn store_interval_interpolates() {
        assert_eq!(store_drip_interval(0.1, 0.0, 50.0, 100.0), Some(20.0));
        assert_eq!(store_drip_interval(0.1, 0.02, 100.0, 100.0), Some(10.0));
        assert_eq!(store_drip_interval(0.1, 0.0, 0.0, 100.0), None);
    }

    #[test]
    fn bypass_weights() {
        let mut c = config();
        c.i = 0.5;
        c.j = 0.3;
        c.k = 0.2;
        c.m = 0.6;
        c.n = 0.4;
        let (a, b) = bypass_d18o(&c, -5.0, -10.0, -20.0);
        assert!((a - -9.5).abs() < 1e-12);
        assert!((b - -7.0).abs() < 1e-12);
    }

    #[test]
    fn flowpaths_use_monthly_interval_without_store_rates() {
        let mut c = config();
        c.monthly_forcing.store_drip_rates = None;
        let state = ReservoirState::from_config(&c);
        let climate = c.monthly_forcing.for_month(1).unwrap();
        let drips = flowpath_drips(&state, &c, &climate, &forcing(), -8.0, 40.0);
        for (drip, path) in drips.iter().zip(Flowpath::ALL) {
            let drip = drip.unwrap();
            assert_eq!(drip.flowpath, path);
            assert_eq!(drip.interval, climate.drip_interval);
        }
        assert_eq!(drips[0].unwrap().d18o, state.ks2.d18o);
        assert_eq!(drips[4].unwrap().d18o, state.ks1.d18o);
    }

    #[test]
    fn empty_store_stops_dripping() {
        let mut c = config();
        c.monthly_forcing.store_drip_rates = Some(crate::forcing::StoreDripRates {
            full: [0.2; 12],
            empty: [0.0; 12],
        });
        let mut state = ReservoirState::from_config(&c);
        state.ks2 = Store::new(0.0, -6.0);
        state.ks1 = Store::new(0.0, -6.0);
        let climate = c.monthly_forcing.for_month(1).unwrap();
        let mut f = forcing();
        f.prp = 0.0;
        let drips = flowpath_drips(&state, &c, &climate, &f, -8.0, 30.0);
        assert!(drips[0].is_none());
        assert!(drips[1].is_some());
        assert!(drips[2].is_none());
        assert!(drips[4].is_none());
    }
}
