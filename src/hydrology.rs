//! One monthly step of the karst hydrology: soil, epikarst, KS1, KS2 and diffuse flow.
//!
//! Routing topology:
//!
//! ```text
//!  rain ──► soil ──f1, overflow──► epikarst ──f3──► KS1 ──f5, spill──► discharge
//!   │                                │  │            ▲
//!   └──f8 bypass──► diffuse ◄──diff──┘  └──f4──► KS2 ┘f7 ──f6, spill──► discharge
//!                      └──────── Weibull-delayed release ─────────────► discharge
//! ```
//!
//! Every flux is taken from the store it leaves, so the step conserves water exactly:
//! precipitation minus evaporative losses equals the change in storage plus discharge.
use crate::config::Config;
use crate::constants::{
    BYPASS_RAIN_THRESHOLD, EPIKARST_EVAP_SLOPE, EPIKARST_EVAP_SOIL_FRACTION, FREEZING_POINT,
};
use crate::errors::KarstError;
use crate::forcing::ForcingRecord;
use crate::reservoir::{mix, ReservoirState};
use crate::weibull::WeibullKernel;
use serde::Serialize;

/// Fluxes of one step (mm per step unless noted).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Fluxes {
    /// Evapotranspiration drawn from the soil store.
    pub soil_et: f64,
    /// Evaporation drawn from the epikarst.
    pub epikarst_evap: f64,
    /// Net rain entering the soil column, before bypass.
    pub infiltration: f64,
    /// Rain bypassing the soil into the diffuse path (f8).
    pub bypass: f64,
    /// Soil content above capacity passed to the epikarst.
    pub soil_overflow: f64,
    /// Soil drainage to the epikarst.
    pub f1: f64,
    /// Epikarst drainage to KS1.
    pub f3: f64,
    /// Epikarst overflow above `epicap` to KS2.
    pub f4: f64,
    /// Epikarst content above capacity passed to KS2.
    pub epikarst_spill: f64,
    /// Epikarst drainage into the diffuse path.
    pub diffuse_in: f64,
    /// KS1 discharge.
    pub f5: f64,
    /// KS2 discharge.
    pub f6: f64,
    /// KS2 overflow above `ovicap` to KS1.
    pub f7: f64,
    /// KS1 content above capacity, discharged.
    pub ks1_spill: f64,
    /// KS2 content above capacity, discharged.
    pub ks2_spill: f64,
    /// Weibull-delayed release of the diffuse path.
    pub diffuse_out: f64,
    /// Net karst discharge.
    pub discharge: f64,
    /// Flow-weighted δ18O of the discharge (permille).
    pub discharge_d18o: f64,
}

impl Fluxes {
    /// Water that left the system by evaporation this step.
    pub fn evaporative_loss(&self) -> f64 {
        self.soil_et + self.epikarst_evap
    }
}

/// Outflow `k * level`, never more than the level and never negative.
///
/// A `k` of one drains the store completely in one step.
pub fn calc_flux(k: f64, level: f64) -> f64 {
    if level <= 0.0 {
        return 0.0;
    }
    (k * level).min(level)
}

/// Epikarst evaporation for the step.
///
/// The epikarst evaporates at `k_eevap * evpt` in dry months. In wet months it only
/// evaporates once the soil store is nearly empty (at most 10 % full), tapering off as
/// the soil refills.
pub fn epikarst_evaporation(k_eevap: f64, evpt: f64, prp: f64, soil: f64, soilstore: f64) -> f64 {
    if prp == 0.0 {
        k_eevap * evpt
    } else if soil <= EPIKARST_EVAP_SOIL_FRACTION * soilstore {
        k_eevap * evpt * (1.0 - EPIKARST_EVAP_SLOPE * soil / soilstore)
    } else {
        0.0
    }
}

/// Rain bypassing the soil store: a fraction of net rain in months above the threshold.
pub fn bypass_flow(f8: f64, prp: f64, evpt: f64) -> f64 {
    if prp > BYPASS_RAIN_THRESHOLD {
        f8 * (prp - evpt).max(0.0)
    } else {
        0.0
    }
}

/// Advance the stores by one step.
///
/// Takes the current state and returns the new state and the step's fluxes; the input
/// state is untouched. Fails with [`KarstError::NegativeStorage`] if a store ends the
/// step below zero.
pub fn step(
    state: &ReservoirState,
    config: &Config,
    kernel: &WeibullKernel,
    forcing: &ForcingRecord,
) -> Result<(ReservoirState, Fluxes), KarstError> {
    let mut next = state.clone();
    let mut fx = Fluxes::default();
    let (prp, evpt) = (forcing.prp, forcing.evpt);

    // Soil: net rain in, bypass split off, evapotranspiration out.
    fx.infiltration = (prp - evpt).max(0.0);
    fx.bypass = bypass_flow(config.f8, prp, evpt).min(fx.infiltration);
    next.soil.receive(&[(fx.infiltration - fx.bypass, forcing.d18o)]);
    fx.soil_et = if prp >= evpt {
        evpt
    } else {
        let deficit = (evpt - prp).min(next.soil.content.max(0.0));
        next.soil.withdraw(deficit);
        prp + deficit
    };
    next.soil.enrich(config.k_d18o_soil * fx.soil_et);
    fx.soil_overflow = next.soil.spill_above(config.soilstore);
    fx.f1 = if forcing.tempp > FREEZING_POINT {
        next.soil.withdraw(calc_flux(config.f1, next.soil.content))
    } else {
        0.0
    };
    let soil_d18o = next.soil.d18o;

    // Epikarst.
    next.epikarst.receive(&[(fx.f1 + fx.soil_overflow, soil_d18o)]);
    fx.f3 = next
        .epikarst
        .withdraw(calc_flux(config.f3, next.epikarst.content));
    fx.diffuse_in = next
        .epikarst
        .withdraw(calc_flux(config.k_diffuse, next.epikarst.content));
    if next.epikarst.content >= config.epicap {
        let above = next.epikarst.content - config.epicap;
        fx.f4 = next.epikarst.withdraw(calc_flux(config.f4, above));
    }
    let epi_d18o = next.epikarst.d18o;
    let evap = epikarst_evaporation(
        config.k_eevap,
        evpt,
        prp,
        next.soil.content,
        config.soilstore,
    );
    fx.epikarst_evap = next
        .epikarst
        .withdraw(evap.max(0.0).min(next.epikarst.content.max(0.0)));
    next.epikarst.enrich(config.k_d18o_epi * fx.epikarst_evap);
    fx.epikarst_spill = next.epikarst.spill_above(config.epikarst);

    // KS2: fed by epikarst overflow, overflows into KS1 above ovicap.
    next.ks2.receive(&[(fx.f4 + fx.epikarst_spill, epi_d18o)]);
    if next.ks2.content >= config.ovicap {
        let above = next.ks2.content - config.ovicap;
        fx.f7 = next.ks2.withdraw(calc_flux(config.f7, above));
    }
    fx.f6 = next.ks2.withdraw(calc_flux(config.f6, next.ks2.content));
    fx.ks2_spill = next.ks2.spill_above(config.ks2);
    let ks2_d18o = next.ks2.d18o;

    // KS1.
    next.ks1.receive(&[(fx.f3, epi_d18o), (fx.f7, ks2_d18o)]);
    fx.f5 = next.ks1.withdraw(calc_flux(config.f5, next.ks1.content));
    fx.ks1_spill = next.ks1.spill_above(config.ks1);
    let ks1_d18o = next.ks1.d18o;

    // Diffuse path: release older pulses, then admit this month's.
    let (diffuse_out, diffuse_d18o) = next.diffuse.release(kernel);
    fx.diffuse_out = diffuse_out;
    let pulse = fx.diffuse_in + fx.bypass;
    let pulse_d18o = mix(
        &[(fx.diffuse_in, epi_d18o), (fx.bypass, forcing.d18o)],
        epi_d18o,
    );
    next.diffuse.receive(pulse, pulse_d18o);

    let ks1_out = fx.f5 + fx.ks1_spill;
    let ks2_out = fx.f6 + fx.ks2_spill;
    fx.discharge = ks1_out + ks2_out + fx.diffuse_out;
    fx.discharge_d18o = mix(
        &[
            (ks1_out, ks1_d18o),
            (ks2_out, ks2_d18o),
            (fx.diffuse_out, diffuse_d18o),
        ],
        ks1_d18o,
    );

    next.check_non_negative(forcing.tt)?;
    Ok((next, fx))
}
