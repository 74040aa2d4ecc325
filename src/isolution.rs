//! In-cave fractionation of drip water into speleothem calcite (ISOLUTION).
//!
//! A drop spreads into a thin film on the stalagmite top. During the drip interval the
//! film partly evaporates (Craig-Gordon enrichment), degasses CO2 towards the cave
//! pCO2 and precipitates calcite. Precipitation removes bicarbonate in a Rayleigh
//! process that enriches the remaining film, damped by isotope exchange with the water
//! (buffering). Calcite forms at equilibrium with the resulting film composition.
//!
//! The calcite δ18O is the sum
//!
//! ```text
//! δcalcite = δdrip + Δevaporation + Δkinetic + Δequilibrium
//! ```
use crate::chemistry::{
    calcite_water_epsilon, calcium_equilibrium, degassing_epsilon, evaporation_rate, film_area,
    liquid_vapour_epsilon, precipitation_rate_constant,
};
use crate::constants::{
    BUFFERING_TIME_REF, BUFFERING_TIME_SLOPE, CALCITE_DENSITY, CALCITE_MOLAR_MASS,
    CRAIG_GORDON_KINETIC, FILM_THICKNESS, KELVIN, MAX_EVAPORATED_FRACTION, PPM,
    SECONDS_PER_YEAR, VPDB_OFFSET, VPDB_SLOPE, WATER_DENSITY, WATER_MOLAR_MASS,
};
use crate::errors::KarstError;
use crate::forcing::CaveClimate;
use serde::Serialize;

/// Breakdown of the fractionation of one drip water into calcite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fractionation {
    /// Fraction of the film evaporated during the drip interval.
    pub evaporated_fraction: f64,
    /// Enrichment of the film by evaporation (permille).
    pub evaporative_shift: f64,
    /// Fraction of the initial calcium precipitated during the drip interval.
    pub precipitated_fraction: f64,
    /// Rayleigh enrichment from degassing and precipitation (permille).
    pub kinetic_shift: f64,
    /// Calcite-water equilibrium offset (permille).
    pub equilibrium_shift: f64,
    /// Calcite-water fractionation factor α.
    pub alpha_calcite_water: f64,
    /// Calcite δ18O (permille VSMOW).
    pub calcite_d18o: f64,
    /// Calcite δ18O (permille VPDB).
    pub calcite_d18o_vpdb: f64,
    /// Stalagmite growth rate (mm/yr).
    pub growth_rate: f64,
}

/// Convert a δ18O from the VSMOW to the VPDB scale (Coplen, 1983).
pub fn vsmow_to_vpdb(d18o: f64) -> f64 {
    VPDB_SLOPE * d18o - VPDB_OFFSET
}

fn check_inputs(
    step: usize,
    d18o: f64,
    drip_interval: f64,
    c: &CaveClimate,
) -> Result<(), KarstError> {
    let fail = |reason: String| Err(KarstError::cave_climate(step, reason));
    let values = [
        ("drip d18O", d18o),
        ("drip interval", drip_interval),
        ("drip pCO2", c.drip_pco2),
        ("cave pCO2", c.cave_pco2),
        ("relative humidity", c.rel_humidity),
        ("ventilation", c.ventilation),
        ("cave temperature", c.cave_temp),
    ];
    if let Some((name, value)) = values.iter().find(|(_, v)| !v.is_finite()) {
        return fail(format!("{name} is not finite ({value})"));
    }
    if c.drip_pco2 <= 0.0 {
        return fail(format!("drip pCO2 must be > 0, got {}", c.drip_pco2));
    }
    if c.cave_pco2 <= 0.0 {
        return fail(format!("cave pCO2 must be > 0, got {}", c.cave_pco2));
    }
    if !(0.0..=1.0).contains(&c.rel_humidity) {
        return fail(format!("relative humidity must lie in [0, 1], got {}", c.rel_humidity));
    }
    if c.ventilation < 0.0 {
        return fail(format!("ventilation must be >= 0, got {}", c.ventilation));
    }
    if drip_interval <= 0.0 {
        return fail(format!("drip interval must be > 0, got {drip_interval}"));
    }
    if c.cave_temp <= -KELVIN {
        return fail(format!("cave temperature {} is below absolute zero", c.cave_temp));
    }
    Ok(())
}

/// Fractionate drip water of δ18O `d18o` (VSMOW) arriving every `drip_interval` seconds.
///
/// Fails with [`KarstError::InvalidCaveClimate`] for non-positive pCO2, humidity
/// outside `[0, 1]`, non-positive drip interval, or any non-finite input or result.
pub fn isotope_calcite(
    step: usize,
    d18o: f64,
    drip_interval: f64,
    climate: &CaveClimate,
) -> Result<Fractionation, KarstError> {
    check_inputs(step, d18o, drip_interval, climate)?;
    let tc = climate.cave_temp;
    let h = climate.rel_humidity;
    let p_drip = climate.drip_pco2 / PPM;
    let p_cave = climate.cave_pco2 / PPM;

    // Evaporation of the film.
    let film_moles = film_area() * FILM_THICKNESS * WATER_DENSITY / WATER_MOLAR_MASS;
    let evaporated_fraction = (evaporation_rate(tc, h, climate.ventilation) * drip_interval
        / film_moles)
        .min(MAX_EVAPORATED_FRACTION);
    let evaporative_shift = if evaporated_fraction > 0.0 {
        let eps = liquid_vapour_epsilon(tc) + CRAIG_GORDON_KINETIC * (1.0 - h);
        (d18o + 1000.0) * ((1.0 - evaporated_fraction).powf(-eps / 1000.0) - 1.0)
    } else {
        0.0
    };
    let film_d18o = d18o + evaporative_shift;

    // Degassing and precipitation.
    let c0 = calcium_equilibrium(p_drip, tc) / (1.0 - evaporated_fraction);
    let c_app = calcium_equilibrium(p_cave, tc);
    let tau = FILM_THICKNESS / precipitation_rate_constant(tc);
    let precipitated_fraction = if c0 > c_app {
        (c0 - c_app) / c0 * (1.0 - (-drip_interval / tau).exp())
    } else {
        0.0
    };
    let growth_rate = c0 * precipitated_fraction * 1000.0 * FILM_THICKNESS * CALCITE_MOLAR_MASS
        / CALCITE_DENSITY
        * (SECONDS_PER_YEAR / drip_interval)
        * 1000.0;

    let kinetic_shift = if p_drip > p_cave && precipitated_fraction > 0.0 {
        let tau_buff = BUFFERING_TIME_REF * (-BUFFERING_TIME_SLOPE * tc).exp();
        let buffering = tau_buff / (tau_buff + drip_interval);
        let exponent = -buffering * degassing_epsilon(tc) / 1000.0;
        (film_d18o + 1000.0) * ((1.0 - precipitated_fraction).powf(exponent) - 1.0)
    } else {
        0.0
    };

    let alpha_calcite_water = (calcite_water_epsilon(tc) / 1000.0).exp();
    let equilibrium_shift = (alpha_calcite_water - 1.0) * (film_d18o + kinetic_shift + 1000.0);
    let calcite_d18o = d18o + evaporative_shift + kinetic_shift + equilibrium_shift;

    let ratios = [
        ("evaporated fraction", evaporated_fraction),
        ("precipitated fraction", precipitated_fraction),
        ("alpha", alpha_calcite_water),
        ("calcite d18O", calcite_d18o),
        ("growth rate", growth_rate),
    ];
    if let Some((name, value)) = ratios.iter().find(|(_, v)| !v.is_finite()) {
        return Err(KarstError::cave_climate(step, format!("{name} evaluated to {value}")));
    }
    if alpha_calcite_water <= 0.0 || c0 <= 0.0 || c_app <= 0.0 {
        return Err(KarstError::cave_climate(
            step,
            format!(
                "degenerate carbonate chemistry (c0 {c0}, c_app {c_app}, \
                 alpha {alpha_calcite_water})"
            ),
        ));
    }

    Ok(Fractionation {
        evaporated_fraction,
        evaporative_shift,
        precipitated_fraction,
        kinetic_shift,
        equilibrium_shift,
        alpha_calcite_water,
        calcite_d18o,
        calcite_d18o_vpdb: vsmow_to_vpdb(calcite_d18o),
        growth_rate,
    })
}
