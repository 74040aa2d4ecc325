//! Carbonate chemistry, film evaporation and oxygen-isotope fractionation factors.
//!
//! Temperatures are in °C at the public interface; pCO2 is in atm unless a function
//! says otherwise. Concentrations are mol/l.
use crate::constants::{ACTIVITY_ITERATIONS, FILM_RADIUS, KELVIN, PPM};
use std::f64::consts::PI;

/// Thermodynamic constants of the CO2-H2O-CaCO3 system at one temperature.
///
/// Plummer & Busenberg (1982).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarbonateConstants {
    /// First dissociation constant of carbonic acid.
    pub k1: f64,
    /// Second dissociation constant of carbonic acid.
    pub k2: f64,
    /// Solubility product of calcite.
    pub kc: f64,
    /// Henry constant of CO2.
    pub kh: f64,
}

impl CarbonateConstants {
    /// Constants at `temp_c` (°C).
    pub fn at(temp_c: f64) -> Self {
        let t = temp_c + KELVIN;
        let lt = t.log10();
        let k1 = -356.3094 - 0.06091964 * t + 21834.37 / t + 126.8339 * lt - 1684915.0 / (t * t);
        let k2 = -107.8871 - 0.03252849 * t + 5151.79 / t + 38.92561 * lt - 563713.9 / (t * t);
        let kc = -171.9065 - 0.077993 * t + 2839.319 / t + 71.595 * lt;
        let kh = 108.3865 + 0.01985076 * t - 6919.53 / t - 40.45154 * lt + 669365.0 / (t * t);
        CarbonateConstants {
            k1: 10f64.powf(k1),
            k2: 10f64.powf(k2),
            kc: 10f64.powf(kc),
            kh: 10f64.powf(kh),
        }
    }
}

/// Davies activity coefficients `(γCa, γHCO3)` of a Ca(HCO3)2 solution of concentration `ca`.
pub fn activity_coefficients(ca: f64, temp_c: f64) -> (f64, f64) {
    let a = 0.4883 + 8.074e-4 * temp_c;
    let ionic = 3.0 * ca.max(0.0);
    let s = ionic.sqrt();
    let davies = s / (1.0 + s) - 0.3 * ionic;
    let g_ca = 10f64.powf(-a * 4.0 * davies);
    let g_hco3 = 10f64.powf(-a * davies);
    (g_ca, g_hco3)
}

/// Calcium concentration (mol/l) of water in equilibrium with calcite at `pco2` (atm).
///
/// `c = (pCO2 K1 KC KH / (4 K2 γCa γHCO3²))^(1/3)`, with the activity coefficients
/// iterated to a fixed point.
pub fn calcium_equilibrium(pco2: f64, temp_c: f64) -> f64 {
    let k = CarbonateConstants::at(temp_c);
    let base = pco2 * k.k1 * k.kc * k.kh / (4.0 * k.k2);
    let mut ca = base.cbrt();
    for _ in 0..ACTIVITY_ITERATIONS {
        let (g_ca, g_hco3) = activity_coefficients(ca, temp_c);
        ca = (base / (g_ca * g_hco3 * g_hco3)).cbrt();
    }
    ca
}

/// pCO2 (ppm) of water holding `ca` mol/l of calcium in equilibrium with calcite.
///
/// Inverse of [`calcium_equilibrium`]; used to prepare drip-water pCO2 inputs from
/// measured calcium concentrations.
///
/// # Examples
///
/// ```
/// use karstolution::chemistry::{calcium_equilibrium, pco2_from_calcium};
/// let ca = calcium_equilibrium(0.01, 10.0);
/// assert!((pco2_from_calcium(ca, 10.0) - 10_000.0).abs() < 1e-6);
/// ```
pub fn pco2_from_calcium(ca: f64, temp_c: f64) -> f64 {
    let k = CarbonateConstants::at(temp_c);
    let (g_ca, g_hco3) = activity_coefficients(ca, temp_c);
    let pco2 = ca.powi(3) * 4.0 * k.k2 * g_ca * g_hco3 * g_hco3 / (k.k1 * k.kc * k.kh);
    pco2 * PPM
}

/// Saturation vapour pressure over water (Pa), Wexler (1976).
pub fn saturation_vapour_pressure(temp_c: f64) -> f64 {
    let t = temp_c + KELVIN;
    (-6094.4642 / t + 21.1249952 - 2.724552e-2 * t + 1.6853396e-5 * t * t + 2.4575506 * t.ln())
        .exp()
}

/// Wetted area of the stalagmite top (m²).
pub fn film_area() -> f64 {
    PI * FILM_RADIUS * FILM_RADIUS
}

/// Evaporation flux from the drip-water film (mol H2O/s).
///
/// Penman-type wind function of the ventilation speed `v` (m/s); zero at saturation.
pub fn evaporation_rate(temp_c: f64, rel_humidity: f64, v: f64) -> f64 {
    let e = saturation_vapour_pressure(temp_c) / 1.3332e2;
    film_area() * (0.002198 + 0.0398 * v.powf(0.5756)) * e * (1.0 - rel_humidity) * 1000.0
        / 3600.0
        / 18.0
}

/// Precipitation rate constant α (m/s) for a thin film, Baker et al. (1998).
pub fn precipitation_rate_constant(temp_c: f64) -> f64 {
    (0.52 + 0.04 * temp_c + 0.004 * temp_c * temp_c) * 1e-7
}

/// `1000 ln α` between calcite and water, Kim & O'Neil (1997).
pub fn calcite_water_epsilon(temp_c: f64) -> f64 {
    let t = temp_c + KELVIN;
    18.03e3 / t - 32.42
}

/// `1000 ln α` between liquid water and vapour, Majoube (1971).
pub fn liquid_vapour_epsilon(temp_c: f64) -> f64 {
    let t = temp_c + KELVIN;
    1.137e6 / (t * t) - 415.6 / t - 2.0667
}

/// `1000 ln α` between gaseous CO2 and dissolved bicarbonate.
///
/// Difference of CO2(g)-H2O (Brenninkmeijer et al., 1983) and HCO3-H2O (Beck et al., 2005).
pub fn degassing_epsilon(temp_c: f64) -> f64 {
    let t = temp_c + KELVIN;
    let co2_water = 17604.0 / t - 17.93;
    let hco3_water = 2.92e6 / (t * t) - 2.66;
    co2_water - hco3_water
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn calcium_rises_with_pco2() {
        let low = calcium_equilibrium(0.001, 10.0);
        let high = calcium_equilibrium(0.01, 10.0);
        assert!(high > low);
        // a few mmol/l for soil-like pCO2
        assert!(high > 1e-3 && high < 5e-3, "got {high}");
    }

    #[test]
    fn calcite_less_soluble_when_warm() {
        assert!(calcium_equilibrium(0.01, 25.0) < calcium_equilibrium(0.01, 5.0));
    }

    #[test]
    fn pco2_inverts_calcium() {
        for &(p, t) in &[(0.002, 8.0), (0.02, 15.0), (0.05, 20.0)] {
            let ca = calcium_equilibrium(p, t);
            assert_relative_eq!(pco2_from_calcium(ca, t), p * PPM, max_relative = 1e-9);
        }
    }

    #[test]
    fn no_evaporation_at_saturation() {
        assert_eq!(evaporation_rate(12.0, 1.0, 0.5), 0.0);
        assert!(evaporation_rate(12.0, 0.9, 0.5) > 0.0);
        assert!(evaporation_rate(12.0, 0.9, 1.0) > evaporation_rate(12.0, 0.9, 0.1));
    }

    #[test]
    fn vapour_pressure_near_table_value() {
        // about 1228 Pa at 10 °C
        assert_relative_eq!(saturation_vapour_pressure(10.0), 1228.0, max_relative = 0.01);
    }

    #[test]
    fn kim_oneil_at_25c() {
        assert_relative_eq!(calcite_water_epsilon(25.0), 28.05, epsilon = 0.05);
    }

    #[test]
    fn fractionation_decreases_with_temperature() {
        assert!(calcite_water_epsilon(5.0) > calcite_water_epsilon(20.0));
        assert!(liquid_vapour_epsilon(5.0) > liquid_vapour_epsilon(20.0));
        assert!(degassing_epsilon(10.0) > 0.0);
    }
}
