//! Validated model configuration.
//!
//! The configuration arrives as a TOML table: flat scalar parameters plus the
//! `[monthly_forcing]` and `[initial_conditions]` sections. It is deserialized into a
//! raw form where every key is optional, checked once by [`RawConfig::validate`], and
//! afterwards passed around by reference as an immutable value.
use crate::constants::{DEFAULT_F4, DEFAULT_WEIBULL_DELAY_MONTHS, KELVIN};
use crate::errors::KarstError;
use crate::forcing::{MonthlyForcing, StoreDripRates};
use log::warn;
use rand_distr::Weibull;
use serde::Deserialize;
use toml::{Table, Value};

/// Starting water volume (mm) and δ18O (permille VSMOW) of every store.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialConditions {
    /// Soil content.
    pub soil: f64,
    /// Epikarst content.
    pub epikarst: f64,
    /// KS1 content.
    pub ks1: f64,
    /// KS2 content.
    pub ks2: f64,
    /// Diffuse store content, entering as a single parcel.
    pub diffuse: f64,
    /// Soil δ18O.
    pub d18o_soil: f64,
    /// Epikarst δ18O.
    pub d18o_epikarst: f64,
    /// KS1 δ18O.
    pub d18o_ks1: f64,
    /// KS2 δ18O.
    pub d18o_ks2: f64,
    /// Diffuse store δ18O.
    pub d18o_diffuse: f64,
    /// Rainfall δ18O of the month before the first step.
    pub d18o_prevrain: f64,
}

/// Full parameter set of a karstolution run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Soil to epikarst drainage fraction.
    pub f1: f64,
    /// Epikarst to KS1 drainage fraction.
    pub f3: f64,
    /// Epikarst overflow fraction above `epicap` (to KS2).
    pub f4: f64,
    /// KS1 discharge fraction.
    pub f5: f64,
    /// KS2 discharge fraction.
    pub f6: f64,
    /// KS2 overflow fraction above `ovicap` (to KS1).
    pub f7: f64,
    /// Rain bypass fraction (soil to the diffuse store).
    pub f8: f64,
    /// Epikarst to diffuse-store fraction.
    pub k_diffuse: f64,
    /// Weight of KS1 water in the first bypass drip.
    pub i: f64,
    /// Weight of this month's rain in the first bypass drip.
    pub j: f64,
    /// Weight of last month's rain in the first bypass drip.
    pub k: f64,
    /// Weight of KS1 water in the second bypass drip.
    pub m: f64,
    /// Weight of this month's rain in the second bypass drip.
    pub n: f64,
    /// Epikarst evaporation as a fraction of evapotranspiration.
    pub k_eevap: f64,
    /// Soil evaporative enrichment (permille per mm evaporated).
    pub k_d18o_soil: f64,
    /// Epikarst evaporative enrichment (permille per mm evaporated).
    pub k_d18o_epi: f64,
    /// Soil store capacity (mm).
    pub soilstore: f64,
    /// Epikarst overflow threshold (mm).
    pub epicap: f64,
    /// KS2 overflow threshold (mm).
    pub ovicap: f64,
    /// Epikarst store capacity (mm).
    pub epikarst: f64,
    /// KS1 capacity (mm).
    pub ks1: f64,
    /// KS2 capacity (mm).
    pub ks2: f64,
    /// Weibull scale of the transit kernel.
    pub lambda_weibull: f64,
    /// Weibull shape of the transit kernel.
    pub k_weibull: f64,
    /// Length of the transit kernel (months).
    pub weibull_delay_months: usize,
    /// Weight of fresh discharge in the drip water; 1 disables conduit mixing.
    pub mixing_parameter_phi: f64,
    /// Monthly cave-climate drivers.
    pub monthly_forcing: MonthlyForcing,
    /// Starting store contents.
    pub initial_conditions: InitialConditions,
}

impl Config {
    /// Read and validate a TOML configuration file.
    pub fn load(path: &str) -> Result<Self, KarstError> {
        let text = std::fs::read_to_string(path)?;
        Config::from_toml_str(&text)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, KarstError> {
        let table: Table = text.parse()?;
        Config::from_table(&table)
    }

    /// Validate a structured mapping. Unknown keys are ignored.
    pub fn from_table(table: &Table) -> Result<Self, KarstError> {
        let raw: RawConfig = Value::Table(table.clone()).try_into()?;
        raw.validate()
    }

    fn check_bypass_weights(&self) {
        let ijk = self.i + self.j + self.k;
        if (ijk - 1.0).abs() > 1e-6 {
            warn!("bypass weights i + j + k = {ijk}, expected 1");
        }
        let mn = self.m + self.n;
        if (mn - 1.0).abs() > 1e-6 {
            warn!("bypass weights m + n = {mn}, expected 1");
        }
    }
}

/// A configuration value as written: either of the expected type, or kept as is for
/// the error report.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Entry<T> {
    /// Value of the expected type.
    Valid(T),
    /// Anything else.
    Invalid(Value),
}

/// Monthly twelve-value array.
type Monthly = Option<Entry<[f64; 12]>>;

/// Configuration as deserialized, before any key or range check.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    f1: Option<Entry<f64>>,
    f3: Option<Entry<f64>>,
    f4: Option<Entry<f64>>,
    f5: Option<Entry<f64>>,
    f6: Option<Entry<f64>>,
    f7: Option<Entry<f64>>,
    f8: Option<Entry<f64>>,
    k_diffuse: Option<Entry<f64>>,
    i: Option<Entry<f64>>,
    j: Option<Entry<f64>>,
    k: Option<Entry<f64>>,
    m: Option<Entry<f64>>,
    n: Option<Entry<f64>>,
    k_eevap: Option<Entry<f64>>,
    k_d18o_soil: Option<Entry<f64>>,
    k_d18o_epi: Option<Entry<f64>>,
    soilstore: Option<Entry<f64>>,
    epicap: Option<Entry<f64>>,
    ovicap: Option<Entry<f64>>,
    epikarst: Option<Entry<f64>>,
    ks1: Option<Entry<f64>>,
    ks2: Option<Entry<f64>>,
    lambda_weibull: Option<Entry<f64>>,
    k_weibull: Option<Entry<f64>>,
    weibull_delay_months: Option<Entry<usize>>,
    mixing_parameter_phi: Option<Entry<f64>>,
    monthly_forcing: Option<Entry<RawMonthlyForcing>>,
    initial_conditions: Option<Entry<RawInitialConditions>>,
}

/// The `[monthly_forcing]` section as deserialized.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawMonthlyForcing {
    drip_pco2: Monthly,
    cave_pco2: Monthly,
    rel_humidity: Monthly,
    ventilation: Monthly,
    cave_temp: Monthly,
    drip_interval: Monthly,
    driprate_store_full: Monthly,
    driprate_store_empty: Monthly,
}

/// The `[initial_conditions]` section as deserialized.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawInitialConditions {
    soil: Option<Entry<f64>>,
    epikarst: Option<Entry<f64>>,
    ks1: Option<Entry<f64>>,
    ks2: Option<Entry<f64>>,
    diffuse: Option<Entry<f64>>,
    d18o_soil: Option<Entry<f64>>,
    d18o_epikarst: Option<Entry<f64>>,
    d18o_ks1: Option<Entry<f64>>,
    d18o_ks2: Option<Entry<f64>>,
    d18o_diffuse: Option<Entry<f64>>,
    d18o_prevrain: Option<Entry<f64>>,
}

fn require<T>(entry: Option<Entry<T>>, key: &str, expected: &str) -> Result<T, KarstError> {
    match entry {
        Some(Entry::Valid(value)) => Ok(value),
        Some(Entry::Invalid(other)) => Err(KarstError::invalid_config(key, other, expected)),
        None => Err(KarstError::MissingConfigKey {
            key: key.to_string(),
        }),
    }
}

/// A finite number accepted by `check`.
fn number<F>(entry: Option<Entry<f64>>, key: &str, check: F, rule: &str) -> Result<f64, KarstError>
where
    F: Fn(f64) -> bool,
{
    let x = require(entry, key, "must be a number")?;
    if x.is_finite() && check(x) {
        Ok(x)
    } else {
        Err(KarstError::invalid_config(key, x, rule))
    }
}

fn finite(entry: Option<Entry<f64>>, key: &str) -> Result<f64, KarstError> {
    number(entry, key, |_| true, "must be a finite number")
}

fn fraction(entry: Option<Entry<f64>>, key: &str) -> Result<f64, KarstError> {
    number(entry, key, |x| (0.0..=1.0).contains(&x), "must lie in [0, 1]")
}

fn positive(entry: Option<Entry<f64>>, key: &str) -> Result<f64, KarstError> {
    number(entry, key, |x| x > 0.0, "must be > 0")
}

fn non_negative(entry: Option<Entry<f64>>, key: &str) -> Result<f64, KarstError> {
    number(entry, key, |x| x >= 0.0, "must be >= 0")
}

/// Twelve finite values, each accepted by `check`.
fn monthly<F>(entry: Monthly, key: &str, check: F, rule: &str) -> Result<[f64; 12], KarstError>
where
    F: Fn(f64) -> bool,
{
    let values = require(entry, key, "must be an array of exactly 12 numbers")?;
    match values.iter().find(|x| !(x.is_finite() && check(**x))) {
        Some(bad) => Err(KarstError::invalid_config(key, bad, rule)),
        None => Ok(values),
    }
}

impl RawConfig {
    /// Check every key and build the [`Config`].
    ///
    /// Fails with [`KarstError::MissingConfigKey`] for the first absent required key and
    /// [`KarstError::InvalidConfigValue`] for a value of the wrong type or range. Nested
    /// keys are reported by their dotted path.
    pub fn validate(self) -> Result<Config, KarstError> {
        let mf = require(self.monthly_forcing, "monthly_forcing", "must be a table")?;
        let ic = require(
            self.initial_conditions,
            "initial_conditions",
            "must be a table",
        )?;

        let epikarst = positive(self.epikarst, "epikarst")?;
        let ks2 = positive(self.ks2, "ks2")?;
        let mut epicap = positive(self.epicap, "epicap")?;
        let mut ovicap = positive(self.ovicap, "ovicap")?;
        if epicap >= epikarst {
            let adjusted = (epikarst - 1.0).max(0.5 * epikarst);
            warn!("epicap {epicap} >= epikarst {epikarst}, using {adjusted}");
            epicap = adjusted;
        }
        if ovicap >= ks2 {
            let adjusted = (ks2 - 1.0).max(0.5 * ks2);
            warn!("ovicap {ovicap} >= ks2 {ks2}, using {adjusted}");
            ovicap = adjusted;
        }

        let lambda_weibull = positive(self.lambda_weibull, "lambda_weibull")?;
        let k_weibull = positive(self.k_weibull, "k_weibull")?;
        Weibull::new(lambda_weibull, k_weibull).map_err(|e| {
            KarstError::invalid_config(
                "lambda_weibull",
                format!("{lambda_weibull} (k_weibull {k_weibull})"),
                &e.to_string(),
            )
        })?;

        let weibull_delay_months = match self.weibull_delay_months {
            None => DEFAULT_WEIBULL_DELAY_MONTHS,
            Some(Entry::Valid(n)) if n >= 2 => n,
            Some(Entry::Valid(n)) => {
                return Err(KarstError::invalid_config(
                    "weibull_delay_months",
                    n,
                    "must be an integer >= 2",
                ))
            }
            Some(Entry::Invalid(other)) => {
                return Err(KarstError::invalid_config(
                    "weibull_delay_months",
                    other,
                    "must be an integer >= 2",
                ))
            }
        };

        let f4 = match self.f4 {
            None => DEFAULT_F4,
            entry => fraction(entry, "f4")?,
        };

        let config = Config {
            f1: fraction(self.f1, "f1")?,
            f3: fraction(self.f3, "f3")?,
            f4,
            f5: fraction(self.f5, "f5")?,
            f6: fraction(self.f6, "f6")?,
            f7: fraction(self.f7, "f7")?,
            f8: fraction(self.f8, "f8")?,
            k_diffuse: fraction(self.k_diffuse, "k_diffuse")?,
            i: fraction(self.i, "i")?,
            j: fraction(self.j, "j")?,
            k: fraction(self.k, "k")?,
            m: fraction(self.m, "m")?,
            n: fraction(self.n, "n")?,
            k_eevap: non_negative(self.k_eevap, "k_eevap")?,
            k_d18o_soil: finite(self.k_d18o_soil, "k_d18o_soil")?,
            k_d18o_epi: finite(self.k_d18o_epi, "k_d18o_epi")?,
            soilstore: positive(self.soilstore, "soilstore")?,
            epicap,
            ovicap,
            epikarst,
            ks1: positive(self.ks1, "ks1")?,
            ks2,
            lambda_weibull,
            k_weibull,
            weibull_delay_months,
            mixing_parameter_phi: fraction(self.mixing_parameter_phi, "mixing_parameter_phi")?,
            monthly_forcing: mf.validate()?,
            initial_conditions: ic.validate()?,
        };
        config.check_bypass_weights();
        Ok(config)
    }
}

impl RawMonthlyForcing {
    fn validate(self) -> Result<MonthlyForcing, KarstError> {
        let gt_zero = |x: f64| x > 0.0;
        let ge_zero = |x: f64| x >= 0.0;
        let store_drip_rates = match (self.driprate_store_full, self.driprate_store_empty) {
            (None, None) => None,
            (full, empty) => {
                let full = monthly(
                    full,
                    "monthly_forcing.driprate_store_full",
                    ge_zero,
                    "must be >= 0",
                )?;
                let empty = monthly(
                    empty,
                    "monthly_forcing.driprate_store_empty",
                    ge_zero,
                    "must be >= 0",
                )?;
                if let Some((f, _)) = full.iter().zip(empty.iter()).find(|(f, e)| f < e) {
                    return Err(KarstError::invalid_config(
                        "monthly_forcing.driprate_store_full",
                        f,
                        "must be >= driprate_store_empty",
                    ));
                }
                Some(StoreDripRates { full, empty })
            }
        };
        Ok(MonthlyForcing {
            drip_pco2: monthly(
                self.drip_pco2,
                "monthly_forcing.drip_pco2",
                gt_zero,
                "must be > 0",
            )?,
            cave_pco2: monthly(
                self.cave_pco2,
                "monthly_forcing.cave_pco2",
                gt_zero,
                "must be > 0",
            )?,
            rel_humidity: monthly(
                self.rel_humidity,
                "monthly_forcing.rel_humidity",
                |x| (0.0..=1.0).contains(&x),
                "must lie in [0, 1]",
            )?,
            ventilation: monthly(
                self.ventilation,
                "monthly_forcing.ventilation",
                ge_zero,
                "must be >= 0",
            )?,
            cave_temp: monthly(
                self.cave_temp,
                "monthly_forcing.cave_temp",
                |x| x > -KELVIN,
                "must be above absolute zero",
            )?,
            drip_interval: monthly(
                self.drip_interval,
                "monthly_forcing.drip_interval",
                gt_zero,
                "must be > 0",
            )?,
            store_drip_rates,
        })
    }
}

impl RawInitialConditions {
    fn validate(self) -> Result<InitialConditions, KarstError> {
        Ok(InitialConditions {
            soil: non_negative(self.soil, "initial_conditions.soil")?,
            epikarst: non_negative(self.epikarst, "initial_conditions.epikarst")?,
            ks1: non_negative(self.ks1, "initial_conditions.ks1")?,
            ks2: non_negative(self.ks2, "initial_conditions.ks2")?,
            diffuse: non_negative(self.diffuse, "initial_conditions.diffuse")?,
            d18o_soil: finite(self.d18o_soil, "initial_conditions.d18o_soil")?,
            d18o_epikarst: finite(self.d18o_epikarst, "initial_conditions.d18o_epikarst")?,
            d18o_ks1: finite(self.d18o_ks1, "initial_conditions.d18o_ks1")?,
            d18o_ks2: finite(self.d18o_ks2, "initial_conditions.d18o_ks2")?,
            d18o_diffuse: finite(self.d18o_diffuse, "initial_conditions.d18o_diffuse")?,
            d18o_prevrain: finite(self.d18o_prevrain, "initial_conditions.d18o_prevrain")?,
        })
    }
}
