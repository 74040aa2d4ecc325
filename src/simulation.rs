//! Simulation driver: threads the carried state through the forcing series.
//!
//! Each step runs the hydrology, the drip generator and the cave fractionation model
//! in that order. [`Simulation::step`] is a pure function of the carried state and one
//! forcing record; [`Simulation::run`] folds it over the series and stops at the first
//! error.
use crate::config::Config;
use crate::drip::{flowpath_drips, Drip, DripGenerator, Flowpath};
use crate::errors::KarstError;
use crate::forcing::{CaveClimate, ForcingRecord, ForcingSeries};
use crate::hydrology::{self, Fluxes};
use crate::isolution::{isotope_calcite, Fractionation};
use crate::reservoir::ReservoirState;
use crate::utils;
use crate::weibull::WeibullKernel;
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

/// State carried from one step to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct CarriedState {
    /// Store contents and compositions.
    pub reservoirs: ReservoirState,
    /// δ18O of the last drip, `None` before the first step.
    pub prev_drip_d18o: Option<f64>,
    /// Rainfall δ18O of the previous step.
    pub prev_rain_d18o: f64,
    /// Precipitation of the previous step (mm).
    pub prev_prp: f64,
}

/// Calcite grown from one flowpath's drip water.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowpathCalcite {
    /// Source of the drip water.
    pub flowpath: Flowpath,
    /// Drip-water δ18O (permille VSMOW).
    pub drip_d18o: f64,
    /// Drip interval (s).
    pub drip_interval: f64,
    /// Calcite δ18O (permille VSMOW).
    pub calcite_d18o: f64,
    /// Calcite δ18O (permille VPDB).
    pub calcite_d18o_vpdb: f64,
    /// Growth rate (mm/yr).
    pub growth_rate: f64,
}

/// Everything produced by one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Step id (`tt`).
    pub step: usize,
    /// Calendar month of the step.
    pub month: u32,
    /// Forcing record driving the step.
    pub forcing: ForcingRecord,
    /// Hydrological fluxes.
    pub fluxes: Fluxes,
    /// Store contents after the step, in [`STORE_NAMES`](crate::constants::STORE_NAMES) order.
    pub stores: [f64; 5],
    /// Store δ18O after the step, in [`STORE_NAMES`](crate::constants::STORE_NAMES) order.
    pub stores_d18o: [f64; 5],
    /// Cave climate of the month.
    pub climate: CaveClimate,
    /// Drip water of the discharge-fed stalagmite.
    pub drip: Drip,
    /// Fractionation of that drip into calcite.
    pub fractionation: Fractionation,
    /// Per-flowpath stalagmites, in [`Flowpath::ALL`] order.
    pub flowpaths: [Option<FlowpathCalcite>; 5],
}

impl StepResult {
    /// Net karst discharge (mm).
    pub fn discharge(&self) -> f64 {
        self.fluxes.discharge
    }

    /// Drip-water δ18O (permille VSMOW).
    pub fn drip_d18o(&self) -> f64 {
        self.drip.d18o
    }

    /// Calcite δ18O of the discharge-fed stalagmite (permille VSMOW).
    pub fn calcite_d18o(&self) -> f64 {
        self.fractionation.calcite_d18o
    }

    /// Total water held in the stores after the step (mm).
    pub fn total_storage(&self) -> f64 {
        self.stores.iter().sum()
    }
}

/// One monthly simulation over a forcing series.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    config: Config,
    forcing: ForcingSeries,
    kernel: WeibullKernel,
    drips: DripGenerator,
}

impl Simulation {
    /// Simulation of `forcing` under `config`. Builds the transit kernel once.
    pub fn new(config: Config, forcing: ForcingSeries) -> Self {
        let kernel = WeibullKernel::new(
            config.lambda_weibull,
            config.k_weibull,
            config.weibull_delay_months,
        );
        let drips = DripGenerator::new(
            config.mixing_parameter_phi,
            config.lambda_weibull,
            config.k_weibull,
        );
        Simulation {
            config,
            forcing,
            kernel,
            drips,
        }
    }

    /// Configuration of the run.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Forcing series of the run.
    pub fn forcing(&self) -> &ForcingSeries {
        &self.forcing
    }

    /// Carried state before the first step.
    pub fn initial_state(&self) -> CarriedState {
        CarriedState {
            reservoirs: ReservoirState::from_config(&self.config),
            prev_drip_d18o: None,
            prev_rain_d18o: self.config.initial_conditions.d18o_prevrain,
            prev_prp: 0.0,
        }
    }

    /// Advance `carried` by one forcing record.
    pub fn step(
        &self,
        carried: &CarriedState,
        forcing: &ForcingRecord,
    ) -> Result<(CarriedState, StepResult), KarstError> {
        let climate = self.config.monthly_forcing.for_record(forcing)?;
        let (reservoirs, fluxes) =
            hydrology::step(&carried.reservoirs, &self.config, &self.kernel, forcing)?;

        let drip = self.drips.drip(
            fluxes.discharge,
            fluxes.discharge_d18o,
            climate.drip_interval,
            carried.prev_drip_d18o,
        );
        let fractionation = isotope_calcite(forcing.tt, drip.d18o, drip.interval, &climate)?;

        let mut flowpaths = [None; 5];
        let drips = flowpath_drips(
            &reservoirs,
            &self.config,
            &climate,
            forcing,
            carried.prev_rain_d18o,
            carried.prev_prp,
        );
        let paths = flowpaths.iter_mut().zip(drips.iter()).zip(Flowpath::ALL);
        for ((slot, path), flowpath) in paths {
            let Some(d) = path else {
                debug!("step {}: {} flowpath is not dripping", forcing.tt, flowpath.name());
                continue;
            };
            let f = isotope_calcite(forcing.tt, d.d18o, d.interval, &climate)?;
            *slot = Some(FlowpathCalcite {
                flowpath,
                drip_d18o: d.d18o,
                drip_interval: d.interval,
                calcite_d18o: f.calcite_d18o,
                calcite_d18o_vpdb: f.calcite_d18o_vpdb,
                growth_rate: f.growth_rate,
            });
        }

        let result = StepResult {
            step: forcing.tt,
            month: forcing.mm,
            forcing: *forcing,
            fluxes,
            stores: reservoirs.contents(),
            stores_d18o: [
                reservoirs.soil.d18o,
                reservoirs.epikarst.d18o,
                reservoirs.ks1.d18o,
                reservoirs.ks2.d18o,
                reservoirs.diffuse.d18o(),
            ],
            climate,
            drip,
            fractionation,
            flowpaths,
        };
        let next = CarriedState {
            reservoirs,
            prev_drip_d18o: Some(drip.d18o),
            prev_rain_d18o: forcing.d18o,
            prev_prp: forcing.prp,
        };
        Ok((next, result))
    }

    /// Run every step of the forcing series.
    pub fn run(&self) -> Result<Vec<StepResult>, KarstError> {
        info!(
            "Running {} steps from step {}.",
            self.forcing.len(),
            self.forcing.iter().next().map_or(0, |r| r.tt)
        );
        let mut carried = self.initial_state();
        let mut results = Vec::with_capacity(self.forcing.len());
        for index in 1..=self.forcing.len() {
            let record = self.forcing.get(index)?;
            let (next, result) = self.step(&carried, record)?;
            debug!(
                "step {}: discharge {:.3} mm, drip {:.3}, calcite {:.3} permille",
                result.step,
                result.discharge(),
                result.drip_d18o(),
                result.calcite_d18o()
            );
            carried = next;
            results.push(result);
        }
        info!(
            "Finished {} steps, {:.1} mm left in storage.",
            results.len(),
            carried.reservoirs.total_water()
        );
        Ok(results)
    }
}

/// Run independent configurations over the same forcing in parallel.
///
/// Results come back in the order of `configs`; each run succeeds or fails on its own.
pub fn run_many(
    configs: &[Config],
    forcing: &ForcingSeries,
) -> Vec<Result<Vec<StepResult>, KarstError>> {
    configs
        .par_iter()
        .map(|c| Simulation::new(c.clone(), forcing.clone()).run())
        .collect()
}

/// Flat csv row of a [`StepResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    /// Step id.
    pub tt: usize,
    /// Calendar month.
    pub mm: u32,
    /// Evapotranspiration (mm).
    pub evpt: f64,
    /// Precipitation (mm).
    pub prp: f64,
    /// Surface temperature (°C).
    pub tempp: f64,
    /// Rainfall δ18O.
    #[serde(rename = "d18O")]
    pub d18o: f64,
    /// Soil evapotranspiration (mm).
    pub soil_et: f64,
    /// Epikarst evaporation (mm).
    pub epikarst_evap: f64,
    /// Soil drainage (mm).
    pub f1: f64,
    /// Epikarst to KS1 (mm).
    pub f3: f64,
    /// Epikarst overflow to KS2 (mm).
    pub f4: f64,
    /// KS1 discharge (mm).
    pub f5: f64,
    /// KS2 discharge (mm).
    pub f6: f64,
    /// KS2 overflow to KS1 (mm).
    pub f7: f64,
    /// Rain bypass (mm).
    pub f8: f64,
    /// Soil overflow (mm).
    pub soil_overflow: f64,
    /// Epikarst spill (mm).
    pub epikarst_spill: f64,
    /// KS1 spill (mm).
    pub ks1_spill: f64,
    /// KS2 spill (mm).
    pub ks2_spill: f64,
    /// Inflow to the diffuse path (mm).
    pub diffuse_in: f64,
    /// Diffuse release (mm).
    pub diffuse_out: f64,
    /// Soil content (mm).
    pub soil: f64,
    /// Epikarst content (mm).
    pub epikarst: f64,
    /// KS1 content (mm).
    pub ks1: f64,
    /// KS2 content (mm).
    pub ks2: f64,
    /// Diffuse content (mm).
    pub diffuse: f64,
    /// Soil δ18O.
    pub d18o_soil: f64,
    /// Epikarst δ18O.
    pub d18o_epikarst: f64,
    /// KS1 δ18O.
    pub d18o_ks1: f64,
    /// KS2 δ18O.
    pub d18o_ks2: f64,
    /// Diffuse δ18O.
    pub d18o_diffuse: f64,
    /// Karst discharge (mm).
    pub discharge: f64,
    /// Discharge δ18O.
    pub discharge_d18o: f64,
    /// Drip-water δ18O.
    pub drip_d18o: f64,
    /// Drip flux (mm/s).
    pub drip_flux: f64,
    /// Drip interval (s).
    pub drip_interval: f64,
    /// Cave temperature (°C).
    pub cave_temp: f64,
    /// Drip-water pCO2 (ppmv).
    pub drip_pco2: f64,
    /// Cave-air pCO2 (ppmv).
    pub cave_pco2: f64,
    /// Cave relative humidity.
    pub rel_humidity: f64,
    /// Cave ventilation (m/s).
    pub ventilation: f64,
    /// Fraction of the film evaporated.
    pub evaporated_fraction: f64,
    /// Evaporative enrichment (permille).
    pub evaporative_shift: f64,
    /// Fraction of calcium precipitated.
    pub precipitated_fraction: f64,
    /// Kinetic enrichment (permille).
    pub kinetic_shift: f64,
    /// Equilibrium offset (permille).
    pub equilibrium_shift: f64,
    /// Calcite-water α.
    pub alpha_calcite_water: f64,
    /// Calcite δ18O (VSMOW).
    pub calcite_d18o: f64,
    /// Calcite δ18O (VPDB).
    pub calcite_d18o_vpdb: f64,
    /// Growth rate (mm/yr).
    pub growth_rate: f64,
    /// Calcite δ18O of flowpath stalagmite 1, empty when it is not dripping.
    pub stal1_d18o: Option<f64>,
    /// Calcite δ18O of flowpath stalagmite 2, empty when it is not dripping.
    pub stal2_d18o: Option<f64>,
    /// Calcite δ18O of flowpath stalagmite 3, empty when it is not dripping.
    pub stal3_d18o: Option<f64>,
    /// Calcite δ18O of flowpath stalagmite 4, empty when it is not dripping.
    pub stal4_d18o: Option<f64>,
    /// Calcite δ18O of flowpath stalagmite 5, empty when it is not dripping.
    pub stal5_d18o: Option<f64>,
    /// Growth rate of flowpath stalagmite 1 (mm/yr).
    pub stal1_growth_rate: Option<f64>,
    /// Growth rate of flowpath stalagmite 2 (mm/yr).
    pub stal2_growth_rate: Option<f64>,
    /// Growth rate of flowpath stalagmite 3 (mm/yr).
    pub stal3_growth_rate: Option<f64>,
    /// Growth rate of flowpath stalagmite 4 (mm/yr).
    pub stal4_growth_rate: Option<f64>,
    /// Growth rate of flowpath stalagmite 5 (mm/yr).
    pub stal5_growth_rate: Option<f64>,
}

impl From<&StepResult> for OutputRow {
    fn from(r: &StepResult) -> Self {
        let stal = |i: usize| r.flowpaths[i].map(|f| f.calcite_d18o);
        let growth = |i: usize| r.flowpaths[i].map(|f| f.growth_rate);
        let (fx, fr) = (&r.fluxes, &r.fractionation);
        OutputRow {
            tt: r.step,
            mm: r.month,
            evpt: r.forcing.evpt,
            prp: r.forcing.prp,
            tempp: r.forcing.tempp,
            d18o: r.forcing.d18o,
            soil_et: fx.soil_et,
            epikarst_evap: fx.epikarst_evap,
            f1: fx.f1,
            f3: fx.f3,
            f4: fx.f4,
            f5: fx.f5,
            f6: fx.f6,
            f7: fx.f7,
            f8: fx.bypass,
            soil_overflow: fx.soil_overflow,
            epikarst_spill: fx.epikarst_spill,
            ks1_spill: fx.ks1_spill,
            ks2_spill: fx.ks2_spill,
            diffuse_in: fx.diffuse_in,
            diffuse_out: fx.diffuse_out,
            soil: r.stores[0],
            epikarst: r.stores[1],
            ks1: r.stores[2],
            ks2: r.stores[3],
            diffuse: r.stores[4],
            d18o_soil: r.stores_d18o[0],
            d18o_epikarst: r.stores_d18o[1],
            d18o_ks1: r.stores_d18o[2],
            d18o_ks2: r.stores_d18o[3],
            d18o_diffuse: r.stores_d18o[4],
            discharge: fx.discharge,
            discharge_d18o: fx.discharge_d18o,
            drip_d18o: r.drip.d18o,
            drip_flux: r.drip.flux,
            drip_interval: r.drip.interval,
            cave_temp: r.climate.cave_temp,
            drip_pco2: r.climate.drip_pco2,
            cave_pco2: r.climate.cave_pco2,
            rel_humidity: r.climate.rel_humidity,
            ventilation: r.climate.ventilation,
            evaporated_fraction: fr.evaporated_fraction,
            evaporative_shift: fr.evaporative_shift,
            precipitated_fraction: fr.precipitated_fraction,
            kinetic_shift: fr.kinetic_shift,
            equilibrium_shift: fr.equilibrium_shift,
            alpha_calcite_water: fr.alpha_calcite_water,
            calcite_d18o: fr.calcite_d18o,
            calcite_d18o_vpdb: fr.calcite_d18o_vpdb,
            growth_rate: fr.growth_rate,
            stal1_d18o: stal(0),
            stal2_d18o: stal(1),
            stal3_d18o: stal(2),
            stal4_d18o: stal(3),
            stal5_d18o: stal(4),
            stal1_growth_rate: growth(0),
            stal2_growth_rate: growth(1),
            stal3_growth_rate: growth(2),
            stal4_growth_rate: growth(3),
            stal5_growth_rate: growth(4),
        }
    }
}

/// Write one flat row per step to a csv file at `path`.
pub fn write_csv(path: &str, results: &[StepResult]) -> Result<(), KarstError> {
    let rows: Vec<OutputRow> = results.iter().map(OutputRow::from).collect();
    utils::record(&rows, path)?;
    info!("Wrote {} rows to {}.", rows.len(), path);
    Ok(())
}
