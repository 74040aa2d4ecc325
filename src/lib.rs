/*!
* # Karstolution - monthly karst hydrology and speleothem δ18O.
* Rain falls on a soil store and drains through an epikarst into two karst stores (KS1, KS2)
* and a slow diffuse path. Evaporation enriches the soil and epikarst waters; overflow
* thresholds route excess water downstream. The discharge drips into a cave, where the
* ISOLUTION model fractionates it through evaporation, CO2 degassing and calcite
* precipitation to give the δ18O of speleothem calcite for every month.
*
* Five further stalagmites are fed from individual flowpaths (KS2, two rain bypasses,
* the epikarst and KS1), so a single run yields a family of proxy records.
*
*  ## Quick Start
*
*  - Load a configuration and a forcing table.
*  - Build a [Simulation](simulation/struct.Simulation.html) and run it.
*  - Write the results to csv with [write_csv](simulation/fn.write_csv.html).
*
* ```no_run
* use karstolution::prelude::*;
*
* fn main() -> Result<(), KarstError> {
*     let config = Config::load("data/config.toml")?;
*     let forcing = ForcingSeries::read("data/forcing.csv")?;
*     let results = Simulation::new(config, forcing).run()?;
*     write_csv("output.csv", &results)?;
*     Ok(())
* }
* ```
*
* Each step is a pure function of the carried state, so single steps can be examined in
* isolation:
*
* ```
* use karstolution::prelude::*;
*
* let config = Config::load("data/config.toml")?;
* let forcing = ForcingSeries::new(vec![ForcingRecord {
*     tt: 1,
*     mm: 1,
*     evpt: 10.0,
*     prp: 80.0,
*     tempp: 6.0,
*     d18o: -7.5,
* }])?;
* let sim = Simulation::new(config, forcing);
* let start = sim.initial_state();
* let (next, result) = sim.step(&start, sim.forcing().get(1)?)?;
* assert_eq!(next.prev_drip_d18o, Some(result.drip_d18o()));
* # Ok::<(), KarstError>(())
* ```
*/
#![warn(missing_docs)]

pub mod chemistry;
pub mod config;
pub mod constants;
pub mod drip;
pub mod errors;
pub mod forcing;
pub mod hydrology;
pub mod isolution;
pub mod reservoir;
pub mod simulation;
pub mod utils;
pub mod weibull;

/// The types and functions needed to configure, run and record a simulation.
pub mod prelude {
    pub use crate::config::{Config, InitialConditions};
    pub use crate::errors::KarstError;
    pub use crate::forcing::{CaveClimate, ForcingRecord, ForcingSeries, MonthlyForcing};
    pub use crate::reservoir::ReservoirState;
    pub use crate::simulation::{run_many, write_csv, CarriedState, Simulation, StepResult};
}
