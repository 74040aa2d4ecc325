use clap::Parser;
use karstolution::prelude::*;
use log::info;

/// Run a karst hydrology and speleothem δ18O simulation.
#[derive(Parser, Debug)]
#[command(name = "karstolution", version, about)]
struct Args {
    /// Model configuration (TOML).
    #[arg(short, long, default_value = "data/config.toml")]
    config: String,
    /// Monthly forcing table (csv with columns tt, mm, evpt, prp, tempp, d18O).
    #[arg(short, long, default_value = "data/forcing.csv")]
    forcing: String,
    /// Output csv, one row per step.
    #[arg(short, long, default_value = "karstolution_output.csv")]
    output: String,
    /// Only run the first N steps of the forcing.
    #[arg(short, long)]
    steps: Option<usize>,
}

fn main() -> Result<(), KarstError> {
    pretty_env_logger::init();
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    let mut forcing = ForcingSeries::read(&args.forcing)?;
    if let Some(n) = args.steps {
        forcing = forcing.truncate(n)?;
    }
    info!("Loaded {} forcing steps from {}.", forcing.len(), args.forcing);

    let results = Simulation::new(config, forcing).run()?;
    write_csv(&args.output, &results)?;
    Ok(())
}
