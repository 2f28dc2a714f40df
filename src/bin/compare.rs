use anyhow::Result;
use clap::Parser;
use discflight::{
    batchrunner::BatchRunner,
    disc::{Disc, IntegratorConfig, ModelRegistry, SimError},
    parameters,
};
use log::{info, warn};
use std::{env, fs, path::PathBuf};

/// Throws every known disc mold with the same launch and compares the flights
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Optional parameter file with extra `models` and `sim` settings
    #[arg(long)]
    params: Option<PathBuf>,

    #[arg(long, default_value_t = 4.0)]
    flight_time: f64,

    /// Number of worker threads, all available cores by default
    #[arg(long)]
    workers: Option<usize>,

    /// Also throw the stress-test mold (`jankie`)
    #[arg(long)]
    include_unphysical: bool,
}

fn main() -> Result<()> {
    // Default log level to "info"
    if env::var("RUST_LOG").is_err() {
        unsafe { env::set_var("RUST_LOG", "info") }
    }

    pretty_env_logger::init();

    let cli = Cli::parse();

    let mut registry = ModelRegistry::builtin();
    let mut integrator = IntegratorConfig::default();
    if let Some(path) = &cli.params {
        info!("Reading parameters from '{}'", path.display());
        let params = parameters::parse_string(fs::read_to_string(path)?)?;
        registry = ModelRegistry::from_params(&params)?;
        if let Some(sim) = params.get_map_opt("sim")? {
            integrator = IntegratorConfig::from_params(sim)?;
        }
    }

    let mut discs = vec![];
    for name in registry.names() {
        if !cli.include_unphysical && name == "jankie" {
            continue;
        }

        let mut disc = Disc::from_registry(&registry, name)?.with_integrator(integrator.clone())?;
        disc.set_default_initial_conditions(&[
            ("vx", 23.0),
            ("vy", 0.0),
            ("theta", 0.0),
            ("phi", 0.2),
        ])?;
        disc.reset_initial_conditions();
        discs.push(disc);
    }

    let mut out_dir = PathBuf::from("out");
    // Create a directory with the current date and time
    out_dir.push(chrono::Local::now().format("%Y_%m_%d_%H-%M-%S").to_string());
    fs::create_dir_all(&out_dir)?;

    let results = BatchRunner::new(discs, cli.flight_time, cli.workers)?.run_blocking()?;

    let mut summary = csv::Writer::from_path(out_dir.join("compare.csv"))?;
    for result in results {
        let name = &result.summary.name;
        match &result.trajectory {
            Ok(traj) => traj.write_csv_file(&out_dir.join(format!("{name}.csv")))?,
            Err(SimError::NumericalInstability { partial, .. }) => {
                partial.write_csv_file(&out_dir.join(format!("{name}_partial.csv")))?
            }
            Err(e) => warn!("No trajectory for '{name}': {e}"),
        }
        summary.serialize(&result.summary)?;
    }
    summary.flush()?;

    info!("Results written to '{}'", out_dir.display());

    Ok(())
}
