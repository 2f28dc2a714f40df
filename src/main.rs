use anyhow::Result;
use clap::Parser;
use discflight::{
    disc::{Disc, ModelRegistry, RunStatus, SimError},
    parameters,
};
use log::{info, warn};
use std::{env, fs, path::PathBuf};

/// Simulates one disc throw and writes the trajectory to csv
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Parameter file
    #[arg(long, default_value = "config/params.toml")]
    params: PathBuf,

    /// Disc model, overrides `disc.model`
    #[arg(long)]
    model: Option<String>,

    /// Flight time in seconds, overrides `sim.flight_time`
    #[arg(long)]
    flight_time: Option<f64>,

    /// Initial condition overrides, e.g. `--set vx=23 --set phi=0.2`
    #[arg(long = "set", value_parser = parse_override)]
    overrides: Vec<(String, f64)>,

    /// Output directory, a timestamped folder under `out/` by default
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn parse_override(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{s}'"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad value for '{name}': {e}"))?;
    Ok((name.trim().to_string(), value))
}

fn main() -> Result<()> {
    // Default log level to "info"
    if env::var("RUST_LOG").is_err() {
        unsafe { env::set_var("RUST_LOG", "info") }
    }

    pretty_env_logger::init();

    let cli = Cli::parse();

    info!("Reading parameters from '{}'", cli.params.display());
    let params = parameters::parse_string(fs::read_to_string(&cli.params)?)?;

    let registry = ModelRegistry::from_params(&params)?;

    let mut disc = Disc::from_params(&params, &registry)?;
    if let Some(model) = &cli.model {
        disc = disc.with_model(model, *registry.get(model)?)?;
    }

    disc.set_initial_conditions(&as_overrides(&cli.overrides))?;

    let flight_time = match cli.flight_time {
        Some(t) => t,
        None => params.get_float_or("sim.flight_time", 3.0)?,
    };

    let out_dir = cli.out_dir.unwrap_or_else(|| {
        let mut out_dir = PathBuf::from("out");
        // Create a directory with the current date and time
        out_dir.push(chrono::Local::now().format("%Y_%m_%d_%H-%M-%S").to_string());
        out_dir
    });
    fs::create_dir_all(&out_dir)?;

    let traj = match disc.compute_trajectory(flight_time) {
        Ok(traj) => traj,
        Err(SimError::NumericalInstability {
            last_valid_t,
            partial,
        }) => {
            let path = out_dir.join(format!("{}_partial.csv", disc.name()));
            partial.write_csv_file(&path)?;
            warn!("Partial trajectory written to '{}'", path.display());
            anyhow::bail!("Simulation became unstable after t = {last_valid_t} s");
        }
        Err(e) => return Err(e.into()),
    };

    let path = out_dir.join(format!("{}.csv", disc.name()));
    traj.write_csv_file(&path)?;

    match traj.status() {
        RunStatus::Completed => info!("Flight completed"),
        status => info!("Flight ended early: {status:?}"),
    }
    for w in traj.warnings() {
        warn!(
            "Near Euler angle singularity at t = {:.3} s (theta = {:.2} deg)",
            w.t,
            w.theta.to_degrees()
        );
    }
    info!(
        "{} samples, landed at ({:.2}, {:.2}) m, written to '{}'",
        traj.len(),
        traj.x.last().copied().unwrap_or_default(),
        traj.y.last().copied().unwrap_or_default(),
        path.display()
    );

    Ok(())
}

fn as_overrides(values: &[(String, f64)]) -> Vec<(&str, f64)> {
    values.iter().map(|(k, v)| (k.as_str(), *v)).collect()
}
