mod args;
mod data;
mod report;
mod runner;
mod training;
mod utils;

use args::{Args, Command};
use candle_core::Device;
use clap::Parser;
use data::{Datasets, DeviceDatasets};
use hyperparams::{ConfigSpace, Grid};
use log::LevelFilter;
use network::ModelSpec;
use runner::ExperimentRunner;
use simplelog::{CombinedLogger, Config, SharedLogger, SimpleLogger, WriteLogger};
use std::error::Error;
use std::fs::File;
use std::path::Path;
use utils::device::get_device;

fn main() -> Result<(), Box<dyn Error>> {
    let args = init()?;

    match &args.command {
        Command::Grid { show } => {
            let grid = Grid::generate(&ConfigSpace::default());
            report::print_grid(&grid, *show);
        }
        Command::Baseline => {
            let device = get_device()?;
            let data = load_data(&args.data_dir, &device)?;

            let config = runner::baseline_config();
            println!("{}\n", ModelSpec::from_config(&config, data.vocabulary).summary());

            let mut runner = ExperimentRunner::new(
                &data,
                &device,
                &args.models_dir,
                args.clip_norm,
                args.seed,
            );
            let run = runner.run("baseline", None, &config)?;
            report::print_runs(&[run]);
        }
        Command::Sweep { runs } => {
            let grid = Grid::generate(&ConfigSpace::default());
            log::info!(
                "Grid has {} valid rows out of {}",
                grid.len(),
                grid.raw_len()
            );

            let device = get_device()?;
            let data = load_data(&args.data_dir, &device)?;

            let mut runner = ExperimentRunner::new(
                &data,
                &device,
                &args.models_dir,
                args.clip_norm,
                args.seed,
            );
            let results = runner.sweep(&grid, *runs)?;
            report::print_runs(&results);
        }
    }

    log::info!("Done!");
    Ok(())
}

fn init() -> Result<Args, Box<dyn Error>> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![SimpleLogger::new(level, Config::default())];
    if let Some(log_file) = &args.log_file {
        loggers.push(WriteLogger::new(
            LevelFilter::Debug,
            Config::default(),
            File::create(log_file)?,
        ));
    }
    CombinedLogger::init(loggers)?;

    Ok(args)
}

fn load_data(dir: &Path, device: &Device) -> Result<DeviceDatasets, Box<dyn Error>> {
    let datasets = Datasets::load(dir)?;
    let vocabulary = datasets.vocabulary();
    log::info!(
        "{} categories, {} SKUs",
        vocabulary.categories,
        vocabulary.skus
    );
    Ok(datasets.to_tensors(device)?)
}
