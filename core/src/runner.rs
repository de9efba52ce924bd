use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use candle_core::Device;
use hyperparams::{Activation, Grid, HyperparameterConfiguration, InitializerName, OptimizerName};
use network::{create_model, resolve_optimizer, ModelSpec};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::DeviceDatasets;
use crate::training::{evaluate, History, Trainer};

/// The hand-picked reference configuration.
pub fn baseline_config() -> HyperparameterConfiguration {
    HyperparameterConfiguration {
        hidden_layers: vec![30, 15, 6],
        activation: Activation::Elu,
        learning_rate: 0.01,
        batch_norm: false,
        initializer: InitializerName::HeAvgUniform,
        optimizer: OptimizerName::Adam,
        epochs: 1,
        batch_size: 50,
    }
}

/// Outcome of training one configuration.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub name: String,
    /// Grid row the configuration came from.
    pub row: Option<usize>,
    pub config: HyperparameterConfiguration,
    pub history: History,
    pub test_loss: f32,
    pub elapsed: Duration,
    pub weights_path: PathBuf,
    pub config_path: PathBuf,
}

/// Trains configurations one after another against fixed splits, persisting
/// each model before the next one is built.
pub struct ExperimentRunner<'a> {
    data: &'a DeviceDatasets,
    device: Device,
    models_dir: PathBuf,
    clip_norm: bool,
    rng: StdRng,
}

impl<'a> ExperimentRunner<'a> {
    pub fn new(
        data: &'a DeviceDatasets,
        device: &Device,
        models_dir: &Path,
        clip_norm: bool,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            data,
            device: device.clone(),
            models_dir: models_dir.to_path_buf(),
            clip_norm,
            rng,
        }
    }

    /// Trains `runs` rows drawn at random from `grid`.
    pub fn sweep(&mut self, grid: &Grid, runs: usize) -> Result<Vec<TrainingRun>, Box<dyn Error>> {
        if runs > 0 && grid.is_empty() {
            return Err(format!(
                "Cannot sample {} runs: no configuration survives filtering",
                runs
            )
            .into());
        }

        let rows = grid.sample_rows(runs, &mut self.rng);
        log::info!("Selected rows {:?} of {}", rows, grid.len());

        let mut results = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            let config = grid
                .get(row)
                .ok_or_else(|| format!("Row {} is outside the grid", row))?
                .clone();

            log::info!("Run {}/{}: row {}", i + 1, runs, row);
            results.push(self.run(&format!("model_{}", row), Some(row), &config)?);
        }

        Ok(results)
    }

    /// Builds, trains, evaluates and persists a single configuration.
    pub fn run(
        &mut self,
        name: &str,
        row: Option<usize>,
        config: &HyperparameterConfiguration,
    ) -> Result<TrainingRun, Box<dyn Error>> {
        log::debug!("Configuration {}:\n{}", name, config);

        let spec = ModelSpec::from_config(config, self.data.vocabulary);
        let (model, varmap) = create_model(&spec, &self.device)?;

        let choice = resolve_optimizer(config.learning_rate, Some(config.optimizer), self.clip_norm)
            .ok_or("No optimizer configured")?;
        let mut solver = choice.build(varmap.all_vars())?;

        let start = Instant::now();
        let history = Trainer::new(config.batch_size, config.epochs, &mut self.rng).fit(
            &model,
            &mut solver,
            &self.data.train,
            &self.data.val,
        )?;
        let elapsed = start.elapsed();

        let test_loss = evaluate(&model, &self.data.test, config.batch_size)?;
        log::info!(
            "Trained {} for {} epochs in {:.2?}, test loss {:.5}",
            name,
            history.epochs(),
            elapsed,
            test_loss
        );

        fs::create_dir_all(&self.models_dir)?;
        let weights_path = self.models_dir.join(format!("{}.safetensors", name));
        varmap.save(&weights_path)?;

        let config_path = self.models_dir.join(format!("{}.csv", name));
        let mut writer = BufWriter::new(File::create(&config_path)?);
        write_config(&mut writer, config)?;
        writer.flush()?;
        log::info!("Saved {:?} and {:?}", weights_path, config_path);

        Ok(TrainingRun {
            name: name.to_string(),
            row,
            config: config.clone(),
            history,
            test_loss,
            elapsed,
            weights_path,
            config_path,
        })
    }
}

/// Writes one `name,value` line per hyperparameter, without a header.
pub fn write_config<W: Write>(
    writer: &mut W,
    config: &HyperparameterConfiguration,
) -> io::Result<()> {
    for (name, value) in config.entries() {
        writeln!(writer, "{},{}", name, quote(&value))?;
    }
    Ok(())
}

fn quote(value: &str) -> String {
    if value.contains([',', '"']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
