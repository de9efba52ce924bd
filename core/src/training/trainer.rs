use candle_nn::loss::mse;
use network::{QuantityModel, Solver};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::error::Error;

use crate::data::TensorSplit;
use crate::training::evaluation::evaluate;
use crate::training::progress::TrainingProgressBar;

/// Per-epoch training and validation loss.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    pub loss: Vec<f32>,
    pub val_loss: Vec<f32>,
}

impl History {
    pub fn epochs(&self) -> usize {
        self.loss.len()
    }
}

/// Mini-batch training with mean squared error on shuffled rows.
pub struct Trainer<'a> {
    batch_size: usize,
    epochs: usize,
    rng: &'a mut StdRng,
}

impl<'a> Trainer<'a> {
    pub fn new(batch_size: usize, epochs: usize, rng: &'a mut StdRng) -> Self {
        Self {
            batch_size: batch_size.max(1),
            epochs,
            rng,
        }
    }

    /// Runs every epoch to completion; there is no early stopping.
    pub fn fit(
        &mut self,
        model: &QuantityModel,
        solver: &mut Solver,
        train: &TensorSplit,
        val: &TensorSplit,
    ) -> Result<History, Box<dyn Error>> {
        let mut history = History::default();
        let mut ids: Vec<u32> = (0..train.len()? as u32).collect();

        for epoch in 1..=self.epochs {
            ids.shuffle(&mut *self.rng);

            let (train_loss, val_loss) = self.train_epoch(model, solver, train, val, &ids, epoch)?;

            log::debug!(
                "Epoch {}: loss {:.5}, val loss {:.5}",
                epoch,
                train_loss,
                val_loss
            );
            history.loss.push(train_loss);
            history.val_loss.push(val_loss);
        }

        Ok(history)
    }

    fn train_epoch(
        &self,
        model: &QuantityModel,
        solver: &mut Solver,
        train: &TensorSplit,
        val: &TensorSplit,
        ids: &[u32],
        epoch: usize,
    ) -> Result<(f32, f32), Box<dyn Error>> {
        let num_batches = ids.len().div_ceil(self.batch_size);
        let progress = TrainingProgressBar::new(num_batches, epoch, self.epochs)?;

        let mut train_loss = 0.0;
        let mut total_error = 0f64;
        let mut rows_processed = 0usize;

        for chunk in ids.chunks(self.batch_size) {
            let (x, y) = train.batch(chunk)?;

            let preds = model.forward_t(&x, true)?;
            let loss = mse(&preds, &y)?;
            solver.backward_step(&loss)?;

            total_error += loss.to_scalar::<f32>()? as f64 * chunk.len() as f64;
            rows_processed += chunk.len();

            train_loss = running_mean(total_error, rows_processed);
            progress.update(train_loss);
        }

        let val_loss = evaluate(model, val, self.batch_size)?;
        progress.finish(val_loss, train_loss);

        Ok((train_loss, val_loss))
    }
}

/// Mean loss per row, given the batch losses summed with their row counts as weights.
fn running_mean(total_error: f64, rows: usize) -> f32 {
    (total_error / rows.max(1) as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Tensor};
    use hyperparams::{Activation, InitializerName, OptimizerName};
    use network::{create_model, resolve_optimizer, Features, ModelSpec, Vocabulary};
    use rand::SeedableRng;

    fn split(n: usize, device: &Device) -> candle_core::Result<TensorSplit> {
        let categories: Vec<u32> = (0..n).map(|i| (i % 3) as u32).collect();
        let skus: Vec<u32> = (0..n).map(|i| (i % 5) as u32).collect();
        let numeric: Vec<f32> = (0..n * 3).map(|i| (i % 7) as f32 / 7.0).collect();
        let targets: Vec<f32> = (0..n).map(|i| (i % 4) as f32).collect();
        Ok(TensorSplit {
            features: Features {
                categories: Tensor::from_vec(categories, (n, 1), device)?,
                skus: Tensor::from_vec(skus, (n, 1), device)?,
                numeric: Tensor::from_vec(numeric, (n, 3), device)?,
            },
            targets: Tensor::from_vec(targets, (n, 1), device)?,
        })
    }

    #[test]
    fn test_fit_records_every_epoch() -> Result<(), Box<dyn Error>> {
        let device = Device::Cpu;
        let spec = ModelSpec {
            vocabulary: Vocabulary::new(3, 5),
            hidden_layers: vec![8, 4],
            activation: Activation::Elu,
            batch_norm: true,
            initializer: Some(InitializerName::HeAvgUniform),
        };
        let (model, varmap) = create_model(&spec, &device)?;
        let mut solver = resolve_optimizer(0.01, Some(OptimizerName::Adam), false)
            .unwrap()
            .build(varmap.all_vars())?;

        let mut rng = StdRng::seed_from_u64(3);
        let mut trainer = Trainer::new(4, 3, &mut rng);
        let history = trainer.fit(&model, &mut solver, &split(10, &device)?, &split(6, &device)?)?;

        assert_eq!(history.epochs(), 3);
        assert_eq!(history.val_loss.len(), 3);
        assert!(history.loss.iter().chain(&history.val_loss).all(|l| l.is_finite()));
        // 10 rows in batches of 4
        assert_eq!(solver.iterations(), 3 * 3);
        Ok(())
    }

    #[test]
    fn test_short_final_batch_is_weighted_by_rows() {
        // two full batches of 4 at loss 1.0 and a final batch of 2 at loss 4.0
        let total = 4.0 * 1.0 + 4.0 * 1.0 + 2.0 * 4.0;
        assert!((running_mean(total, 10) - 1.6).abs() < 1e-6);
        assert_eq!(running_mean(0.0, 0), 0.0);
    }

    #[test]
    fn test_constant_model_loss_matches_per_row_mean() -> Result<(), Box<dyn Error>> {
        let device = Device::Cpu;
        let spec = ModelSpec {
            vocabulary: Vocabulary::new(3, 5),
            hidden_layers: vec![2],
            activation: Activation::Elu,
            batch_norm: false,
            initializer: Some(InitializerName::HeAvgUniform),
        };
        let (model, varmap) = create_model(&spec, &device)?;
        // a zero learning rate keeps the model fixed across batches
        let mut solver = resolve_optimizer(0.0, Some(OptimizerName::PlainSgd), false)
            .unwrap()
            .build(varmap.all_vars())?;

        let train = split(10, &device)?;
        let expected = evaluate(&model, &train, 10)?;

        let mut rng = StdRng::seed_from_u64(11);
        let mut trainer = Trainer::new(4, 1, &mut rng);
        let history = trainer.fit(&model, &mut solver, &train, &split(3, &device)?)?;

        assert!((history.loss[0] - expected).abs() < 1e-4 * expected.max(1.0));
        Ok(())
    }
}
