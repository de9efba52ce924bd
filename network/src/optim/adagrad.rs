use candle_core::{backprop::GradStore, Result, Var};
use candle_nn::Optimizer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamsAdagrad {
    pub lr: f64,
    pub initial_accumulator: f64,
    pub eps: f64,
}

/// Scales each coordinate by the root of its accumulated squared gradients.
pub struct Adagrad {
    vars: Vec<(Var, Var)>,
    params: ParamsAdagrad,
}

impl Optimizer for Adagrad {
    type Config = ParamsAdagrad;

    fn new(vars: Vec<Var>, params: ParamsAdagrad) -> Result<Self> {
        let vars = vars
            .into_iter()
            .filter(|var| var.dtype().is_float())
            .map(|var| {
                let accumulator = var.ones_like()?.affine(params.initial_accumulator, 0.0)?;
                Ok((var, Var::from_tensor(&accumulator)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { vars, params })
    }

    fn learning_rate(&self) -> f64 {
        self.params.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.params.lr = lr
    }

    fn step(&mut self, grads: &GradStore) -> Result<()> {
        for (var, accumulator) in &self.vars {
            if let Some(grad) = grads.get(var) {
                let next_accumulator = (accumulator.as_tensor() + grad.sqr()?)?;
                let denom = (next_accumulator.sqrt()? + self.params.eps)?;
                let update = ((grad * self.params.lr)? / denom)?;
                accumulator.set(&next_accumulator)?;
                var.set(&(var.as_tensor() - update)?)?;
            }
        }
        Ok(())
    }
}
