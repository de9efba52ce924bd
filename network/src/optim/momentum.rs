use candle_core::{backprop::GradStore, Result, Var};
use candle_nn::Optimizer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamsMomentum {
    pub lr: f64,
    pub momentum: f64,
    pub nesterov: bool,
}

/// Gradient descent with a velocity term, optionally with Nesterov lookahead.
///
/// `v <- m * v - lr * g`, then `w <- w + v`, or `w <- w + m * v - lr * g`
/// with Nesterov.
pub struct Momentum {
    vars: Vec<(Var, Var)>,
    params: ParamsMomentum,
}

impl Optimizer for Momentum {
    type Config = ParamsMomentum;

    fn new(vars: Vec<Var>, params: ParamsMomentum) -> Result<Self> {
        let vars = vars
            .into_iter()
            .filter(|var| var.dtype().is_float())
            .map(|var| {
                let velocity = Var::zeros(var.shape(), var.dtype(), var.device())?;
                Ok((var, velocity))
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
        let ParamsMomentum {
            lr,
            momentum,
            nesterov,
        } = self.params;

        for (var, velocity) in &self.vars {
            if let Some(grad) = grads.get(var) {
                let scaled_grad = (grad * lr)?;
                let next_velocity = ((velocity.as_tensor() * momentum)? - &scaled_grad)?;
                let update = if nesterov {
                    ((&next_velocity * momentum)? - &scaled_grad)?
                } else {
                    next_velocity.clone()
                };
                velocity.set(&next_velocity)?;
                var.set(&(var.as_tensor() + update)?)?;
            }
        }
        Ok(())
    }
}
