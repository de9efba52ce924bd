use candle_core::{backprop::GradStore, Result, Var};
use candle_nn::Optimizer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamsRmsProp {
    pub lr: f64,
    pub rho: f64,
    pub momentum: f64,
    pub eps: f64,
}

struct Slot {
    var: Var,
    mean_square: Var,
    momentum: Var,
}

/// Divides the gradient by a running root mean square of recent gradients.
pub struct RmsProp {
    slots: Vec<Slot>,
    params: ParamsRmsProp,
}

impl Optimizer for RmsProp {
    type Config = ParamsRmsProp;

    fn new(vars: Vec<Var>, params: ParamsRmsProp) -> Result<Self> {
        let slots = vars
            .into_iter()
            .filter(|var| var.dtype().is_float())
            .map(|var| {
                let mean_square = Var::zeros(var.shape(), var.dtype(), var.device())?;
                let momentum = Var::zeros(var.shape(), var.dtype(), var.device())?;
                Ok(Slot {
                    var,
                    mean_square,
                    momentum,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { slots, params })
    }

    fn learning_rate(&self) -> f64 {
        self.params.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.params.lr = lr
    }

    fn step(&mut self, grads: &GradStore) -> Result<()> {
        let ParamsRmsProp {
            lr,
            rho,
            momentum,
            eps,
        } = self.params;

        for slot in &self.slots {
            if let Some(grad) = grads.get(&slot.var) {
                let mean_square = ((slot.mean_square.as_tensor() * rho)?
                    + (grad.sqr()? * (1.0 - rho))?)?;
                let step = ((grad * lr)? / (mean_square.sqrt()? + eps)?)?;
                slot.mean_square.set(&mean_square)?;

                let update = if momentum > 0.0 {
                    let accumulated = ((slot.momentum.as_tensor() * momentum)? + step)?;
                    slot.momentum.set(&accumulated)?;
                    accumulated
                } else {
                    step
                };
                slot.var.set(&(slot.var.as_tensor() - update)?)?;
            }
        }
        Ok(())
    }
}
