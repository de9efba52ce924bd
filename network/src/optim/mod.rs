mod adagrad;
mod clip;
mod momentum;
mod rmsprop;
mod schedule;

pub use adagrad::{Adagrad, ParamsAdagrad};
pub use clip::clip_by_norm;
pub use momentum::{Momentum, ParamsMomentum};
pub use rmsprop::{ParamsRmsProp, RmsProp};
pub use schedule::ExponentialDecay;

use candle_core::{backprop::GradStore, Result, Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, SGD};
use hyperparams::OptimizerName;

/// Gradient norm bound used when clipping is requested.
pub const CLIP_NORM: f64 = 1.0;

const MOMENTUM: f64 = 0.9;
const EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimizerKind {
    PlainSgd,
    Momentum {
        momentum: f64,
    },
    Nesterov {
        momentum: f64,
    },
    Adagrad {
        initial_accumulator: f64,
        epsilon: f64,
    },
    RmsProp {
        rho: f64,
        momentum: f64,
        epsilon: f64,
    },
    Adam {
        beta1: f64,
        beta2: f64,
        epsilon: f64,
    },
    /// Plain SGD whose learning rate follows an [`ExponentialDecay`].
    ExponentialDecay {
        decay_steps: usize,
        decay_rate: f64,
    },
}

/// A fully parameterized optimizer, ready to be bound to variables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerChoice {
    pub learning_rate: f64,
    pub clip_norm: Option<f64>,
    pub kind: OptimizerKind,
}

/// Maps an optimizer name to its fixed hyperparameters.
///
/// Returns `None` when no optimizer is named; callers must not train
/// without one.
pub fn resolve_optimizer(
    learning_rate: f64,
    name: Option<OptimizerName>,
    clip_norm: bool,
) -> Option<OptimizerChoice> {
    let kind = match name? {
        OptimizerName::PlainSgd => OptimizerKind::PlainSgd,
        OptimizerName::Momentum => OptimizerKind::Momentum { momentum: MOMENTUM },
        OptimizerName::Nesterov => OptimizerKind::Nesterov { momentum: MOMENTUM },
        OptimizerName::Adagrad => OptimizerKind::Adagrad {
            initial_accumulator: 0.1,
            epsilon: EPSILON,
        },
        OptimizerName::RmsProp => OptimizerKind::RmsProp {
            rho: 0.9,
            momentum: 0.0,
            epsilon: EPSILON,
        },
        OptimizerName::Adam => OptimizerKind::Adam {
            beta1: 0.9,
            beta2: 0.99,
            epsilon: EPSILON,
        },
        OptimizerName::LearningRateScheduling => OptimizerKind::ExponentialDecay {
            decay_steps: 10_000,
            decay_rate: 0.95,
        },
    };

    Some(OptimizerChoice {
        learning_rate,
        clip_norm: clip_norm.then_some(CLIP_NORM),
        kind,
    })
}

impl OptimizerChoice {
    /// Binds the optimizer to `vars`.
    pub fn build(&self, vars: Vec<Var>) -> Result<Solver> {
        let lr = self.learning_rate;
        let mut schedule = None;

        let inner = match self.kind {
            OptimizerKind::PlainSgd => Inner::Sgd(SGD::new(vars.clone(), lr)?),
            OptimizerKind::Momentum { momentum } => Inner::Momentum(Momentum::new(
                vars.clone(),
                ParamsMomentum {
                    lr,
                    momentum,
                    nesterov: false,
                },
            )?),
            OptimizerKind::Nesterov { momentum } => Inner::Momentum(Momentum::new(
                vars.clone(),
                ParamsMomentum {
                    lr,
                    momentum,
                    nesterov: true,
                },
            )?),
            OptimizerKind::Adagrad {
                initial_accumulator,
                epsilon,
            } => Inner::Adagrad(Adagrad::new(
                vars.clone(),
                ParamsAdagrad {
                    lr,
                    initial_accumulator,
                    eps: epsilon,
                },
            )?),
            OptimizerKind::RmsProp {
                rho,
                momentum,
                epsilon,
            } => Inner::RmsProp(RmsProp::new(
                vars.clone(),
                ParamsRmsProp {
                    lr,
                    rho,
                    momentum,
                    eps: epsilon,
                },
            )?),
            OptimizerKind::Adam {
                beta1,
                beta2,
                epsilon,
            } => Inner::Adam(AdamW::new(
                vars.clone(),
                ParamsAdamW {
                    lr,
                    beta1,
                    beta2,
                    eps: epsilon,
                    weight_decay: 0.0,
                },
            )?),
            OptimizerKind::ExponentialDecay {
                decay_steps,
                decay_rate,
            } => {
                schedule = Some(ExponentialDecay {
                    initial_learning_rate: lr,
                    decay_steps,
                    decay_rate,
                });
                Inner::Sgd(SGD::new(vars.clone(), lr)?)
            }
        };

        Ok(Solver {
            inner,
            vars,
            clip_norm: self.clip_norm,
            schedule,
            iterations: 0,
        })
    }
}

enum Inner {
    Sgd(SGD),
    Momentum(Momentum),
    Adagrad(Adagrad),
    RmsProp(RmsProp),
    Adam(AdamW),
}

impl Inner {
    fn step(&mut self, grads: &GradStore) -> Result<()> {
        match self {
            Inner::Sgd(opt) => opt.step(grads),
            Inner::Momentum(opt) => opt.step(grads),
            Inner::Adagrad(opt) => opt.step(grads),
            Inner::RmsProp(opt) => opt.step(grads),
            Inner::Adam(opt) => opt.step(grads),
        }
    }

    fn learning_rate(&self) -> f64 {
        match self {
            Inner::Sgd(opt) => opt.learning_rate(),
            Inner::Momentum(opt) => opt.learning_rate(),
            Inner::Adagrad(opt) => opt.learning_rate(),
            Inner::RmsProp(opt) => opt.learning_rate(),
            Inner::Adam(opt) => opt.learning_rate(),
        }
    }

    fn set_learning_rate(&mut self, lr: f64) {
        match self {
            Inner::Sgd(opt) => opt.set_learning_rate(lr),
            Inner::Momentum(opt) => opt.set_learning_rate(lr),
            Inner::Adagrad(opt) => opt.set_learning_rate(lr),
            Inner::RmsProp(opt) => opt.set_learning_rate(lr),
            Inner::Adam(opt) => opt.set_learning_rate(lr),
        }
    }
}

/// An optimizer bound to a model's variables, with optional gradient
/// clipping and learning-rate schedule applied around each step.
pub struct Solver {
    inner: Inner,
    vars: Vec<Var>,
    clip_norm: Option<f64>,
    schedule: Option<ExponentialDecay>,
    iterations: usize,
}

impl Solver {
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        let mut grads = loss.backward()?;
        if let Some(max_norm) = self.clip_norm {
            clip_by_norm(&mut grads, &self.vars, max_norm)?;
        }
        if let Some(schedule) = &self.schedule {
            self.inner
                .set_learning_rate(schedule.learning_rate_at(self.iterations));
        }

        self.inner.step(&grads)?;
        self.iterations += 1;
        Ok(())
    }

    pub fn learning_rate(&self) -> f64 {
        self.inner.learning_rate()
    }

    /// Number of steps taken so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    const TOLERANCE: f32 = 1e-5;

    /// A single weight at 1.0 with loss `w^2`, so the first gradient is 2.0.
    fn weight() -> Result<Var> {
        Var::new(&[1f32], &Device::Cpu)
    }

    fn loss(w: &Var) -> Result<Tensor> {
        w.as_tensor().sqr()?.sum_all()
    }

    fn value(w: &Var) -> Result<f32> {
        Ok(w.as_tensor().to_vec1::<f32>()?[0])
    }

    fn run(name: OptimizerName, lr: f64, clip: bool, steps: usize) -> Result<Vec<f32>> {
        let w = weight()?;
        let choice = resolve_optimizer(lr, Some(name), clip).unwrap();
        let mut solver = choice.build(vec![w.clone()])?;

        let mut trace = Vec::with_capacity(steps);
        for _ in 0..steps {
            solver.backward_step(&loss(&w)?)?;
            trace.push(value(&w)?);
        }
        Ok(trace)
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < TOLERANCE,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_resolved_constants() {
        let resolve = |name| resolve_optimizer(0.01, Some(name), false).unwrap().kind;

        assert_eq!(resolve(OptimizerName::PlainSgd), OptimizerKind::PlainSgd);
        assert_eq!(
            resolve(OptimizerName::Momentum),
            OptimizerKind::Momentum { momentum: 0.9 }
        );
        assert_eq!(
            resolve(OptimizerName::Nesterov),
            OptimizerKind::Nesterov { momentum: 0.9 }
        );
        assert_eq!(
            resolve(OptimizerName::Adagrad),
            OptimizerKind::Adagrad {
                initial_accumulator: 0.1,
                epsilon: 1e-7
            }
        );
        assert_eq!(
            resolve(OptimizerName::RmsProp),
            OptimizerKind::RmsProp {
                rho: 0.9,
                momentum: 0.0,
                epsilon: 1e-7
            }
        );
        assert_eq!(
            resolve(OptimizerName::Adam),
            OptimizerKind::Adam {
                beta1: 0.9,
                beta2: 0.99,
                epsilon: 1e-7
            }
        );
        assert_eq!(
            resolve(OptimizerName::LearningRateScheduling),
            OptimizerKind::ExponentialDecay {
                decay_steps: 10_000,
                decay_rate: 0.95
            }
        );
    }

    #[test]
    fn test_clip_flag() {
        for name in OptimizerName::ALL {
            let clipped = resolve_optimizer(0.1, Some(name), true).unwrap();
            let unclipped = resolve_optimizer(0.1, Some(name), false).unwrap();
            assert_eq!(clipped.clip_norm, Some(1.0));
            assert_eq!(unclipped.clip_norm, None);
            assert_eq!(clipped.learning_rate, 0.1);
        }
    }

    #[test]
    fn test_missing_name_yields_no_optimizer() {
        assert_eq!(resolve_optimizer(0.1, None, true), None);
    }

    #[test]
    fn test_plain_sgd_step() -> Result<()> {
        let trace = run(OptimizerName::PlainSgd, 0.1, false, 2)?;
        assert_close(trace[0], 0.8);
        assert_close(trace[1], 0.64);
        Ok(())
    }

    #[test]
    fn test_momentum_steps() -> Result<()> {
        let trace = run(OptimizerName::Momentum, 0.1, false, 2)?;
        // v = -0.2; then v = 0.9 * -0.2 - 0.1 * 1.6 = -0.34
        assert_close(trace[0], 0.8);
        assert_close(trace[1], 0.46);
        Ok(())
    }

    #[test]
    fn test_nesterov_step() -> Result<()> {
        let trace = run(OptimizerName::Nesterov, 0.1, false, 1)?;
        // w + 0.9 * -0.2 - 0.2
        assert_close(trace[0], 0.62);
        Ok(())
    }

    #[test]
    fn test_adagrad_step() -> Result<()> {
        let trace = run(OptimizerName::Adagrad, 0.1, false, 1)?;
        assert_close(trace[0], 1.0 - 0.2 / (4.1f32).sqrt());
        Ok(())
    }

    #[test]
    fn test_rmsprop_step() -> Result<()> {
        let trace = run(OptimizerName::RmsProp, 0.1, false, 1)?;
        assert_close(trace[0], 1.0 - 0.2 / (0.4f32).sqrt());
        Ok(())
    }

    #[test]
    fn test_adam_step() -> Result<()> {
        let trace = run(OptimizerName::Adam, 0.01, false, 1)?;
        assert_close(trace[0], 0.99);
        Ok(())
    }

    #[test]
    fn test_clipped_step() -> Result<()> {
        // gradient 2.0 is clipped to 1.0
        let trace = run(OptimizerName::PlainSgd, 0.1, true, 1)?;
        assert_close(trace[0], 0.9);
        Ok(())
    }

    #[test]
    fn test_schedule_decays_learning_rate() -> Result<()> {
        let w = weight()?;
        let choice = resolve_optimizer(0.1, Some(OptimizerName::LearningRateScheduling), false)
            .unwrap();
        let mut solver = choice.build(vec![w.clone()])?;

        solver.backward_step(&loss(&w)?)?;
        assert_close(value(&w)?, 0.8);
        assert_eq!(solver.learning_rate(), 0.1);

        solver.backward_step(&loss(&w)?)?;
        assert_eq!(solver.iterations(), 2);
        assert!(solver.learning_rate() < 0.1);
        Ok(())
    }

    #[test]
    fn test_variables_without_gradients_are_left_alone() -> Result<()> {
        let w = weight()?;
        let untouched = Var::new(&[3f32], &Device::Cpu)?;
        for name in OptimizerName::ALL {
            let choice = resolve_optimizer(0.1, Some(name), true).unwrap();
            let mut solver = choice.build(vec![w.clone(), untouched.clone()])?;
            solver.backward_step(&loss(&w)?)?;
            assert_eq!(value(&untouched)?, 3.0);
        }
        Ok(())
    }
}
