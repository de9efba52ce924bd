use candle_core::{bail, Result, Tensor};
use candle_nn::{batch_norm, Activation, BatchNorm, BatchNormConfig, Linear, ModuleT};

use crate::context::BuildContext;
use crate::init::InitializerChoice;

/// Activation applied after every normalization step.
///
/// NOTE: this ignores the configured activation, and stacks built without
/// batch normalization apply no activation at all, which makes them a single
/// affine map. Both behaviors are kept so that results stay comparable with
/// earlier sweeps.
pub const NORMALIZED_ACTIVATION: Activation = Activation::Elu(1.0);

const BATCH_NORM_EPS: f64 = 1e-3;
const BATCH_NORM_MOMENTUM: f64 = 0.01;

fn batch_norm_config() -> BatchNormConfig {
    BatchNormConfig {
        eps: BATCH_NORM_EPS,
        remove_mean: true,
        affine: true,
        momentum: BATCH_NORM_MOMENTUM,
    }
}

struct Normalization {
    norm: BatchNorm,
    activation: Activation,
}

pub struct HiddenLayer {
    dense: Linear,
    normalization: Option<Normalization>,
}

impl HiddenLayer {
    pub fn width(&self) -> usize {
        self.dense.weight().dims()[0]
    }

    pub fn is_normalized(&self) -> bool {
        self.normalization.is_some()
    }

    /// Activation applied after this layer, if any.
    pub fn activation(&self) -> Option<Activation> {
        self.normalization.as_ref().map(|n| n.activation)
    }
}

impl ModuleT for HiddenLayer {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let xs = xs.apply(&self.dense)?;
        match &self.normalization {
            Some(n) => xs.apply_t(&n.norm, train)?.apply(&n.activation),
            None => Ok(xs),
        }
    }
}

/// The chain of dense layers between the embedded input and the output.
pub struct HiddenStack {
    layers: Vec<HiddenLayer>,
}

impl HiddenStack {
    /// Builds one dense layer per entry of `widths`, reading `input_width`
    /// features. Layer variables are named `hidden{i}` and `norm{i}`.
    pub fn new(
        ctx: &BuildContext,
        input_width: usize,
        widths: &[usize],
        init: &InitializerChoice,
        normalize: bool,
    ) -> Result<Self> {
        if widths.is_empty() {
            bail!("hidden stack needs at least one layer");
        }

        let mut layers = Vec::with_capacity(widths.len());
        let mut in_dim = input_width;

        for (i, &width) in widths.iter().enumerate() {
            let dense = ctx.dense(&format!("hidden{}", i), in_dim, width, init)?;
            let normalization = if normalize {
                let vb = ctx.var_builder().pp(format!("norm{}", i));
                Some(Normalization {
                    norm: batch_norm(width, batch_norm_config(), vb)?,
                    activation: NORMALIZED_ACTIVATION,
                })
            } else {
                None
            };

            layers.push(HiddenLayer {
                dense,
                normalization,
            });
            in_dim = width;
        }

        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[HiddenLayer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Width of the last layer.
    pub fn output_width(&self) -> usize {
        self.layers.last().map(|l| l.width()).unwrap_or(0)
    }
}

impl ModuleT for HiddenStack {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let mut xs = xs.clone();
        for layer in &self.layers {
            xs = layer.forward_t(&xs, train)?;
        }
        Ok(xs)
    }
}
